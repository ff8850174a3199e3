use ndarray::Array2;
use tracing::{debug, warn};

use crate::consts::NEIGHBOUR_WINDOW;
use crate::error::Result;
use crate::frame::Binning;
use crate::instrument::InstrumentProfile;
use crate::stats::median_in_place;

use super::{PrefixStep, Reduced};

/// Replace column `x`, rows `y0..yf`, by the per-row median of up to `n`
/// columns on each side. Bounds are clamped to the image.
pub fn clean_column(data: &mut Array2<f32>, x: usize, y0: usize, yf: usize, n: usize) {
    clean_column_skipping(data, x, y0, yf, n, &[]);
}

/// Replace row `y`, columns `x0..xf`, by the per-column median of up to `n`
/// rows above and below. Bounds are clamped to the image.
pub fn clean_line(data: &mut Array2<f32>, x0: usize, xf: usize, y: usize, n: usize) {
    let (rows, cols) = data.dim();
    let xf = xf.min(cols);
    if y >= rows || x0 >= xf {
        return;
    }
    let above = y.saturating_sub(n)..y;
    let below = y + 1..(y + n + 1).min(rows);

    let mut neighbours = Vec::with_capacity(2 * n);
    for x in x0..xf {
        neighbours.clear();
        neighbours.extend(above.clone().map(|r| data[[r, x]]));
        neighbours.extend(below.clone().map(|r| data[[r, x]]));
        if let Some(m) = median_in_place(&mut neighbours) {
            data[[y, x]] = m;
        }
    }
}

/// Clean the instrument's known bad columns and lines for `binning`.
pub fn clean_defects(data: &mut Array2<f32>, binning: Binning, profile: &dyn InstrumentProfile) {
    let columns = profile.bad_columns(binning);
    let lines = profile.bad_lines(binning);
    debug!(
        columns = columns.len(),
        lines = lines.len(),
        binning = %binning,
        "Cleaning detector defects"
    );
    for c in columns {
        clean_column(data, c.x, c.y0, c.yf, NEIGHBOUR_WINDOW);
    }
    for l in lines {
        clean_line(data, l.x0, l.xf, l.y, NEIGHBOUR_WINDOW);
    }
}

/// Repair the columns at the amplifier seam of a freshly merged frame.
///
/// Seam columns never serve as neighbours of one another.
pub fn repair_seams(
    mut frame: Reduced,
    enabled: bool,
    profile: &dyn InstrumentProfile,
) -> Result<Reduced> {
    if !enabled {
        return Ok(frame);
    }
    let (rows, cols) = frame.data.dim();
    let seams = profile.seam_columns(cols);
    for &x in &seams {
        clean_column_skipping(&mut frame.data, x, 0, rows, NEIGHBOUR_WINDOW, &seams);
    }
    frame.header.add_history("Repaired amplifier seam columns.");
    frame.mark(PrefixStep::SeamRepair);
    Ok(frame)
}

/// Final bad-pixel cleanup with the instrument's defect tables.
///
/// The tables are indexed by binning; a frame without `CCDSUM` is left
/// untouched.
pub fn clean_hot_columns_and_lines(
    mut frame: Reduced,
    enabled: bool,
    profile: &dyn InstrumentProfile,
) -> Result<Reduced> {
    if !enabled {
        return Ok(frame);
    }
    match frame.header.opt_str("CCDSUM")? {
        Some(ccdsum) => {
            let binning = Binning::parse(ccdsum)?;
            clean_defects(&mut frame.data, binning, profile);
            frame.header.add_history("Cleaned bad columns and lines.");
        }
        None => warn!("CCDSUM missing, skipping bad column and line cleaning"),
    }
    frame.mark(PrefixStep::Cleanup);
    Ok(frame)
}

fn clean_column_skipping(
    data: &mut Array2<f32>,
    x: usize,
    y0: usize,
    yf: usize,
    n: usize,
    skip: &[usize],
) {
    let (rows, cols) = data.dim();
    let yf = yf.min(rows);
    if x >= cols || y0 >= yf {
        return;
    }
    let left: Vec<usize> = (x.saturating_sub(n)..x).filter(|c| !skip.contains(c)).collect();
    let right: Vec<usize> = (x + 1..(x + n + 1).min(cols))
        .filter(|c| !skip.contains(c))
        .collect();

    let mut neighbours = Vec::with_capacity(left.len() + right.len());
    for y in y0..yf {
        neighbours.clear();
        neighbours.extend(left.iter().chain(&right).map(|&c| data[[y, c]]));
        if let Some(m) = median_in_place(&mut neighbours) {
            data[[y, x]] = m;
        }
    }
}
