use std::path::Path;

use ndarray::{s, Array2, Zip};
use tracing::{info, warn};

use crate::consts::{EPSILON, GLOW_COL_BANDS, GLOW_ROW_BANDS};
use crate::error::Result;
use crate::frame::Binning;
use crate::instrument::InstrumentProfile;
use crate::io::fits::read_image;
use crate::stats::median_of;

use super::clean::clean_defects;
use super::{check_shape, PrefixStep, Reduced};

/// Subtract the master zero.
pub fn correct_zero(mut frame: Reduced, zero_file: Option<&Path>) -> Result<Reduced> {
    let Some(path) = zero_file else {
        return Ok(frame);
    };
    let (_, zero) = read_image(path)?;
    check_shape(frame.data.dim(), zero.dim())?;

    frame.data -= &zero;
    frame.header.set("BIASFILE", path.display().to_string());
    frame.mark(PrefixStep::Zero);
    Ok(frame)
}

/// Subtract the master dark scaled to the frame's exposure time.
///
/// Without `EXPTIME` in both the frame and the master the dark cannot be
/// scaled and the frame passes through unchanged.
pub fn correct_dark(mut frame: Reduced, dark_file: Option<&Path>) -> Result<Reduced> {
    let Some(path) = dark_file else {
        return Ok(frame);
    };
    let (dark_header, dark) = read_image(path)?;
    check_shape(frame.data.dim(), dark.dim())?;
    frame.mark(PrefixStep::Dark);

    let (Some(dark_time), Some(exptime)) =
        (dark_header.opt_f64("EXPTIME")?, frame.header.opt_f64("EXPTIME")?)
    else {
        warn!(dark = %path.display(), "EXPTIME missing, dark not subtracted");
        return Ok(frame);
    };
    if dark_time.abs() < EPSILON as f64 {
        warn!(dark = %path.display(), "Master dark has zero exposure time, dark not subtracted");
        return Ok(frame);
    }

    let factor = (exptime / dark_time) as f32;
    Zip::from(&mut frame.data)
        .and(&dark)
        .for_each(|v, &d| *v -= d * factor);
    frame.header.set("DARKFILE", path.display().to_string());
    Ok(frame)
}

/// Divide by the master flat. Pixels where the flat is zero are left as is.
pub fn correct_flat(mut frame: Reduced, flat_file: Option<&Path>) -> Result<Reduced> {
    let Some(path) = flat_file else {
        return Ok(frame);
    };
    let (_, flat) = read_image(path)?;
    check_shape(frame.data.dim(), flat.dim())?;

    Zip::from(&mut frame.data).and(&flat).for_each(|v, &f| {
        if f.abs() > EPSILON {
            *v /= f;
        }
    });
    frame.header.set("FLATFILE", path.display().to_string());
    frame.mark(PrefixStep::Flat);
    Ok(frame)
}

/// Normalise to counts per second.
pub fn divide_by_exposure_time(mut frame: Reduced, enabled: bool) -> Result<Reduced> {
    if !enabled {
        return Ok(frame);
    }
    frame.header.set("UNITS", "adu / s");
    match frame.header.opt_f64("EXPTIME")? {
        Some(t) if t.abs() > EPSILON as f64 => frame.data /= t as f32,
        Some(_) => warn!("EXPTIME is zero, data not normalised"),
        None => warn!("EXPTIME missing, data not normalised"),
    }
    frame.mark(PrefixStep::ExposureTime);
    Ok(frame)
}

/// Medians of the four glow sampling rectangles as
/// `[[upper-left, upper-right], [lower-left, lower-right]]`.
fn glow_regions(data: &Array2<f32>) -> Option<[[f32; 2]; 2]> {
    let (rows, cols) = data.dim();
    let max_row = GLOW_ROW_BANDS.iter().map(|b| b.1).max().unwrap_or(0);
    let max_col = GLOW_COL_BANDS.iter().map(|b| b.1).max().unwrap_or(0);
    if rows < max_row || cols < max_col {
        return None;
    }
    let mut out = [[0.0f32; 2]; 2];
    for (i, &(r0, r1)) in GLOW_ROW_BANDS.iter().enumerate() {
        for (j, &(c0, c1)) in GLOW_COL_BANDS.iter().enumerate() {
            out[i][j] = median_of(data.slice(s![r0..r1, c0..c1]))?;
        }
    }
    Some(out)
}

/// Remove lateral glow with a scaled template.
///
/// The edge (left or right) holding the faintest sampling rectangle is used.
/// Its upper-to-lower background difference in the frame, divided by the
/// same difference in the defect-cleaned template, scales the template
/// before subtraction.
pub fn correct_lateral_glow(
    mut frame: Reduced,
    glow_file: Option<&Path>,
    profile: &dyn InstrumentProfile,
) -> Result<Reduced> {
    let Some(path) = glow_file else {
        return Ok(frame);
    };
    frame.mark(PrefixStep::LateralGlow);

    let Some(regions) = glow_regions(&frame.data) else {
        warn!(shape = ?frame.data.dim(), "Frame too small for glow sampling, glow not removed");
        return Ok(frame);
    };
    let (_, mut glow) = read_image(path)?;
    check_shape(frame.data.dim(), glow.dim())?;
    if let Some(ccdsum) = frame.header.opt_str("CCDSUM")? {
        clean_defects(&mut glow, Binning::parse(ccdsum)?, profile);
    }

    let flat_index = regions
        .iter()
        .flatten()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i);
    let side = flat_index % 2;

    let midpt1 = regions[0][side];
    let diff = regions[1][side] - midpt1;

    let Some(glow_regions) = glow_regions(&glow) else {
        return Ok(frame);
    };
    let glow_midpt1 = glow_regions[0][side];
    let glow_diff = glow_regions[1][side] - glow_midpt1;
    if glow_diff.abs() < EPSILON {
        warn!(glow = %path.display(), "Glow template has no background gradient, glow not removed");
        return Ok(frame);
    }

    let k = diff / glow_diff;
    info!(scale = k, side, "Removing lateral glow");
    Zip::from(&mut frame.data)
        .and(&glow)
        .for_each(|v, &g| *v -= midpt1 + (g - glow_midpt1) * k);
    frame
        .header
        .add_history(&format!("Lateral glow removed using {} file", path.display()));
    Ok(frame)
}
