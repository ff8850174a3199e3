use ndarray::{s, Array2, ArrayView2};
use tracing::{debug, warn};

use crate::consts::DEFAULT_EQUINOX;
use crate::error::{ReductionError, Result};
use crate::frame::{Binning, ObsType};
use crate::instrument::{InstrumentProfile, MosaicLayout};
use crate::io::fits::Hdu;
use crate::io::header::{Header, Value};
use crate::region::{format_region, parse_region, Region};
use crate::stats::{median_in_place, Polynomial};

use super::{check_shape, Reduced, MERGED_PREFIX};

/// Degree of the overscan model fitted along each amplifier's rows.
const OVERSCAN_FIT_DEGREE: usize = 2;

/// Assemble the full detector frame from the amplifier extensions.
///
/// Each amplifier's overscan (`BIASSEC`) is collapsed to a per-row median
/// profile, modelled with a quadratic in row number and subtracted from the
/// science section (`TRIMSEC`), which is then placed at its binned `DETSEC`.
pub fn merge(hdus: &[Hdu]) -> Result<Reduced> {
    let Some(primary) = hdus.first() else {
        return Err(ReductionError::EmptySequence);
    };

    if hdus.len() == 1 {
        warn!("File contains a single extension, not merging");
        let data = primary
            .data
            .clone()
            .ok_or_else(|| ReductionError::Format("single HDU carries no image".into()))?;
        return Ok(Reduced::new(data, primary.header.clone(), ""));
    }

    let first_amp = &hdus[1].header;
    let detsize = parse_region(first_amp.get_str("DETSIZE")?)?;
    let binning = Binning::from_header(first_amp)?;
    let shape = (detsize.y1 / binning.y, detsize.x1 / binning.x);
    let mut mosaic = Array2::<f32>::zeros(shape);

    for (i, amp) in hdus.iter().enumerate().skip(1) {
        let data = amp.data.as_ref().ok_or_else(|| {
            ReductionError::Format(format!("amplifier extension {i} carries no image"))
        })?;
        let amp_binning = match amp.header.opt_str("CCDSUM")? {
            Some(ccdsum) => Binning::parse(ccdsum)?,
            None => binning,
        };

        let trimsec = section(&amp.header, "TRIMSEC", data.dim())?;
        let biassec = section(&amp.header, "BIASSEC", data.dim())?;
        let detsec = parse_region(amp.header.get_str("DETSEC")?)?.binned(amp_binning.x, amp_binning.y);

        let corrected = subtract_overscan(
            data.slice(s![trimsec.y0..trimsec.y1, trimsec.x0..trimsec.x1]),
            data.slice(s![biassec.y0..biassec.y1, biassec.x0..biassec.x1]),
        )?;

        check_shape(detsec.shape(), corrected.dim())?;
        if !detsec.fits_within(shape) {
            return Err(ReductionError::Format(format!(
                "DETSEC {detsec} of extension {i} lies outside the {}x{} mosaic",
                shape.1, shape.0
            )));
        }
        mosaic
            .slice_mut(s![detsec.y0..detsec.y1, detsec.x0..detsec.x1])
            .assign(&corrected);
        debug!(extension = i, detsec = %detsec, "Placed amplifier");
    }

    let header = merged_header(primary, first_amp, binning)?;
    Ok(Reduced::new(mosaic, header, MERGED_PREFIX))
}

/// Open the physical gap between the two SOI detectors in OBJECT frames.
///
/// Runs after the calibrations, whose masters are built without the gap,
/// and before the WCS so that CRPIX refers to the final width.
pub fn insert_detector_gap(mut frame: Reduced, profile: &dyn InstrumentProfile) -> Result<Reduced> {
    let layout = profile.mosaic_layout();
    if !matches!(layout, MosaicLayout::Gapped { .. }) {
        return Ok(frame);
    }
    let is_object = frame
        .header
        .opt_str("OBSTYPE")?
        .is_some_and(|t| ObsType::parse(t) == ObsType::Object);
    if !is_object {
        return Ok(frame);
    }

    let binning = Binning::from_header(&frame.header)?;
    let gap = layout.gap_pixels(binning);
    frame.data = insert_gap(&frame.data, gap);
    frame
        .header
        .add_history(&format!("Inserted {gap} column detector gap"));
    debug!(gap, "Inserted detector gap");
    Ok(frame)
}

/// Subtract a smooth row-wise overscan model from a science section.
pub fn subtract_overscan(trim: ArrayView2<f32>, bias: ArrayView2<f32>) -> Result<Array2<f32>> {
    let mut profile = Vec::with_capacity(bias.nrows());
    for row in bias.rows() {
        let mut values = row.to_vec();
        profile.push(median_in_place(&mut values).unwrap_or(0.0) as f64);
    }
    let x: Vec<f64> = (1..=profile.len()).map(|v| v as f64).collect();
    let model = Polynomial::fit(&x, &profile, OVERSCAN_FIT_DEGREE)?;

    let mut out = trim.to_owned();
    for (r, mut row) in out.rows_mut().into_iter().enumerate() {
        let level = model.eval((r + 1) as f64) as f32;
        row.mapv_inplace(|v| v - level);
    }
    Ok(out)
}

/// Primary header enriched with the amplifier bookkeeping keywords.
fn merged_header(primary: &Hdu, first_amp: &Header, binning: Binning) -> Result<Header> {
    let mut header = primary.header.clone();
    normalize_header(&mut header);

    header.set_with_comment("UNITS", "ADU", "Pixel intensity units.");
    header.set("CCDSUM", first_amp.get_str("CCDSUM")?.to_string());
    let detsec_text = first_amp.get_str("DETSEC")?.to_string();
    header.set("DETSEC", detsec_text.clone());

    let detsec = parse_region(&detsec_text)?;
    let (dx0, dx1) = (detsec.x0 / binning.x, detsec.x1 / binning.x);
    let (dy0, dy1) = (detsec.y0 / binning.y, detsec.y1 / binning.y);
    header.set("AMP_SEC1", format_region(dx0, dx1, dy0, dy1));
    header.set("AMP_SEC2", format_region(dx0 + dx1, 2 * dx1, dy0, dy1));
    header.set("AMP_SEC3", format_region(dx0, dx1, dy0 + dy1, 2 * dy1));
    header.set("AMP_SEC4", format_region(dx0 + dx1, 2 * dx1, dy0 + dy1, 2 * dy1));
    Ok(header)
}

/// Fix keywords the acquisition system writes in non-standard form.
fn normalize_header(header: &mut Header) {
    header.rename("RADECSYS", "RADESYSA");
    let unavailable = matches!(header.get("EQUINOX"), Some(Value::Str(s)) if s.contains("unavail"));
    if unavailable {
        header.set("EQUINOX", DEFAULT_EQUINOX);
    }
    header.set_default("EPOCH", DEFAULT_EQUINOX);
}

/// Insert `gap` zero columns at the horizontal centre.
pub fn insert_gap(data: &Array2<f32>, gap: usize) -> Array2<f32> {
    let (rows, cols) = data.dim();
    let half = cols / 2;
    let mut out = Array2::<f32>::zeros((rows, cols + gap));
    out.slice_mut(s![.., ..half]).assign(&data.slice(s![.., ..half]));
    out.slice_mut(s![.., half + gap..]).assign(&data.slice(s![.., half..]));
    out
}

fn section(header: &Header, key: &str, shape: (usize, usize)) -> Result<Region> {
    let region = parse_region(header.get_str(key)?)?;
    if !region.fits_within(shape) {
        return Err(ReductionError::Format(format!(
            "{key} {region} exceeds the {}x{} extension",
            shape.1, shape.0
        )));
    }
    Ok(region)
}
