//! Per-frame reduction: mosaic merge followed by the correction chain.
//!
//! Every step takes the frame by value and hands it back, so the chain is a
//! plain sequence of calls. Nothing here touches the file system except to
//! read calibration masters.

pub mod clean;
pub mod correct;
pub mod cosmic;
pub mod merge;
pub mod state;
pub mod wcs;

use ndarray::Array2;
use tracing::debug;

use crate::error::{ReductionError, Result};
use crate::instrument::InstrumentProfile;
use crate::io::fits::Hdu;
use crate::io::header::Header;

pub use cosmic::{CosmicRayRejector, LaCosmic, LaCosmicParams};
pub use state::{CalibrationState, PrefixStep, MERGED_PREFIX};

/// Image, header and file-name prefix carried through the chain.
#[derive(Clone, Debug)]
pub struct Reduced {
    pub data: Array2<f32>,
    pub header: Header,
    pub prefix: String,
}

impl Reduced {
    pub fn new(data: Array2<f32>, header: Header, prefix: impl Into<String>) -> Self {
        Self {
            data,
            header,
            prefix: prefix.into(),
        }
    }

    pub(crate) fn mark(&mut self, step: PrefixStep) {
        self.prefix.insert(0, step.symbol());
    }
}

/// Collaborators the chain needs besides the per-frame state.
pub struct ReductionContext<'a> {
    pub profile: &'a dyn InstrumentProfile,
    pub rejector: &'a dyn CosmicRayRejector,
}

/// Reduce one raw frame.
///
/// A file holding a single HDU is already merged and is returned as is with
/// an empty prefix. Otherwise the amplifiers are merged and every step the
/// state enables is applied in canonical order; the resulting prefix always
/// equals `state.prefix(true)`.
pub fn reduce_frame(
    hdus: &[Hdu],
    state: &CalibrationState,
    ctx: &ReductionContext<'_>,
) -> Result<Reduced> {
    if hdus.len() == 1 {
        debug!("Single HDU, frame already merged");
        return merge::merge(hdus);
    }

    let frame = merge::merge(hdus)?;
    let frame = clean::repair_seams(frame, state.repair_seams, ctx.profile)?;
    let frame = correct::correct_zero(frame, state.zero_file.as_deref())?;
    let frame = correct::correct_dark(frame, state.dark_file.as_deref())?;
    let frame = cosmic::remove_cosmic_rays(frame, state.cosmic_rays, ctx.rejector)?;
    let frame = correct::correct_lateral_glow(frame, state.glow_file.as_deref(), ctx.profile)?;
    let frame = correct::correct_flat(frame, state.flat_file.as_deref())?;
    let frame = correct::divide_by_exposure_time(frame, state.exposure_time)?;
    let frame = clean::clean_hot_columns_and_lines(frame, state.clean, ctx.profile)?;
    let frame = merge::insert_detector_gap(frame, ctx.profile)?;
    let frame = wcs::create_wcs(frame)?;

    debug_assert_eq!(frame.prefix, state.prefix(true));
    Ok(frame)
}

pub(crate) fn check_shape(expected: (usize, usize), actual: (usize, usize)) -> Result<()> {
    if expected != actual {
        return Err(ReductionError::ShapeMismatch { expected, actual });
    }
    Ok(())
}
