//! Statistical combination of calibrated frames into master calibrations.

pub mod combiner;
pub mod minmax;
pub mod scale;
pub mod sigma_clip;

use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{ReductionError, Result};
use crate::stats::median_in_place;

pub use combiner::StackCombiner;
pub use sigma_clip::SigmaClipParams;

/// Type of master calibration being produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MasterKind {
    Zero,
    Dark,
    Flat,
}

impl fmt::Display for MasterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zero => write!(f, "zero"),
            Self::Dark => write!(f, "dark"),
            Self::Flat => write!(f, "flat"),
        }
    }
}

/// Per-pixel reduction of the surviving values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombineMethod {
    #[default]
    Average,
    Median,
}

/// Per-pixel rejection applied before the reduction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Clipping {
    #[default]
    None,
    MinMax,
    Sigma(SigmaClipParams),
}

/// Per-frame scaling applied before combining.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scaling {
    #[default]
    None,
    /// Multiply each frame by the inverse median of its central window.
    InverseCentralMedian,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineParams {
    pub method: CombineMethod,
    pub scaling: Scaling,
    pub clipping: Clipping,
}

impl CombineParams {
    /// Average with min/max rejection, used for zeros and darks.
    pub fn bias() -> Self {
        Self {
            method: CombineMethod::Average,
            clipping: Clipping::MinMax,
            scaling: Scaling::None,
        }
    }

    /// Sigma-clipped median of normalised frames, used for flats.
    pub fn flat() -> Self {
        Self {
            method: CombineMethod::Median,
            clipping: Clipping::Sigma(SigmaClipParams::default()),
            scaling: Scaling::InverseCentralMedian,
        }
    }
}

/// Combine parameters for each master type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    pub zero: CombineParams,
    pub dark: CombineParams,
    pub flat: CombineParams,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            zero: CombineParams::bias(),
            dark: CombineParams::bias(),
            flat: CombineParams::flat(),
        }
    }
}

impl CombineConfig {
    pub fn for_kind(&self, kind: MasterKind) -> &CombineParams {
        match kind {
            MasterKind::Zero => &self.zero,
            MasterKind::Dark => &self.dark,
            MasterKind::Flat => &self.flat,
        }
    }
}

/// Produces a master calibration file from a list of calibrated frames.
pub trait CombineService: Send + Sync {
    /// Combine `inputs` into a new file at `output`.
    fn combine(&self, kind: MasterKind, inputs: &[PathBuf], output: &Path) -> Result<()>;
}

/// Combine same-shaped frames pixel by pixel.
///
/// NaN values take no part. A pixel whose values are all rejected falls
/// back to the reduction over every finite value.
pub fn combine_arrays(frames: &[Array2<f32>], params: &CombineParams) -> Result<Array2<f32>> {
    let Some(first) = frames.first() else {
        return Err(ReductionError::EmptySequence);
    };
    let shape = first.dim();
    if let Some(bad) = frames.iter().find(|f| f.dim() != shape) {
        return Err(ReductionError::ShapeMismatch {
            expected: shape,
            actual: bad.dim(),
        });
    }

    let n = frames.len();
    let mut result = Array2::<f32>::zeros(shape);
    let mut values = Vec::with_capacity(n);
    let mut mask = Vec::with_capacity(n);
    let mut scratch = Vec::with_capacity(n);

    for ((row, col), out) in result.indexed_iter_mut() {
        values.clear();
        values.extend(
            frames
                .iter()
                .map(|f| f[[row, col]])
                .filter(|v| !v.is_nan()),
        );
        mask.clear();
        mask.resize(values.len(), true);

        match &params.clipping {
            Clipping::None => {}
            Clipping::MinMax => minmax::minmax_clip(&values, &mut mask),
            Clipping::Sigma(p) => sigma_clip::sigma_clip(&values, &mut mask, p, &mut scratch),
        }

        scratch.clear();
        scratch.extend(
            values
                .iter()
                .zip(&mask)
                .filter(|(_, m)| **m)
                .map(|(v, _)| *v),
        );
        if scratch.is_empty() {
            scratch.extend_from_slice(&values);
        }
        *out = reduce(&mut scratch, params.method);
    }
    Ok(result)
}

fn reduce(values: &mut [f32], method: CombineMethod) -> f32 {
    if values.is_empty() {
        return f32::NAN;
    }
    match method {
        CombineMethod::Average => values.iter().sum::<f32>() / values.len() as f32,
        CombineMethod::Median => median_in_place(values).unwrap_or(f32::NAN),
    }
}
