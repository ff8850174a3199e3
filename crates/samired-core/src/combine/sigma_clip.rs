use serde::{Deserialize, Serialize};

use crate::stats::median_in_place;

/// Parameters for sigma clipping around the median.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmaClipParams {
    /// Number of rejection iterations (default: 1).
    pub iterations: usize,
    /// Values below `median - low * stddev` are rejected (default: 3.0).
    pub low: f32,
    /// Values above `median + high * stddev` are rejected (default: 3.0).
    pub high: f32,
}

impl Default for SigmaClipParams {
    fn default() -> Self {
        Self {
            iterations: 1,
            low: 3.0,
            high: 3.0,
        }
    }
}

/// Reject outliers from one pixel's values, clearing their `mask` entries.
///
/// The centre is the median of the surviving values and the spread their
/// standard deviation about the mean.
pub fn sigma_clip(
    values: &[f32],
    mask: &mut [bool],
    params: &SigmaClipParams,
    scratch: &mut Vec<f32>,
) {
    for _ in 0..params.iterations {
        scratch.clear();
        scratch.extend(
            values
                .iter()
                .zip(mask.iter())
                .filter(|(_, m)| **m)
                .map(|(v, _)| *v),
        );
        let n = scratch.len();
        if n < 2 {
            return;
        }
        let mean = scratch.iter().sum::<f32>() / n as f32;
        let stddev =
            (scratch.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n as f32).sqrt();
        if stddev < 1e-10 {
            return;
        }
        let Some(centre) = median_in_place(scratch) else {
            return;
        };

        let lo = centre - params.low * stddev;
        let hi = centre + params.high * stddev;
        let mut rejected = false;
        for (v, m) in values.iter().zip(mask.iter_mut()) {
            if *m && (*v < lo || *v > hi) {
                *m = false;
                rejected = true;
            }
        }
        if !rejected {
            return;
        }
    }
}
