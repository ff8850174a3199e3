//! Cosmic-ray and hot-pixel rejection.
//!
//! [`LaCosmic`] follows the Laplacian edge detection of van Dokkum (2001):
//! sharp features are found in the Laplacian of a 2x subsampled image,
//! normalised by a Poisson plus read-noise model, and kept as cosmic rays
//! only when they are sharper than the fine structure of real sources.

use ndarray::{Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{
    DEFAULT_COSMIC_ITERATIONS, DEFAULT_GAIN, DEFAULT_OBJLIM, DEFAULT_READ_NOISE, DEFAULT_SIGCLIP,
    DEFAULT_SIGFRAC,
};
use crate::error::Result;
use crate::stats::median_in_place;

use super::Reduced;

/// Detector and detection parameters for L.A.Cosmic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaCosmicParams {
    /// Electrons per ADU.
    pub gain: f32,
    /// Read noise in electrons.
    pub read_noise: f32,
    /// Laplacian significance above which a pixel is a candidate.
    pub sigclip: f32,
    /// Fraction of `sigclip` used when growing around detections.
    pub sigfrac: f32,
    /// Minimum contrast between the Laplacian and the fine structure.
    pub objlim: f32,
    pub max_iterations: usize,
}

impl Default for LaCosmicParams {
    fn default() -> Self {
        Self {
            gain: DEFAULT_GAIN,
            read_noise: DEFAULT_READ_NOISE,
            sigclip: DEFAULT_SIGCLIP,
            sigfrac: DEFAULT_SIGFRAC,
            objlim: DEFAULT_OBJLIM,
            max_iterations: DEFAULT_COSMIC_ITERATIONS,
        }
    }
}

/// Output of a rejector: the cleaned image in electrons and the pixels that
/// were replaced.
#[derive(Clone, Debug)]
pub struct Rejection {
    pub cleaned: Array2<f32>,
    pub mask: Array2<bool>,
}

impl Rejection {
    pub fn rejected_pixels(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

/// Robust cosmic-ray rejection on an image in ADU.
pub trait CosmicRayRejector: Send + Sync {
    /// Electrons per ADU assumed by [`CosmicRayRejector::reject`].
    fn gain(&self) -> f32;

    /// Return the cleaned image in electrons and the rejection mask.
    fn reject(&self, data: &Array2<f32>) -> Result<Rejection>;
}

/// L.A.Cosmic rejector.
#[derive(Clone, Debug, Default)]
pub struct LaCosmic {
    pub params: LaCosmicParams,
}

impl LaCosmic {
    pub fn new(params: LaCosmicParams) -> Self {
        Self { params }
    }
}

impl CosmicRayRejector for LaCosmic {
    fn gain(&self) -> f32 {
        self.params.gain
    }

    fn reject(&self, data: &Array2<f32>) -> Result<Rejection> {
        let p = &self.params;
        let mut image = data.mapv(|v| v * p.gain);
        let mut mask = Array2::<bool>::from_elem(data.dim(), false);
        let grow_limit = p.sigclip * p.sigfrac;

        for iteration in 0..p.max_iterations {
            let lplus = subsampled_laplacian(&image);
            let med5 = median_filter(&image, 2);
            let noise = med5.mapv(|m| (m.max(1e-5) + p.read_noise * p.read_noise).sqrt());

            let snr = Zip::from(&lplus)
                .and(&noise)
                .map_collect(|&l, &n| l / (2.0 * n));
            let snr_background = median_filter(&snr, 2);
            let sp = &snr - &snr_background;

            let med3 = median_filter(&image, 1);
            let med7 = median_filter(&med3, 3);
            let fine = Zip::from(&med3)
                .and(&med7)
                .and(&noise)
                .map_collect(|&m3, &m7, &n| ((m3 - m7) / n).max(0.01));

            let mut candidates = Zip::from(&sp)
                .and(&fine)
                .map_collect(|&s, &f| s > p.sigclip && s / f > p.objlim);
            candidates = grow(&candidates, &sp, p.sigclip);
            candidates = grow(&candidates, &sp, grow_limit);

            let mut found = 0usize;
            Zip::from(&mut mask).and(&candidates).for_each(|m, &c| {
                if c && !*m {
                    *m = true;
                    found += 1;
                }
            });
            debug!(iteration, found, "L.A.Cosmic pass");
            if found == 0 {
                break;
            }
            image = replace_masked(&image, &mask);
        }

        Ok(Rejection {
            cleaned: image,
            mask,
        })
    }
}

/// Remove cosmic rays and hot pixels. The result stays in ADU.
pub fn remove_cosmic_rays(
    mut frame: Reduced,
    enabled: bool,
    rejector: &dyn CosmicRayRejector,
) -> Result<Reduced> {
    if !enabled {
        return Ok(frame);
    }
    let rejection = rejector.reject(&frame.data)?;
    let gain = rejector.gain();
    debug!(rejected = rejection.rejected_pixels(), "Cosmic rays removed");
    frame.data = rejection.cleaned.mapv(|v| v / gain);
    frame
        .header
        .add_history("Cosmic rays and hot pixels removed using LACosmic");
    Ok(frame)
}

/// Positive Laplacian of the image block-replicated 2x2, rebinned back.
///
/// Each sub-pixel of a block sees its own pixel twice and one outside
/// neighbour on each axis, so the convolution reduces to `2v - a - b` per
/// quadrant. Edges replicate the border.
fn subsampled_laplacian(image: &Array2<f32>) -> Array2<f32> {
    let (rows, cols) = image.dim();
    let at = |r: isize, c: isize| {
        let r = r.clamp(0, rows as isize - 1) as usize;
        let c = c.clamp(0, cols as isize - 1) as usize;
        image[[r, c]]
    };
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        let (r, c) = (r as isize, c as isize);
        let v = at(r, c);
        let (up, down, left, right) = (at(r - 1, c), at(r + 1, c), at(r, c - 1), at(r, c + 1));
        let quadrants = [
            2.0 * v - up - left,
            2.0 * v - up - right,
            2.0 * v - down - left,
            2.0 * v - down - right,
        ];
        quadrants.iter().map(|q| q.max(0.0)).sum::<f32>() / 4.0
    })
}

/// Square median filter of half-width `radius`, shrinking at the borders.
pub fn median_filter(image: &Array2<f32>, radius: usize) -> Array2<f32> {
    let (rows, cols) = image.dim();
    let mut window = Vec::with_capacity((2 * radius + 1).pow(2));
    Array2::from_shape_fn((rows, cols), |(r, c)| {
        window.clear();
        for rr in r.saturating_sub(radius)..(r + radius + 1).min(rows) {
            for cc in c.saturating_sub(radius)..(c + radius + 1).min(cols) {
                window.push(image[[rr, cc]]);
            }
        }
        median_in_place(&mut window).unwrap_or(image[[r, c]])
    })
}

/// Add 8-connected neighbours of `seeds` whose significance exceeds `limit`.
fn grow(seeds: &Array2<bool>, sp: &Array2<f32>, limit: f32) -> Array2<bool> {
    let (rows, cols) = seeds.dim();
    let mut out = seeds.clone();
    for ((r, c), &seed) in seeds.indexed_iter() {
        if !seed {
            continue;
        }
        for rr in r.saturating_sub(1)..(r + 2).min(rows) {
            for cc in c.saturating_sub(1)..(c + 2).min(cols) {
                if sp[[rr, cc]] > limit {
                    out[[rr, cc]] = true;
                }
            }
        }
    }
    out
}

/// Replace masked pixels by the median of unmasked pixels in a 5x5 box.
fn replace_masked(image: &Array2<f32>, mask: &Array2<bool>) -> Array2<f32> {
    let (rows, cols) = image.dim();
    let mut out = image.clone();
    let mut window = Vec::with_capacity(25);
    for ((r, c), &masked) in mask.indexed_iter() {
        if !masked {
            continue;
        }
        window.clear();
        for rr in r.saturating_sub(2)..(r + 3).min(rows) {
            for cc in c.saturating_sub(2)..(c + 3).min(cols) {
                if !mask[[rr, cc]] {
                    window.push(image[[rr, cc]]);
                }
            }
        }
        if let Some(m) = median_in_place(&mut window) {
            out[[r, c]] = m;
        }
    }
    out
}
