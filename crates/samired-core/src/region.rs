use std::fmt;
use std::str::FromStr;

use crate::error::{ReductionError, Result};

/// Rectangular pixel region with zero-based, half-open bounds.
///
/// FITS headers describe sections (`TRIMSEC`, `BIASSEC`, `DETSEC`,
/// `DETSIZE`) with one-based inclusive bracket notation `[x0:x1,y0:y1]`.
/// Only the start of each axis differs between the two conventions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

impl Region {
    pub fn new(x0: usize, x1: usize, y0: usize, y1: usize) -> Result<Self> {
        if x0 >= x1 || y0 >= y1 {
            return Err(ReductionError::Format(format!(
                "empty region x={x0}..{x1}, y={y0}..{y1}"
            )));
        }
        Ok(Self { x0, x1, y0, y1 })
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0
    }

    /// Shape as `(rows, cols)`, the ndarray convention.
    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Divide every bound by the on-chip binning factors.
    pub fn binned(&self, bx: usize, by: usize) -> Self {
        Self {
            x0: self.x0 / bx,
            x1: self.x1 / bx,
            y0: self.y0 / by,
            y1: self.y1 / by,
        }
    }

    /// Whether the region fits inside an array of the given `(rows, cols)`.
    pub fn fits_within(&self, shape: (usize, usize)) -> bool {
        self.y1 <= shape.0 && self.x1 <= shape.1
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_region(self.x0, self.x1, self.y0, self.y1))
    }
}

impl FromStr for Region {
    type Err = ReductionError;

    fn from_str(s: &str) -> Result<Self> {
        parse_region(s)
    }
}

/// Parse `[x0:x1,y0:y1]` (one-based, inclusive) into a zero-based region.
pub fn parse_region(text: &str) -> Result<Region> {
    let malformed = || ReductionError::Format(format!("invalid region string {text:?}"));

    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(malformed)?;

    let mut axes = inner.split(',');
    let (x_axis, y_axis) = match (axes.next(), axes.next(), axes.next()) {
        (Some(x), Some(y), None) => (x, y),
        _ => return Err(malformed()),
    };

    let (x0, x1) = parse_axis(x_axis).ok_or_else(malformed)?;
    let (y0, y1) = parse_axis(y_axis).ok_or_else(malformed)?;

    if x0 == 0 || y0 == 0 {
        return Err(malformed());
    }
    Region::new(x0 - 1, x1, y0 - 1, y1).map_err(|_| malformed())
}

/// Format zero-based half-open bounds as one-based inclusive `[a:b,c:d]`.
pub fn format_region(x0: usize, x1: usize, y0: usize, y1: usize) -> String {
    format!("[{}:{},{}:{}]", x0 + 1, x1, y0 + 1, y1)
}

fn parse_axis(axis: &str) -> Option<(usize, usize)> {
    let (start, end) = axis.split_once(':')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}
