use ndarray::{s, Array2};

use crate::consts::FLAT_SCALE_WINDOW_DIVISOR;
use crate::stats::median_of;

/// Inverse median of the central window of a frame, NaN ignored.
///
/// The window spans `rows/2 ± rows/10` by `cols/2 ± cols/10`. Returns `None`
/// when the window holds no finite pixel or its median is zero.
pub fn inverse_central_median(data: &Array2<f32>) -> Option<f32> {
    let (rows, cols) = data.dim();
    let (half_r, half_c) = (rows / 2, cols / 2);
    let (dr, dc) = (
        (rows / FLAT_SCALE_WINDOW_DIVISOR).max(1),
        (cols / FLAT_SCALE_WINDOW_DIVISOR).max(1),
    );
    let window = data.slice(s![
        half_r.saturating_sub(dr)..(half_r + dr).min(rows),
        half_c.saturating_sub(dc)..(half_c + dc).min(cols)
    ]);
    let median = median_of(window)?;
    (median != 0.0 && median.is_finite()).then(|| 1.0 / median)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn uses_central_window_only() {
        let mut data = Array2::<f32>::from_elem((40, 40), 1000.0);
        data.slice_mut(s![16..24, 16..24]).fill(250.0);
        assert_abs_diff_eq!(inverse_central_median(&data).unwrap(), 1.0 / 250.0);
    }

    #[test]
    fn zero_median_has_no_scale() {
        let data = Array2::<f32>::zeros((20, 20));
        assert!(inverse_central_median(&data).is_none());
    }
}
