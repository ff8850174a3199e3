use ndarray::ArrayView2;

use crate::error::{ReductionError, Result};

/// Median of a slice, reordering it in place. Even lengths average the two
/// middle values. Returns `None` for an empty slice.
///
/// Uses `select_nth_unstable` for O(n) selection without a full sort.
pub fn median_in_place(values: &mut [f32]) -> Option<f32> {
    let n = values.len();
    match n {
        0 => None,
        1 => Some(values[0]),
        _ if n % 2 == 1 => Some(*values.select_nth_unstable_by(n / 2, |a, b| a.total_cmp(b)).1),
        _ => {
            let mid = n / 2;
            values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
            let upper = values[mid];
            let lower = values[..mid]
                .iter()
                .copied()
                .fold(f32::NEG_INFINITY, f32::max);
            Some((lower + upper) / 2.0)
        }
    }
}

/// Median of a 2-D view, ignoring NaN pixels.
pub fn median_of(view: ArrayView2<f32>) -> Option<f32> {
    let mut values: Vec<f32> = view.iter().copied().filter(|v| !v.is_nan()).collect();
    median_in_place(&mut values)
}

/// Mean and population standard deviation, accumulated in f64.
pub fn mean_std<'a>(values: impl IntoIterator<Item = &'a f32>) -> (f64, f64) {
    let mut n = 0usize;
    let mut mean = 0.0f64;
    let mut m2 = 0.0f64;
    for &v in values {
        n += 1;
        let x = v as f64;
        let delta = x - mean;
        mean += delta / n as f64;
        m2 += delta * (x - mean);
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    (mean, (m2 / n as f64).sqrt())
}

/// Least-squares polynomial in a centred, scaled abscissa.
///
/// Fitting against `t = (x - shift) / scale` keeps the normal equations well
/// conditioned for long overscan profiles.
#[derive(Clone, Debug)]
pub struct Polynomial {
    coefficients: Vec<f64>,
    shift: f64,
    scale: f64,
}

impl Polynomial {
    /// Fit a polynomial of at most `degree` to `(x, y)`. The degree drops when
    /// there are too few points to constrain it.
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Result<Self> {
        if x.len() != y.len() {
            return Err(ReductionError::ShapeMismatch {
                expected: (x.len(), 1),
                actual: (y.len(), 1),
            });
        }
        if x.is_empty() {
            return Err(ReductionError::EmptySequence);
        }
        let degree = degree.min(x.len() - 1);
        let n = x.len() as f64;
        let shift = x.iter().sum::<f64>() / n;
        let scale = x
            .iter()
            .map(|v| (v - shift).abs())
            .fold(0.0f64, f64::max)
            .max(1.0);

        let terms = degree + 1;
        // Normal equations A c = b with A[i][j] = sum t^(i+j).
        let mut a = vec![vec![0.0f64; terms]; terms];
        let mut b = vec![0.0f64; terms];
        for (&xi, &yi) in x.iter().zip(y) {
            let t = (xi - shift) / scale;
            let mut powers = vec![1.0f64; 2 * terms - 1];
            for k in 1..powers.len() {
                powers[k] = powers[k - 1] * t;
            }
            for i in 0..terms {
                b[i] += yi * powers[i];
                for j in 0..terms {
                    a[i][j] += powers[i + j];
                }
            }
        }

        let coefficients = solve(a, b).ok_or_else(|| {
            ReductionError::Format("singular system in polynomial fit".into())
        })?;
        Ok(Self {
            coefficients,
            shift,
            scale,
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        let t = (x - self.shift) / self.scale;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * t + c)
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0f64; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median_in_place(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median_in_place(&mut [4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median_in_place(&mut []), None);
    }

    #[test]
    fn quadratic_is_recovered_exactly() {
        let x: Vec<f64> = (1..=200).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 0.002 * v * v - 0.3 * v + 1000.0).collect();
        let p = Polynomial::fit(&x, &y, 2).unwrap();
        for (&xi, &yi) in x.iter().zip(&y) {
            assert_relative_eq!(p.eval(xi), yi, epsilon = 1e-6);
        }
    }

    #[test]
    fn degree_drops_for_short_profiles() {
        let p = Polynomial::fit(&[1.0, 2.0], &[5.0, 7.0], 2).unwrap();
        assert_eq!(p.degree(), 1);
        assert_relative_eq!(p.eval(3.0), 9.0, epsilon = 1e-9);
    }

    #[test]
    fn std_of_constant_is_zero() {
        let (mean, std) = mean_std(&[4.0f32; 10]);
        assert_relative_eq!(mean, 4.0);
        assert_relative_eq!(std, 0.0);
    }
}
