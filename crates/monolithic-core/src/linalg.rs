//! Dense least squares for the small design matrices used in form removal.

use crate::error::{Error, Result};
use crate::grid::Grid;

/// Relative threshold on the diagonal of `R` below which the design is
/// treated as rank deficient.
const RANK_TOLERANCE: f64 = 1e-12;

/// Solve `min ||A x - b||₂` by Householder QR.
///
/// `a` is `m x k` with `m >= k`. Returns the `k` coefficients.
pub fn lstsq(a: &Grid, b: &[f64]) -> Result<Vec<f64>> {
    let (m, k) = a.shape();
    if b.len() != m {
        return Err(Error::ShapeMismatch {
            expected: format!("{m} observations"),
            actual: format!("{} observations", b.len()),
        });
    }
    if k == 0 {
        return Err(Error::EmptyInput("design matrix has no columns"));
    }
    if m < k {
        return Err(Error::Singular(format!(
            "{m} samples cannot determine {k} coefficients"
        )));
    }

    let mut r = a.as_slice().to_vec();
    let mut rhs = b.to_vec();

    for j in 0..k {
        let norm = (j..m).map(|i| r[i * k + j].powi(2)).sum::<f64>().sqrt();
        if norm == 0.0 {
            continue;
        }
        let alpha = if r[j * k + j] > 0.0 { -norm } else { norm };
        let mut v: Vec<f64> = (j..m).map(|i| r[i * k + j]).collect();
        v[0] -= alpha;
        let v_norm2: f64 = v.iter().map(|x| x * x).sum();
        if v_norm2 == 0.0 {
            continue;
        }

        // apply H = I - 2 v vᵀ / (vᵀ v) to the trailing block and the rhs
        for col in j..k {
            let dot: f64 = v.iter().enumerate().map(|(t, vi)| vi * r[(j + t) * k + col]).sum();
            let f = 2.0 * dot / v_norm2;
            for (t, vi) in v.iter().enumerate() {
                r[(j + t) * k + col] -= f * vi;
            }
        }
        let dot: f64 = v.iter().enumerate().map(|(t, vi)| vi * rhs[j + t]).sum();
        let f = 2.0 * dot / v_norm2;
        for (t, vi) in v.iter().enumerate() {
            rhs[j + t] -= f * vi;
        }
    }

    let scale = (0..k).map(|j| r[j * k + j].abs()).fold(0.0, f64::max);
    let mut x = vec![0.0; k];
    for j in (0..k).rev() {
        let diag = r[j * k + j];
        if scale == 0.0 || diag.abs() <= RANK_TOLERANCE * scale {
            return Err(Error::Singular(format!(
                "design matrix is rank deficient at column {j}"
            )));
        }
        let tail: f64 = (j + 1..k).map(|c| r[j * k + c] * x[c]).sum();
        x[j] = (rhs[j] - tail) / diag;
    }
    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_solution() {
        // z = 1 + 2x - 3y sampled at four points
        let a = Grid::from_rows(vec![
            vec![1.0, 0.0, 0.0],
            vec![1.0, 1.0, 0.0],
            vec![1.0, 0.0, 1.0],
            vec![1.0, 1.0, 1.0],
        ])
        .unwrap();
        let b = [1.0, 3.0, -2.0, 0.0];
        let x = lstsq(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
        assert!((x[2] + 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_overdetermined_line_fit() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let a = Grid::from_fn(4, 2, |r, c| if c == 0 { 1.0 } else { xs[r] });
        let b = [1.0, 2.0, 2.0, 3.0];
        let x = lstsq(&a, &b).unwrap();
        assert!((x[0] - 1.1).abs() < 1e-12);
        assert!((x[1] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_rank_deficient() {
        let a = Grid::from_rows(vec![vec![1.0, 2.0], vec![2.0, 4.0], vec![3.0, 6.0]]).unwrap();
        assert!(matches!(lstsq(&a, &[1.0, 2.0, 3.0]), Err(Error::Singular(_))));
    }

    #[test]
    fn test_underdetermined() {
        let a = Grid::from_rows(vec![vec![1.0, 2.0, 3.0]]).unwrap();
        assert!(matches!(lstsq(&a, &[1.0]), Err(Error::Singular(_))));
    }

    #[test]
    fn test_rhs_length_mismatch() {
        let a = Grid::filled(3, 1, 1.0);
        assert!(matches!(lstsq(&a, &[1.0]), Err(Error::ShapeMismatch { .. })));
    }
}
