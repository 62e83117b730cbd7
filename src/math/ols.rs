//! Dense least squares helpers for the damped Gauss-Newton step.
//!
//! Each Levenberg-Marquardt iteration solves a small, tall system
//!
//! ```text
//! minimize ‖ [J; √λ·D] δ + [r; 0] ‖²
//! ```
//!
//! where the parameter dimension is tiny (a handful of columns) and the row
//! count is the number of observations in the calibration window.
//!
//! Implementation choices:
//! - SVD, so tall and rank-deficient systems are handled without panics
//!   (nalgebra's `QR::solve` is intended for square systems).
//! - Progressively looser singular value tolerances before giving up.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// `(JᵀJ)⁻¹` via the pseudo-inverse; `None` when singular or non-finite.
pub fn normal_covariance(j: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if j.ncols() == 0 || j.nrows() < j.ncols() {
        return None;
    }
    let jtj = j.transpose() * j;
    let svd = jtj.clone().svd(true, true);
    let smax = svd.singular_values.max();
    if !(smax.is_finite() && smax > 0.0) || svd.rank(smax * 1e-12) < j.ncols() {
        return None;
    }
    let cov = svd.pseudo_inverse(smax * 1e-12).ok()?;
    cov.iter().all(|v| v.is_finite()).then_some(cov)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn covariance_of_identity_columns() {
        // Two orthogonal columns with squared norms 2 and 4.
        let j = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let cov = normal_covariance(&j).unwrap();
        assert!((cov[(0, 0)] - 0.5).abs() < 1e-12);
        assert!((cov[(1, 1)] - 0.25).abs() < 1e-12);
        assert!(cov[(0, 1)].abs() < 1e-12);
    }

    #[test]
    fn covariance_of_collinear_columns_is_none() {
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 2.0, 4.0, 3.0, 6.0]);
        assert!(normal_covariance(&j).is_none());
    }
}
