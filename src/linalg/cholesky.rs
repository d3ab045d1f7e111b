use nalgebra::{SMatrix, SVector, linalg::Cholesky};
use tracing::debug;

use crate::linalg::{LinAlgError, LinAlgResult, ensure_finite};

/// Solve `H·dx = g` through an LLᵀ factorization of `H`.
///
/// Returns [`LinAlgError::NotPositiveDefinite`] when the factorization meets a
/// non-positive pivot, which is the signal the optimizers react to (abort for
/// Gauss-Newton, damping escalation for Levenberg-Marquardt).
pub fn solve<const D: usize>(
    hessian: &SMatrix<f64, D, D>,
    gradient: &SVector<f64, D>,
) -> LinAlgResult<SVector<f64, D>> {
    let cholesky = Cholesky::new(*hessian).ok_or_else(|| {
        debug!("Cholesky factorization failed for H = {}", hessian);
        LinAlgError::NotPositiveDefinite
    })?;
    ensure_finite(cholesky.solve(gradient))
}

/// Invert a symmetric positive definite matrix.
///
/// Used to turn the final information matrix into a covariance estimate.
pub fn inverse<const D: usize>(hessian: &SMatrix<f64, D, D>) -> LinAlgResult<SMatrix<f64, D, D>> {
    let cholesky = Cholesky::new(*hessian).ok_or(LinAlgError::NotPositiveDefinite)?;
    let inverse = cholesky.inverse();
    if inverse.iter().all(|v| v.is_finite()) {
        Ok(inverse)
    } else {
        Err(LinAlgError::NonFiniteSolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix1, Matrix3, Vector1, Vector3};

    #[test]
    fn test_cholesky_solve_spd() -> Result<(), LinAlgError> {
        let h = Matrix3::new(4.0, 1.0, 0.0, 1.0, 3.0, 0.5, 0.0, 0.5, 2.0);
        let g = Vector3::new(1.0, -2.0, 0.5);
        let dx = solve(&h, &g)?;
        assert!((h * dx - g).norm() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_cholesky_rejects_zero_matrix() {
        let h = Matrix1::new(0.0);
        let g = Vector1::new(10.0);
        assert_eq!(solve(&h, &g), Err(LinAlgError::NotPositiveDefinite));
    }

    #[test]
    fn test_cholesky_rejects_indefinite_matrix() {
        let h = Matrix3::new(1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0);
        let g = Vector3::new(1.0, 1.0, 1.0);
        assert_eq!(solve(&h, &g), Err(LinAlgError::NotPositiveDefinite));
    }

    #[test]
    fn test_inverse() -> Result<(), LinAlgError> {
        let h = Matrix3::new(2.0, 0.0, 0.0, 0.0, 4.0, 0.0, 0.0, 0.0, 8.0);
        let cov = inverse(&h)?;
        assert!((cov * h - Matrix3::identity()).norm() < 1e-12);
        assert!((cov[(2, 2)] - 0.125).abs() < 1e-15);
        Ok(())
    }
}
