use nalgebra::{DMatrix, DVector, SMatrix, SVector};

use crate::linalg::{LinAlgError, LinAlgResult, ensure_finite};

/// Solve `H·dx = g` through a Householder QR factorization of `H`.
///
/// Slower than Cholesky but does not require positive definiteness, only
/// invertibility. The factorization runs on a dynamic copy of `H` so that it
/// stays independent of the type-level dimension arithmetic of the fixed-size
/// decompositions.
pub fn solve<const D: usize>(
    hessian: &SMatrix<f64, D, D>,
    gradient: &SVector<f64, D>,
) -> LinAlgResult<SVector<f64, D>> {
    let h = DMatrix::from_column_slice(D, D, hessian.as_slice());
    let g = DVector::from_column_slice(gradient.as_slice());

    let dx = h
        .qr()
        .solve(&g)
        .ok_or_else(|| LinAlgError::SingularMatrix.log_with_source(hessian))?;

    ensure_finite(SVector::<f64, D>::from_column_slice(dx.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix2, Vector2};

    #[test]
    fn test_qr_solves_indefinite_system() -> Result<(), LinAlgError> {
        // Invertible but indefinite: Cholesky would reject it.
        let h = Matrix2::new(1.0, 0.0, 0.0, -2.0);
        let g = Vector2::new(3.0, 4.0);
        let dx = solve(&h, &g)?;
        assert!((dx - Vector2::new(3.0, -2.0)).norm() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_qr_rejects_singular_matrix() {
        let h = Matrix2::new(1.0, 0.0, 0.0, 0.0);
        let g = Vector2::new(1.0, 1.0);
        assert!(solve(&h, &g).is_err());
    }
}
