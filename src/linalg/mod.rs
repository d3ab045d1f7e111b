//! Dense fixed-size linear algebra for the normal equations.
//!
//! Every system solved by the optimizers has the shape `H·dx = g` where `H` is a
//! `D×D` symmetric positive (semi-)definite matrix and `D` is known at compile time.
//! The solvers here therefore work on stack-allocated `nalgebra` matrices; a
//! dimension mismatch between a problem and its optimizer is a type error.

pub mod cholesky;
pub mod qr;

use nalgebra::{SMatrix, SVector};
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::error;

/// Backend used for the default linear solve of the normal equations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinearSolverType {
    /// Cholesky (LLᵀ) factorization. Fails when `H` is not positive definite.
    #[default]
    Cholesky,
    /// Householder QR factorization. Fails only when `H` is exactly singular.
    QR,
}

impl Display for LinearSolverType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LinearSolverType::Cholesky => write!(f, "Dense Cholesky"),
            LinearSolverType::QR => write!(f, "Dense QR"),
        }
    }
}

/// Linear algebra specific error types for apex-lsq
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinAlgError {
    /// Cholesky factorization rejected the matrix
    #[error("Matrix is not positive definite")]
    NotPositiveDefinite,

    /// Singular or near-singular matrix detected
    #[error("Singular matrix detected (matrix is not invertible)")]
    SingularMatrix,

    /// The factorization succeeded but produced NaN or Inf
    #[error("Linear solve produced non-finite values")]
    NonFiniteSolution,
}

impl LinAlgError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .ok_or_else(|| LinAlgError::SingularMatrix.log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the value that triggered it.
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Solve `H·dx = g` with the requested backend.
pub fn solve<const D: usize>(
    solver_type: LinearSolverType,
    hessian: &SMatrix<f64, D, D>,
    gradient: &SVector<f64, D>,
) -> LinAlgResult<SVector<f64, D>> {
    match solver_type {
        LinearSolverType::Cholesky => cholesky::solve(hessian, gradient),
        LinearSolverType::QR => qr::solve(hessian, gradient),
    }
}

/// Add `lambda` to every diagonal entry, producing `H + λ·I`.
pub fn add_diagonal<const D: usize>(
    hessian: &SMatrix<f64, D, D>,
    lambda: f64,
) -> SMatrix<f64, D, D> {
    let mut augmented = *hessian;
    for i in 0..D {
        augmented[(i, i)] += lambda;
    }
    augmented
}

fn ensure_finite<const D: usize>(dx: SVector<f64, D>) -> LinAlgResult<SVector<f64, D>> {
    if dx.iter().all(|v| v.is_finite()) {
        Ok(dx)
    } else {
        Err(LinAlgError::NonFiniteSolution)
    }
}
