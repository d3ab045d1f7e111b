//! Error types for the apex-lsq library
//!
//! # Error Hierarchy
//!
//! - **`ApexLsqError`** is the top-level error for callers that mix several modules
//!   (binaries, applications building problems and running the solver)
//! - **Module errors** (`CoreError`, `OptimizerError`, `LinAlgError`, ...) are
//!   wrapped transparently and keep their sources
//!
//! Example error chain:
//! ```text
//! ApexLsqError::Optimizer(
//!     OptimizerError::LinearSolveFailed {
//!         iteration: 0,
//!         source: LinAlgError::NotPositiveDefinite,
//!     }
//! )
//! ```

use crate::{
    core::CoreError, linalg::LinAlgError, manifold::ManifoldError, observers::ObserverError,
    optimizer::OptimizerError,
};
use std::error::Error as StdError;
use thiserror::Error;

/// Main result type used throughout the apex-lsq library
pub type ApexLsqResult<T> = Result<T, ApexLsqError>;

/// Main error type for the apex-lsq library
///
/// ```rust,ignore
/// if let Err(e) = run() {
///     warn!("Full chain: {}", e.chain());
/// }
/// ```
#[derive(Debug, Error)]
pub enum ApexLsqError {
    /// Problem construction errors
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Optimization algorithm errors
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// Linear algebra errors
    #[error(transparent)]
    LinearAlgebra(#[from] LinAlgError),

    /// Manifold operation errors
    #[error(transparent)]
    Manifold(#[from] ManifoldError),

    /// Observer errors
    #[error(transparent)]
    Observer(#[from] ObserverError),
}

impl ApexLsqError {
    /// Full error chain, one cause per line.
    ///
    /// ```rust,ignore
    /// // Linear system solve failed at iteration 0
    /// //   → Matrix is not positive definite
    /// ```
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {}", err));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Single-line error chain for logging
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}
