//! Core building blocks for describing a least squares problem
//!
//! - [`problem::Problem`]: the contract a concrete estimation problem implements
//!   (linearization, retraction, optional custom solve and lifecycle hooks)
//! - [`loss_functions`]: robust kernels concrete problems can use to down-weight outliers

pub mod loss_functions;
pub mod problem;

pub use problem::{Gradient, Hessian, Problem, Update};

use thiserror::Error;
use tracing::error;

/// Errors raised while constructing a concrete problem
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Measurement containers of a problem disagree in length
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Invalid input parameter or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for problem construction
pub type CoreResult<T> = Result<T, CoreError>;
