//! # Apex LSQ
//!
//! A fixed-size nonlinear least squares engine. A problem describes how to
//! linearize its error at a state and how to apply an update to that state;
//! the solver owns the iteration policy.
//!
//! ## Features
//!
//! - **Two strategies**: Gauss-Newton (undamped) and Levenberg-Marquardt (adaptive damping
//!   with an accept/reject trial loop)
//! - **Compile-time dimensions**: `H`, `g` and `dx` are stack-allocated `nalgebra` types
//!   sized by a const generic, so a dimension mismatch is a type error
//! - **Manifold states**: retractions built on SO(3) and Rⁿ Lie group operations
//! - **Problem hooks**: custom linear solve and per-iteration / per-trial callbacks with
//!   no-op defaults
//! - **Diagnostics**: verbose iteration tables, summaries, observers and post-hoc access to
//!   chi2, the Hessian and its covariance
//!
//! ## Example
//!
//! ```
//! use apex_lsq::optimizer::{LeastSquaresSolver, OptimizerConfig, OptimizerType};
//! use apex_lsq::problems::ExponentialCurveProblem;
//! use nalgebra::Vector2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let xs: Vec<f64> = (0..30).map(|i| i as f64 * 0.1).collect();
//! let ys: Vec<f64> = xs.iter().map(|&x| 1.5 * (-0.8 * x).exp()).collect();
//! let mut problem = ExponentialCurveProblem::new(xs, ys)?;
//!
//! let config = OptimizerConfig::new()
//!     .with_optimizer_type(OptimizerType::LevenbergMarquardt)
//!     .with_max_iterations(50);
//! let mut solver = LeastSquaresSolver::<2>::with_config(config)?;
//! let mut params = Vector2::new(1.0, 0.0);
//! solver.optimize(&mut problem, &mut params)?;
//!
//! assert!((params - Vector2::new(1.5, -0.8)).norm() < 1e-6);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;
pub mod linalg;
#[cfg(feature = "logging")]
pub mod logger;
pub mod manifold;
pub mod observers;
pub mod optimizer;
pub mod problems;

pub use core::Problem;
pub use core::loss_functions::{CauchyLoss, HuberLoss, L2Loss, LossFunction};
pub use error::{ApexLsqError, ApexLsqResult};
pub use linalg::LinearSolverType;
#[cfg(feature = "logging")]
pub use logger::{init_logger, init_logger_with_level};
pub use observers::{HistoryObserver, OptObserver, OptObserverVec};
pub use optimizer::{
    LeastSquaresSolver, OptimizationStatus, OptimizerConfig, OptimizerType, SolverResult,
};
