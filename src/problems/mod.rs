//! Concrete least squares problems.
//!
//! Each type binds its measurements at construction and implements
//! [`Problem`](crate::core::Problem) for a fixed update dimension:
//!
//! | Problem | D | State | Retraction |
//! |---|---|---|---|
//! | [`ExponentialCurveProblem`] | 2 | `Vector2` (a, b) of `y = a·exp(b·x)` | addition |
//! | [`RotationAlignmentProblem`] | 3 | [`SO3`](crate::manifold::SO3) | `R·Exp(δ)` |
//! | [`PoseOnlyReprojectionProblem`] | 6 | [`CameraPose`] | `Exp(δθ)·(R, t) + δt` |

pub mod curve_fitting;
pub mod reprojection;
pub mod rotation_alignment;

pub use curve_fitting::ExponentialCurveProblem;
pub use reprojection::{CameraPose, PinholeCamera, PoseOnlyReprojectionProblem};
pub use rotation_alignment::RotationAlignmentProblem;
