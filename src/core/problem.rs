//! The problem contract consumed by the least squares optimizers.
//!
//! A [`Problem`] knows the mathematical structure of one estimation task and
//! nothing about the iteration strategy. The optimizer is generic over the
//! problem type, so every call in the hot loop is statically dispatched.
//!
//! # Sign convention
//!
//! `evaluate_error` returns the normal equations in the form `H·dx = g`, where
//! `dx` is the correction to *apply*. For a residual `r(x)` with Jacobian `J`
//! this means `H = JᵀJ` and `g = -Jᵀr`.
//!
//! # Example
//!
//! ```
//! use apex_lsq::core::problem::{Gradient, Hessian, Problem, Update};
//! use nalgebra::Vector1;
//!
//! /// chi2(x) = (x - 5)²
//! struct Parabola;
//!
//! impl Problem<1> for Parabola {
//!     type State = Vector1<f64>;
//!
//!     fn evaluate_error(
//!         &self,
//!         state: &Self::State,
//!         hessian: Option<&mut Hessian<1>>,
//!         gradient: Option<&mut Gradient<1>>,
//!     ) -> f64 {
//!         let r = state[0] - 5.0;
//!         if let Some(h) = hessian {
//!             h[(0, 0)] += 2.0;
//!         }
//!         if let Some(g) = gradient {
//!             g[0] -= 2.0 * r;
//!         }
//!         r * r
//!     }
//!
//!     fn update(&self, state: &Self::State, dx: &Update<1>) -> Self::State {
//!         state + dx
//!     }
//! }
//! ```

use crate::linalg::{self, LinAlgResult, LinearSolverType};
use nalgebra::{SMatrix, SVector};

/// `D×D` Hessian (information matrix) approximation.
pub type Hessian<const D: usize> = SMatrix<f64, D, D>;

/// `D×1` right-hand side of the normal equations.
pub type Gradient<const D: usize> = SVector<f64, D>;

/// `D×1` correction produced by one linear solve.
pub type Update<const D: usize> = SVector<f64, D>;

/// A nonlinear least squares problem over a state with `D` degrees of freedom.
///
/// Required: [`evaluate_error`](Problem::evaluate_error) and
/// [`update`](Problem::update). Everything else has a default the optimizer
/// relies on when the implementation does not override it.
pub trait Problem<const D: usize> {
    /// The quantity being estimated (a vector, a rotation, a pose, ...).
    type State: Clone;

    /// Evaluate the error at `state`.
    ///
    /// Returns chi2, the weighted sum of squared residuals. When `hessian` and
    /// `gradient` are provided they arrive zeroed and the implementation
    /// accumulates `H` and `g` linearized at `state` into them. `None` means the
    /// caller only needs the error (e.g. to score a trial step).
    ///
    /// Must be a pure function of `state` and the measurements bound at
    /// construction.
    fn evaluate_error(
        &self,
        state: &Self::State,
        hessian: Option<&mut Hessian<D>>,
        gradient: Option<&mut Gradient<D>>,
    ) -> f64;

    /// Apply the correction `dx` to `state` and return the new state.
    ///
    /// The retraction depends on the state space: plain addition for
    /// Euclidean states, `X ∘ Exp(dx)` for Lie groups. `state` itself is never
    /// modified so a rejected trial leaves no trace.
    fn update(&self, state: &Self::State, dx: &Update<D>) -> Self::State;

    /// Solve `H·dx = g` for `dx`.
    ///
    /// The default factorizes `H` with the backend configured on the
    /// optimizer and fails if the factorization does. Override to exploit
    /// problem structure (block-diagonal `H`, gauge fixing, ...).
    fn solve(
        &self,
        _state: &Self::State,
        hessian: &Hessian<D>,
        gradient: &Gradient<D>,
        solver_type: LinearSolverType,
    ) -> LinAlgResult<Update<D>> {
        linalg::solve(solver_type, hessian, gradient)
    }

    /// Called at the start of every outer iteration. No-op by default.
    fn start_iteration(&mut self) {}

    /// Called at the end of every outer iteration unless the run stopped in it
    /// on convergence, an error increase or an exhausted trial budget. It does
    /// run after the last iteration of a run that hits `max_iterations`.
    /// No-op by default.
    fn finish_iteration(&mut self) {}

    /// Called after every Levenberg-Marquardt trial, accepted or rejected.
    /// No-op by default.
    fn finish_trial(&mut self) {}
}
