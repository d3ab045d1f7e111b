//! Gauss-Newton optimization algorithm implementation.
//!
//! At each iteration the problem is linearized at the current state and the
//! undamped normal equations
//!
//! ```text
//! H·dx = g        with H ≈ JᵀJ, g = −Jᵀr
//! ```
//!
//! are solved for the update, which is applied through the problem's
//! retraction and accepted unconditionally.
//!
//! ## Convergence Properties
//!
//! - **Quadratic convergence** near the solution when `JᵀJ` approximates the true Hessian well
//! - **May diverge** if the initial guess is far from the optimum
//! - **No step size control**: a singular `H` aborts the run
//!
//! ## Termination
//!
//! - `||dx||∞ < parameter_tolerance` → [`OptimizationStatus::Converged`]
//! - chi2 increased and `stop_when_error_increases` is set →
//!   [`OptimizationStatus::ErrorIncreased`], the state from before the
//!   offending step is restored
//! - `max_iterations` reached → [`OptimizationStatus::MaxIterationsReached`]
//! - linear solve failed → [`OptimizerError::LinearSolveFailed`]
//!
//! # Example
//!
//! ```
//! use apex_lsq::optimizer::{LeastSquaresSolver, OptimizerConfig, OptimizerType};
//! use apex_lsq::problems::ExponentialCurveProblem;
//! use nalgebra::Vector2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let xs: Vec<f64> = (0..20).map(|i| i as f64 * 0.1).collect();
//! let ys: Vec<f64> = xs.iter().map(|&x| 2.0 * (0.5 * x).exp()).collect();
//! let mut problem = ExponentialCurveProblem::new(xs, ys)?;
//!
//! let config = OptimizerConfig::new()
//!     .with_optimizer_type(OptimizerType::GaussNewton)
//!     .with_max_iterations(30);
//! let mut solver = LeastSquaresSolver::<2>::with_config(config)?;
//! let mut params = Vector2::new(1.5, 0.4);
//! let result = solver.optimize(&mut problem, &mut params)?;
//!
//! assert!(result.status.is_converged());
//! assert!((params - Vector2::new(2.0, 0.5)).norm() < 1e-6);
//! # Ok(())
//! # }
//! ```

use crate::core::problem::{Gradient, Hessian, Problem};
use crate::optimizer::{
    ConvergenceInfo, EvaluationCounters, IterationStats, LeastSquaresSolver, OptimizationStatus,
    OptimizerError, OptimizerResult, SolverResult,
};
use std::{fmt, mem};
use tracing::{debug, info};
use web_time::{Duration, Instant};

/// Summary statistics for the Gauss-Newton optimization process.
#[derive(Debug, Clone)]
pub struct GaussNewtonSummary {
    /// Initial cost value
    pub initial_cost: f64,
    /// Final cost value
    pub final_cost: f64,
    /// Total number of iterations performed
    pub iterations: usize,
    /// Maximum gradient norm encountered
    pub max_gradient_norm: f64,
    /// Final gradient norm
    pub final_gradient_norm: f64,
    /// Maximum parameter update norm
    pub max_parameter_update_norm: f64,
    /// Final parameter update norm
    pub final_parameter_update_norm: f64,
    /// Time spent inside the problem's error evaluation
    pub evaluation_time: Duration,
    /// Total time elapsed
    pub total_time: Duration,
    /// Average time per iteration
    pub average_time_per_iteration: Duration,
    /// Per-iteration statistics history
    pub iteration_history: Vec<IterationStats>,
    /// Convergence status
    pub convergence_status: OptimizationStatus,
}

impl fmt::Display for GaussNewtonSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Gauss-Newton Final Result")?;

        if self.convergence_status.is_converged() {
            writeln!(f, "CONVERGED ({})", self.convergence_status)?;
        } else {
            writeln!(f, "STOPPED ({})", self.convergence_status)?;
        }

        writeln!(f)?;
        writeln!(f, "Cost:")?;
        writeln!(f, "  Initial:   {:.6e}", self.initial_cost)?;
        writeln!(f, "  Final:     {:.6e}", self.final_cost)?;
        writeln!(
            f,
            "  Reduction: {:.6e} ({:.2}%)",
            self.initial_cost - self.final_cost,
            100.0 * (self.initial_cost - self.final_cost) / self.initial_cost.max(1e-12)
        )?;
        writeln!(f)?;
        writeln!(f, "Iterations:")?;
        writeln!(f, "  Total: {}", self.iterations)?;
        writeln!(f)?;
        writeln!(f, "Gradient:")?;
        writeln!(f, "  Max norm:   {:.2e}", self.max_gradient_norm)?;
        writeln!(f, "  Final norm: {:.2e}", self.final_gradient_norm)?;
        writeln!(f)?;
        writeln!(f, "Parameter Update:")?;
        writeln!(f, "  Max norm:   {:.2e}", self.max_parameter_update_norm)?;
        writeln!(f, "  Final norm: {:.2e}", self.final_parameter_update_norm)?;
        writeln!(f)?;
        writeln!(f, "Performance:")?;
        writeln!(
            f,
            "  Evaluation time:        {:.2}ms",
            self.evaluation_time.as_secs_f64() * 1000.0
        )?;
        writeln!(
            f,
            "  Total time:             {:.2}ms",
            self.total_time.as_secs_f64() * 1000.0
        )?;
        writeln!(
            f,
            "  Average per iteration:  {:.2}ms",
            self.average_time_per_iteration.as_secs_f64() * 1000.0
        )?;

        Ok(())
    }
}

impl<const D: usize> LeastSquaresSolver<D> {
    pub(crate) fn optimize_gauss_newton<P: Problem<D>>(
        &mut self,
        problem: &mut P,
        state: &mut P::State,
    ) -> OptimizerResult<SolverResult> {
        let start_time = Instant::now();
        let mut counters = EvaluationCounters::default();
        let mut status = OptimizationStatus::MaxIterationsReached;
        let mut iterations = 0;
        let mut initial_cost = 0.0;

        let mut max_gradient_norm: f64 = 0.0;
        let mut final_gradient_norm = 0.0;
        let mut max_parameter_update_norm: f64 = 0.0;
        let mut final_parameter_update_norm = 0.0;
        let mut iteration_history = Vec::new();

        // Only kept when a rollback can happen
        let mut previous_state: Option<P::State> = None;

        if self.config.verbose {
            IterationStats::print_header();
        }

        for iteration in 0..self.config.max_iterations {
            iterations += 1;
            problem.start_iteration();

            let mut hessian = Hessian::<D>::zeros();
            let mut gradient = Gradient::<D>::zeros();
            let (new_chi2, evaluation_time) =
                counters.linearize(problem, state, &mut hessian, &mut gradient);
            if iteration == 0 {
                initial_cost = new_chi2;
            }

            if self.config.stop_when_error_increases
                && iteration > 0
                && new_chi2 > self.state.chi2
            {
                debug!(
                    "Error increased at iteration {}: {:.6e} -> {:.6e}, restoring previous state",
                    iteration, self.state.chi2, new_chi2
                );
                if let Some(previous) = previous_state.take() {
                    *state = previous;
                }
                status = OptimizationStatus::ErrorIncreased;
                break;
            }

            let cost_change = if iteration == 0 {
                0.0
            } else {
                self.state.chi2 - new_chi2
            };
            self.state.hessian = hessian;
            self.state.gradient = gradient;
            self.state.chi2 = new_chi2;

            let gradient_norm = gradient.norm();
            max_gradient_norm = max_gradient_norm.max(gradient_norm);
            final_gradient_norm = gradient_norm;

            let dx = problem
                .solve(state, &hessian, &gradient, self.config.linear_solver_type)
                .map_err(|source| OptimizerError::LinearSolveFailed { iteration, source }.log())?;

            let candidate = problem.update(state, &dx);
            let previous = mem::replace(state, candidate);
            if self.config.stop_when_error_increases {
                previous_state = Some(previous);
            }

            let step_norm = dx.amax();
            max_parameter_update_norm = max_parameter_update_norm.max(step_norm);
            final_parameter_update_norm = step_norm;

            let stats = IterationStats {
                iteration,
                cost: new_chi2,
                cost_change,
                gradient_norm,
                step_norm,
                damping: None,
                trials: 0,
                evaluation_time_ms: evaluation_time.as_secs_f64() * 1000.0,
                total_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
            };
            if self.config.verbose {
                stats.print_line();
                iteration_history.push(stats.clone());
            }
            self.observers.notify(&stats);

            self.state.iteration = iteration + 1;
            if step_norm < self.config.parameter_tolerance {
                status = OptimizationStatus::Converged;
                break;
            }

            problem.finish_iteration();
        }

        // chi2 above belongs to the linearization point; score the returned state
        if status != OptimizationStatus::ErrorIncreased {
            self.state.chi2 = counters.cost::<D, P>(problem, state);
        }

        let elapsed = start_time.elapsed();
        if self.config.verbose || tracing::enabled!(tracing::Level::DEBUG) {
            let summary = GaussNewtonSummary {
                initial_cost,
                final_cost: self.state.chi2,
                iterations,
                max_gradient_norm,
                final_gradient_norm,
                max_parameter_update_norm,
                final_parameter_update_norm,
                evaluation_time: counters.evaluation_time,
                total_time: elapsed,
                average_time_per_iteration: elapsed / iterations.max(1) as u32,
                iteration_history,
                convergence_status: status,
            };
            if self.config.verbose {
                info!("{}", summary);
            } else {
                debug!("{}", summary);
            }
        }

        Ok(SolverResult {
            status,
            initial_cost,
            final_cost: self.state.chi2,
            iterations,
            elapsed_time: elapsed,
            convergence_info: ConvergenceInfo {
                final_gradient_norm,
                final_parameter_update_norm,
                cost_evaluations: counters.cost_evaluations,
                jacobian_evaluations: counters.jacobian_evaluations,
                evaluation_time: counters.evaluation_time,
            },
        })
    }
}
