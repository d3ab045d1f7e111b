//! Levenberg-Marquardt algorithm implementation.
//!
//! Each outer iteration linearizes the problem once and then runs a trial
//! loop on the damped normal equations
//!
//! ```text
//! (H + μI)·dx = g
//! ```
//!
//! A trial is accepted when it strictly lowers chi2. Accepted trials shrink
//! the damping toward Gauss-Newton behavior, rejected trials (including a
//! failed linear solve) grow it toward short gradient-descent steps:
//!
//! ```text
//! accepted:  ρ = chi2_old − chi2_new > 0
//!            μ ← μ · max(1/3, min(1 − (2ρ − 1)³, 2/3)),   ν ← ν₀
//! rejected:  μ ← μ · ν,   ν ← 2ν
//! ```
//!
//! Rejected trials never touch the caller's state, and damping escalation is
//! charged against `max_trials` rather than `max_iterations`.
//!
//! ## Termination
//!
//! - `||dx||∞ < parameter_tolerance` on an accepted trial → [`OptimizationStatus::Converged`]
//! - `max_trials` consecutive rejections → [`OptimizationStatus::TrialBudgetExhausted`]
//! - `max_iterations` reached → [`OptimizationStatus::MaxIterationsReached`]
//!
//! # References
//!
//! - Levenberg, K. (1944). "A Method for the Solution of Certain Non-Linear Problems in Least Squares". *Quarterly of Applied Mathematics*.
//! - Marquardt, D. W. (1963). "An Algorithm for Least-Squares Estimation of Nonlinear Parameters". *Journal of the Society for Industrial and Applied Mathematics*.
//! - Nielsen, H. B. (1999). "Damping Parameter in Marquardt's Method". Technical Report IMM-REP-1999-05.

use crate::core::problem::Problem;
use crate::linalg;
use crate::optimizer::{
    ConvergenceInfo, EvaluationCounters, IterationStats, LeastSquaresSolver, OptimizationStatus,
    OptimizerResult, SolverResult,
};
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use tracing::{debug, info};
use web_time::{Duration, Instant};

/// Summary statistics for the Levenberg-Marquardt optimization process.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardtSummary {
    /// Initial cost value
    pub initial_cost: f64,
    /// Final cost value
    pub final_cost: f64,
    /// Total number of outer iterations performed
    pub iterations: usize,
    /// Number of accepted trials
    pub successful_steps: usize,
    /// Number of rejected trials (cost did not decrease or the solve failed)
    pub unsuccessful_steps: usize,
    /// Final damping parameter value
    pub final_damping: f64,
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
    /// Per-iteration statistics history
    pub iteration_history: Vec<IterationStats>,
    /// Convergence status
    pub convergence_status: OptimizationStatus,
}

impl Display for LevenbergMarquardtSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Levenberg-Marquardt Final Result")?;

        if self.convergence_status.is_converged() {
            writeln!(f, "CONVERGED ({})", self.convergence_status)?;
        } else {
            writeln!(f, "STOPPED ({})", self.convergence_status)?;
        }

        let trials = (self.successful_steps + self.unsuccessful_steps).max(1) as f64;

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
        writeln!(f, "  Total:              {}", self.iterations)?;
        writeln!(
            f,
            "  Successful steps:   {} ({:.1}%)",
            self.successful_steps,
            100.0 * self.successful_steps as f64 / trials
        )?;
        writeln!(
            f,
            "  Unsuccessful steps: {} ({:.1}%)",
            self.unsuccessful_steps,
            100.0 * self.unsuccessful_steps as f64 / trials
        )?;
        writeln!(f, "  Final damping:      {:.2e}", self.final_damping)?;
        writeln!(f)?;
        writeln!(f, "Gradient:")?;
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

        Ok(())
    }
}

/// Damping shrink factor for an accepted trial with cost reduction `rho`.
fn damping_decrease_factor(rho: f64) -> f64 {
    let t = 2.0 * rho - 1.0;
    (1.0 - t * t * t).clamp(1.0 / 3.0, 2.0 / 3.0)
}

impl<const D: usize> LeastSquaresSolver<D> {
    /// Initial μ from the first linearization: τ·max(diag H).
    fn initial_damping(&self, scale: f64) -> f64 {
        let max_diagonal = self
            .state
            .hessian
            .diagonal()
            .iter()
            .fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        let damping = scale * max_diagonal;
        if damping.is_finite() && damping > 0.0 {
            damping
        } else {
            debug!(
                "Automatic damping unusable ({:.3e}), falling back to {:.3e}",
                damping, self.config.damping
            );
            self.config.damping
        }
    }

    fn accept_trial(&mut self, rho: f64) {
        self.state.damping *= damping_decrease_factor(rho);
        self.state.damping_nu = self.config.damping_nu;
    }

    fn reject_trial(&mut self) {
        self.state.damping *= self.state.damping_nu;
        // Saturate so μ = 0 never meets ν = ∞
        self.state.damping_nu = (self.state.damping_nu * 2.0).min(f64::MAX);
        self.state.trials += 1;
    }

    pub(crate) fn optimize_levenberg_marquardt<P: Problem<D>>(
        &mut self,
        problem: &mut P,
        state: &mut P::State,
    ) -> OptimizerResult<SolverResult> {
        let start_time = Instant::now();
        let mut counters = EvaluationCounters::default();
        let mut status = OptimizationStatus::MaxIterationsReached;
        let mut iterations = 0;
        let mut initial_cost = 0.0;

        let mut successful_steps = 0;
        let mut unsuccessful_steps = 0;
        let mut final_gradient_norm = 0.0;
        let mut max_parameter_update_norm: f64 = 0.0;
        let mut final_parameter_update_norm = 0.0;
        let mut iteration_history = Vec::new();

        if self.config.verbose {
            IterationStats::print_header();
        }

        'outer: for iteration in 0..self.config.max_iterations {
            iterations += 1;
            problem.start_iteration();

            let (chi2, evaluation_time) = counters.linearize(
                problem,
                state,
                &mut self.state.hessian,
                &mut self.state.gradient,
            );
            if iteration == 0 {
                initial_cost = chi2;
                if let Some(scale) = self.config.auto_damping_scale {
                    self.state.damping = self.initial_damping(scale);
                }
            }
            self.state.chi2 = chi2;
            self.state.trials = 0;

            let gradient_norm = self.state.gradient.norm();
            final_gradient_norm = gradient_norm;

            // Accepted update max-norm for this iteration
            let step_norm = loop {
                let damped = linalg::add_diagonal(&self.state.hessian, self.state.damping);
                let trial = match problem.solve(
                    state,
                    &damped,
                    &self.state.gradient,
                    self.config.linear_solver_type,
                ) {
                    Ok(dx) => {
                        let candidate = problem.update(state, &dx);
                        let new_chi2 = counters.cost::<D, P>(problem, &candidate);
                        Ok((dx, candidate, new_chi2))
                    }
                    Err(e) => Err(e),
                };

                match trial {
                    Ok((dx, candidate, new_chi2)) if chi2 - new_chi2 > 0.0 => {
                        let rho = chi2 - new_chi2;
                        debug!(
                            "Iteration {} trial {} accepted: chi2 {:.6e} -> {:.6e}, mu = {:.3e}",
                            iteration, self.state.trials, chi2, new_chi2, self.state.damping
                        );
                        *state = candidate;
                        self.state.chi2 = new_chi2;
                        self.accept_trial(rho);
                        successful_steps += 1;
                        problem.finish_trial();
                        break dx.amax();
                    }
                    Ok((_, _, new_chi2)) => {
                        debug!(
                            "Iteration {} trial {} rejected: chi2 {:.6e} -> {:.6e}, mu = {:.3e}, nu = {:.1}",
                            iteration,
                            self.state.trials,
                            chi2,
                            new_chi2,
                            self.state.damping,
                            self.state.damping_nu
                        );
                    }
                    Err(e) => {
                        debug!(
                            "Iteration {} trial {} solve failed ({}), mu = {:.3e}, nu = {:.1}",
                            iteration,
                            self.state.trials,
                            e,
                            self.state.damping,
                            self.state.damping_nu
                        );
                    }
                }

                self.reject_trial();
                unsuccessful_steps += 1;
                problem.finish_trial();
                if self.state.trials >= self.config.max_trials {
                    debug!(
                        "Iteration {}: {} trials rejected, keeping chi2 = {:.6e}",
                        iteration, self.state.trials, chi2
                    );
                    status = OptimizationStatus::TrialBudgetExhausted;
                    break 'outer;
                }
            };

            max_parameter_update_norm = max_parameter_update_norm.max(step_norm);
            final_parameter_update_norm = step_norm;

            let stats = IterationStats {
                iteration,
                cost: self.state.chi2,
                cost_change: chi2 - self.state.chi2,
                gradient_norm,
                step_norm,
                damping: Some(self.state.damping),
                trials: self.state.trials,
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

        let elapsed = start_time.elapsed();
        if self.config.verbose || tracing::enabled!(tracing::Level::DEBUG) {
            let summary = LevenbergMarquardtSummary {
                initial_cost,
                final_cost: self.state.chi2,
                iterations,
                successful_steps,
                unsuccessful_steps,
                final_damping: self.state.damping,
                final_gradient_norm,
                max_parameter_update_norm,
                final_parameter_update_norm,
                evaluation_time: counters.evaluation_time,
                total_time: elapsed,
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
