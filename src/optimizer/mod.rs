//! Optimization strategies for fixed-size nonlinear least squares problems.
//!
//! [`LeastSquaresSolver`] owns the trust-region state (damping, counters, last
//! linearization) and drives a [`Problem`] through one of two strategies:
//! - Gauss-Newton: undamped steps, accepted unconditionally
//! - Levenberg-Marquardt: damped steps with an inner accept/reject trial loop
//!
//! The strategy is selected through [`OptimizerConfig::optimizer_type`].

use crate::core::problem::{Gradient, Hessian, Problem};
use crate::linalg::{self, LinAlgError, LinAlgResult};
use std::{
    fmt,
    fmt::{Display, Formatter},
    str::FromStr,
};
use thiserror::Error;
use tracing::{error, info};
use web_time::{Duration, Instant};

pub mod config;
pub mod gauss_newton;
pub mod levenberg_marquardt;

pub use config::OptimizerConfig;
pub use gauss_newton::GaussNewtonSummary;
pub use levenberg_marquardt::LevenbergMarquardtSummary;

// Re-export observer types from the observers module
pub use crate::observers::{OptObserver, OptObserverVec};

/// Type of optimization strategy to use
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerType {
    /// Gauss-Newton algorithm (fast convergence, may be unstable)
    #[default]
    GaussNewton,
    /// Levenberg-Marquardt algorithm (robust, adaptive damping)
    LevenbergMarquardt,
}

impl Display for OptimizerType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerType::GaussNewton => write!(f, "Gauss-Newton"),
            OptimizerType::LevenbergMarquardt => write!(f, "Levenberg-Marquardt"),
        }
    }
}

impl FromStr for OptimizerType {
    type Err = OptimizerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gn" | "gauss-newton" | "gauss_newton" => Ok(OptimizerType::GaussNewton),
            "lm" | "levenberg-marquardt" | "levenberg_marquardt" => {
                Ok(OptimizerType::LevenbergMarquardt)
            }
            other => Err(OptimizerError::InvalidParameters(format!(
                "unknown optimizer type '{other}' (expected gn or lm)"
            ))),
        }
    }
}

/// Optimizer-specific error types for apex-lsq
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Invalid optimization parameters provided
    #[error("Invalid optimization parameters: {0}")]
    InvalidParameters(String),

    /// The undamped normal equations could not be solved (Gauss-Newton)
    #[error("Linear system solve failed at iteration {iteration}")]
    LinearSolveFailed {
        iteration: usize,
        #[source]
        source: LinAlgError,
    },
}

impl OptimizerError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// config.validate().map_err(|e| e.log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error
    ///
    /// # Arguments
    /// * `source_error` - The underlying error (must implement Debug)
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Detailed convergence information.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceInfo {
    /// L2 norm of the last computed gradient
    pub final_gradient_norm: f64,
    /// Max-norm of the last accepted update
    pub final_parameter_update_norm: f64,
    /// Number of error evaluations (with or without linearization)
    pub cost_evaluations: usize,
    /// Number of evaluations that also produced H and g
    pub jacobian_evaluations: usize,
    /// Total time spent inside the problem's error evaluation
    pub evaluation_time: Duration,
}

impl Display for ConvergenceInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Final gradient norm: {:.2e}, Final parameter update norm: {:.2e}, Cost evaluations: {}, Jacobian evaluations: {}",
            self.final_gradient_norm,
            self.final_parameter_update_norm,
            self.cost_evaluations,
            self.jacobian_evaluations
        )
    }
}

/// Terminal status of an optimization run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// The update max-norm fell below the parameter tolerance
    Converged,
    /// Gauss-Newton stopped because chi2 increased; the previous state was kept
    ErrorIncreased,
    /// Maximum number of outer iterations reached
    MaxIterationsReached,
    /// Levenberg-Marquardt rejected `max_trials` consecutive trials
    TrialBudgetExhausted,
}

impl OptimizationStatus {
    /// Whether the run stopped on the convergence predicate.
    pub fn is_converged(&self) -> bool {
        matches!(self, OptimizationStatus::Converged)
    }
}

impl Display for OptimizationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStatus::Converged => write!(f, "Converged"),
            OptimizationStatus::ErrorIncreased => write!(f, "Stopped on error increase"),
            OptimizationStatus::MaxIterationsReached => write!(f, "Maximum iterations reached"),
            OptimizationStatus::TrialBudgetExhausted => write!(f, "Trial budget exhausted"),
        }
    }
}

/// Result of a solver execution. The optimized state itself is written back
/// through the `&mut` reference handed to [`LeastSquaresSolver::optimize`].
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// Final optimization status
    pub status: OptimizationStatus,
    /// Cost at the initial state
    pub initial_cost: f64,
    /// Cost at the returned state
    pub final_cost: f64,
    /// Number of outer iterations performed
    pub iterations: usize,
    /// Total time elapsed
    pub elapsed_time: Duration,
    /// Convergence statistics
    pub convergence_info: ConvergenceInfo,
}

/// Per-iteration statistics, reported after every accepted step.
#[derive(Debug, Clone)]
pub struct IterationStats {
    /// Iteration number (0-indexed)
    pub iteration: usize,
    /// chi2 of the iteration (Gauss-Newton: at the linearization point,
    /// Levenberg-Marquardt: after the accepted trial)
    pub cost: f64,
    /// chi2 reduction relative to the previous report
    pub cost_change: f64,
    /// L2 norm of the gradient at the linearization point
    pub gradient_norm: f64,
    /// Max-norm of the accepted update
    pub step_norm: f64,
    /// Damping μ after the step (None for Gauss-Newton)
    pub damping: Option<f64>,
    /// Rejected trials before the step was accepted
    pub trials: usize,
    /// Time spent linearizing this iteration in milliseconds
    pub evaluation_time_ms: f64,
    /// Total elapsed time since optimization started in milliseconds
    pub total_time_ms: f64,
}

impl IterationStats {
    /// Print table header
    pub fn print_header() {
        info!(
            "{:>4}  {:>13}  {:>13}  {:>13}  {:>13}  {:>11}  {:>6}  {:>11}  {:>13}",
            "iter",
            "chi2",
            "chi2_change",
            "|gradient|",
            "|dx|inf",
            "mu",
            "trials",
            "eval_time",
            "total_time"
        );
    }

    /// Print single iteration line with scientific notation
    pub fn print_line(&self) {
        let damping = match self.damping {
            Some(mu) => format!("{mu:.2e}"),
            None => "-".to_string(),
        };
        info!(
            "{:>4}  {:>13.6e}  {:>13.2e}  {:>13.2e}  {:>13.2e}  {:>11}  {:>6}  {:>9.2}ms  {:>11.2}ms",
            self.iteration,
            self.cost,
            self.cost_change,
            self.gradient_norm,
            self.step_norm,
            damping,
            self.trials,
            self.evaluation_time_ms,
            self.total_time_ms
        );
    }
}

/// Mutable numeric state shared across iterations of one run.
#[derive(Debug, Clone)]
pub(crate) struct TrustRegionState<const D: usize> {
    /// chi2 of the most recently accepted state
    pub(crate) chi2: f64,
    pub(crate) damping: f64,
    pub(crate) damping_nu: f64,
    /// Completed outer iterations
    pub(crate) iteration: usize,
    /// Rejected trials in the current outer iteration
    pub(crate) trials: usize,
    pub(crate) hessian: Hessian<D>,
    pub(crate) gradient: Gradient<D>,
}

impl<const D: usize> TrustRegionState<D> {
    pub(crate) fn new(config: &OptimizerConfig) -> Self {
        Self {
            chi2: 0.0,
            damping: config.damping,
            damping_nu: config.damping_nu,
            iteration: 0,
            trials: 0,
            hessian: Hessian::zeros(),
            gradient: Gradient::zeros(),
        }
    }
}

/// Evaluation bookkeeping for one run.
#[derive(Debug, Clone, Default)]
pub(crate) struct EvaluationCounters {
    pub(crate) cost_evaluations: usize,
    pub(crate) jacobian_evaluations: usize,
    pub(crate) evaluation_time: Duration,
}

impl EvaluationCounters {
    /// Linearize `problem` at `state` into freshly zeroed H and g.
    ///
    /// Returns chi2 and the time spent in the problem.
    pub(crate) fn linearize<const D: usize, P: Problem<D>>(
        &mut self,
        problem: &P,
        state: &P::State,
        hessian: &mut Hessian<D>,
        gradient: &mut Gradient<D>,
    ) -> (f64, Duration) {
        hessian.fill(0.0);
        gradient.fill(0.0);
        let start = Instant::now();
        let chi2 = problem.evaluate_error(state, Some(hessian), Some(gradient));
        let elapsed = start.elapsed();
        self.cost_evaluations += 1;
        self.jacobian_evaluations += 1;
        self.evaluation_time += elapsed;
        (chi2, elapsed)
    }

    /// Evaluate chi2 only.
    pub(crate) fn cost<const D: usize, P: Problem<D>>(
        &mut self,
        problem: &P,
        state: &P::State,
    ) -> f64 {
        let start = Instant::now();
        let chi2 = problem.evaluate_error(state, None, None);
        self.cost_evaluations += 1;
        self.evaluation_time += start.elapsed();
        chi2
    }
}

/// Nonlinear least squares solver over a `D`-dimensional update space.
///
/// One instance runs one optimization at a time; the trust-region state is
/// reset at the start of every [`optimize`](Self::optimize) call and stays
/// queryable afterwards.
///
/// ```
/// use apex_lsq::core::{Gradient, Hessian, Problem, Update};
/// use apex_lsq::optimizer::{LeastSquaresSolver, OptimizationStatus};
///
/// struct Parabola;
///
/// impl Problem<1> for Parabola {
///     type State = f64;
///
///     fn evaluate_error(
///         &self,
///         x: &f64,
///         hessian: Option<&mut Hessian<1>>,
///         gradient: Option<&mut Gradient<1>>,
///     ) -> f64 {
///         if let Some(h) = hessian {
///             h[(0, 0)] += 2.0;
///         }
///         if let Some(g) = gradient {
///             g[0] += -2.0 * (x - 5.0);
///         }
///         (x - 5.0) * (x - 5.0)
///     }
///
///     fn update(&self, x: &f64, dx: &Update<1>) -> f64 {
///         x + dx[0]
///     }
/// }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut solver = LeastSquaresSolver::<1>::new();
/// let mut x = 0.0;
/// let result = solver.optimize(&mut Parabola, &mut x)?;
/// assert_eq!(result.status, OptimizationStatus::Converged);
/// assert!((x - 5.0).abs() < 1e-12);
/// # Ok(())
/// # }
/// ```
pub struct LeastSquaresSolver<const D: usize> {
    config: OptimizerConfig,
    state: TrustRegionState<D>,
    observers: OptObserverVec,
}

impl<const D: usize> Default for LeastSquaresSolver<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const D: usize> LeastSquaresSolver<D> {
    /// Create a solver with the default configuration (Gauss-Newton).
    pub fn new() -> Self {
        let config = OptimizerConfig::default();
        Self {
            state: TrustRegionState::new(&config),
            config,
            observers: OptObserverVec::new(),
        }
    }

    /// Create a solver with a validated configuration.
    pub fn with_config(config: OptimizerConfig) -> OptimizerResult<Self> {
        config.validate()?;
        Ok(Self {
            state: TrustRegionState::new(&config),
            config,
            observers: OptObserverVec::new(),
        })
    }

    /// Add an observer notified after every accepted step.
    pub fn add_observer(&mut self, observer: impl OptObserver + 'static) {
        self.observers.add(observer);
    }

    /// The active configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Restore damping, counters, chi2 and the stored linearization to their initial values.
    pub fn reset(&mut self) {
        self.state = TrustRegionState::new(&self.config);
    }

    /// chi2 of the last accepted state.
    pub fn error(&self) -> f64 {
        self.state.chi2
    }

    /// Undamped Hessian from the last linearization.
    pub fn hessian(&self) -> &Hessian<D> {
        &self.state.hessian
    }

    /// Gradient from the last linearization.
    pub fn gradient(&self) -> &Gradient<D> {
        &self.state.gradient
    }

    /// Current damping μ.
    pub fn damping(&self) -> f64 {
        self.state.damping
    }

    /// Current damping growth factor ν.
    pub fn damping_nu(&self) -> f64 {
        self.state.damping_nu
    }

    /// Number of completed outer iterations.
    pub fn iteration(&self) -> usize {
        self.state.iteration
    }

    /// Rejected trials in the last outer iteration.
    pub fn trials(&self) -> usize {
        self.state.trials
    }

    /// Covariance estimate H⁻¹ from the last linearization.
    pub fn compute_covariance(&self) -> LinAlgResult<Hessian<D>> {
        linalg::cholesky::inverse(&self.state.hessian)
    }

    /// Minimize the problem's error starting from `state`, writing the result back.
    ///
    /// Returns `Err` only when the Gauss-Newton linear solve fails; `state` then
    /// holds the last valid iterate. Every other termination is reported through
    /// [`SolverResult::status`].
    pub fn optimize<P: Problem<D>>(
        &mut self,
        problem: &mut P,
        state: &mut P::State,
    ) -> OptimizerResult<SolverResult> {
        self.reset();

        if self.config.verbose {
            self.config.print_configuration();
        }

        if self.config.max_iterations == 0 {
            let start_time = Instant::now();
            let mut counters = EvaluationCounters::default();
            let chi2 = counters.cost::<D, P>(problem, state);
            self.state.chi2 = chi2;
            return Ok(SolverResult {
                status: OptimizationStatus::MaxIterationsReached,
                initial_cost: chi2,
                final_cost: chi2,
                iterations: 0,
                elapsed_time: start_time.elapsed(),
                convergence_info: ConvergenceInfo {
                    cost_evaluations: counters.cost_evaluations,
                    evaluation_time: counters.evaluation_time,
                    ..ConvergenceInfo::default()
                },
            });
        }

        match self.config.optimizer_type {
            OptimizerType::GaussNewton => self.optimize_gauss_newton(problem, state),
            OptimizerType::LevenbergMarquardt => self.optimize_levenberg_marquardt(problem, state),
        }
    }
}
