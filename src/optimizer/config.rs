//! Configuration shared by both optimization strategies.

use crate::linalg::LinearSolverType;
use crate::optimizer::{OptimizerError, OptimizerResult, OptimizerType};
use tracing::info;

/// Configuration parameters for [`LeastSquaresSolver`](crate::optimizer::LeastSquaresSolver).
///
/// # Builder Pattern
///
/// ```
/// use apex_lsq::optimizer::{OptimizerConfig, OptimizerType};
///
/// let config = OptimizerConfig::new()
///     .with_optimizer_type(OptimizerType::LevenbergMarquardt)
///     .with_max_iterations(30)
///     .with_damping(1e-3)
///     .with_max_trials(8);
/// assert!(config.validate().is_ok());
/// ```
///
/// # Damping Parameter Behavior (Levenberg-Marquardt)
///
/// - **Initial damping** (`damping`, μ₀): added to the Hessian diagonal, `(H + μI)·dx = g`
/// - **Growth factor** (`damping_nu`, ν₀): on a rejected trial `μ ← μ·ν` and `ν ← 2ν`;
///   on an accepted trial μ shrinks by a factor in [1/3, 2/3] and ν resets to ν₀
/// - **Automatic damping** (`auto_damping_scale`, τ): when set, μ₀ is replaced by
///   `τ·max(diag H)` from the first linearization
///
/// # Termination
///
/// - `||dx||∞ < parameter_tolerance` after an accepted step
/// - `max_iterations` outer iterations
/// - `max_trials` consecutive rejected trials (Levenberg-Marquardt)
/// - chi2 increase, if `stop_when_error_increases` is set (Gauss-Newton)
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Optimization strategy
    pub optimizer_type: OptimizerType,
    /// Backend of the default linear solve
    pub linear_solver_type: LinearSolverType,
    /// Initial damping parameter μ₀
    pub damping: f64,
    /// Initial damping growth factor ν₀
    pub damping_nu: f64,
    /// Derive μ₀ as τ·max(diag H) when set
    pub auto_damping_scale: Option<f64>,
    /// Maximum number of outer iterations
    pub max_iterations: usize,
    /// Maximum number of trials per outer iteration (Levenberg-Marquardt)
    pub max_trials: usize,
    /// Stop (and roll back) when chi2 increases between iterations (Gauss-Newton)
    pub stop_when_error_increases: bool,
    /// Convergence threshold on the update max-norm
    pub parameter_tolerance: f64,
    /// Report per-iteration statistics and a final summary at INFO level
    pub verbose: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            optimizer_type: OptimizerType::default(),
            linear_solver_type: LinearSolverType::default(),
            damping: 0.01,
            damping_nu: 2.0,
            auto_damping_scale: None,
            max_iterations: 15,
            max_trials: 5,
            stop_when_error_increases: false,
            parameter_tolerance: 1e-10,
            verbose: false,
        }
    }
}

impl OptimizerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the optimization strategy
    pub fn with_optimizer_type(mut self, optimizer_type: OptimizerType) -> Self {
        self.optimizer_type = optimizer_type;
        self
    }

    /// Set the linear solver type
    pub fn with_linear_solver_type(mut self, linear_solver_type: LinearSolverType) -> Self {
        self.linear_solver_type = linear_solver_type;
        self
    }

    /// Set the initial damping parameter.
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Set the initial damping growth factor.
    pub fn with_damping_nu(mut self, damping_nu: f64) -> Self {
        self.damping_nu = damping_nu;
        self
    }

    /// Derive the initial damping from the first Hessian: μ₀ = τ·max(diag H).
    pub fn with_auto_damping(mut self, scale: f64) -> Self {
        self.auto_damping_scale = Some(scale);
        self
    }

    /// Set the maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the maximum number of trials per iteration
    pub fn with_max_trials(mut self, max_trials: usize) -> Self {
        self.max_trials = max_trials;
        self
    }

    /// Stop when the error increases between two Gauss-Newton iterations
    pub fn with_stop_when_error_increases(mut self, stop: bool) -> Self {
        self.stop_when_error_increases = stop;
        self
    }

    /// Set the update-norm convergence threshold
    pub fn with_parameter_tolerance(mut self, parameter_tolerance: f64) -> Self {
        self.parameter_tolerance = parameter_tolerance;
        self
    }

    /// Enable or disable verbose reporting
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Check every option against its valid range.
    pub fn validate(&self) -> OptimizerResult<()> {
        if !(self.damping.is_finite() && self.damping >= 0.0) {
            return Err(OptimizerError::InvalidParameters(format!(
                "damping must be finite and non-negative, got {}",
                self.damping
            ))
            .log());
        }
        if !(self.damping_nu.is_finite() && self.damping_nu >= 1.0) {
            return Err(OptimizerError::InvalidParameters(format!(
                "damping_nu must be finite and >= 1, got {}",
                self.damping_nu
            ))
            .log());
        }
        if let Some(scale) = self.auto_damping_scale
            && !(scale.is_finite() && scale > 0.0)
        {
            return Err(OptimizerError::InvalidParameters(format!(
                "auto damping scale must be finite and positive, got {scale}"
            ))
            .log());
        }
        if self.optimizer_type == OptimizerType::LevenbergMarquardt && self.max_trials == 0 {
            return Err(OptimizerError::InvalidParameters(
                "max_trials must be at least 1 for Levenberg-Marquardt".to_string(),
            )
            .log());
        }
        if self.parameter_tolerance.is_nan() || self.parameter_tolerance < 0.0 {
            return Err(OptimizerError::InvalidParameters(format!(
                "parameter_tolerance must be non-negative, got {}",
                self.parameter_tolerance
            ))
            .log());
        }
        Ok(())
    }

    /// Print configuration parameters (verbose mode only)
    pub fn print_configuration(&self) {
        info!(
            "Configuration:\n  Solver:              {}\n  Linear solver:       {}\n  Max iterations:      {}\n  Max trials:          {}\n  Parameter tolerance: {:.2e}\n  Initial damping:     {}\n  Damping growth:      {:.2}\n  Stop on increase:    {}",
            self.optimizer_type,
            self.linear_solver_type,
            self.max_iterations,
            self.max_trials,
            self.parameter_tolerance,
            match self.auto_damping_scale {
                Some(scale) => format!("auto ({scale:.2e} * max diag H)"),
                None => format!("{:.2e}", self.damping),
            },
            self.damping_nu,
            if self.stop_when_error_increases {
                "enabled"
            } else {
                "disabled"
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OptimizerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.optimizer_type, OptimizerType::GaussNewton);
        assert_eq!(config.max_iterations, 15);
        assert_eq!(config.max_trials, 5);
        assert!((config.damping - 0.01).abs() < 1e-15);
        assert!((config.damping_nu - 2.0).abs() < 1e-15);
        assert!(!config.stop_when_error_increases);
    }

    #[test]
    fn test_builder() {
        let config = OptimizerConfig::new()
            .with_optimizer_type(OptimizerType::LevenbergMarquardt)
            .with_linear_solver_type(LinearSolverType::QR)
            .with_damping(0.5)
            .with_damping_nu(3.0)
            .with_max_iterations(7)
            .with_max_trials(2)
            .with_stop_when_error_increases(true)
            .with_parameter_tolerance(1e-6)
            .with_verbose(true);
        assert_eq!(config.optimizer_type, OptimizerType::LevenbergMarquardt);
        assert_eq!(config.linear_solver_type, LinearSolverType::QR);
        assert_eq!(config.max_iterations, 7);
        assert_eq!(config.max_trials, 2);
        assert!(config.stop_when_error_increases);
        assert!(config.verbose);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(OptimizerConfig::new().with_damping(-1.0).validate().is_err());
        assert!(OptimizerConfig::new().with_damping(f64::NAN).validate().is_err());
        assert!(OptimizerConfig::new().with_damping_nu(0.5).validate().is_err());
        assert!(OptimizerConfig::new().with_auto_damping(0.0).validate().is_err());
        assert!(
            OptimizerConfig::new()
                .with_parameter_tolerance(-1.0)
                .validate()
                .is_err()
        );
        assert!(
            OptimizerConfig::new()
                .with_optimizer_type(OptimizerType::LevenbergMarquardt)
                .with_max_trials(0)
                .validate()
                .is_err()
        );
        // max_trials is irrelevant to Gauss-Newton
        assert!(OptimizerConfig::new().with_max_trials(0).validate().is_ok());
        // an infinite tolerance is legal: stop after the first accepted step
        assert!(
            OptimizerConfig::new()
                .with_parameter_tolerance(f64::INFINITY)
                .validate()
                .is_ok()
        );
    }
}
