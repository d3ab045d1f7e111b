//! Integration tests for Apex LSQ
//!
//! These tests drive the public solver API end to end on small analytic
//! problems and on the bundled curve, rotation and pose problems.
//!
//! # Test Coverage
//!
//! - **Solver properties**: zero-iteration runs, one-step Gauss-Newton on
//!   quadratics, monotone Levenberg-Marquardt chi2, the damping law, the
//!   step-size convergence predicate and budget exhaustion
//! - **Failure handling**: singular normal equations under both strategies
//! - **Problem hooks**: iteration and trial callbacks
//! - **Bundled problems**: convergence from perturbed starts on noisy data
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test integration_tests
//! ```

use apex_lsq::core::{Gradient, Hessian, Problem, Update};
use apex_lsq::linalg::{LinAlgError, LinAlgResult, LinearSolverType};
use apex_lsq::manifold::{LieGroup, SO3};
use apex_lsq::optimizer::{
    LeastSquaresSolver, OptimizationStatus, OptimizerConfig, OptimizerError, OptimizerType,
};
use apex_lsq::problems::{
    CameraPose, ExponentialCurveProblem, PinholeCamera, PoseOnlyReprojectionProblem,
    RotationAlignmentProblem,
};
use apex_lsq::{ApexLsqResult, HistoryObserver};
use nalgebra::{Matrix2, Vector1, Vector2, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;

/// chi2 = (x − 5)², optionally reporting a singular Hessian.
struct Parabola {
    singular: bool,
}

impl Problem<1> for Parabola {
    type State = f64;

    fn evaluate_error(
        &self,
        x: &f64,
        hessian: Option<&mut Hessian<1>>,
        gradient: Option<&mut Gradient<1>>,
    ) -> f64 {
        if let Some(h) = hessian
            && !self.singular
        {
            h[(0, 0)] += 2.0;
        }
        if let Some(g) = gradient {
            g[0] += -2.0 * (x - 5.0);
        }
        (x - 5.0) * (x - 5.0)
    }

    fn update(&self, x: &f64, dx: &Update<1>) -> f64 {
        x + dx[0]
    }
}

/// chi2 = (x − x*)ᵀ·A·(x − x*) with A symmetric positive definite.
struct Quadratic {
    a: Matrix2<f64>,
    minimum: Vector2<f64>,
}

impl Problem<2> for Quadratic {
    type State = Vector2<f64>;

    fn evaluate_error(
        &self,
        x: &Vector2<f64>,
        hessian: Option<&mut Hessian<2>>,
        gradient: Option<&mut Gradient<2>>,
    ) -> f64 {
        let offset = x - self.minimum;
        if let Some(h) = hessian {
            *h += self.a;
        }
        if let Some(g) = gradient {
            *g -= self.a * offset;
        }
        offset.dot(&(self.a * offset))
    }

    fn update(&self, x: &Vector2<f64>, dx: &Update<2>) -> Vector2<f64> {
        x + dx
    }
}

/// A residual of 1 that no step can reduce, with a unit step proposed every time.
struct ConstantResidual {
    frozen: bool,
}

impl Problem<1> for ConstantResidual {
    type State = Vector1<f64>;

    fn evaluate_error(
        &self,
        _x: &Vector1<f64>,
        hessian: Option<&mut Hessian<1>>,
        gradient: Option<&mut Gradient<1>>,
    ) -> f64 {
        if let Some(h) = hessian {
            h[(0, 0)] += 1.0;
        }
        if let Some(g) = gradient {
            g[0] += 1.0;
        }
        1.0
    }

    fn update(&self, x: &Vector1<f64>, dx: &Update<1>) -> Vector1<f64> {
        if self.frozen { *x } else { x + dx }
    }
}

/// Parabola that counts hook invocations.
#[derive(Default)]
struct CountingParabola {
    started: usize,
    finished: usize,
    trials: usize,
}

impl Problem<1> for CountingParabola {
    type State = f64;

    fn evaluate_error(
        &self,
        x: &f64,
        hessian: Option<&mut Hessian<1>>,
        gradient: Option<&mut Gradient<1>>,
    ) -> f64 {
        Parabola { singular: false }.evaluate_error(x, hessian, gradient)
    }

    fn update(&self, x: &f64, dx: &Update<1>) -> f64 {
        x + dx[0]
    }

    fn start_iteration(&mut self) {
        self.started += 1;
    }

    fn finish_iteration(&mut self) {
        self.finished += 1;
    }

    fn finish_trial(&mut self) {
        self.trials += 1;
    }
}

/// Singular parabola with its own diagonal solve that floors the curvature at 2.
#[derive(Default)]
struct FlooredParabola {
    solves: Cell<usize>,
}

impl Problem<1> for FlooredParabola {
    type State = f64;

    fn evaluate_error(
        &self,
        x: &f64,
        hessian: Option<&mut Hessian<1>>,
        gradient: Option<&mut Gradient<1>>,
    ) -> f64 {
        Parabola { singular: true }.evaluate_error(x, hessian, gradient)
    }

    fn update(&self, x: &f64, dx: &Update<1>) -> f64 {
        x + dx[0]
    }

    fn solve(
        &self,
        _x: &f64,
        hessian: &Hessian<1>,
        gradient: &Gradient<1>,
        _solver_type: LinearSolverType,
    ) -> LinAlgResult<Update<1>> {
        self.solves.set(self.solves.get() + 1);
        Ok(Update::<1>::new(gradient[0] / hessian[(0, 0)].max(2.0)))
    }
}

fn solver<const D: usize>(config: OptimizerConfig) -> ApexLsqResult<LeastSquaresSolver<D>> {
    Ok(LeastSquaresSolver::<D>::with_config(config)?)
}

fn levenberg_marquardt() -> OptimizerConfig {
    OptimizerConfig::new().with_optimizer_type(OptimizerType::LevenbergMarquardt)
}

#[test]
fn test_zero_iterations_leave_state_bit_identical() -> ApexLsqResult<()> {
    for optimizer_type in [OptimizerType::GaussNewton, OptimizerType::LevenbergMarquardt] {
        let config = OptimizerConfig::new()
            .with_optimizer_type(optimizer_type)
            .with_max_iterations(0);
        let mut solver = solver::<1>(config)?;
        let mut x = 0.1 + 0.2;
        let result = solver.optimize(&mut Parabola { singular: false }, &mut x)?;

        assert_eq!(x.to_bits(), (0.1f64 + 0.2).to_bits());
        assert_eq!(result.iterations, 0);
        assert_eq!(result.status, OptimizationStatus::MaxIterationsReached);
        assert_eq!(result.initial_cost, result.final_cost);
    }
    Ok(())
}

#[test]
fn test_gauss_newton_parabola_reaches_minimum() -> ApexLsqResult<()> {
    let mut solver = LeastSquaresSolver::<1>::new();
    let mut x = 0.0;
    let result = solver.optimize(&mut Parabola { singular: false }, &mut x)?;

    assert_eq!(result.status, OptimizationStatus::Converged);
    assert!((x - 5.0).abs() < 1e-12);
    assert!(result.final_cost < 1e-20);
    assert!((result.initial_cost - 25.0).abs() < 1e-12);
    // The first step is exact; the second only confirms it
    assert_eq!(result.iterations, 2);

    let covariance = solver.compute_covariance()?;
    assert!((covariance[(0, 0)] - 0.5).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_gauss_newton_quadratic_single_step() -> ApexLsqResult<()> {
    let mut problem = Quadratic {
        a: Matrix2::new(4.0, 1.0, 1.0, 3.0),
        minimum: Vector2::new(-1.5, 2.25),
    };
    let mut solver = solver::<2>(OptimizerConfig::new().with_max_iterations(1))?;
    let mut x = Vector2::new(10.0, -7.0);
    let result = solver.optimize(&mut problem, &mut x)?;

    assert_eq!(result.iterations, 1);
    assert!((x - problem.minimum).amax() < 1e-12);
    assert!(solver.error() < 1e-20);
    assert_eq!(*solver.hessian(), problem.a);
    Ok(())
}

#[test]
fn test_levenberg_marquardt_chi2_is_monotone() -> ApexLsqResult<()> {
    let xs: Vec<f64> = (0..40).map(|i| i as f64 * 0.05).collect();
    let ys = xs.iter().map(|&x| 2.0 * (0.5 * x).exp()).collect();
    let mut problem = ExponentialCurveProblem::new(xs, ys)?;

    let history = HistoryObserver::new();
    let config = levenberg_marquardt()
        .with_max_iterations(50)
        .with_max_trials(10);
    let mut solver = solver::<2>(config)?;
    solver.add_observer(history.clone());

    let mut params = Vector2::new(1.0, 0.0);
    let result = solver.optimize(&mut problem, &mut params)?;
    let steps = history.history()?;

    assert!(!steps.is_empty());
    let mut previous = result.initial_cost;
    for step in &steps {
        assert!(step.cost < previous);
        assert!(step.cost_change > 0.0);
        previous = step.cost;
    }
    assert!(result.final_cost <= steps[steps.len() - 1].cost);
    assert!((params - Vector2::new(2.0, 0.5)).amax() < 1e-6);
    Ok(())
}

#[test]
fn test_damping_shrinks_on_accepted_steps() -> ApexLsqResult<()> {
    let history = HistoryObserver::new();
    let mut solver = solver::<1>(levenberg_marquardt())?;
    solver.add_observer(history.clone());

    let mut x = 0.0;
    solver.optimize(&mut Parabola { singular: false }, &mut x)?;

    let mut damping = solver.config().damping;
    for step in history.history()? {
        let next = step.damping.unwrap_or(f64::NAN);
        assert_eq!(step.trials, 0);
        assert!(next <= damping * 2.0 / 3.0 + 1e-15);
        assert!(next >= damping / 3.0 - 1e-15);
        damping = next;
    }
    assert_eq!(solver.damping(), damping);
    Ok(())
}

#[test]
fn test_damping_grows_on_rejected_trials() -> ApexLsqResult<()> {
    let mut solver = solver::<1>(levenberg_marquardt().with_max_trials(3))?;
    let mut x = Vector1::new(0.0);
    let result = solver.optimize(&mut ConstantResidual { frozen: false }, &mut x)?;

    assert_eq!(result.status, OptimizationStatus::TrialBudgetExhausted);
    // μ: 0.01 → 0.02 → 0.08 → 0.64, ν: 2 → 4 → 8 → 16
    assert!((solver.damping() - 0.64).abs() < 1e-12);
    assert_eq!(solver.damping_nu(), 16.0);
    assert_eq!(solver.trials(), 3);
    // Rejected trials never touch the state
    assert_eq!(x[0].to_bits(), 0.0f64.to_bits());
    assert_eq!(solver.error(), 1.0);
    Ok(())
}

#[test]
fn test_infinite_tolerance_stops_after_one_step() -> ApexLsqResult<()> {
    for config in [OptimizerConfig::new(), levenberg_marquardt()] {
        let mut solver = solver::<1>(config.with_parameter_tolerance(f64::INFINITY))?;
        let mut x = 0.0;
        let result = solver.optimize(&mut Parabola { singular: false }, &mut x)?;

        assert_eq!(result.status, OptimizationStatus::Converged);
        assert_eq!(result.iterations, 1);
        assert!(x > 0.0 && x <= 5.0);
    }
    Ok(())
}

#[test]
fn test_constant_residual_exhausts_iterations() -> ApexLsqResult<()> {
    let mut solver = solver::<1>(OptimizerConfig::new().with_max_iterations(7))?;
    let mut x = Vector1::new(3.0);
    let result = solver.optimize(&mut ConstantResidual { frozen: true }, &mut x)?;

    assert_eq!(result.status, OptimizationStatus::MaxIterationsReached);
    assert_eq!(result.iterations, 7);
    assert_eq!(solver.iteration(), 7);
    assert_eq!(result.final_cost, 1.0);
    assert_eq!(result.initial_cost, 1.0);
    assert_eq!(x[0], 3.0);
    Ok(())
}

#[test]
fn test_singular_hessian_fails_gauss_newton() -> ApexLsqResult<()> {
    let mut solver = LeastSquaresSolver::<1>::new();
    let mut x = 0.0;
    let result = solver.optimize(&mut Parabola { singular: true }, &mut x);

    assert!(matches!(
        result,
        Err(OptimizerError::LinearSolveFailed {
            iteration: 0,
            source: LinAlgError::NotPositiveDefinite,
        })
    ));
    assert_eq!(x, 0.0);
    assert_eq!(solver.error(), 25.0);
    Ok(())
}

#[test]
fn test_singular_hessian_recovers_with_damping() -> ApexLsqResult<()> {
    let config = levenberg_marquardt()
        .with_max_trials(10)
        .with_max_iterations(50);
    let mut solver = solver::<1>(config)?;
    let mut x = 0.0;
    let result = solver.optimize(&mut Parabola { singular: true }, &mut x)?;

    assert!((x - 5.0).abs() < 1e-3);
    assert!(result.final_cost < result.initial_cost);
    Ok(())
}

#[test]
fn test_custom_solve_replaces_default_backend() -> ApexLsqResult<()> {
    let mut problem = FlooredParabola::default();
    let mut x = 0.0;
    let result = LeastSquaresSolver::<1>::new().optimize(&mut problem, &mut x)?;

    // The Cholesky default fails on H = 0; the override does not
    assert_eq!(result.status, OptimizationStatus::Converged);
    assert_eq!(x, 5.0);
    assert_eq!(problem.solves.get(), result.iterations);

    let mut problem = FlooredParabola::default();
    let mut x = 0.0;
    let result = solver::<1>(levenberg_marquardt())?.optimize(&mut problem, &mut x)?;

    // One exact step, then five zero steps rejected for not lowering chi2
    assert_eq!(x, 5.0);
    assert_eq!(result.final_cost, 0.0);
    assert_eq!(result.status, OptimizationStatus::TrialBudgetExhausted);
    assert_eq!(problem.solves.get(), 6);
    Ok(())
}

#[test]
fn test_hooks_follow_iterations_and_trials() -> ApexLsqResult<()> {
    let mut problem = CountingParabola::default();
    let mut x = 0.0;
    let result = LeastSquaresSolver::<1>::new().optimize(&mut problem, &mut x)?;

    assert_eq!(problem.started, result.iterations);
    assert_eq!(problem.finished, result.iterations - 1);
    assert_eq!(problem.trials, 0);

    let mut problem = CountingParabola::default();
    let mut x = 0.0;
    let result = solver::<1>(levenberg_marquardt())?.optimize(&mut problem, &mut x)?;

    assert_eq!(result.status, OptimizationStatus::Converged);
    assert_eq!(problem.started, result.iterations);
    assert_eq!(problem.finished, result.iterations - 1);
    // Every trial on a convex parabola is accepted
    assert_eq!(problem.trials, result.iterations);

    // Running out of iterations still finishes the last one
    let mut problem = CountingParabola::default();
    let mut x = 0.0;
    let result = solver::<1>(OptimizerConfig::new().with_max_iterations(1))?
        .optimize(&mut problem, &mut x)?;

    assert_eq!(result.status, OptimizationStatus::MaxIterationsReached);
    assert_eq!(problem.started, 1);
    assert_eq!(problem.finished, 1);
    Ok(())
}

#[test]
fn test_stop_when_error_increases_restores_state() -> ApexLsqResult<()> {
    let config = OptimizerConfig::new()
        .with_stop_when_error_increases(true)
        .with_max_iterations(20);
    let mut solver = solver::<1>(config)?;
    let mut x = 0.0;
    let result = solver.optimize(&mut Parabola { singular: false }, &mut x)?;

    // A convex parabola never increases, so the flag must not change the outcome
    assert_eq!(result.status, OptimizationStatus::Converged);
    assert!((x - 5.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_curve_fitting_with_noise() -> ApexLsqResult<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let xs: Vec<f64> = (0..40).map(|i| i as f64 * 0.05).collect();
    let ys = xs
        .iter()
        .map(|&x| 2.0 * (0.5 * x).exp() + rng.random_range(-0.01..0.01))
        .collect();
    let mut problem = ExponentialCurveProblem::new(xs, ys)?;

    for optimizer_type in [OptimizerType::GaussNewton, OptimizerType::LevenbergMarquardt] {
        let config = OptimizerConfig::new()
            .with_optimizer_type(optimizer_type)
            .with_max_iterations(50);
        let mut solver = solver::<2>(config)?;
        let mut params = Vector2::new(1.5, 0.3);
        let result = solver.optimize(&mut problem, &mut params)?;

        assert!(result.final_cost < result.initial_cost);
        assert!((params[0] - 2.0).abs() < 0.02, "{optimizer_type}: a = {}", params[0]);
        assert!((params[1] - 0.5).abs() < 0.02, "{optimizer_type}: b = {}", params[1]);
    }
    Ok(())
}

#[test]
fn test_rotation_alignment_with_noise() -> ApexLsqResult<()> {
    let mut rng = StdRng::seed_from_u64(11);
    let truth = SO3::from_euler_angles(0.3, -0.2, 0.5);
    let mut source = Vec::new();
    let mut target = Vec::new();
    for _ in 0..30 {
        let a = Vector3::new(
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
            rng.random_range(-1.0..1.0),
        );
        let noise = Vector3::new(
            rng.random_range(-0.01..0.01),
            rng.random_range(-0.01..0.01),
            rng.random_range(-0.01..0.01),
        );
        target.push(truth.act(&a) + noise);
        source.push(a);
    }
    let mut problem = RotationAlignmentProblem::new(source, target)?;

    for optimizer_type in [OptimizerType::GaussNewton, OptimizerType::LevenbergMarquardt] {
        let config = OptimizerConfig::new()
            .with_optimizer_type(optimizer_type)
            .with_max_iterations(30);
        let mut solver = solver::<3>(config)?;
        let mut rotation = SO3::identity();
        let result = solver.optimize(&mut problem, &mut rotation)?;

        assert!(result.final_cost < result.initial_cost);
        assert!(rotation.between(&truth).angle() < 0.02);
    }
    Ok(())
}

#[test]
fn test_pose_recovery_with_noise() -> ApexLsqResult<()> {
    let mut rng = StdRng::seed_from_u64(42);
    let camera = PinholeCamera::new(500.0, 500.0, 320.0, 240.0)?;
    let truth = CameraPose::new(
        SO3::from_euler_angles(0.05, -0.1, 0.2),
        Vector3::new(0.3, -0.2, 1.0),
    );

    let mut landmarks = Vec::new();
    let mut observations = Vec::new();
    while landmarks.len() < 40 {
        let point = Vector3::new(
            rng.random_range(-2.0..2.0),
            rng.random_range(-1.5..1.5),
            rng.random_range(3.0..8.0),
        );
        if let Some(pixel) = camera.project(&truth.transform(&point)) {
            let noise = Vector2::new(rng.random_range(-0.5..0.5), rng.random_range(-0.5..0.5));
            landmarks.push(point);
            observations.push(pixel + noise);
        }
    }
    let mut problem = PoseOnlyReprojectionProblem::new(camera, landmarks, observations)?;

    for optimizer_type in [OptimizerType::GaussNewton, OptimizerType::LevenbergMarquardt] {
        let config = OptimizerConfig::new()
            .with_optimizer_type(optimizer_type)
            .with_max_iterations(30);
        let mut solver = solver::<6>(config)?;
        let mut pose = CameraPose::new(
            SO3::from_euler_angles(0.0, 0.0, 0.1),
            truth.translation + Vector3::new(-0.1, 0.15, 0.2),
        );
        let result = solver.optimize(&mut problem, &mut pose)?;

        let (angle, distance) = pose.distance(&truth);
        assert!(result.final_cost < result.initial_cost);
        assert!(angle < 0.01, "{optimizer_type}: rotation error {angle}");
        assert!(distance < 0.05, "{optimizer_type}: translation error {distance}");
    }
    Ok(())
}
