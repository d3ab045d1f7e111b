use std::str::FromStr;

use apex_lsq::manifold::SO3;
use apex_lsq::optimizer::{LeastSquaresSolver, OptimizerConfig, OptimizerType};
use apex_lsq::problems::{CameraPose, PinholeCamera, PoseOnlyReprojectionProblem};
use apex_lsq::{ApexLsqResult, HuberLoss, init_logger};
use clap::Parser;
use nalgebra::{Vector2, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "synthetic_pose")]
#[command(about = "Recover a camera pose from synthetic landmark observations")]
struct Args {
    /// Optimizer type: "gn" (Gauss-Newton) or "lm" (Levenberg-Marquardt)
    #[arg(short, long, default_value = "lm")]
    optimizer: String,

    /// Number of landmarks in front of the camera
    #[arg(short, long, default_value = "50")]
    landmarks: usize,

    /// Pixel noise amplitude added to each observation
    #[arg(short, long, default_value = "0.5")]
    noise: f64,

    /// Maximum number of optimization iterations
    #[arg(short, long, default_value = "30")]
    max_iterations: usize,

    /// Huber scale in pixels; omit for a plain squared loss
    #[arg(long)]
    huber: Option<f64>,

    /// Seed for landmark placement and noise
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Print per-iteration statistics and the final summary
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ApexLsqResult<()> {
    init_logger();
    let args = Args::parse();

    let optimizer_type = OptimizerType::from_str(&args.optimizer)?;
    let camera = PinholeCamera::new(500.0, 500.0, 320.0, 240.0)?;
    let truth = CameraPose::new(
        SO3::from_euler_angles(0.05, -0.1, 0.2),
        Vector3::new(0.3, -0.2, 1.0),
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let mut landmarks = Vec::with_capacity(args.landmarks);
    let mut observations = Vec::with_capacity(args.landmarks);
    while landmarks.len() < args.landmarks {
        let point = Vector3::new(
            rng.random_range(-2.0..2.0),
            rng.random_range(-1.5..1.5),
            rng.random_range(3.0..8.0),
        );
        let Some(pixel) = camera.project(&truth.transform(&point)) else {
            continue;
        };
        let noise = if args.noise > 0.0 {
            Vector2::new(
                rng.random_range(-args.noise..args.noise),
                rng.random_range(-args.noise..args.noise),
            )
        } else {
            Vector2::zeros()
        };
        landmarks.push(point);
        observations.push(pixel + noise);
    }

    let mut problem = PoseOnlyReprojectionProblem::new(camera, landmarks, observations)?;
    if let Some(scale) = args.huber {
        problem = problem.with_loss(HuberLoss::new(scale)?);
    }

    let mut pose = CameraPose::new(
        SO3::from_euler_angles(0.0, 0.0, 0.1),
        truth.translation + Vector3::new(-0.1, 0.15, 0.2),
    );
    let (angle, distance) = pose.distance(&truth);
    info!("Ground truth: {}", truth);
    info!(
        "Initial pose: {} (rotation error {:.4} rad, translation error {:.4})",
        pose, angle, distance
    );

    let config = OptimizerConfig::new()
        .with_optimizer_type(optimizer_type)
        .with_max_iterations(args.max_iterations)
        .with_verbose(args.verbose);
    let mut solver = LeastSquaresSolver::<6>::with_config(config)?;
    let result = solver.optimize(&mut problem, &mut pose)?;

    let (angle, distance) = pose.distance(&truth);
    info!("Optimizer: {}", optimizer_type);
    info!(
        "Status: {} after {} iterations in {:.2?}",
        result.status, result.iterations, result.elapsed_time
    );
    info!(
        "Cost: {:.6e} -> {:.6e}",
        result.initial_cost, result.final_cost
    );
    info!("Final pose: {}", pose);
    info!(
        "Rotation error {:.6} rad, translation error {:.6}",
        angle, distance
    );

    if !result.status.is_converged() {
        warn!("Optimization stopped before convergence: {}", result.status);
    }
    Ok(())
}
