//! Camera-pose-only reprojection.
//!
//! Landmarks are fixed and known in the world frame; only the world-to-camera
//! pose is estimated from their pixel observations.
//!
//! # Residual Formulation
//!
//! ```text
//! p_c = R·p_w + t
//! r   = obs − π(p_c),   π(x, y, z) = (fx·x/z + cx, fy·y/z + cy)
//! ```
//!
//! The pose is perturbed on the left with the update ordered `[δt, δθ]`:
//!
//! ```text
//! R' = Exp(δθ)·R,   t' = Exp(δθ)·t + δt   ⇒   ∂p_c/∂ξ = [I | −[p_c]ₓ]
//! ```
//!
//! With a robust loss ρ each observation contributes `ρ(‖r‖²)` to chi2 and is
//! weighted by `ρ'(‖r‖²)` in `H` and `g`.
//!
//! A landmark that lands behind the camera contributes the fixed squared error
//! [`BEHIND_CAMERA_SQUARED_ERROR`] with a zero Jacobian, so hiding observations
//! never lowers chi2.

use crate::core::loss_functions::LossFunction;
use crate::core::{CoreError, CoreResult, Gradient, Hessian, Problem, Update};
use crate::manifold::{LieGroup, SO3, SO3Tangent, Tangent, so3::skew};
use nalgebra::{Matrix2x3, Matrix2x6, Vector2, Vector3};
use std::fmt;

/// Points closer than this to the camera plane are not projected.
const MIN_DEPTH: f64 = 1e-6;

/// Squared pixel error charged for a landmark that cannot be projected (1000 px).
pub const BEHIND_CAMERA_SQUARED_ERROR: f64 = 1e6;

/// Pinhole intrinsics without distortion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeCamera {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl PinholeCamera {
    /// Focal lengths must be positive, all values finite.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> CoreResult<Self> {
        if ![fx, fy, cx, cy].iter().all(|v| v.is_finite()) || fx <= 0.0 || fy <= 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "invalid pinhole intrinsics fx={fx}, fy={fy}, cx={cx}, cy={cy}"
            ))
            .log());
        }
        Ok(Self { fx, fy, cx, cy })
    }

    /// Project a camera-frame point; `None` behind or on the camera plane.
    pub fn project(&self, point: &Vector3<f64>) -> Option<Vector2<f64>> {
        if point.z < MIN_DEPTH {
            return None;
        }
        Some(Vector2::new(
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy,
        ))
    }

    /// Jacobian of [`project`](Self::project) with respect to the camera-frame point.
    pub fn project_jacobian(&self, point: &Vector3<f64>) -> Matrix2x3<f64> {
        let inv_z = 1.0 / point.z;
        let inv_z2 = inv_z * inv_z;
        Matrix2x3::new(
            self.fx * inv_z,
            0.0,
            -self.fx * point.x * inv_z2,
            0.0,
            self.fy * inv_z,
            -self.fy * point.y * inv_z2,
        )
    }
}

/// World-to-camera rigid transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub rotation: SO3,
    pub translation: Vector3<f64>,
}

impl CameraPose {
    pub fn new(rotation: SO3, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self::new(SO3::identity(), Vector3::zeros())
    }

    /// Map a world point into the camera frame.
    pub fn transform(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.act(point) + self.translation
    }

    /// Left retraction by `[δt, δθ]`.
    pub fn retract(&self, delta: &Update<6>) -> Self {
        let delta_rotation = SO3Tangent::new(Vector3::new(delta[3], delta[4], delta[5])).exp();
        Self {
            rotation: delta_rotation.compose(&self.rotation),
            translation: delta_rotation.act(&self.translation)
                + Vector3::new(delta[0], delta[1], delta[2]),
        }
    }

    /// Rotation angle and translation distance to another pose.
    pub fn distance(&self, other: &Self) -> (f64, f64) {
        (
            self.rotation.between(&other.rotation).angle(),
            (self.translation - other.translation).norm(),
        )
    }
}

impl fmt::Display for CameraPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CameraPose({}, t: [{:.4}, {:.4}, {:.4}])",
            self.rotation, self.translation.x, self.translation.y, self.translation.z
        )
    }
}

/// Estimate a camera pose from known landmarks and their pixel observations.
pub struct PoseOnlyReprojectionProblem {
    camera: PinholeCamera,
    landmarks: Vec<Vector3<f64>>,
    observations: Vec<Vector2<f64>>,
    loss: Option<Box<dyn LossFunction>>,
}

impl PoseOnlyReprojectionProblem {
    /// Bind `landmarks[i]` (world frame) to `observations[i]` (pixels).
    pub fn new(
        camera: PinholeCamera,
        landmarks: Vec<Vector3<f64>>,
        observations: Vec<Vector2<f64>>,
    ) -> CoreResult<Self> {
        if landmarks.len() != observations.len() {
            return Err(CoreError::DimensionMismatch(format!(
                "{} landmarks for {} observations",
                landmarks.len(),
                observations.len()
            ))
            .log());
        }
        if landmarks.len() < 3 {
            return Err(CoreError::InvalidInput(format!(
                "a pose needs at least 3 observations, got {}",
                landmarks.len()
            ))
            .log());
        }
        Ok(Self {
            camera,
            landmarks,
            observations,
            loss: None,
        })
    }

    /// Down-weight large reprojection errors with a robust loss.
    pub fn with_loss(mut self, loss: impl LossFunction + 'static) -> Self {
        self.loss = Some(Box::new(loss));
        self
    }

    pub fn camera(&self) -> &PinholeCamera {
        &self.camera
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// `(ρ(s), ρ'(s))` for a squared pixel error `s`.
    fn robust_cost(&self, s: f64) -> (f64, f64) {
        match &self.loss {
            Some(loss) => {
                let [rho, rho1, _] = loss.evaluate(s);
                (rho, rho1)
            }
            None => (s, 1.0),
        }
    }
}

impl Problem<6> for PoseOnlyReprojectionProblem {
    type State = CameraPose;

    fn evaluate_error(
        &self,
        pose: &CameraPose,
        mut hessian: Option<&mut Hessian<6>>,
        mut gradient: Option<&mut Gradient<6>>,
    ) -> f64 {
        let mut chi2 = 0.0;

        for (landmark, observed) in self.landmarks.iter().zip(&self.observations) {
            let point = pose.transform(landmark);
            let Some(projected) = self.camera.project(&point) else {
                chi2 += self.robust_cost(BEHIND_CAMERA_SQUARED_ERROR).0;
                continue;
            };
            let residual = observed - projected;
            let (cost, weight) = self.robust_cost(residual.norm_squared());
            chi2 += cost;

            if hessian.is_none() && gradient.is_none() {
                continue;
            }
            let mut point_jacobian = Matrix2x6::<f64>::zeros();
            let d_proj = self.camera.project_jacobian(&point);
            point_jacobian.fixed_view_mut::<2, 3>(0, 0).copy_from(&d_proj);
            point_jacobian
                .fixed_view_mut::<2, 3>(0, 3)
                .copy_from(&(-d_proj * skew(&point)));
            // r = obs − π, so ∂r/∂ξ = −∂π/∂ξ
            let jacobian = -point_jacobian;

            if let Some(h) = hessian.as_deref_mut() {
                *h += weight * jacobian.transpose() * jacobian;
            }
            if let Some(g) = gradient.as_deref_mut() {
                *g -= weight * jacobian.transpose() * residual;
            }
        }

        chi2
    }

    fn update(&self, pose: &CameraPose, dx: &Update<6>) -> CameraPose {
        pose.retract(dx)
    }
}
