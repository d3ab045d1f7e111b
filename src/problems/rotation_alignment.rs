//! Rotation alignment: find `R` such that `R·aᵢ ≈ bᵢ` for paired 3D directions.

use crate::core::{CoreError, CoreResult, Gradient, Hessian, Problem, Update};
use crate::manifold::{LieGroup, SO3, SO3Tangent, so3::skew};
use nalgebra::Vector3;

/// Least squares rotation between two sets of corresponding vectors.
///
/// Residuals are `rᵢ = R·aᵢ − bᵢ`. The state lives on SO(3) and is updated with
/// the right retraction `R ⊕ δ = R·Exp(δ)`, under which `∂rᵢ/∂δ = −R·[aᵢ]ₓ`.
#[derive(Debug, Clone)]
pub struct RotationAlignmentProblem {
    source: Vec<Vector3<f64>>,
    target: Vec<Vector3<f64>>,
}

impl RotationAlignmentProblem {
    /// Bind the correspondences `source[i] ↦ target[i]`.
    pub fn new(source: Vec<Vector3<f64>>, target: Vec<Vector3<f64>>) -> CoreResult<Self> {
        if source.len() != target.len() {
            return Err(CoreError::DimensionMismatch(format!(
                "{} source vectors for {} target vectors",
                source.len(),
                target.len()
            ))
            .log());
        }
        if source.is_empty() {
            return Err(CoreError::InvalidInput("no correspondences".to_string()).log());
        }
        Ok(Self { source, target })
    }

    /// Number of correspondences.
    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

impl Problem<3> for RotationAlignmentProblem {
    type State = SO3;

    fn evaluate_error(
        &self,
        rotation: &SO3,
        mut hessian: Option<&mut Hessian<3>>,
        mut gradient: Option<&mut Gradient<3>>,
    ) -> f64 {
        let r_mat = rotation.rotation_matrix();
        let mut chi2 = 0.0;

        for (a, b) in self.source.iter().zip(&self.target) {
            let residual = r_mat * a - b;
            chi2 += residual.norm_squared();

            if hessian.is_none() && gradient.is_none() {
                continue;
            }
            let jacobian = -r_mat * skew(a);
            if let Some(h) = hessian.as_deref_mut() {
                *h += jacobian.transpose() * jacobian;
            }
            if let Some(g) = gradient.as_deref_mut() {
                *g -= jacobian.transpose() * residual;
            }
        }

        chi2
    }

    fn update(&self, rotation: &SO3, dx: &Update<3>) -> SO3 {
        rotation.right_plus(&SO3Tangent::from(*dx))
    }
}
