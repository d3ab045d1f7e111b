//! SO3 - Special Orthogonal Group in 3D
//!
//! SO(3) elements are represented using nalgebra's UnitQuaternion internally.
//! SO(3) tangent elements are represented as axis-angle vectors in R³,
//! where the direction gives the axis of rotation and the magnitude gives the angle.

use crate::manifold::{LieGroup, ManifoldError, ManifoldResult, Tangent};
use nalgebra::{Matrix3, Quaternion, Rotation3, UnitQuaternion, Vector3};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// SO(3) group element representing rotations in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SO3 {
    /// Internal representation as a unit quaternion
    quaternion: UnitQuaternion<f64>,
}

impl Display for SO3 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let q = self.quaternion.quaternion();
        write!(
            f,
            "SO3(quaternion: [w: {:.4}, x: {:.4}, y: {:.4}, z: {:.4}])",
            q.w, q.i, q.j, q.k
        )
    }
}

impl SO3 {
    /// Degrees of freedom - dimension of the tangent space
    pub const DOF: usize = 3;

    /// Create a new SO(3) element from a unit quaternion.
    pub fn new(quaternion: UnitQuaternion<f64>) -> Self {
        SO3 { quaternion }
    }

    /// Create SO(3) from quaternion coefficients, normalizing them.
    ///
    /// Fails on non-finite or zero-norm input instead of producing NaN rotations.
    pub fn from_quaternion_coeffs(x: f64, y: f64, z: f64, w: f64) -> ManifoldResult<Self> {
        if ![x, y, z, w].iter().all(|v| v.is_finite()) {
            return Err(ManifoldError::InvalidNumber);
        }
        let q = Quaternion::new(w, x, y, z);
        if q.norm() < f64::EPSILON {
            return Err(ManifoldError::InvalidElement(
                "quaternion with zero norm".to_string(),
            ));
        }
        Ok(SO3::new(UnitQuaternion::from_quaternion(q)))
    }

    /// Create SO(3) from a rotation matrix, validating RᵀR = I and det(R) = 1.
    pub fn from_matrix(matrix: &Matrix3<f64>, tolerance: f64) -> ManifoldResult<Self> {
        if !matrix.iter().all(|v| v.is_finite()) {
            return Err(ManifoldError::InvalidNumber);
        }
        let orthogonality = (matrix.transpose() * matrix - Matrix3::identity()).norm();
        if orthogonality > tolerance {
            return Err(ManifoldError::InvalidElement(format!(
                "matrix is not orthogonal (|RᵀR - I| = {orthogonality:.3e})"
            )));
        }
        if (matrix.determinant() - 1.0).abs() > tolerance {
            return Err(ManifoldError::InvalidElement(
                "matrix is a reflection (det != 1)".to_string(),
            ));
        }
        let rotation = Rotation3::from_matrix_unchecked(*matrix);
        Ok(SO3::new(UnitQuaternion::from_rotation_matrix(&rotation)))
    }

    /// Create SO(3) from Euler angles (roll, pitch, yaw).
    pub fn from_euler_angles(roll: f64, pitch: f64, yaw: f64) -> Self {
        SO3::new(UnitQuaternion::from_euler_angles(roll, pitch, yaw))
    }

    /// Create SO(3) from scaled axis (axis-angle vector).
    pub fn from_scaled_axis(axis_angle: Vector3<f64>) -> Self {
        SO3::new(UnitQuaternion::from_scaled_axis(axis_angle))
    }

    /// Get the quaternion representation.
    pub fn quaternion(&self) -> UnitQuaternion<f64> {
        self.quaternion
    }

    /// Get the 3×3 rotation matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.quaternion.to_rotation_matrix().into_inner()
    }

    /// Rotate a vector: R·v.
    pub fn act(&self, vector: &Vector3<f64>) -> Vector3<f64> {
        self.quaternion * vector
    }

    /// Rotation angle in radians, in [0, π].
    pub fn angle(&self) -> f64 {
        self.quaternion.angle()
    }
}

impl LieGroup for SO3 {
    type TangentVector = SO3Tangent;

    fn identity() -> Self {
        SO3 {
            quaternion: UnitQuaternion::identity(),
        }
    }

    fn inverse(&self) -> Self {
        SO3 {
            quaternion: self.quaternion.inverse(),
        }
    }

    fn compose(&self, other: &Self) -> Self {
        SO3 {
            quaternion: self.quaternion * other.quaternion,
        }
    }

    fn log(&self) -> Self::TangentVector {
        let q = self.quaternion.quaternion();
        let sin_angle_squared = q.i * q.i + q.j * q.j + q.k * q.k;

        let log_coeff = if sin_angle_squared > f64::EPSILON {
            let sin_angle = sin_angle_squared.sqrt();
            let cos_angle = q.w;

            // Keep the angle in [-π, π] when w < 0 (double cover).
            let two_angle = 2.0
                * if cos_angle < 0.0 {
                    f64::atan2(-sin_angle, -cos_angle)
                } else {
                    f64::atan2(sin_angle, cos_angle)
                };

            two_angle / sin_angle
        } else {
            2.0
        };

        SO3Tangent::new(Vector3::new(
            q.i * log_coeff,
            q.j * log_coeff,
            q.k * log_coeff,
        ))
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        self.right_minus(other).data.norm() < tolerance
    }
}

/// SO(3) tangent space element (axis-angle vector).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SO3Tangent {
    data: Vector3<f64>,
}

impl SO3Tangent {
    /// Create a new tangent vector from its axis-angle coordinates.
    pub fn new(data: Vector3<f64>) -> Self {
        SO3Tangent { data }
    }

    /// Axis-angle coordinates.
    pub fn coeffs(&self) -> Vector3<f64> {
        self.data
    }

    /// Hat operator: the skew-symmetric matrix [θ]ₓ.
    pub fn hat(&self) -> Matrix3<f64> {
        skew(&self.data)
    }
}

impl From<Vector3<f64>> for SO3Tangent {
    fn from(data: Vector3<f64>) -> Self {
        SO3Tangent::new(data)
    }
}

impl Tangent<SO3> for SO3Tangent {
    const DOF: usize = 3;

    fn exp(&self) -> SO3 {
        let theta_squared = self.data.norm_squared();

        let quaternion = if theta_squared > f64::EPSILON {
            UnitQuaternion::from_scaled_axis(self.data)
        } else {
            UnitQuaternion::from_quaternion(Quaternion::new(
                1.0,
                self.data.x / 2.0,
                self.data.y / 2.0,
                self.data.z / 2.0,
            ))
        };

        SO3 { quaternion }
    }

    fn zero() -> Self {
        SO3Tangent::new(Vector3::zeros())
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.data.norm() < tolerance
    }
}

/// Skew-symmetric matrix such that `skew(a)·b = a × b`.
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}
