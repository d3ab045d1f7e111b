//! Manifold representations for optimization on non-Euclidean spaces.
//!
//! The optimizers never add an update vector to a state directly; they hand it
//! to the problem's retraction. This module provides the group structure those
//! retractions are built from:
//! - **Rⁿ**: Euclidean vectors (`SVector<f64, N>`), where the retraction is plain addition
//! - **SO(3)**: 3D rotations, where the retraction composes with `Exp(δ)`
//!
//! Lie group M,° | size   | dim | X ∈ M                   | Constraint      | T_X M                 | Exp(T)             | Comp. | Action
//! ------------- | ------ | --- | ----------------------- | --------------- | --------------------- | ------------------ | ----- | ------
//! n-D vector    | Rⁿ,+   | n   | v ∈ Rⁿ                  | |v-v|=0         | v ∈ Rⁿ                | v = exp(v)         | v₁+v₂ | v + x
//! Rotation      | SO(3),.| 3   | R                       | RᵀR = I         | [θ] ∈ R³              | R = exp([θ]x)      | R₁R₂  | Rx
//!
//! The conventions follow the [manif](https://github.com/artivis/manif) C++ library:
//! `X ⊕ τ = X ∘ Exp(τ)` (right plus) and `X ⊖ Y = Log(Y⁻¹ ∘ X)` (right minus).

use thiserror::Error;

pub mod rn;
pub mod so3;

pub use so3::{SO3, SO3Tangent};

/// Errors that can occur during manifold operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifoldError {
    /// Invalid manifold element
    #[error("Invalid manifold element: {0}")]
    InvalidElement(String),
    /// NaN or Inf detected in manifold element
    #[error("Invalid number: NaN or Inf detected")]
    InvalidNumber,
}

/// Result type for manifold operations.
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Core trait for Lie group operations.
///
/// Only the operations the retractions and residuals of this crate need are
/// required; the `plus`/`minus` family is derived from them.
pub trait LieGroup: Clone + PartialEq {
    /// The tangent space vector type
    type TangentVector: Tangent<Self>;

    /// The neutral element e such that e ∘ g = g ∘ e = g.
    fn identity() -> Self;

    /// Compute the inverse g⁻¹ such that g ∘ g⁻¹ = e.
    fn inverse(&self) -> Self;

    /// Compose this element with another (group multiplication g₁ ∘ g₂).
    fn compose(&self, other: &Self) -> Self;

    /// Logarithmic map from manifold to tangent space, log(g)^∨.
    fn log(&self) -> Self::TangentVector;

    /// Check if the element is approximately equal to another element.
    fn is_approx(&self, other: &Self, tolerance: f64) -> bool;

    /// Right plus: g ⊕ τ = g ∘ Exp(τ).
    fn right_plus(&self, tangent: &Self::TangentVector) -> Self {
        self.compose(&tangent.exp())
    }

    /// Right minus: g₁ ⊖ g₂ = Log(g₂⁻¹ ∘ g₁).
    fn right_minus(&self, other: &Self) -> Self::TangentVector {
        other.inverse().compose(self).log()
    }

    /// Left plus: τ ⊕ g = Exp(τ) ∘ g.
    fn left_plus(&self, tangent: &Self::TangentVector) -> Self {
        tangent.exp().compose(self)
    }

    /// Left minus: g₁ ⊖ g₂ = Log(g₁ ∘ g₂⁻¹).
    fn left_minus(&self, other: &Self) -> Self::TangentVector {
        self.compose(&other.inverse()).log()
    }

    /// Relative element g₁⁻¹ ∘ g₂.
    fn between(&self, other: &Self) -> Self {
        self.inverse().compose(other)
    }
}

/// Tangent space (Lie algebra in vector form) of a [`LieGroup`].
pub trait Tangent<Group: LieGroup>: Clone + PartialEq {
    /// Degrees of freedom of the tangent space.
    const DOF: usize;

    /// Exponential map to the group, Exp(τ).
    fn exp(&self) -> Group;

    /// Zero tangent vector.
    fn zero() -> Self;

    /// Check if the tangent vector is approximately zero.
    fn is_zero(&self, tolerance: f64) -> bool;
}
