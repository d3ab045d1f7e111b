//! Rn - n-dimensional Euclidean Space
//!
//! Rⁿ with vector addition as the group operation. Elements and tangent vectors
//! are both `SVector<f64, N>`, so any fixed-size vector state gets the
//! `LieGroup` retraction (`right_plus` is plain addition) for free.

use crate::manifold::{LieGroup, Tangent};
use nalgebra::SVector;

impl<const N: usize> LieGroup for SVector<f64, N> {
    type TangentVector = SVector<f64, N>;

    fn identity() -> Self {
        SVector::zeros()
    }

    fn inverse(&self) -> Self {
        -self
    }

    fn compose(&self, other: &Self) -> Self {
        self + other
    }

    fn log(&self) -> Self::TangentVector {
        *self
    }

    fn is_approx(&self, other: &Self, tolerance: f64) -> bool {
        (self - other).norm() < tolerance
    }
}

impl<const N: usize> Tangent<SVector<f64, N>> for SVector<f64, N> {
    const DOF: usize = N;

    fn exp(&self) -> SVector<f64, N> {
        *self
    }

    fn zero() -> Self {
        SVector::zeros()
    }

    fn is_zero(&self, tolerance: f64) -> bool {
        self.norm() < tolerance
    }
}
