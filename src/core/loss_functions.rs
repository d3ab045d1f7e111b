//! Robust loss functions for outlier-resistant least squares.
//!
//! A loss function ρ(s) replaces the squared residual `s = ||r||²` in the
//! cost. Problems apply it by iteratively reweighted least squares: each
//! residual block contributes `ρ(s)` to chi2 and is weighted by `ρ'(s)` in the
//! normal equations.
//!
//! | Loss   | ρ(s) for s ≤ δ² | ρ(s) for s > δ²   |
//! |--------|-----------------|-------------------|
//! | L2     | s               | s                 |
//! | Huber  | s               | 2δ√s − δ²         |
//! | Cauchy | δ²·ln(1 + s/δ²) | δ²·ln(1 + s/δ²)   |

use crate::core::{CoreError, CoreResult};

/// A robust kernel evaluated on the squared residual norm.
pub trait LossFunction: Send + Sync {
    /// Evaluate the loss function and its first two derivatives at squared residual `s`.
    ///
    /// # Returns
    ///
    /// Array `[ρ(s), ρ'(s), ρ''(s)]` containing the cost, first derivative, and second derivative
    fn evaluate(&self, s: f64) -> [f64; 3];

    /// IRLS weight `ρ'(s)` applied to a residual block in the normal equations.
    fn weight(&self, s: f64) -> f64 {
        self.evaluate(s)[1]
    }
}

/// Plain squared loss, ρ(s) = s.
#[derive(Debug, Clone, Copy, Default)]
pub struct L2Loss;

impl L2Loss {
    pub fn new() -> Self {
        L2Loss
    }
}

impl LossFunction for L2Loss {
    fn evaluate(&self, s: f64) -> [f64; 3] {
        [s, 1.0, 0.0]
    }
}

/// Huber loss: quadratic for inliers, linear beyond the scale δ.
#[derive(Debug, Clone, Copy)]
pub struct HuberLoss {
    /// Scale parameter δ
    scale: f64,
    /// Cached value δ²
    scale2: f64,
}

impl HuberLoss {
    /// Create a Huber loss with threshold `scale` (must be positive and finite).
    pub fn new(scale: f64) -> CoreResult<Self> {
        validate_scale("Huber", scale)?;
        Ok(HuberLoss {
            scale,
            scale2: scale * scale,
        })
    }
}

impl LossFunction for HuberLoss {
    fn evaluate(&self, s: f64) -> [f64; 3] {
        if s > self.scale2 {
            let r = s.sqrt();
            let rho1 = self.scale / r;
            [2.0 * self.scale * r - self.scale2, rho1, -rho1 / (2.0 * s)]
        } else {
            [s, 1.0, 0.0]
        }
    }
}

/// Cauchy loss: logarithmic growth, strong down-weighting of large residuals.
#[derive(Debug, Clone, Copy)]
pub struct CauchyLoss {
    scale2: f64,
    inv_scale2: f64,
}

impl CauchyLoss {
    /// Create a Cauchy loss with scale `scale` (must be positive and finite).
    pub fn new(scale: f64) -> CoreResult<Self> {
        validate_scale("Cauchy", scale)?;
        let scale2 = scale * scale;
        Ok(CauchyLoss {
            scale2,
            inv_scale2: 1.0 / scale2,
        })
    }
}

impl LossFunction for CauchyLoss {
    fn evaluate(&self, s: f64) -> [f64; 3] {
        let sum = 1.0 + s * self.inv_scale2;
        let inv = 1.0 / sum;
        [
            self.scale2 * sum.ln(),
            inv,
            -self.inv_scale2 * inv * inv,
        ]
    }
}

fn validate_scale(name: &str, scale: f64) -> CoreResult<()> {
    if scale > 0.0 && scale.is_finite() {
        Ok(())
    } else {
        Err(CoreError::InvalidInput(format!("{name} scale must be positive, got {scale}")).log())
    }
}
