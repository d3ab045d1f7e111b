//! Exponential curve fitting, `y = a·exp(b·x)`.

use crate::core::{CoreError, CoreResult, Gradient, Hessian, Problem, Update};
use crate::manifold::LieGroup;
use nalgebra::{RowVector2, Vector2};

/// Fit `(a, b)` of `y = a·exp(b·x)` to sample pairs.
///
/// Residuals are `rᵢ = a·exp(b·xᵢ) − yᵢ` and chi2 is `Σ rᵢ²`.
#[derive(Debug, Clone)]
pub struct ExponentialCurveProblem {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl ExponentialCurveProblem {
    /// Bind the samples. Both slices must be non-empty, equally long and finite.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> CoreResult<Self> {
        if xs.len() != ys.len() {
            return Err(CoreError::DimensionMismatch(format!(
                "{} abscissas for {} ordinates",
                xs.len(),
                ys.len()
            ))
            .log());
        }
        if xs.is_empty() {
            return Err(CoreError::InvalidInput("no samples to fit".to_string()).log());
        }
        if !xs.iter().chain(ys.iter()).all(|v| v.is_finite()) {
            return Err(CoreError::InvalidInput("samples must be finite".to_string()).log());
        }
        Ok(Self { xs, ys })
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }
}

impl Problem<2> for ExponentialCurveProblem {
    type State = Vector2<f64>;

    fn evaluate_error(
        &self,
        params: &Vector2<f64>,
        mut hessian: Option<&mut Hessian<2>>,
        mut gradient: Option<&mut Gradient<2>>,
    ) -> f64 {
        let (a, b) = (params[0], params[1]);
        let mut chi2 = 0.0;

        for (&x, &y) in self.xs.iter().zip(&self.ys) {
            let e = (b * x).exp();
            let r = a * e - y;
            chi2 += r * r;

            if hessian.is_none() && gradient.is_none() {
                continue;
            }
            let j = RowVector2::new(e, a * x * e);
            if let Some(h) = hessian.as_deref_mut() {
                *h += j.transpose() * j;
            }
            if let Some(g) = gradient.as_deref_mut() {
                *g -= j.transpose() * r;
            }
        }

        chi2
    }

    fn update(&self, params: &Vector2<f64>, dx: &Update<2>) -> Vector2<f64> {
        params.right_plus(dx)
    }
}
