//! Finite-difference gradient checking.
//!
//! Compares the gradient the engine computes for a scalar function against
//! central differences:
//!
//! $$ \\frac{\\partial f}{\\partial x_i} \\approx \\frac{f(x + \\epsilon e_i) - f(x - \\epsilon e_i)}{2\\epsilon} $$
//!
//! # Example
//!
//! ```rust
//! use tapegrad::gradcheck::check;
//! use tapegrad::tensor;
//!
//! let x = tensor!([0.5, -1.0, 2.0]);
//! let report = check(|v| v.tanh().mul_scalar(3.0).sum(), &x, 1e-6).unwrap();
//! assert!(report.passed());
//! ```

use crate::approx::{ApproxEquality, RelativeEq};
use crate::config::no_grad;
use crate::error::Result;
use crate::tensors::Ten64;
use crate::value::Value;

/// Outcome of a gradient check.
#[derive(Debug, Clone)]
pub struct GradCheckReport {
    /// Gradient reported by the backward engine.
    pub analytical: Ten64,
    /// Central-difference estimate.
    pub numerical: Ten64,
    /// Largest elementwise absolute difference.
    pub max_abs_error: f64,
    /// Worst-element rating of the two gradients.
    pub equality: ApproxEquality,
}

impl GradCheckReport {
    /// Whether the gradients agree within [`F64_MAX_ERROR`](crate::approx::F64_MAX_ERROR).
    pub fn passed(&self) -> bool {
        self.equality < ApproxEquality::Scarce
    }
}

/// Central-difference gradient of the scalar function `f` at `x`.
pub fn numerical_grad(f: impl Fn(&Ten64) -> f64, x: &Ten64, eps: f64) -> Ten64 {
    let mut probe = x.clone();
    let mut grad = x.zeros_like();
    for i in 0..x.numel() {
        let orig = probe.data[i];
        probe.data[i] = orig + eps;
        let f_plus = f(&probe);
        probe.data[i] = orig - eps;
        let f_minus = f(&probe);
        probe.data[i] = orig;
        grad.data[i] = (f_plus - f_minus) / (2.0 * eps);
    }
    grad
}

/// Builds `build(x)` on a fresh leaf, backpropagates from it, and compares the
/// leaf's gradient with [`numerical_grad`].
///
/// `build` must return a single-element value.
///
/// # Errors
/// Propagates the backward error, e.g. [`NonScalarRoot`](crate::error::GradError::NonScalarRoot)
/// when `build` does not reduce to one element.
pub fn check(build: impl Fn(&Value) -> Value, x: &Ten64, eps: f64) -> Result<GradCheckReport> {
    let leaf = Value::leaf(x.clone());
    build(&leaf).backward()?;
    let analytical = leaf.grad().unwrap_or_else(|| x.zeros_like());

    let numerical = no_grad(|| {
        numerical_grad(
            |probe| build(&Value::constant(probe.clone())).data().sum(),
            x,
            eps,
        )
    });

    let max_abs_error = analytical
        .data
        .iter()
        .zip(&numerical.data)
        .map(|(a, n)| (a - n).abs())
        .fold(0.0, f64::max);
    let equality = analytical.approx_eq(&numerical);

    log::debug!("gradcheck: max abs error {max_abs_error:e} ({equality:?})");
    Ok(GradCheckReport {
        analytical,
        numerical,
        max_abs_error,
        equality,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn numerical_grad_of_square() {
        let x = tensor!([1.0, -2.0, 3.0]);
        let g = numerical_grad(|t| t.data.iter().map(|v| v * v).sum(), &x, 1e-5);
        for (got, want) in g.data.iter().zip([2.0, -4.0, 6.0]) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn non_scalar_output_is_an_error() {
        let x = tensor!([1.0, 2.0]);
        assert!(check(|v| v.exp(), &x, 1e-6).is_err());
    }
}
