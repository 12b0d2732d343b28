//! CPU kernels for the differentiable primitives.
//!
//! # CPU Backend
//!
//! Every primitive is a plain function returning the forward output together
//! with a boxed backward closure. The closure owns exactly the buffers its
//! gradient rule needs (the "saved tensors"); dropping it releases them.
//!
//! ## Elementwise loops
//!
//! [`map`], [`zip_map`] and [`add_assign`] are the only loops over tensor
//! data. They run on the rayon pool when the active [`Kernel`] is
//! `Parallel` and the buffer holds at least [`PARALLEL_THRESHOLD`] elements,
//! and sequentially otherwise.
//!
//! ## Shapes
//!
//! Binary kernels accept equal shapes or a one-element operand; gradients for a
//! broadcast operand are summed back down with [`Ten64::reduce_to`]. Shape
//! validation happens in [`dispatch`](super::dispatch) before a kernel runs.

use rayon::prelude::*;

use super::BackwardFn;
use crate::config::{get_kernel, Kernel, PARALLEL_THRESHOLD};
use crate::tensors::{Tensor, Ten64};

fn parallel(len: usize) -> bool {
    get_kernel() == Kernel::Parallel && len >= PARALLEL_THRESHOLD
}

/// Applies `f` to every element of `data`.
pub fn map(data: &[f64], f: impl Fn(f64) -> f64 + Sync + Send) -> Vec<f64> {
    if parallel(data.len()) {
        data.par_iter().map(|&x| f(x)).collect()
    } else {
        data.iter().map(|&x| f(x)).collect()
    }
}

/// Combines `a` and `b` elementwise, broadcasting a one-element side.
pub fn zip_map(a: &[f64], b: &[f64], f: impl Fn(f64, f64) -> f64 + Sync + Send) -> Vec<f64> {
    match (a.len(), b.len()) {
        (1, n) if n != 1 => {
            let x = a[0];
            map(b, |y| f(x, y))
        }
        (n, 1) if n != 1 => {
            let y = b[0];
            map(a, |x| f(x, y))
        }
        _ => {
            debug_assert_eq!(a.len(), b.len());
            if parallel(a.len()) {
                a.par_iter().zip(b.par_iter()).map(|(&x, &y)| f(x, y)).collect()
            } else {
                a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
            }
        }
    }
}

/// `acc += other`, elementwise.
pub fn add_assign(acc: &mut [f64], other: &[f64]) {
    debug_assert_eq!(acc.len(), other.len());
    if parallel(acc.len()) {
        acc.par_iter_mut().zip(other.par_iter()).for_each(|(a, &b)| *a += b);
    } else {
        acc.iter_mut().zip(other).for_each(|(a, &b)| *a += b);
    }
}

/// `a + b`.
///
/// Backward: `(g, g)`, each reduced to its input's shape.
pub fn add(a: &Ten64, b: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let out = a.zip_map(b, |x, y| x + y);
    let a_shape = a.shape.clone();
    let b_shape = b.shape.clone();

    let back = move |grad: &Ten64| {
        vec![
            grad.clone().reduce_to(&a_shape),
            grad.clone().reduce_to(&b_shape),
        ]
    };

    (out, Box::new(back))
}

/// `a - b`.
pub fn sub(a: &Ten64, b: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let out = a.zip_map(b, |x, y| x - y);
    let a_shape = a.shape.clone();
    let b_shape = b.shape.clone();

    let back = move |grad: &Ten64| {
        vec![
            grad.clone().reduce_to(&a_shape),
            grad.map(|g| -g).reduce_to(&b_shape),
        ]
    };

    (out, Box::new(back))
}

/// Elementwise `a * b`.
///
/// Saves both operands: `da = g * b`, `db = g * a`.
pub fn mul(a: &Ten64, b: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let out = a.zip_map(b, |x, y| x * y);
    let a_val = a.clone();
    let b_val = b.clone();

    let back = move |grad: &Ten64| {
        vec![
            grad.zip_map(&b_val, |g, y| g * y).reduce_to(&a_val.shape),
            grad.zip_map(&a_val, |g, x| g * x).reduce_to(&b_val.shape),
        ]
    };

    (out, Box::new(back))
}

/// Elementwise `a / b`.
///
/// Saves both operands: `da = g / b`, `db = -g * a / b^2`.
pub fn div(a: &Ten64, b: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let out = a.zip_map(b, |x, y| x / y);
    let a_val = a.clone();
    let b_val = b.clone();

    let back = move |grad: &Ten64| {
        let grad_a = grad.zip_map(&b_val, |g, y| g / y).reduce_to(&a_val.shape);
        let a_over_b2 = a_val.zip_map(&b_val, |x, y| x / (y * y));
        let grad_b = grad
            .zip_map(&a_over_b2, |g, q| -g * q)
            .reduce_to(&b_val.shape);
        vec![grad_a, grad_b]
    };

    (out, Box::new(back))
}

/// `-a`.
pub fn neg(a: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let out = a.map(|x| -x);
    let back = |grad: &Ten64| vec![grad.map(|g| -g)];
    (out, Box::new(back))
}

/// `a + c` for a constant `c`. The gradient passes through unchanged.
pub fn add_scalar(a: &Ten64, c: f64) -> (Ten64, Box<BackwardFn>) {
    let out = a.map(|x| x + c);
    let back = |grad: &Ten64| vec![grad.clone()];
    (out, Box::new(back))
}

/// `a * c` for a constant `c`.
pub fn mul_scalar(a: &Ten64, c: f64) -> (Ten64, Box<BackwardFn>) {
    let out = a.map(|x| x * c);
    let back = move |grad: &Ten64| vec![grad.map(|g| g * c)];
    (out, Box::new(back))
}

/// `a^p` for a constant exponent `p`.
///
/// Saves the input: `da = g * p * a^(p - 1)`.
pub fn pow_scalar(a: &Ten64, p: f64) -> (Ten64, Box<BackwardFn>) {
    let out = a.map(|x| x.powf(p));
    let a_val = a.clone();

    let back = move |grad: &Ten64| vec![grad.zip_map(&a_val, |g, x| g * p * x.powf(p - 1.0))];

    (out, Box::new(back))
}

/// `e^a`. Saves the output, which is its own derivative.
pub fn exp(a: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let out = a.map(f64::exp);
    let saved = out.clone();

    let back = move |grad: &Ten64| vec![grad.zip_map(&saved, |g, y| g * y)];

    (out, Box::new(back))
}

/// Natural logarithm. Saves the input: `da = g / a`.
pub fn ln(a: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let out = a.map(f64::ln);
    let a_val = a.clone();

    let back = move |grad: &Ten64| vec![grad.zip_map(&a_val, |g, x| g / x)];

    (out, Box::new(back))
}

/// `max(0, a)`; gradients pass only where the input is positive.
pub fn relu(a: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let out = a.map(|x| if x > 0.0 { x } else { 0.0 });
    let a_val = a.clone();

    let back = move |grad: &Ten64| {
        vec![grad.zip_map(&a_val, |g, x| if x > 0.0 { g } else { 0.0 })]
    };

    (out, Box::new(back))
}

/// Hyperbolic tangent. Saves the output: `da = g * (1 - tanh^2)`.
pub fn tanh(a: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let out = a.map(f64::tanh);
    let saved = out.clone();

    let back = move |grad: &Ten64| vec![grad.zip_map(&saved, |g, t| g * (1.0 - t * t))];

    (out, Box::new(back))
}

/// Logistic sigmoid. Saves the output: `da = g * s * (1 - s)`.
pub fn sigmoid(a: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let out = a.map(|x| 1.0 / (1.0 + (-x).exp()));
    let saved = out.clone();

    let back = move |grad: &Ten64| vec![grad.zip_map(&saved, |g, s| g * s * (1.0 - s))];

    (out, Box::new(back))
}

/// Sum of every element, as a `[1]`-shaped tensor.
///
/// Backward broadcasts the incoming gradient to the input's shape.
pub fn sum(a: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let out = Tensor::new(vec![1], vec![a.sum()]);
    let shape = a.shape.clone();

    let back = move |grad: &Ten64| vec![Tensor::full(shape.clone(), grad.sum())];

    (out, Box::new(back))
}

/// Arithmetic mean of every element, as a `[1]`-shaped tensor.
///
/// # Formula
/// $$ y = \\frac{1}{n} \\sum_i x_i, \\quad \\frac{\\partial y}{\\partial x_i} = \\frac{1}{n} $$
///
/// The mean of an empty tensor is NaN, as `0 / 0` is.
pub fn mean(a: &Ten64) -> (Ten64, Box<BackwardFn>) {
    let n = a.numel() as f64;
    let out = Tensor::new(vec![1], vec![a.sum() / n]);
    let shape = a.shape.clone();

    let back = move |grad: &Ten64| vec![Tensor::full(shape.clone(), grad.sum() / n)];

    (out, Box::new(back))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn mul_saves_both_operands() {
        let a = tensor!([1.0, 2.0, 3.0]);
        let b = tensor!([4.0, 5.0, 6.0]);
        let (out, back) = mul(&a, &b);
        assert_eq!(out.data, vec![4.0, 10.0, 18.0]);
        let grads = back(&Tensor::ones(vec![3]));
        assert_eq!(grads[0].data, b.data);
        assert_eq!(grads[1].data, a.data);
    }

    #[test]
    fn broadcast_operand_gradient_is_summed() {
        let a = tensor!([[1.0, 2.0], [3.0, 4.0]]);
        let c = Tensor::new(vec![1], vec![10.0]);
        let (out, back) = add(&a, &c);
        assert_eq!(out.data, vec![11.0, 12.0, 13.0, 14.0]);
        let grads = back(&Tensor::ones(vec![2, 2]));
        assert_eq!(grads[0].shape, vec![2, 2]);
        assert_eq!(grads[1].data, vec![4.0]);
    }

    #[test]
    fn mean_spreads_gradient_evenly() {
        let a = Tensor::full(vec![2, 2], 27.0);
        let (out, back) = mean(&a);
        assert_eq!(out.data, vec![27.0]);
        let grads = back(&Tensor::new(vec![1], vec![1.0]));
        assert_eq!(grads[0].data, vec![0.25; 4]);
    }

    #[test]
    fn relu_masks_non_positive() {
        let a = tensor!([-1.0, 0.0, 2.0]);
        let (out, back) = relu(&a);
        assert_eq!(out.data, vec![0.0, 0.0, 2.0]);
        let grads = back(&Tensor::ones(vec![3]));
        assert_eq!(grads[0].data, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn parallel_and_serial_kernels_agree() {
        let data: Vec<f64> = (0..PARALLEL_THRESHOLD * 2).map(|i| i as f64).collect();
        let parallel = map(&data, |x| x * 2.0);
        let serial: Vec<f64> = data.iter().map(|x| x * 2.0).collect();
        assert_eq!(parallel, serial);
    }
}
