//! Differentiable values.
//!
//! A [`Value`] is a cheap, clonable handle to a graph node: a tensor, an
//! optional gradient buffer, and the [`Operation`] that produced it. Cloning a
//! `Value` clones the handle, not the data; clones observe the same gradient.
//!
//! Arithmetic on values records the graph as it runs:
//!
//! ```rust
//! use tapegrad::tensors::Tensor;
//! use tapegrad::value::Value;
//!
//! let x = Value::new(Tensor::ones(vec![2, 2]), true);
//! let y = &x + 2.0;
//! assert_eq!(y.grad_fn_name(), Some("AddBackward"));
//!
//! let out = (&y * &y * 3.0).mean();
//! out.backward().unwrap();
//! assert_eq!(x.grad().unwrap().data, vec![4.5; 4]);
//! ```

use core::cell::{Ref, RefCell};
use core::fmt;
use std::rc::Rc;

use crate::backprop::{self, BackwardOptions};
use crate::error::Result;
use crate::graph::{NodeId, Operation};
use crate::ops::{cpu, dispatch, OpKind};
use crate::tensors::Ten64;

struct Node {
    id: NodeId,
    data: RefCell<Ten64>,
    grad: RefCell<Option<Ten64>>,
    creator: Option<Rc<Operation>>,
    requires_grad: bool,
}

/// Unlinks the history iteratively, so dropping the root of a long chain does
/// not recurse once per operation.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending: Vec<Rc<Operation>> = self.creator.take().into_iter().collect();
        while let Some(op) = pending.pop() {
            // shared operations stay alive for their other owners
            let Some(op) = Rc::into_inner(op) else {
                continue;
            };
            for input in op.into_inputs() {
                if let Some(mut node) = Rc::into_inner(input.0) {
                    pending.extend(node.creator.take());
                }
            }
        }
    }
}

/// Tensor with automatic differentiation support.
#[derive(Clone)]
pub struct Value(Rc<Node>);

impl Value {
    /// Creates a leaf from raw data.
    ///
    /// Leaves with `requires_grad` receive gradients during backward passes;
    /// leaves without it are constants.
    pub fn new(data: Ten64, requires_grad: bool) -> Self {
        Self::from_parts(data, None, requires_grad)
    }

    /// Leaf that tracks gradients.
    pub fn leaf(data: Ten64) -> Self {
        Self::new(data, true)
    }

    /// Leaf that never tracks gradients.
    pub fn constant(data: Ten64) -> Self {
        Self::new(data, false)
    }

    pub(crate) fn from_parts(
        data: Ten64,
        creator: Option<Rc<Operation>>,
        requires_grad: bool,
    ) -> Self {
        Self(Rc::new(Node {
            id: NodeId::next(),
            data: RefCell::new(data),
            grad: RefCell::new(None),
            creator,
            requires_grad,
        }))
    }

    /// Unique identity of this node.
    pub fn id(&self) -> NodeId {
        self.0.id
    }

    /// Borrow the underlying tensor.
    pub fn data(&self) -> Ref<'_, Ten64> {
        self.0.data.borrow()
    }

    /// Shape of the underlying tensor.
    pub fn shape(&self) -> Vec<usize> {
        self.0.data.borrow().shape.clone()
    }

    /// Accumulated gradient, absent until a backward pass reaches this value.
    pub fn grad(&self) -> Option<Ten64> {
        self.0.grad.borrow().clone()
    }

    /// Operation that produced this value; `None` for leaves.
    pub fn creator(&self) -> Option<Rc<Operation>> {
        self.0.creator.clone()
    }

    pub(crate) fn creator_ref(&self) -> Option<&Operation> {
        self.0.creator.as_deref()
    }

    /// Name of the backward node that produced this value, e.g. `"MulBackward"`.
    pub fn grad_fn_name(&self) -> Option<&'static str> {
        self.0.creator.as_ref().map(|op| op.kind().name())
    }

    /// Whether gradients are tracked for this value.
    pub fn requires_grad(&self) -> bool {
        self.0.requires_grad
    }

    /// Whether this value was created by the user rather than by an operation.
    pub fn is_leaf(&self) -> bool {
        self.0.creator.is_none()
    }

    /// Adds `grad` into the buffer, allocating it on first use.
    pub(crate) fn accumulate_grad(&self, grad: Ten64) {
        let mut slot = self.0.grad.borrow_mut();
        match slot.as_mut() {
            Some(existing) => existing.accumulate(&grad),
            None => *slot = Some(grad),
        }
    }

    /// Clears the gradient buffer.
    pub fn zero_grad(&self) {
        *self.0.grad.borrow_mut() = None;
    }

    /// Replaces the data of this leaf in place, keeping its identity.
    ///
    /// Meant for parameter updates between passes.
    ///
    /// # Panics
    /// Panics if the shape changes, or if this value was produced by an
    /// operation (its saved buffers would no longer match its data).
    pub fn set_data(&self, data: Ten64) {
        assert!(
            self.is_leaf(),
            "set_data on a non-leaf value ({})",
            self.grad_fn_name().unwrap_or("unknown")
        );
        self.0.data.borrow_mut().update(data);
    }

    /// A new constant leaf holding a copy of this value's data, with no history.
    pub fn detach(&self) -> Self {
        Self::constant(self.data().clone())
    }

    /// Backpropagates from this value with the default seed.
    ///
    /// # Errors
    /// See [`backprop::backward`].
    pub fn backward(&self) -> Result<()> {
        backprop::backward(self, None)
    }

    /// Backpropagates from this value with an explicit seed gradient.
    pub fn backward_with_seed(&self, seed: Ten64) -> Result<()> {
        backprop::backward(self, Some(seed))
    }

    /// Backpropagates with full control over seed and buffer retention.
    pub fn backward_with(&self, seed: Option<Ten64>, options: BackwardOptions) -> Result<()> {
        backprop::backward_with(self, seed, options)
    }

    /// Elementwise `self + other`.
    ///
    /// # Panics
    /// Panics unless the shapes match or one side holds a single element.
    pub fn add(&self, other: &Value) -> Value {
        dispatch::binary(OpKind::Add, self, other, cpu::add)
    }

    /// Fallible [`add`](Self::add).
    pub fn try_add(&self, other: &Value) -> Result<Value> {
        dispatch::try_binary(OpKind::Add, self, other, cpu::add)
    }

    /// Elementwise `self - other`.
    pub fn sub(&self, other: &Value) -> Value {
        dispatch::binary(OpKind::Sub, self, other, cpu::sub)
    }

    /// Fallible [`sub`](Self::sub).
    pub fn try_sub(&self, other: &Value) -> Result<Value> {
        dispatch::try_binary(OpKind::Sub, self, other, cpu::sub)
    }

    /// Elementwise `self * other`.
    pub fn mul(&self, other: &Value) -> Value {
        dispatch::binary(OpKind::Mul, self, other, cpu::mul)
    }

    /// Fallible [`mul`](Self::mul).
    pub fn try_mul(&self, other: &Value) -> Result<Value> {
        dispatch::try_binary(OpKind::Mul, self, other, cpu::mul)
    }

    /// Elementwise `self / other`.
    pub fn div(&self, other: &Value) -> Value {
        dispatch::binary(OpKind::Div, self, other, cpu::div)
    }

    /// Fallible [`div`](Self::div).
    pub fn try_div(&self, other: &Value) -> Result<Value> {
        dispatch::try_binary(OpKind::Div, self, other, cpu::div)
    }

    /// `-self`.
    pub fn neg(&self) -> Value {
        dispatch::unary(OpKind::Neg, self, cpu::neg)
    }

    /// `self + c` for a constant `c`.
    pub fn add_scalar(&self, c: f64) -> Value {
        dispatch::unary(OpKind::AddScalar(c), self, |x| cpu::add_scalar(x, c))
    }

    /// `self * c` for a constant `c`.
    pub fn mul_scalar(&self, c: f64) -> Value {
        dispatch::unary(OpKind::MulScalar(c), self, |x| cpu::mul_scalar(x, c))
    }

    /// `self ^ p` for a constant exponent `p`.
    pub fn powf(&self, p: f64) -> Value {
        dispatch::unary(OpKind::PowScalar(p), self, |x| cpu::pow_scalar(x, p))
    }

    /// Elementwise `e ^ self`.
    pub fn exp(&self) -> Value {
        dispatch::unary(OpKind::Exp, self, cpu::exp)
    }

    /// Elementwise natural logarithm.
    pub fn ln(&self) -> Value {
        dispatch::unary(OpKind::Ln, self, cpu::ln)
    }

    /// Elementwise `max(0, self)`.
    pub fn relu(&self) -> Value {
        dispatch::unary(OpKind::Relu, self, cpu::relu)
    }

    /// Elementwise hyperbolic tangent.
    pub fn tanh(&self) -> Value {
        dispatch::unary(OpKind::Tanh, self, cpu::tanh)
    }

    /// Elementwise logistic sigmoid.
    pub fn sigmoid(&self) -> Value {
        dispatch::unary(OpKind::Sigmoid, self, cpu::sigmoid)
    }

    /// Sum of all elements, shape `[1]`.
    pub fn sum(&self) -> Value {
        dispatch::unary(OpKind::Sum, self, cpu::sum)
    }

    /// Mean of all elements, shape `[1]`.
    pub fn mean(&self) -> Value {
        dispatch::unary(OpKind::Mean, self, cpu::mean)
    }
}

impl From<Ten64> for Value {
    /// Wraps a tensor as a constant.
    fn from(data: Ten64) -> Self {
        Self::constant(data)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("id", &self.0.id)
            .field("data", &*self.0.data.borrow())
            .field("grad", &*self.0.grad.borrow())
            .field("grad_fn", &self.grad_fn_name())
            .field("requires_grad", &self.0.requires_grad)
            .finish()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.data.borrow())?;
        match self.grad_fn_name() {
            Some(name) => write!(f, " grad_fn=<{name}>"),
            None if self.0.requires_grad => f.write_str(" requires_grad=true"),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensors::Tensor;

    #[test]
    fn fresh_leaf_has_no_grad_and_no_creator() {
        let x = Value::leaf(Tensor::ones(vec![2, 2]));
        assert!(x.grad().is_none());
        assert!(x.is_leaf());
        assert!(x.creator().is_none());
        assert_eq!(x.grad_fn_name(), None);
    }

    #[test]
    fn clones_share_the_gradient_buffer() {
        let x = Value::leaf(Tensor::ones(vec![3]));
        let alias = x.clone();
        x.accumulate_grad(Tensor::ones(vec![3]));
        alias.accumulate_grad(Tensor::ones(vec![3]));
        assert_eq!(x.grad().unwrap().data, vec![2.0; 3]);
        assert_eq!(x.id(), alias.id());
    }

    #[test]
    fn detach_drops_history() {
        let x = Value::leaf(Tensor::ones(vec![2]));
        let y = x.mul_scalar(2.0);
        let d = y.detach();
        assert!(d.is_leaf());
        assert!(!d.requires_grad());
        assert_eq!(d.data().data, vec![2.0, 2.0]);
        assert_ne!(d.id(), y.id());
    }

    #[test]
    #[should_panic(expected = "shape mismatch")]
    fn set_data_rejects_new_shape() {
        let x = Value::leaf(Tensor::ones(vec![2]));
        x.set_data(Tensor::ones(vec![3]));
    }

    #[test]
    fn set_data_updates_leaf() {
        let x = Value::leaf(Tensor::ones(vec![2]));
        x.set_data(Tensor::full(vec![2], 4.0));
        assert_eq!(x.data().data, vec![4.0, 4.0]);
    }

    #[test]
    #[should_panic(expected = "set_data on a non-leaf value (MulBackward)")]
    fn set_data_rejects_non_leaf() {
        let x = Value::leaf(Tensor::ones(vec![2]));
        let y = x.mul_scalar(2.0);
        y.set_data(Tensor::ones(vec![2]));
    }

    #[test]
    fn dropping_root_keeps_shared_history() {
        let x = Value::leaf(Tensor::ones(vec![1]));
        let mid = x.mul_scalar(3.0);
        let root = mid.exp().ln();
        drop(root);
        assert_eq!(mid.grad_fn_name(), Some("MulBackward"));
        mid.backward().unwrap();
        assert_eq!(x.grad().unwrap().data, vec![3.0]);
    }
}
