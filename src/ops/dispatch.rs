//! Operation Dispatch Layer
//!
//! Runs a kernel on the data of its operand [`Value`]s and decides whether the
//! result joins the graph.
//!
//! An [`Operation`] is recorded only when grad mode is enabled on this thread
//! and at least one operand requires gradients. Otherwise the backward closure
//! returned by the kernel is dropped on the spot and the output is a constant
//! leaf, so no gradient can ever flow through it.
//!
//! # Example
//! ```rust
//! use tapegrad::{tensor, value::Value};
//!
//! let a = Value::leaf(tensor!([1.0, 2.0]));
//! let b = Value::constant(tensor!([3.0, 4.0]));
//! let c = a.mul(&b);
//! assert!(c.requires_grad());
//!
//! let d = b.mul(&b);
//! assert!(d.is_leaf() && !d.requires_grad());
//! ```

use std::rc::Rc;

use log::trace;

use super::{BackwardFn, OpKind};
use crate::config::is_grad_enabled;
use crate::error::{GradError, Result};
use crate::graph::Operation;
use crate::tensors::{broadcast_shape, Ten64};
use crate::value::Value;

fn record(kind: OpKind, inputs: &[&Value], out: Ten64, back: Box<BackwardFn>) -> Value {
    let requires_grad = is_grad_enabled() && inputs.iter().any(|v| v.requires_grad());
    if !requires_grad {
        return Value::constant(out);
    }

    let inputs: Vec<Value> = inputs.iter().map(|&v| v.clone()).collect();
    let op = Rc::new(Operation::new(kind, inputs, back));
    let value = Value::from_parts(out, Some(op), true);
    trace!("recorded {kind} -> {}", value.id());
    value
}

/// Applies a one-input kernel.
pub fn unary<K>(kind: OpKind, x: &Value, kernel: K) -> Value
where
    K: FnOnce(&Ten64) -> (Ten64, Box<BackwardFn>),
{
    let (out, back) = {
        let data = x.data();
        kernel(&*data)
    };
    record(kind, &[x], out, back)
}

/// Applies a two-input elementwise kernel.
///
/// # Panics
/// Panics if the operand shapes are incompatible; see [`try_binary`].
pub fn binary<K>(kind: OpKind, a: &Value, b: &Value, kernel: K) -> Value
where
    K: FnOnce(&Ten64, &Ten64) -> (Ten64, Box<BackwardFn>),
{
    match try_binary(kind, a, b, kernel) {
        Ok(v) => v,
        Err(e) => panic!("{e}"),
    }
}

/// Applies a two-input elementwise kernel after checking shapes.
///
/// # Errors
/// [`GradError::ShapeMismatch`] unless the shapes are equal or one operand
/// holds a single element.
pub fn try_binary<K>(kind: OpKind, a: &Value, b: &Value, kernel: K) -> Result<Value>
where
    K: FnOnce(&Ten64, &Ten64) -> (Ten64, Box<BackwardFn>),
{
    let (out, back) = {
        let a_data = a.data();
        let b_data = b.data();
        if broadcast_shape(&a_data.shape, &b_data.shape).is_none() {
            return Err(GradError::ShapeMismatch {
                op: kind.name(),
                lhs: a_data.shape.clone(),
                rhs: b_data.shape.clone(),
            });
        }
        kernel(&*a_data, &*b_data)
    };
    Ok(record(kind, &[a, b], out, back))
}
