//! # Primitive Operation Registry
//!
//! Every differentiable primitive is described by an [`OpKind`] and
//! implemented in two layers:
//!
//! - [`cpu`]: forward computation plus a boxed backward closure
//!   owning whatever the gradient rule needs
//! - [`dispatch`]: validation of operand shapes, and recording of an
//!   [`Operation`](crate::graph::Operation) when any input tracks gradients
//!
//! [`overload`] wires the arithmetic operators (`+ - * /` and unary `-`) for
//! [`Value`](crate::value::Value) onto the dispatch layer.
//!
//! ## Adding a primitive
//!
//! 1. Write `cpu::my_op` returning `(output, Box<BackwardFn>)`
//! 2. Add an `OpKind` variant and its display name
//! 3. Expose it as a `Value` method going through `dispatch::unary` or
//!    `dispatch::binary`

pub mod cpu;
pub mod dispatch;
pub mod overload;

use core::fmt;

use crate::tensors::Ten64;

/// Gradient rule of a recorded operation: maps the gradient flowing into the
/// output to one gradient per input, in input order.
///
/// It is `Fn` rather than `FnOnce` so a retained graph can be replayed.
pub type BackwardFn = dyn Fn(&Ten64) -> Vec<Ten64>;

/// Tag identifying a primitive; scalar operands are stored inline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OpKind {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    AddScalar(f64),
    MulScalar(f64),
    PowScalar(f64),
    Exp,
    Ln,
    Relu,
    Tanh,
    Sigmoid,
    Sum,
    Mean,
}

impl OpKind {
    /// Name of the backward node this kind records, as reported by
    /// [`Value::grad_fn_name`](crate::value::Value::grad_fn_name).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add | Self::AddScalar(_) => "AddBackward",
            Self::Sub => "SubBackward",
            Self::Mul | Self::MulScalar(_) => "MulBackward",
            Self::Div => "DivBackward",
            Self::Neg => "NegBackward",
            Self::PowScalar(_) => "PowBackward",
            Self::Exp => "ExpBackward",
            Self::Ln => "LogBackward",
            Self::Relu => "ReluBackward",
            Self::Tanh => "TanhBackward",
            Self::Sigmoid => "SigmoidBackward",
            Self::Sum => "SumBackward",
            Self::Mean => "MeanBackward",
        }
    }

    /// Number of Value inputs the kind consumes.
    pub fn arity(&self) -> usize {
        match self {
            Self::Add | Self::Sub | Self::Mul | Self::Div => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
