//! Graph bookkeeping: node identities and recorded operations.
//!
//! There is no graph object. The graph is the transitive closure of
//! [`Operation`]s reachable from a root [`Value`] through creator links, and it
//! is acyclic because an operation can only reference values that existed
//! before it.

use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{GradError, Result};
use crate::ops::{BackwardFn, OpKind};
use crate::tensors::Ten64;
use crate::value::Value;

/// Process-unique identifier of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A recorded primitive computation.
///
/// Holds its inputs in order and the gradient rule produced by the kernel.
/// The rule owns the saved buffers; [`release`](Self::release) drops it, after
/// which the operation can no longer propagate gradients.
pub struct Operation {
    kind: OpKind,
    inputs: Vec<Value>,
    backward_fn: RefCell<Option<Box<BackwardFn>>>,
}

impl Operation {
    pub(crate) fn new(kind: OpKind, inputs: Vec<Value>, backward_fn: Box<BackwardFn>) -> Self {
        debug_assert_eq!(kind.arity(), inputs.len());
        Self {
            kind,
            inputs,
            backward_fn: RefCell::new(Some(backward_fn)),
        }
    }

    /// Which primitive produced the output.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Inputs, in the order the backward rule reports their gradients.
    pub fn inputs(&self) -> &[Value] {
        &self.inputs
    }

    /// Whether the saved buffers were already dropped by a backward pass.
    pub fn is_released(&self) -> bool {
        self.backward_fn.borrow().is_none()
    }

    /// Runs the gradient rule on `grad_output`.
    pub(crate) fn apply(&self, grad_output: &Ten64) -> Result<Vec<Ten64>> {
        let rule = self.backward_fn.borrow();
        let rule = rule.as_ref().ok_or(GradError::GraphConsumed {
            op: self.kind.name(),
        })?;
        let grads = rule(grad_output);
        debug_assert_eq!(grads.len(), self.inputs.len());
        Ok(grads)
    }

    /// Drops the saved buffers.
    pub(crate) fn release(&self) {
        self.backward_fn.borrow_mut().take();
    }

    /// Consumes the operation, handing back its inputs.
    pub(crate) fn into_inputs(self) -> Vec<Value> {
        self.inputs
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("kind", &self.kind)
            .field(
                "inputs",
                &self.inputs.iter().map(Value::id).collect::<Vec<_>>(),
            )
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;

    #[test]
    fn released_operation_refuses_to_apply() {
        let x = Value::leaf(tensor!([1.0, 2.0]));
        let y = x.mul_scalar(3.0);
        let op = y.creator().unwrap();
        assert_eq!(op.apply(&tensor!([1.0, 1.0])).unwrap()[0].data, vec![3.0, 3.0]);

        op.release();
        assert!(op.is_released());
        assert_eq!(
            op.apply(&tensor!([1.0, 1.0])),
            Err(GradError::GraphConsumed { op: "MulBackward" })
        );
    }

    #[test]
    fn ids_are_unique() {
        let a = NodeId::next();
        let b = NodeId::next();
        assert_ne!(a, b);
        assert!(b.index() > a.index());
    }
}
