//! Error types for the autograd engine.

use thiserror::Error;

/// Errors surfaced by the backward engine and the fallible forward ops.
///
/// All of them are programming-contract violations; none is transient.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradError {
    /// `backward` was called without a seed on a root holding more than one element.
    #[error(
        "backward on non-scalar requires explicit seed shape matching root (root has {numel} elements)"
    )]
    NonScalarRoot { numel: usize },

    /// The explicit seed does not have the root's shape.
    #[error("seed shape {found:?} does not match root shape {expected:?}")]
    SeedShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// The saved buffers of an operation on the path were already released.
    #[error(
        "graph already consumed: buffers of {op} were released by a previous backward pass; \
         pass retain_graph to keep them"
    )]
    GraphConsumed { op: &'static str },

    /// Operands of a binary op cannot be combined elementwise.
    #[error("{op}: shape mismatch between {lhs:?} and {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },
}

pub type Result<T> = std::result::Result<T, GradError>;
