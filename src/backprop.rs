//! Reverse-mode backward engine.
//!
//! # Backpropagation
//!
//! [`backward`] replays the operations recorded during the forward pass in
//! reverse topological order, starting from a root [`Value`]:
//!
//! 1. **Seed**: the gradient of the root with respect to itself. It defaults to
//!    ones, which is only allowed for a root holding a single element.
//! 2. **Order**: a depth-first walk over creator links yields every value that
//!    requires gradients, each exactly once, consumers before producers.
//! 3. **Propagation**: for each value, contributions from all of its consumers
//!    are summed first, added into its gradient buffer, and then pushed through
//!    its creator's backward rule to the inputs.
//! 4. **Release**: unless [`BackwardOptions::retain_graph`] is set, every
//!    operation visited drops its saved buffers. Walking through it again fails
//!    with [`GradError::GraphConsumed`].
//!
//! Gradients add up across passes; call [`Value::zero_grad`] between them to
//! start fresh.
//!
//! ## Example
//!
//! ```rust
//! use tapegrad::backprop::{backward_with, BackwardOptions};
//! use tapegrad::tensors::Tensor;
//! use tapegrad::value::Value;
//!
//! let x = Value::leaf(Tensor::ones(vec![2, 2]));
//! let y = &x + 2.0;
//! let keep = BackwardOptions { retain_graph: true };
//! backward_with(&y, Some(Tensor::ones(vec![2, 2])), keep).unwrap();
//! backward_with(&y, Some(Tensor::ones(vec![2, 2])), Default::default()).unwrap();
//! assert_eq!(x.grad().unwrap().data, vec![2.0; 4]);
//! assert!(y.backward_with_seed(Tensor::ones(vec![2, 2])).is_err());
//! ```

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use crate::error::{GradError, Result};
use crate::graph::NodeId;
use crate::tensors::Ten64;
use crate::value::Value;

/// Knobs for a backward pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackwardOptions {
    /// Keep the saved buffers of every visited operation so the same graph can
    /// be walked again.
    pub retain_graph: bool,
}

impl BackwardOptions {
    /// Options that keep the graph alive after the pass.
    pub fn retained() -> Self {
        Self { retain_graph: true }
    }
}

/// Backpropagates from `root`, releasing the graph afterwards.
///
/// `seed` is the gradient of the final objective with respect to `root`. When
/// `None`, `root` must hold exactly one element and the seed is one.
///
/// # Errors
/// - [`GradError::NonScalarRoot`] if `seed` is `None` and `root` has more than one element
/// - [`GradError::SeedShapeMismatch`] if `seed` does not have `root`'s shape
/// - [`GradError::GraphConsumed`] if an operation on the path was already released
///
/// Calling it on a value that does not require gradients is a no-op.
pub fn backward(root: &Value, seed: Option<Ten64>) -> Result<()> {
    backward_with(root, seed, BackwardOptions::default())
}

/// Backpropagates from `root` with explicit [`BackwardOptions`].
///
/// # Errors
/// Same as [`backward`]. Errors are detected before any gradient buffer is
/// touched.
pub fn backward_with(root: &Value, seed: Option<Ten64>, options: BackwardOptions) -> Result<()> {
    let seed = resolve_seed(root, seed)?;

    if !root.requires_grad() {
        debug!("backward on {} which does not require grad; nothing to do", root.id());
        return Ok(());
    }

    let order = topological_order(root);

    if let Some(op) = order
        .iter()
        .filter_map(Value::creator_ref)
        .find(|op| op.is_released())
    {
        return Err(GradError::GraphConsumed {
            op: op.kind().name(),
        });
    }

    let mut pending: HashMap<NodeId, Ten64> = HashMap::new();
    pending.insert(root.id(), seed);

    for value in &order {
        let Some(grad) = pending.remove(&value.id()) else {
            continue;
        };

        if let Some(op) = value.creator_ref() {
            trace!("{} <- {}", op.kind(), value.id());
            let input_grads = op.apply(&grad)?;
            for (input, input_grad) in op.inputs().iter().zip(input_grads) {
                if !input.requires_grad() {
                    continue;
                }
                match pending.entry(input.id()) {
                    Entry::Occupied(mut slot) => slot.get_mut().accumulate(&input_grad),
                    Entry::Vacant(slot) => {
                        slot.insert(input_grad);
                    }
                }
            }
        }

        value.accumulate_grad(grad);
    }

    if !options.retain_graph {
        for op in order.iter().filter_map(Value::creator_ref) {
            op.release();
        }
    }

    debug!(
        "backward from {} visited {} values (graph {})",
        root.id(),
        order.len(),
        if options.retain_graph { "retained" } else { "released" }
    );
    Ok(())
}

fn resolve_seed(root: &Value, seed: Option<Ten64>) -> Result<Ten64> {
    let data = root.data();
    match seed {
        Some(seed) if seed.shape != data.shape => Err(GradError::SeedShapeMismatch {
            expected: data.shape.clone(),
            found: seed.shape,
        }),
        Some(seed) => Ok(seed),
        None if data.is_scalar() => Ok(data.ones_like()),
        None => Err(GradError::NonScalarRoot { numel: data.numel() }),
    }
}

/// Values reachable from `root` through gradient-tracking edges, ordered so
/// that every value comes before the inputs of its creator.
///
/// Iterative post-order DFS; deep chains do not grow the call stack.
fn topological_order(root: &Value) -> Vec<Value> {
    let mut order = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![(root.clone(), false)];

    while let Some((value, expanded)) = stack.pop() {
        if expanded {
            order.push(value);
            continue;
        }
        if !visited.insert(value.id()) {
            continue;
        }
        let inputs: Vec<Value> = value
            .creator_ref()
            .map(|op| {
                op.inputs()
                    .iter()
                    .filter(|input| input.requires_grad() && !visited.contains(&input.id()))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        stack.push((value, true));
        stack.extend(inputs.into_iter().rev().map(|input| (input, false)));
    }

    order.reverse();
    order
}
