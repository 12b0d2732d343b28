//! tapegrad: a minimal define-by-run, reverse-mode autodiff engine.
//!
//! Operations on [`Value`]s execute eagerly and, as a side effect, record the
//! graph needed to differentiate them. Calling `backward` on a result replays
//! that graph in reverse and accumulates gradients into every value that
//! asked for them.
//!
//! # Features
//!
//! - Dense `f64` tensors with elementwise kernels that go parallel on large buffers.
//! - Elementwise and reduction primitives with hand-written gradient rules.
//! - Gradient accumulation across multiple paths and multiple passes.
//! - Saved buffers released after a pass unless the graph is explicitly retained.
//! - Thread-local `no_grad` mode and finite-difference gradient checking.
//!
//! # Modules
//!
//! - [`tensors`]: Core tensor data structure.
//! - [`value`]: Differentiable handles and their arithmetic.
//! - [`ops`]: Primitive kernels, gradient rules and graph recording.
//! - [`graph`]: Recorded operations and node identities.
//! - [`backprop`]: The backward engine and its retention policy.
//! - [`config`]: Kernel mode and grad mode.
//! - [`gradcheck`]: Numerical verification of gradients.
//! - [`approx`]: Tolerance ladder for float comparisons.
//! - [`error`]: The error type.
//!
//! # Example
//!
//! ```rust
//! use tapegrad::{tensors::Tensor, value::Value};
//!
//! let x = Value::new(Tensor::ones(vec![2, 2]), true);
//! let y = &x + 2.0;
//! let z = &y * &y * 3.0;
//! let out = z.mean();
//!
//! out.backward()?;
//! assert_eq!(x.grad().unwrap().data, vec![4.5; 4]);
//!
//! // the graph was released by the first pass
//! assert!(out.backward().is_err());
//! # Ok::<(), tapegrad::error::GradError>(())
//! ```

pub mod approx;
pub mod backprop;
pub mod config;
pub mod error;
pub mod gradcheck;
pub mod graph;
pub mod ops;
pub mod tensors;
pub mod value;

pub use backprop::{backward, backward_with, BackwardOptions};
pub use config::no_grad;
pub use error::{GradError, Result};
pub use tensors::{Ten64, Tensor};
pub use value::Value;
