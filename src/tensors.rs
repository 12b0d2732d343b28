//! Core tensor data structures.
//!
//! # Dense Tensors
//!
//! A [`Tensor`] is the raw numeric array the autograd layer wraps: a shape and a
//! flat, row-major buffer. Tensors carry no graph information themselves; see
//! [`Value`](crate::value::Value) for the differentiable handle.
//!
//! It supports:
//! - Construction from shape + data, constant fills and standard-normal samples
//! - Elementwise arithmetic with single-element broadcasting
//! - Whole-tensor reductions (`sum`, `norm`)
//! - The `tensor!` literal macro
//!
//! ## Design Highlights
//! - `Tensor<T>` is generic over the element type, but every numeric routine is
//!   implemented for [`Ten64`] (`Tensor<f64>`), the element type of the engine
//! - Shape is a `Vec<usize>` enforced at construction
//! - Elementwise loops go through [`ops::cpu`](crate::ops::cpu), which picks a
//!   serial or rayon-parallel kernel according to [`config`](crate::config)
//!
//! ## Limitations
//! - Row-major only
//! - Broadcasting is limited to one-element operands
//!
//! ## Example
//!
//! ```rust
//! use tapegrad::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! assert_eq!(t.sum(), 21.0);
//! ```

use core::fmt;
use rand::Rng;
use rand_distr::StandardNormal;

use crate::ops::cpu;

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - `shape` defines the structure, e.g. `[2, 3]` for a 2x3 matrix. An empty
///   shape is a 0-d scalar holding exactly one element.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// The tensor type the engine differentiates.
pub type Ten64 = Tensor<f64>;

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Replaces this tensor's data with another tensor of the same shape.
    ///
    /// # Panics
    /// Panics if shapes do not match.
    pub fn update(&mut self, mut other: Tensor<T>) {
        assert_eq!(self.shape, other.shape, "shape mismatch");
        std::mem::swap(&mut self.data, &mut other.data);
    }

    /// The dimensions of this tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The flat row-major elements.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Whether the tensor holds exactly one element, whatever its rank.
    pub fn is_scalar(&self) -> bool {
        self.data.len() == 1
    }
}

impl Ten64 {
    /// A 0-d tensor holding `value`.
    pub fn scalar(value: f64) -> Self {
        Self::new(Vec::new(), vec![value])
    }

    /// A tensor of the given shape filled with `value`.
    pub fn full(shape: impl Into<Vec<usize>>, value: f64) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self::new(shape, vec![value; len])
    }

    /// A tensor of zeros.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, 0.0)
    }

    /// A tensor of ones.
    pub fn ones(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, 1.0)
    }

    /// Zeros with the shape of `self`.
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape.clone())
    }

    /// Ones with the shape of `self`.
    pub fn ones_like(&self) -> Self {
        Self::ones(self.shape.clone())
    }

    /// Standard-normal samples drawn from the thread-local generator.
    pub fn randn(shape: impl Into<Vec<usize>>) -> Self {
        Self::randn_with_rng(shape, &mut rand::rng())
    }

    /// Standard-normal samples drawn from `rng`.
    ///
    /// ```rust
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    /// use tapegrad::tensors::Tensor;
    ///
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let t = Tensor::randn_with_rng(vec![3], &mut rng);
    /// assert_eq!(t.numel(), 3);
    /// ```
    pub fn randn_with_rng<R: Rng>(shape: impl Into<Vec<usize>>, rng: &mut R) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        let data = (0..len).map(|_| rng.sample(StandardNormal)).collect();
        Self::new(shape, data)
    }

    /// The single element of a one-element tensor.
    pub fn item(&self) -> Option<f64> {
        match self.data.as_slice() {
            [x] => Some(*x),
            _ => None,
        }
    }

    /// Sum of all elements.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Euclidean (Frobenius) norm.
    pub fn norm(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// Applies `f` to every element.
    pub fn map(&self, f: impl Fn(f64) -> f64 + Sync + Send) -> Self {
        Self::new(self.shape.clone(), cpu::map(&self.data, f))
    }

    /// Combines two tensors elementwise.
    ///
    /// Shapes must be equal, or one side must hold a single element, which is
    /// then broadcast against the other.
    ///
    /// # Panics
    /// Panics if the shapes are not compatible.
    pub fn zip_map(&self, other: &Ten64, f: impl Fn(f64, f64) -> f64 + Sync + Send) -> Self {
        let shape = broadcast_shape(&self.shape, &other.shape).unwrap_or_else(|| {
            panic!(
                "elementwise shape mismatch: {:?} vs {:?}",
                self.shape, other.shape
            )
        });
        Self::new(shape, cpu::zip_map(&self.data, &other.data, f))
    }

    /// Adds `other` into `self` in place, as gradient accumulation does.
    ///
    /// # Panics
    /// Panics if the shapes differ.
    pub fn accumulate(&mut self, other: &Ten64) {
        assert_eq!(self.shape, other.shape, "cannot accumulate mismatched shapes");
        cpu::add_assign(&mut self.data, &other.data);
    }

    /// Sums `self` down to `shape`, undoing a single-element broadcast.
    ///
    /// Returns `self` unchanged when the shapes already agree.
    pub fn reduce_to(self, shape: &[usize]) -> Self {
        if self.shape == shape {
            return self;
        }
        debug_assert_eq!(shape.iter().product::<usize>(), 1);
        Self::new(shape.to_vec(), vec![self.sum()])
    }
}

/// Result shape of an elementwise op over `a` and `b`, if they are compatible.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Vec<usize>> {
    let a_len: usize = a.iter().product();
    let b_len: usize = b.iter().product();
    if a == b {
        Some(a.to_vec())
    } else if a_len == 1 {
        Some(b.to_vec())
    } else if b_len == 1 {
        Some(a.to_vec())
    } else {
        None
    }
}

impl fmt::Display for Ten64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_dim(
            f: &mut fmt::Formatter<'_>,
            shape: &[usize],
            data: &[f64],
            depth: usize,
        ) -> fmt::Result {
            match shape.split_first() {
                None => write!(f, "{:.4}", data[0]),
                Some((&n, rest)) => {
                    let stride = rest.iter().product::<usize>();
                    f.write_str("[")?;
                    for i in 0..n {
                        if i > 0 {
                            f.write_str(",")?;
                            if rest.is_empty() {
                                f.write_str(" ")?;
                            } else {
                                write!(f, "\n{:width$}", "", width = depth + 1)?;
                            }
                        }
                        write_dim(f, rest, &data[i * stride..(i + 1) * stride], depth + 1)?;
                    }
                    f.write_str("]")
                }
            }
        }

        if self.data.is_empty() {
            return write!(f, "tensor([], shape={:?})", self.shape);
        }
        f.write_str("tensor(")?;
        write_dim(f, &self.shape, &self.data, 7)?;
        f.write_str(")")
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
/// Elements are expressions, so negative numbers work as written.
///
/// # Example
/// ```
/// use tapegrad::tensor;
/// let t = tensor!([[1.0, -2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// assert_eq!(t.data[1], -2.0);
/// ```
#[macro_export]
macro_rules! tensor {
    ([ $( [ $($row:tt)* ] ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!([ $($row)* ]) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};

    ([ $( $x:expr ),+ $(,)? ]) => {{
        let data = vec![ $( $x ),+ ];
        $crate::tensors::Tensor::new(vec![data.len()], data)
    }};

    ($x:expr) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$x])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_rules() {
        assert_eq!(broadcast_shape(&[2, 2], &[2, 2]), Some(vec![2, 2]));
        assert_eq!(broadcast_shape(&[1], &[2, 3]), Some(vec![2, 3]));
        assert_eq!(broadcast_shape(&[2, 3], &[]), Some(vec![2, 3]));
        assert_eq!(broadcast_shape(&[2], &[3]), None);
    }

    #[test]
    fn reduce_to_sums_broadcast_gradient() {
        let g = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(g.clone().reduce_to(&[2, 2]), g);
        assert_eq!(g.reduce_to(&[1]).data, vec![10.0]);
    }

    #[test]
    fn display_nested() {
        let t = crate::tensor!([[1.0, 2.0], [3.0, 4.0]]);
        let s = t.to_string();
        assert!(s.starts_with("tensor([[1.0000, 2.0000],"));
        assert!(s.ends_with("[3.0000, 4.0000]])"));
    }
}
