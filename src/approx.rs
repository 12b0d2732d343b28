//! Utilities to approximate equality of floating point values.
//!
//! Comparisons report an [`ApproxEquality`] rating rather than a bool, so
//! callers choose how strict to be. Ratings are ordered from best
//! ([`Precise`](ApproxEquality::Precise)) to worst
//! ([`Scarce`](ApproxEquality::Scarce)); aggregates report their worst element.

use crate::tensors::Ten64;

/// The max epsilon accepted on `f64`s.
pub const F64_MAX_ERROR: f64 = 1e-3;

/// The expected minimum epsilon accepted on `f64`s.
pub const F64_AVG_ERROR: f64 = 1e-6;

/// The best expected epsilon accepted on `f64`s.
pub const F64_MIN_ERROR: f64 = 1e-13;

/// The approximated equality enumerated.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApproxEquality {
    /// Very strong epsilon.
    Precise = 0,

    /// Good epsilon.
    Partial = 1,

    /// Acceptable epsilon
    Relative = 2,

    /// No relative equality.
    Scarce = 3,
}

impl ApproxEquality {
    /// Rates an absolute difference.
    pub fn of_difference(dif: f64) -> Self {
        if dif < F64_MIN_ERROR {
            Self::Precise
        } else if dif < F64_AVG_ERROR {
            Self::Partial
        } else if dif < F64_MAX_ERROR {
            Self::Relative
        } else {
            // NaN lands here too
            Self::Scarce
        }
    }
}

/// Checks the relative distance based off epsilon.
pub trait RelativeEq<Rhs: ?Sized> {
    /// Enumerates the equality of `self`
    fn approx_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

impl RelativeEq<Self> for f64 {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        ApproxEquality::of_difference((self - rhs).abs())
    }
}

impl RelativeEq<[f64]> for [f64] {
    fn approx_eq(&self, rhs: &[f64]) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        let mut eq = ApproxEquality::Precise;
        for (a, b) in self.iter().zip(rhs) {
            eq = eq.max(a.approx_eq(b));
            if eq == ApproxEquality::Scarce {
                break; // can't improve from here; not equal
            }
        }
        eq
    }
}

impl RelativeEq<Ten64> for Ten64 {
    fn approx_eq(&self, rhs: &Ten64) -> ApproxEquality {
        if self.shape != rhs.shape {
            return ApproxEquality::Scarce;
        }
        self.data.as_slice().approx_eq(rhs.data.as_slice())
    }
}

/// Approximates equality based off the relative difference.
pub fn approx_eq<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    let eq = a.approx_eq(b);
    eq == ApproxEquality::Precise
}

/// Whether `a` and `b` are equal at rating `level` or better.
pub fn approx_eq_within<A: RelativeEq<B> + ?Sized, B: ?Sized>(
    a: &A,
    b: &B,
    level: ApproxEquality,
) -> bool {
    a.approx_eq(b) <= level
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensors::Tensor;

    #[test]
    fn ratings_follow_the_epsilon_ladder() {
        assert_eq!(1.0f64.approx_eq(&1.0), ApproxEquality::Precise);
        assert_eq!(1.0f64.approx_eq(&(1.0 + 1e-8)), ApproxEquality::Partial);
        assert_eq!(1.0f64.approx_eq(&1.0001), ApproxEquality::Relative);
        assert_eq!(1.0f64.approx_eq(&1.1), ApproxEquality::Scarce);
        assert_eq!(f64::NAN.approx_eq(&f64::NAN), ApproxEquality::Scarce);
    }

    #[test]
    fn slices_report_their_worst_element() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 2.0 + 1e-8, 3.0001];
        assert_eq!(a[..].approx_eq(&b[..]), ApproxEquality::Relative);
        assert!(approx_eq_within(&a[..], &b[..], ApproxEquality::Relative));
        assert!(!approx_eq(&a[..], &b[..]));
    }

    #[test]
    fn tensors_compare_shape_first() {
        let a = Tensor::ones(vec![2, 2]);
        let b = Tensor::ones(vec![4]);
        assert_eq!(a.approx_eq(&b), ApproxEquality::Scarce);
        assert!(approx_eq(&a, &a.clone()));
    }
}
