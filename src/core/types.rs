//! Core data types for the histogram / partition training core.
//!
//! The aliases mirror the vocabulary of mainstream histogram-based GBDT
//! implementations: 32-bit gradients on input, caller-chosen accumulation
//! precision inside histograms.

use num_traits::Float;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Row identifier inside the shared row-index buffer.
pub type RowIndex = usize;

/// Prediction and gradient value type. 32-bit float on input.
pub type Score = f32;

/// Default histogram accumulation type. 64-bit float for numerical
/// stability of the subtraction trick.
pub type Hist = f64;

/// Feature index type for identifying features in the binned matrix.
pub type FeatureIndex = usize;

/// Global bin index into the histogram.
pub type BinIndex = u32;

/// Tree node identifier type.
pub type NodeIndex = usize;

/// Accumulation precision for histogram bins.
///
/// The gradient input is always [`Score`] (single precision); the histogram
/// precision is an independent choice of the caller. Implemented for `f32`
/// and `f64`.
pub trait GradientSum: Float + Default + Send + Sync + fmt::Debug + 'static {
    /// Widen (or pass through) a single-precision score.
    fn from_score(s: Score) -> Self;
}

impl GradientSum for f32 {
    #[inline]
    fn from_score(s: Score) -> Self {
        s
    }
}

impl GradientSum for f64 {
    #[inline]
    fn from_score(s: Score) -> Self {
        s as f64
    }
}

/// A (gradient, hessian) pair.
///
/// The element type is the accumulation precision: `GradientPair<Score>`
/// for per-row input pairs, `GradientPair<Hist>` (or `<f32>`) for histogram
/// bins.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GradientPair<T> {
    /// First derivative of the loss at this row / summed over a bin.
    pub grad: T,
    /// Second derivative of the loss at this row / summed over a bin.
    pub hess: T,
}

/// Per-row gradient pair as produced by the objective.
pub type GradPair = GradientPair<Score>;

impl<T: Float> GradientPair<T> {
    /// Creates a new gradient pair.
    #[inline]
    pub fn new(grad: T, hess: T) -> Self {
        GradientPair { grad, hess }
    }

    /// The zero pair.
    #[inline]
    pub fn zero() -> Self {
        GradientPair {
            grad: T::zero(),
            hess: T::zero(),
        }
    }
}

impl<T: GradientSum> GradientPair<T> {
    /// Widens a single-precision input pair to the accumulation precision.
    #[inline]
    pub fn from_score_pair(p: GradPair) -> Self {
        GradientPair {
            grad: T::from_score(p.grad),
            hess: T::from_score(p.hess),
        }
    }
}

impl<T: Float> Add for GradientPair<T> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        GradientPair {
            grad: self.grad + rhs.grad,
            hess: self.hess + rhs.hess,
        }
    }
}

impl<T: Float> AddAssign for GradientPair<T> {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.grad = self.grad + rhs.grad;
        self.hess = self.hess + rhs.hess;
    }
}

impl<T: Float> Sub for GradientPair<T> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        GradientPair {
            grad: self.grad - rhs.grad,
            hess: self.hess - rhs.hess,
        }
    }
}

impl<T: Float> SubAssign for GradientPair<T> {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.grad = self.grad - rhs.grad;
        self.hess = self.hess - rhs.hess;
    }
}

impl<T: Float + fmt::Display> fmt::Display for GradientPair<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.grad, self.hess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_pair_arithmetic() {
        let a = GradientPair::new(1.0f64, 2.0);
        let b = GradientPair::new(0.5f64, 0.25);

        assert_eq!(a + b, GradientPair::new(1.5, 2.25));
        assert_eq!(a - b, GradientPair::new(0.5, 1.75));

        let mut c = a;
        c += b;
        assert_eq!(c, GradientPair::new(1.5, 2.25));
        c -= b;
        assert_eq!(c, a);
    }

    #[test]
    fn test_from_score_pair_widens() {
        let p = GradPair::new(1.5f32, -0.25);
        let wide: GradientPair<f64> = GradientPair::from_score_pair(p);
        assert_eq!(wide.grad, 1.5f64);
        assert_eq!(wide.hess, -0.25f64);
    }
}
