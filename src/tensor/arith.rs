//! Broadcasting arithmetic, sums and comparisons

use super::{Shape, Tensor};
use crate::dtype::{DType, Element, FloatElement, NumericElement};
use crate::error::{Error, Result};
use crate::ops::dispatch::{OutputSpec, dispatch_one};
use crate::ops::validate::ensure_axes;
use crate::ops::{Op, broadcast_shape};
use crate::runtime::Runtime;

/// Broadcast result shape, or a precondition panic naming `op`
#[track_caller]
fn ensure_broadcast(a: &Shape, b: &Shape, op: &str) -> Shape {
    match broadcast_shape(a, b) {
        Some(shape) => shape,
        None => panic!("{op}: shapes {a} and {b} are not broadcast compatible"),
    }
}

impl<T: NumericElement, R: Runtime> Tensor<T, R> {
    /// A plain zero scalar placed and stored like `other`
    fn zero_like(other: &Self) -> Result<Self> {
        Self::from_slice_with_precision(
            &[T::zero()],
            &[],
            other.is_reduced_precision(),
            other.device(),
        )
    }

    #[track_caller]
    fn binary_op(&self, other: &Self, op: Op) -> Result<Self> {
        // The zero marker is placed on the ambient device and precision; as
        // a real operand it takes the other side's.
        let lhs_zero;
        let lhs = if self.is_scalar_zero() {
            lhs_zero = Self::zero_like(other)?;
            &lhs_zero
        } else {
            self
        };
        let rhs_zero;
        let rhs = if other.is_scalar_zero() && !self.is_scalar_zero() {
            rhs_zero = Self::zero_like(self)?;
            &rhs_zero
        } else {
            other
        };

        lhs.ensure_compatible(rhs, op.name());
        let shape = ensure_broadcast(lhs.shape(), rhs.shape(), op.name());
        let spec = OutputSpec::new(shape, lhs.dtype());
        dispatch_one(&op, lhs.device(), &[lhs.handle(), rhs.handle()], spec).map(Self::from_handle)
    }

    /// Element-wise sum with broadcasting
    ///
    /// If either side is the additive identity from `zero()`, the other side
    /// is returned as is.
    ///
    /// # Panics
    ///
    /// Panics if the shapes are not broadcast compatible, or the operands
    /// differ in device or precision.
    #[track_caller]
    pub fn add(&self, other: &Self) -> Result<Self> {
        if self.is_scalar_zero() {
            return Ok(other.clone());
        }
        if other.is_scalar_zero() {
            return Ok(self.clone());
        }
        self.binary_op(other, Op::Add)
    }

    /// Element-wise difference with broadcasting
    ///
    /// Subtracting the additive identity returns `self` as is.
    #[track_caller]
    pub fn subtract(&self, other: &Self) -> Result<Self> {
        if other.is_scalar_zero() {
            return Ok(self.clone());
        }
        self.binary_op(other, Op::Sub)
    }

    /// Element-wise product with broadcasting
    #[track_caller]
    pub fn multiply(&self, other: &Self) -> Result<Self> {
        self.binary_op(other, Op::Mul)
    }

    /// Sum over `axes` keeping them as size-1 dimensions
    pub(crate) fn sum_keeping(&self, mut axes: Vec<usize>) -> Result<Self> {
        axes.sort_unstable();
        axes.dedup();
        let mut shape = self.shape().clone();
        for &axis in &axes {
            shape = shape.with_dim(axis, 1);
        }
        self.unary_op(Op::Sum { axes }, shape)
    }

    /// Sum of every element as a rank-0 tensor
    pub fn sum(&self) -> Result<Self> {
        let axes: Vec<usize> = (0..self.rank()).collect();
        let spec = OutputSpec::new(Shape::scalar(), self.dtype());
        dispatch_one(&Op::Sum { axes }, self.device(), &[self.handle()], spec).map(Self::from_handle)
    }

    /// Sum over `axes`, keeping them as size-1 dimensions
    ///
    /// # Panics
    ///
    /// Panics if an axis is out of range.
    #[track_caller]
    pub fn sum_along_axes(&self, axes: &[isize]) -> Result<Self> {
        let axes = ensure_axes(axes, self.rank(), false, "sum_along_axes");
        self.sum_keeping(axes)
    }

    /// Sum over `axes`, removing them from the shape
    ///
    /// # Panics
    ///
    /// Panics if an axis is out of range.
    #[track_caller]
    pub fn sum_squeezing_axes(&self, axes: &[isize]) -> Result<Self> {
        let axes = ensure_axes(axes, self.rank(), false, "sum_squeezing_axes");
        let shape: Shape = (0..self.rank())
            .filter(|k| !axes.contains(k))
            .map(|k| self.shape()[k])
            .collect();
        Ok(self.sum_keeping(axes)?.reshaped(shape))
    }
}

impl<T: FloatElement, R: Runtime> Tensor<T, R> {
    /// Mean over `axes`, keeping them as size-1 dimensions
    ///
    /// # Panics
    ///
    /// Panics if an axis is out of range.
    #[track_caller]
    pub fn mean_along_axes(&self, axes: &[isize]) -> Result<Self> {
        let mut axes = ensure_axes(axes, self.rank(), false, "mean_along_axes");
        axes.sort_unstable();
        axes.dedup();
        let count: usize = axes.iter().map(|&a| self.shape()[a]).product();
        let scale = Self::scalar_like(T::from_f64(1.0 / count as f64), self)?;
        self.sum_keeping(axes)?.multiply(&scale)
    }

    /// Mean of every element as a rank-0 tensor
    pub fn mean(&self) -> Result<Self> {
        let scale = Self::scalar_like(T::from_f64(1.0 / self.scalar_count() as f64), self)?;
        self.sum()?.multiply(&scale)
    }
}

impl<T: Element, R: Runtime> Tensor<T, R> {
    #[track_caller]
    fn compare(&self, other: &Self, op: Op) -> Result<Tensor<bool, R>> {
        self.ensure_compatible(other, op.name());
        let shape = ensure_broadcast(self.shape(), other.shape(), op.name());
        let spec = OutputSpec::new(shape, DType::Bool);
        dispatch_one(&op, self.device(), &[self.handle(), other.handle()], spec)
            .map(Tensor::from_handle)
    }

    /// Element-wise `==` with broadcasting
    ///
    /// Floating point rules apply: `NaN` differs from everything and
    /// `-0.0 == 0.0`.
    #[track_caller]
    pub fn elementwise_equal(&self, other: &Self) -> Result<Tensor<bool, R>> {
        self.compare(other, Op::Equal)
    }

    /// Element-wise `!=` with broadcasting
    #[track_caller]
    pub fn elementwise_not_equal(&self, other: &Self) -> Result<Tensor<bool, R>> {
        self.compare(other, Op::NotEqual)
    }
}

impl<R: Runtime> Tensor<bool, R> {
    fn reduce_logical(&self, op: Op) -> Result<bool> {
        let spec = OutputSpec::new(Shape::scalar(), DType::Bool);
        let reduced: Self =
            dispatch_one(&op, self.device(), &[self.handle()], spec).map(Self::from_handle)?;
        reduced
            .scalar()?
            .ok_or_else(|| Error::Internal(format!("{}: expected a single result", op.name())))
    }

    /// Whether every element is `true` (`true` for an empty tensor)
    pub fn all(&self) -> Result<bool> {
        self.reduce_logical(Op::All)
    }

    /// Whether any element is `true` (`false` for an empty tensor)
    pub fn any(&self) -> Result<bool> {
        self.reduce_logical(Op::Any)
    }
}
