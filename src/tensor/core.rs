//! Core Tensor type

use super::{Shape, Storage, TensorHandle};
use crate::dtype::{DType, Element, NumericElement, encode};
use crate::error::{Error, Result};
use crate::runtime::cpu::CpuRuntime;
use crate::runtime::{Device, ExecutionContext, Runtime};
use half::bf16;
use std::fmt;
use std::marker::PhantomData;

/// Immutable n-dimensional array stored on a compute device
///
/// A `Tensor` consists of:
/// - **Handle**: a reference-counted device buffer paired with its shape
/// - **Element type**: `T`, fixed at compile time
/// - **Precision**: floating tensors may keep their buffer as `bf16`
///   ("reduced precision"); the buffer's physical dtype is the only record
///   of this
///
/// Cloning is cheap: clones share the buffer. Nothing mutates a shared
/// buffer. [`set_scalar`](Tensor::set_scalar) copies it first.
///
/// # Errors and panics
///
/// Shape and axis preconditions, device mismatches and precision misuse
/// are programmer errors and panic before any backend work happens.
/// Backend failures (allocation, unsupported dtype, out-of-range index
/// values) are returned as [`Error`].
///
/// # Example
///
/// ```
/// use difftensor::prelude::*;
///
/// # fn main() -> difftensor::error::Result<()> {
/// let device = CpuDevice::new();
/// let t = Tensor::<f32>::from_slice(&[1.0, 2.0, 3.0, 4.0], &[2, 2], &device)?;
/// let flipped = t.t()?;
/// assert_eq!(flipped.scalars()?, vec![1.0, 3.0, 2.0, 4.0]);
/// # Ok(())
/// # }
/// ```
pub struct Tensor<T: Element, R: Runtime = CpuRuntime> {
    handle: TensorHandle<R>,
    /// Set only on the additive identity made by `zero()`
    is_scalar_zero: bool,
    _element: PhantomData<fn() -> T>,
}

impl<T: Element, R: Runtime> Tensor<T, R> {
    /// Wrap a handle
    ///
    /// # Panics
    ///
    /// Panics if the handle's dtype is neither `T`'s dtype nor, for floating
    /// `T`, its reduced precision form.
    #[track_caller]
    pub fn from_handle(handle: TensorHandle<R>) -> Self {
        let dtype = handle.dtype();
        assert!(
            dtype == T::DTYPE || T::DTYPE.reduced() == Some(dtype),
            "a {dtype} buffer cannot hold {} tensor elements",
            T::DTYPE
        );
        Self {
            handle,
            is_scalar_zero: false,
            _element: PhantomData,
        }
    }

    /// Create a tensor from host data on the ambient device
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not equal the product of `shape`.
    #[track_caller]
    pub fn new(data: &[T], shape: &[usize]) -> Result<Self> {
        let context = ExecutionContext::<R>::current();
        Self::from_slice(data, shape, context.device())
    }

    /// Create a tensor from host data
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not equal the product of `shape`.
    #[track_caller]
    pub fn from_slice(data: &[T], shape: &[usize], device: &R::Device) -> Result<Self> {
        Self::from_slice_with_precision(data, shape, false, device)
    }

    /// Create a tensor from host data, optionally stored in reduced precision
    ///
    /// # Panics
    ///
    /// Panics if `data.len()` does not equal the product of `shape`, or if
    /// reduced precision is requested for a non-floating element type.
    #[track_caller]
    pub fn from_slice_with_precision(
        data: &[T],
        shape: &[usize],
        reduced_precision: bool,
        device: &R::Device,
    ) -> Result<Self> {
        let shape = Shape::new(shape);
        assert_eq!(
            data.len(),
            shape.contiguous_size(),
            "from_slice: {} scalars cannot fill shape {shape}",
            data.len()
        );

        let storage = if reduced_precision {
            let reduced: Vec<bf16> = data
                .iter()
                .map(|&v| match v.to_reduced() {
                    Some(r) => r,
                    None => panic!("from_slice: {} has no reduced precision form", T::DTYPE),
                })
                .collect();
            Storage::from_slice(&reduced, device)?
        } else {
            Storage::from_slice(data, device)?
        };
        Ok(Self::from_handle(TensorHandle::new(storage, shape)))
    }

    /// Rank-0 tensor on the ambient device
    pub fn from_scalar(value: T) -> Result<Self> {
        Self::from_slice(&[value], &[], ExecutionContext::<R>::current().device())
    }

    /// Rank-0 tensor on `device`
    pub fn from_scalar_on(value: T, device: &R::Device) -> Result<Self> {
        Self::from_slice(&[value], &[], device)
    }

    /// Tensor of `rank` dimensions, all of size 1, holding `value`
    pub fn scalar_with_rank(value: T, rank: usize, device: &R::Device) -> Result<Self> {
        Self::from_slice(&[value], &Shape::repeating(1, rank), device)
    }

    /// Tensor of `shape` with every element set to `value`
    pub fn repeating(value: T, shape: &[usize], device: &R::Device) -> Result<Self> {
        let count = shape.iter().product();
        Self::from_slice(&vec![value; count], shape, device)
    }

    // ===== Accessors =====

    /// The buffer handle
    #[inline]
    pub fn handle(&self) -> &TensorHandle<R> {
        &self.handle
    }

    /// Shape
    #[inline]
    pub fn shape(&self) -> &Shape {
        self.handle.shape()
    }

    /// Number of dimensions
    #[inline]
    pub fn rank(&self) -> usize {
        self.shape().rank()
    }

    /// Total number of elements
    #[inline]
    pub fn scalar_count(&self) -> usize {
        self.shape().contiguous_size()
    }

    /// Whether this is a rank-0 tensor
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.rank() == 0
    }

    /// Device holding the buffer
    #[inline]
    pub fn device(&self) -> &R::Device {
        self.handle.device()
    }

    /// Physical element type of the buffer
    #[inline]
    pub fn dtype(&self) -> DType {
        self.handle.dtype()
    }

    /// Whether the buffer holds the reduced precision form of `T`
    #[inline]
    pub fn is_reduced_precision(&self) -> bool {
        self.dtype() != T::DTYPE
    }

    #[inline]
    pub(crate) fn is_scalar_zero(&self) -> bool {
        self.is_scalar_zero
    }

    pub(crate) fn marked_zero(mut self) -> Self {
        self.is_scalar_zero = true;
        self
    }

    /// Rank as a rank-0 `i32` tensor on the same device
    pub fn rank_tensor(&self) -> Result<Tensor<i32, R>> {
        Tensor::from_scalar_on(self.rank() as i32, self.device())
    }

    /// Dimensions as a 1-D `i32` tensor on the same device
    pub fn shape_tensor(&self) -> Result<Tensor<i32, R>> {
        let dims: Vec<i32> = self.shape().iter().map(|&d| d as i32).collect();
        Tensor::from_slice(&dims, &[dims.len()], self.device())
    }

    /// Element count as a rank-0 `i32` tensor on the same device
    pub fn scalar_count_tensor(&self) -> Result<Tensor<i32, R>> {
        Tensor::from_scalar_on(self.scalar_count() as i32, self.device())
    }

    // ===== Host readback =====

    /// Copy every element to the host in row-major order
    ///
    /// Reduced precision elements are widened back to `T`.
    pub fn scalars(&self) -> Result<Vec<T>> {
        let storage = self.handle.storage();
        if !self.is_reduced_precision() {
            return storage.to_vec::<T>();
        }
        storage
            .to_vec::<bf16>()?
            .into_iter()
            .map(|v| {
                T::from_reduced(v).ok_or_else(|| {
                    Error::Internal(format!("{} cannot be widened from bf16", T::DTYPE))
                })
            })
            .collect()
    }

    /// The only element, if the tensor holds exactly one
    pub fn scalar(&self) -> Result<Option<T>> {
        if self.scalar_count() != 1 {
            return Ok(None);
        }
        Ok(self.scalars()?.pop())
    }

    /// The only element
    ///
    /// # Panics
    ///
    /// Panics unless the tensor holds exactly one element.
    #[track_caller]
    pub fn scalarized(&self) -> Result<T> {
        assert_eq!(
            self.scalar_count(),
            1,
            "scalarized: shape {} holds {} scalars, expected 1",
            self.shape(),
            self.scalar_count()
        );
        self.scalars()?
            .pop()
            .ok_or_else(|| Error::Internal("scalarized: empty readback".into()))
    }

    // ===== Mutation and placement =====

    /// Overwrite one element in place
    ///
    /// The buffer is copied first if any other tensor shares it.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not address an element of this tensor.
    #[track_caller]
    pub fn set_scalar(&mut self, index: &[usize], value: T) -> Result<()> {
        let shape = self.shape().clone();
        assert!(
            index.len() == shape.rank() && index.iter().zip(shape.iter()).all(|(&i, &d)| i < d),
            "set_scalar: index {index:?} out of bounds for shape {shape}"
        );
        let linear: usize = index.iter().zip(shape.strides()).map(|(&i, s)| i * s).sum();

        let reduced;
        let bytes = if self.is_reduced_precision() {
            reduced = value.to_reduced().ok_or_else(|| {
                Error::Internal(format!("{} has no reduced precision form", T::DTYPE))
            })?;
            encode(std::slice::from_ref(&reduced))
        } else {
            encode(std::slice::from_ref(&value))
        };
        self.handle.storage_mut().write_element(linear, bytes)?;
        self.is_scalar_zero = false;
        Ok(())
    }

    /// Copy to another device, keeping shape and precision
    pub fn copied_to(&self, device: &R::Device) -> Result<Self> {
        let storage = self.handle.storage().copy_to(device)?;
        Ok(Self {
            handle: TensorHandle::new(storage, self.shape().clone()),
            is_scalar_zero: self.is_scalar_zero,
            _element: PhantomData,
        })
    }

    // ===== Precondition helpers =====

    /// Device precondition for combining two tensors
    #[track_caller]
    pub(crate) fn ensure_same_device<U: Element>(&self, other: &Tensor<U, R>, op: &str) {
        assert!(
            self.device().is_same(other.device()),
            "{op}: operand on {} cannot be combined with operand on {}",
            self.device().name(),
            other.device().name()
        );
    }

    /// Device and precision precondition for combining two tensors
    #[track_caller]
    pub(crate) fn ensure_compatible(&self, other: &Self, op: &str) {
        self.ensure_same_device(other, op);
        assert_eq!(
            self.dtype(),
            other.dtype(),
            "{op}: precision mismatch ({} vs {})",
            self.dtype(),
            other.dtype()
        );
    }

    /// Equality as a fallible operation
    ///
    /// Tensors of different shapes are unequal without a backend call.
    pub fn try_eq(&self, other: &Self) -> Result<bool> {
        if self.shape() != other.shape() {
            return Ok(false);
        }
        self.elementwise_equal(other)?.all()
    }

    /// Inequality as a fallible operation
    pub fn try_ne(&self, other: &Self) -> Result<bool> {
        if self.shape() != other.shape() {
            return Ok(true);
        }
        self.elementwise_not_equal(other)?.any()
    }
}

impl<T: NumericElement, R: Runtime> Tensor<T, R> {
    /// Tensor of `shape` filled with zeros
    pub fn zeros(shape: &[usize], device: &R::Device) -> Result<Self> {
        Self::repeating(T::zero(), shape, device)
    }

    /// The additive identity on the ambient device
    ///
    /// A rank-0 zero, stored in reduced precision when the ambient context
    /// asks for it and `T` has a reduced form. Adding it to, or subtracting
    /// it from, another tensor returns that tensor without a backend call.
    pub fn try_zero() -> Result<Self> {
        let context = ExecutionContext::<R>::current();
        let reduced = context.reduced_precision() && T::zero().to_reduced().is_some();
        let zero = Self::from_slice_with_precision(&[T::zero()], &[], reduced, context.device())?;
        Ok(zero.marked_zero())
    }
}

impl<T: Element, R: Runtime> Clone for Tensor<T, R> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            is_scalar_zero: self.is_scalar_zero,
            _element: PhantomData,
        }
    }
}

impl<T: Element, R: Runtime> PartialEq for Tensor<T, R> {
    /// # Panics
    ///
    /// Panics if the comparison fails on the backend.
    fn eq(&self, other: &Self) -> bool {
        match self.try_eq(other) {
            Ok(equal) => equal,
            Err(e) => panic!("tensor comparison failed: {e}"),
        }
    }

    #[allow(clippy::partialeq_ne_impl)]
    fn ne(&self, other: &Self) -> bool {
        match self.try_ne(other) {
            Ok(unequal) => unequal,
            Err(e) => panic!("tensor comparison failed: {e}"),
        }
    }
}

impl<T: Element, R: Runtime> fmt::Debug for Tensor<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", self.shape())
            .field("dtype", &self.dtype())
            .field("device", &self.device().name())
            .finish()
    }
}

impl<T: Element, R: Runtime> fmt::Display for Tensor<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor({}, dtype={})", self.shape(), self.dtype())
    }
}
