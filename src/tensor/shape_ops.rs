//! Shape manipulation, data movement and gathering
//!
//! Reshape, expand, squeeze, flatten and rank lift only relabel the buffer:
//! the result shares storage with `self` and no backend call is made.
//! Everything else maps to exactly one backend operation, except for
//! `stacking` (expand + concat), `unbroadcasted` (sum + reshape) and the
//! mask gathers, which first count matches on the host.

use super::{Shape, Tensor};
use crate::dtype::{DType, Element, IndexElement, NumericElement, encode};
use crate::error::Result;
use crate::ops::dispatch::{OutputSpec, dispatch, dispatch_one};
use crate::ops::validate::{
    ensure_axes, ensure_axis, ensure_permutation, is_broadcastable_to, normalize_insert_axis,
    unbroadcast_axes,
};
use crate::ops::{MirrorMode, Op, PadFill};
use crate::runtime::Runtime;

/// How [`Tensor::padded`] fills the new positions
///
/// Mirror modes follow TensorFlow's `MirrorPad`. For `x = [1, 2, 3]` padded
/// by two on each side:
///
/// | mode | result | limit per side |
/// |---|---|---|
/// | `Constant(0)` | `[0, 0, 1, 2, 3, 0, 0]` | none |
/// | `Reflect` | `[3, 2, 1, 2, 3, 2, 1]` | `dim - 1` |
/// | `Symmetric` | `[2, 1, 1, 2, 3, 3, 2]` | `dim` |
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum PaddingMode<T> {
    /// Fill with a fixed value
    Constant(T),
    /// Mirror around the edge element
    Reflect,
    /// Mirror including the edge element
    Symmetric,
}

impl<T> PaddingMode<T> {
    pub(crate) fn mirror(&self) -> Option<MirrorMode> {
        match self {
            Self::Constant(_) => None,
            Self::Reflect => Some(MirrorMode::Reflect),
            Self::Symmetric => Some(MirrorMode::Symmetric),
        }
    }
}

impl<T: Element, R: Runtime> Tensor<T, R> {
    /// Run a single-input, single-output op keeping the physical dtype
    #[track_caller]
    pub(crate) fn unary_op(&self, op: Op, shape: Shape) -> Result<Self> {
        let spec = OutputSpec::new(shape, self.dtype());
        dispatch_one(&op, self.device(), &[self.handle()], spec).map(Self::from_handle)
    }

    /// The same tensor
    pub fn identity(&self) -> Self {
        self.clone()
    }

    // ===== Metadata only =====

    /// View the elements with another shape of the same size
    ///
    /// # Panics
    ///
    /// Panics if the element counts differ.
    #[track_caller]
    pub fn reshaped(&self, shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.contiguous_size(),
            self.scalar_count(),
            "reshaped: cannot reshape {} into {shape} ({} vs {} scalars)",
            self.shape(),
            self.scalar_count(),
            shape.contiguous_size()
        );
        Self::from_handle(self.handle().reshaped(shape))
    }

    /// Reshape to the shape of `other`
    #[track_caller]
    pub fn reshaped_like<U: Element>(&self, other: &Tensor<U, R>) -> Self {
        self.reshaped(other.shape())
    }

    /// Collapse to one dimension in row-major order
    pub fn flattened(&self) -> Self {
        self.reshaped([self.scalar_count()])
    }

    /// Insert size-1 dimensions
    ///
    /// Axes are applied in order, each relative to the shape produced by the
    /// previous insertion; a negative axis `a` denotes `a + rank + 1`.
    ///
    /// # Panics
    ///
    /// Panics if an axis is outside `-(rank + 1)..=rank` at its turn.
    #[track_caller]
    pub fn expanding_shape(&self, axes: &[isize]) -> Self {
        let mut dims = self.shape().to_vec();
        for &axis in axes {
            let rank = dims.len();
            let Some(position) = normalize_insert_axis(axis, rank) else {
                panic!(
                    "expanding_shape: axis {axis} out of range for rank {rank} (expected -{}..={rank})",
                    rank + 1
                );
            };
            dims.insert(position, 1);
        }
        self.reshaped(dims)
    }

    /// Add a leading dimension of size 1
    pub fn rank_lifted(&self) -> Self {
        self.expanding_shape(&[0])
    }

    /// Remove size-1 dimensions; all of them if `axes` is empty
    ///
    /// # Panics
    ///
    /// Panics if an axis is out of range or names a dimension whose size is
    /// not 1.
    #[track_caller]
    pub fn squeezing_shape(&self, axes: &[isize]) -> Self {
        let shape = self.shape();
        let squeezed: Vec<usize> = if axes.is_empty() {
            (0..shape.rank()).filter(|&k| shape[k] == 1).collect()
        } else {
            ensure_axes(axes, shape.rank(), false, "squeezing_shape")
        };
        for &axis in &squeezed {
            assert_eq!(
                shape[axis], 1,
                "squeezing_shape: dimension {axis} of {shape} has size {}, expected 1",
                shape[axis]
            );
        }
        let dims: Shape = (0..shape.rank())
            .filter(|k| !squeezed.contains(k))
            .map(|k| shape[k])
            .collect();
        self.reshaped(dims)
    }

    // ===== Splitting and joining =====

    /// Slices along `axis`, with that axis removed from each
    #[track_caller]
    pub fn unstacked(&self, axis: isize) -> Result<Vec<Self>> {
        let axis = ensure_axis(axis, self.rank(), "unstacked");
        let count = self.shape()[axis];
        let reduced = self.shape().without_dim(axis);
        Ok(self
            .split_into(&vec![1; count], axis)?
            .into_iter()
            .map(|piece| piece.reshaped(reduced.clone()))
            .collect())
    }

    /// `count` equal pieces along `axis`
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero or does not divide the dimension.
    #[track_caller]
    pub fn split_count(&self, count: usize, axis: isize) -> Result<Vec<Self>> {
        let axis = ensure_axis(axis, self.rank(), "split");
        let size = self.shape()[axis];
        assert!(
            count > 0 && size % count == 0,
            "split: {count} does not evenly divide dimension {axis} of size {size}"
        );
        self.split_into(&vec![size / count; count], axis)
    }

    /// Pieces of the given sizes along `axis`
    ///
    /// # Panics
    ///
    /// Panics if the sizes do not add up to the dimension.
    #[track_caller]
    pub fn split_sizes(&self, sizes: &[usize], axis: isize) -> Result<Vec<Self>> {
        let axis = ensure_axis(axis, self.rank(), "split");
        let size = self.shape()[axis];
        let total: usize = sizes.iter().sum();
        assert_eq!(
            total, size,
            "split: sizes {sizes:?} add up to {total} but dimension {axis} has size {size}"
        );
        self.split_into(sizes, axis)
    }

    fn split_into(&self, sizes: &[usize], axis: usize) -> Result<Vec<Self>> {
        if sizes.is_empty() {
            return Ok(Vec::new());
        }
        let outputs = sizes
            .iter()
            .map(|&s| OutputSpec::new(self.shape().with_dim(axis, s), self.dtype()))
            .collect();
        let handles = dispatch(&Op::Split { axis }, self.device(), &[self.handle()], outputs)?;
        Ok(handles.into_iter().map(Self::from_handle).collect())
    }

    /// Join with `other` along `axis`
    ///
    /// # Panics
    ///
    /// Panics if ranks differ, any other dimension differs, or the tensors
    /// live on different devices or in different precisions.
    #[track_caller]
    pub fn concatenated(&self, other: &Self, axis: isize) -> Result<Self> {
        Self::concatenating(&[self.clone(), other.clone()], axis)
    }

    /// Join a list of tensors along an existing `axis`
    ///
    /// # Panics
    ///
    /// Panics if the list is empty or the tensors disagree outside `axis`.
    #[track_caller]
    pub fn concatenating(tensors: &[Self], axis: isize) -> Result<Self> {
        let Some(first) = tensors.first() else {
            panic!("concatenating: needs at least one tensor");
        };
        let axis = ensure_axis(axis, first.rank(), "concatenating");
        let mut joined = 0;
        for t in tensors {
            first.ensure_compatible(t, "concatenating");
            let matches = t.rank() == first.rank()
                && (0..first.rank()).all(|k| k == axis || t.shape()[k] == first.shape()[k]);
            assert!(
                matches,
                "concatenating: shape {} does not match {} outside axis {axis}",
                t.shape(),
                first.shape()
            );
            joined += t.shape()[axis];
        }

        let handles: Vec<_> = tensors.iter().map(|t| t.handle()).collect();
        let spec = OutputSpec::new(first.shape().with_dim(axis, joined), first.dtype());
        dispatch_one(&Op::Concat { axis }, first.device(), &handles, spec).map(Self::from_handle)
    }

    /// Join a list of equally shaped tensors along a new `axis`
    ///
    /// `axis` may be in `-(rank + 1)..=rank`.
    ///
    /// # Panics
    ///
    /// Panics if the list is empty or the shapes differ.
    #[track_caller]
    pub fn stacking(tensors: &[Self], axis: isize) -> Result<Self> {
        let Some(first) = tensors.first() else {
            panic!("stacking: needs at least one tensor");
        };
        let rank = first.rank();
        let Some(position) = normalize_insert_axis(axis, rank) else {
            panic!(
                "stacking: axis {axis} out of range for rank {rank} (expected -{}..={rank})",
                rank + 1
            );
        };
        for t in tensors {
            assert_eq!(
                t.shape(),
                first.shape(),
                "stacking: shape {} differs from {}",
                t.shape(),
                first.shape()
            );
        }
        let lifted: Vec<Self> = tensors
            .iter()
            .map(|t| t.expanding_shape(&[position as isize]))
            .collect();
        Self::concatenating(&lifted, position as isize)
    }

    // ===== Data movement =====

    /// Repeat the tensor `multiples[i]` times along dimension `i`
    ///
    /// # Panics
    ///
    /// Panics unless there is one multiple per dimension.
    #[track_caller]
    pub fn tiled(&self, multiples: &[usize]) -> Result<Self> {
        assert_eq!(
            multiples.len(),
            self.rank(),
            "tiled: {} multiples for rank {}",
            multiples.len(),
            self.rank()
        );
        let shape: Shape = self.shape().iter().zip(multiples).map(|(d, m)| d * m).collect();
        self.unary_op(
            Op::Tile {
                multiples: multiples.to_vec(),
            },
            shape,
        )
    }

    /// Permute dimensions: result dimension `i` is dimension `permutation[i]`
    ///
    /// # Panics
    ///
    /// Panics unless `permutation` is a permutation of `0..rank` (negative
    /// entries wrap).
    #[track_caller]
    pub fn transposed(&self, permutation: &[isize]) -> Result<Self> {
        let permutation = ensure_permutation(permutation, self.rank(), "transposed");
        let shape: Shape = permutation.iter().map(|&p| self.shape()[p]).collect();
        self.unary_op(Op::Transpose { permutation }, shape)
    }

    /// Reverse the order of all dimensions
    pub fn t(&self) -> Result<Self> {
        let reversed: Vec<isize> = (0..self.rank() as isize).rev().collect();
        self.transposed(&reversed)
    }

    /// Reverse the element order along `axes`
    ///
    /// # Panics
    ///
    /// Panics if an axis is out of range or repeats after normalization.
    #[track_caller]
    pub fn reversed(&self, axes: &[isize]) -> Result<Self> {
        let axes = ensure_axes(axes, self.rank(), true, "reversed");
        self.unary_op(Op::Reverse { axes }, self.shape().clone())
    }

    /// Stretch to `shape` (trailing-aligned, size-1 dims stretch)
    ///
    /// # Panics
    ///
    /// Panics if the shape is not broadcast compatible.
    #[track_caller]
    pub fn broadcasted(&self, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        assert!(
            is_broadcastable_to(self.shape(), &shape),
            "broadcasted: cannot broadcast {} to {shape}",
            self.shape()
        );
        if &shape == self.shape() {
            return Ok(self.clone());
        }
        self.unary_op(Op::BroadcastTo, shape)
    }

    /// Broadcast to the shape of `other`
    #[track_caller]
    pub fn broadcasted_like<U: Element>(&self, other: &Tensor<U, R>) -> Result<Self> {
        self.broadcasted(other.shape())
    }

    /// Rebind `self` to `other` broadcast to `self`'s shape
    #[track_caller]
    pub fn assign_broadcast(&mut self, other: &Self) -> Result<()> {
        *self = other.broadcasted(self.shape())?;
        Ok(())
    }

    /// Grow every dimension by `(before, after)` elements
    ///
    /// # Panics
    ///
    /// Panics unless there is one pair per dimension, or if a mirror
    /// padding exceeds the limit of its mode.
    #[track_caller]
    pub fn padded(&self, paddings: &[(usize, usize)], mode: PaddingMode<T>) -> Result<Self> {
        assert_eq!(
            paddings.len(),
            self.rank(),
            "padded: {} padding pairs for rank {}",
            paddings.len(),
            self.rank()
        );
        let fill = match mode {
            PaddingMode::Constant(value) => PadFill::Constant(self.encode_scalar(value, "padded")),
            PaddingMode::Reflect => PadFill::Mirror(self.ensure_mirror(paddings, MirrorMode::Reflect)),
            PaddingMode::Symmetric => {
                PadFill::Mirror(self.ensure_mirror(paddings, MirrorMode::Symmetric))
            }
        };
        let shape: Shape = self
            .shape()
            .iter()
            .zip(paddings)
            .map(|(&d, &(before, after))| d + before + after)
            .collect();
        self.unary_op(
            Op::Pad {
                paddings: paddings.to_vec(),
                fill,
            },
            shape,
        )
    }

    #[track_caller]
    fn ensure_mirror(&self, paddings: &[(usize, usize)], mode: MirrorMode) -> MirrorMode {
        for (k, (&(before, after), &dim)) in paddings.iter().zip(self.shape().iter()).enumerate() {
            let max = mode.max_padding(dim);
            assert!(
                before <= max && after <= max,
                "padded: {mode:?} padding ({before}, {after}) exceeds {max} for dimension {k} of size {dim}"
            );
        }
        mode
    }

    /// Block of `sizes` elements starting at `lower_bounds`
    ///
    /// # Panics
    ///
    /// Panics unless both lists have one entry per dimension and the block
    /// lies within the tensor.
    #[track_caller]
    pub fn slice(&self, lower_bounds: &[usize], sizes: &[usize]) -> Result<Self> {
        let rank = self.rank();
        assert!(
            lower_bounds.len() == rank && sizes.len() == rank,
            "slice: bounds {lower_bounds:?} and sizes {sizes:?} must both have length {rank}"
        );
        let bounds = lower_bounds.iter().zip(sizes).zip(self.shape().iter());
        for (k, ((&lower, &size), &dim)) in bounds.enumerate() {
            assert!(
                lower + size <= dim,
                "slice: {lower} + {size} exceeds dimension {k} of size {dim}"
            );
        }
        self.unary_op(
            Op::Slice {
                lower_bounds: lower_bounds.to_vec(),
            },
            Shape::new(sizes),
        )
    }

    /// Block between `lower_bounds` (inclusive) and `upper_bounds` (exclusive)
    #[track_caller]
    pub fn slice_bounds(&self, lower_bounds: &[usize], upper_bounds: &[usize]) -> Result<Self> {
        assert_eq!(
            lower_bounds.len(),
            upper_bounds.len(),
            "slice: {lower_bounds:?} and {upper_bounds:?} differ in length"
        );
        let sizes: Vec<usize> = lower_bounds
            .iter()
            .zip(upper_bounds)
            .map(|(&lo, &hi)| {
                assert!(lo <= hi, "slice: lower bound {lo} is above upper bound {hi}");
                hi - lo
            })
            .collect();
        self.slice(lower_bounds, &sizes)
    }

    // ===== Gathering =====

    /// Select slices along `axis` by index
    ///
    /// The result shape is `shape[..axis] ++ indices.shape ++ shape[axis+1..]`.
    /// Index values outside the dimension fail with
    /// [`Error::IndexOutOfBounds`](crate::error::Error::IndexOutOfBounds).
    #[track_caller]
    pub fn gathering<I: IndexElement>(&self, indices: &Tensor<I, R>, axis: isize) -> Result<Self> {
        let axis = ensure_axis(axis, self.rank(), "gathering");
        self.ensure_same_device(indices, "gathering");
        self.gather_rows(indices, axis, 0)
    }

    /// Gather along `axis` with a separate row of indices per batch entry
    ///
    /// The first `batch_dims` dimensions of `indices` must equal those of
    /// `self`; batch entry `b` gathers from `self[b]` with `indices[b]`.
    /// This is TensorFlow's `GatherV2` with `batch_dims`. The result shape is
    /// `shape[..axis] ++ indices.shape[batch_dims..] ++ shape[axis+1..]`, and
    /// with `batch_dims == 0` this is [`gathering`](Self::gathering).
    ///
    /// ```
    /// # use difftensor::prelude::*;
    /// # let device = CpuDevice::new();
    /// let x = Tensor::<f32>::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], &device)?;
    /// let indices = Tensor::<i32>::from_slice(&[2, 0, 1, 1], &[2, 2], &device)?;
    /// let picked = x.batch_gathering(&indices, 1, 1)?;
    /// assert_eq!(picked.scalars()?, vec![3.0, 1.0, 5.0, 5.0]);
    /// # Ok::<(), difftensor::error::Error>(())
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `batch_dims` exceeds `axis` or the rank of `indices`, or if
    /// the batch dimensions of `indices` and `self` differ.
    #[track_caller]
    pub fn batch_gathering<I: IndexElement>(
        &self,
        indices: &Tensor<I, R>,
        axis: isize,
        batch_dims: usize,
    ) -> Result<Self> {
        let axis = ensure_axis(axis, self.rank(), "batch_gathering");
        self.ensure_same_device(indices, "batch_gathering");
        assert!(
            batch_dims <= axis && batch_dims <= indices.rank(),
            "batch_gathering: {batch_dims} batch dimensions with axis {axis} and indices of rank {}",
            indices.rank()
        );
        assert!(
            indices.shape()[..batch_dims] == self.shape()[..batch_dims],
            "batch_gathering: indices {} and params {} differ in the first {batch_dims} dimensions",
            indices.shape(),
            self.shape()
        );
        self.gather_rows(indices, axis, batch_dims)
    }

    fn gather_rows<I: IndexElement>(
        &self,
        indices: &Tensor<I, R>,
        axis: usize,
        batch_dims: usize,
    ) -> Result<Self> {
        let shape: Shape = self.shape()[..axis]
            .iter()
            .chain(&indices.shape()[batch_dims..])
            .chain(&self.shape()[axis + 1..])
            .copied()
            .collect();
        let spec = OutputSpec::new(shape, self.dtype());
        dispatch_one(
            &Op::Gather { axis, batch_dims },
            self.device(),
            &[self.handle(), indices.handle()],
            spec,
        )
        .map(Self::from_handle)
    }

    /// Keep the positions along `axis` where `mask` is set
    ///
    /// `mask` covers the dimensions `axis..axis + mask.rank()`; those
    /// dimensions collapse into one holding the selected entries.
    ///
    /// # Panics
    ///
    /// Panics if the mask shape does not match those dimensions.
    #[track_caller]
    pub fn gathering_where(&self, mask: &Tensor<bool, R>, axis: isize) -> Result<Self> {
        let axis = ensure_axis(axis, self.rank(), "gathering_where");
        let end = axis + mask.rank();
        assert!(
            mask.rank() > 0 && end <= self.rank() && mask.shape()[..] == self.shape()[axis..end],
            "gathering_where: mask {} does not cover dimensions {axis}.. of {}",
            mask.shape(),
            self.shape()
        );
        let collapsed: Shape = self.shape()[..axis]
            .iter()
            .copied()
            .chain(std::iter::once(mask.scalar_count()))
            .chain(self.shape()[end..].iter().copied())
            .collect();
        let positions = mask.flattened().non_zero_indices()?.flattened();
        self.reshaped(collapsed).gathering(&positions, axis as isize)
    }

    /// Coordinates of all non-zero elements as a `[count, rank]` tensor
    pub fn non_zero_indices(&self) -> Result<Tensor<i64, R>> {
        let count = self.scalars()?.into_iter().filter(|v| !v.is_zero()).count();
        let spec = OutputSpec::new([count, self.rank()], DType::I64);
        dispatch_one(&Op::Where, self.device(), &[self.handle()], spec).map(Tensor::from_handle)
    }

    // ===== Shape arguments held in tensors =====
    //
    // Each reads its i32 argument back to the host and defers to the
    // slice-taking form, so gradients go through the matching `vjp_*`.

    /// [`reshaped`](Self::reshaped) with the shape in a rank-1 tensor
    ///
    /// One entry may be `-1`; that dimension is inferred from the element
    /// count.
    ///
    /// # Panics
    ///
    /// Panics on other negative entries, on more than one `-1`, or if the
    /// element counts cannot match.
    #[track_caller]
    pub fn reshaped_to_tensor(&self, shape: &Tensor<i32, R>) -> Result<Self> {
        let dims = shape_argument(shape, "reshaped")?;
        let inferred: Vec<usize> = dims
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == -1)
            .map(|(i, _)| i)
            .collect();
        assert!(inferred.len() <= 1, "reshaped: more than one inferred dimension in {dims:?}");
        let known: usize = dims
            .iter()
            .filter(|&&d| d != -1)
            .map(|&d| non_negative(d, "reshaped"))
            .product();
        let mut resolved: Vec<usize> = dims
            .iter()
            .map(|&d| if d == -1 { 0 } else { non_negative(d, "reshaped") })
            .collect();
        if let Some(&at) = inferred.first() {
            let count = self.scalar_count();
            assert!(
                known != 0 && count % known == 0,
                "reshaped: cannot infer a dimension of {dims:?} for {count} elements"
            );
            resolved[at] = count / known;
        }
        Ok(self.reshaped(resolved))
    }

    /// [`split_sizes`](Self::split_sizes) with the sizes in a rank-1 tensor
    #[track_caller]
    pub fn split_sizes_tensor(&self, sizes: &Tensor<i32, R>, axis: isize) -> Result<Vec<Self>> {
        let sizes = dims_argument(sizes, "split_sizes")?;
        self.split_sizes(&sizes, axis)
    }

    /// [`tiled`](Self::tiled) with the multiples in a rank-1 tensor
    #[track_caller]
    pub fn tiled_by_tensor(&self, multiples: &Tensor<i32, R>) -> Result<Self> {
        let multiples = dims_argument(multiples, "tiled")?;
        self.tiled(&multiples)
    }

    /// [`transposed`](Self::transposed) with the permutation in a rank-1 tensor
    #[track_caller]
    pub fn transposed_by_tensor(&self, permutation: &Tensor<i32, R>) -> Result<Self> {
        let permutation = shape_argument(permutation, "transposed")?;
        self.transposed(&permutation)
    }

    /// [`broadcasted`](Self::broadcasted) with the shape in a rank-1 tensor
    #[track_caller]
    pub fn broadcasted_to_tensor(&self, shape: &Tensor<i32, R>) -> Result<Self> {
        let shape = dims_argument(shape, "broadcasted")?;
        self.broadcasted(shape)
    }

    /// [`slice`](Self::slice) with bounds and sizes in rank-1 tensors
    #[track_caller]
    pub fn slice_by_tensors(
        &self,
        lower_bounds: &Tensor<i32, R>,
        sizes: &Tensor<i32, R>,
    ) -> Result<Self> {
        let lower_bounds = dims_argument(lower_bounds, "slice")?;
        let sizes = dims_argument(sizes, "slice")?;
        self.slice(&lower_bounds, &sizes)
    }

    /// Bytes of one element in this tensor's physical dtype
    #[track_caller]
    pub(crate) fn encode_scalar(&self, value: T, op: &str) -> Vec<u8> {
        if !self.is_reduced_precision() {
            return encode(std::slice::from_ref(&value)).to_vec();
        }
        match value.to_reduced() {
            Some(reduced) => encode(std::slice::from_ref(&reduced)).to_vec(),
            None => panic!("{op}: {} has no reduced precision form", T::DTYPE),
        }
    }
}

/// Host copy of a rank-0 or rank-1 `i32` argument tensor
#[track_caller]
fn shape_argument<R: Runtime>(argument: &Tensor<i32, R>, op: &str) -> Result<Vec<isize>> {
    assert!(
        argument.rank() <= 1,
        "{op}: argument tensor must have rank 0 or 1, got {}",
        argument.shape()
    );
    Ok(argument.scalars()?.into_iter().map(|v| v as isize).collect())
}

#[track_caller]
fn dims_argument<R: Runtime>(argument: &Tensor<i32, R>, op: &str) -> Result<Vec<usize>> {
    Ok(shape_argument(argument, op)?
        .into_iter()
        .map(|v| non_negative(v, op))
        .collect())
}

#[track_caller]
fn non_negative(value: isize, op: &str) -> usize {
    match usize::try_from(value) {
        Ok(v) => v,
        Err(_) => panic!("{op}: negative size {value} in argument tensor"),
    }
}

impl<T: NumericElement, R: Runtime> Tensor<T, R> {
    /// Sum away broadcast dimensions to reach `shape`
    ///
    /// `shape` is trailing-aligned with `self.shape()`. Leading dimensions
    /// are summed away, and so is every dimension where `shape` has size 1.
    ///
    /// # Panics
    ///
    /// Panics if `shape` is longer than this tensor's shape or has a
    /// dimension that is neither equal nor 1.
    #[track_caller]
    pub fn unbroadcasted(&self, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        let Some(axes) = unbroadcast_axes(self.shape(), &shape) else {
            panic!("unbroadcasted: cannot reduce {} to {shape}", self.shape());
        };
        if axes.is_empty() {
            return Ok(self.reshaped(shape));
        }
        Ok(self.sum_keeping(axes)?.reshaped(shape))
    }

    /// Unbroadcast to the shape of `other`
    #[track_caller]
    pub fn unbroadcasted_like<U: Element>(&self, other: &Tensor<U, R>) -> Result<Self> {
        self.unbroadcasted(other.shape())
    }

    /// Add update slices into zeros of `shape` at `indices` along `axis`
    ///
    /// The inverse movement of [`batch_gathering`](Self::batch_gathering);
    /// repeated indices accumulate.
    pub(crate) fn scatter_added<I: IndexElement>(
        &self,
        indices: &Tensor<I, R>,
        axis: usize,
        batch_dims: usize,
        shape: Shape,
    ) -> Result<Self> {
        let spec = OutputSpec::new(shape, self.dtype());
        dispatch_one(
            &Op::ScatterAdd { axis, batch_dims },
            self.device(),
            &[self.handle(), indices.handle()],
            spec,
        )
        .map(Self::from_handle)
    }

    /// Fold the gradient of a mirror pad back onto the unpadded `shape`
    pub(crate) fn mirror_pad_folded(
        &self,
        paddings: &[(usize, usize)],
        mode: MirrorMode,
        shape: Shape,
    ) -> Result<Self> {
        self.unary_op(
            Op::MirrorPadGrad {
                paddings: paddings.to_vec(),
                mode,
            },
            shape,
        )
    }
}
