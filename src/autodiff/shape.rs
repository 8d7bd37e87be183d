//! Pullbacks of shape manipulation and data movement
//!
//! Each of these operations only moves elements around, so each pullback
//! moves the cotangent back: reshape undoes reshape, split undoes concat,
//! scatter-add undoes gather, and summing undoes replication (tile,
//! broadcast, mirror pad).

use super::{TensorPair, TensorVjp, Pullback, ValueWithPullback, linear, materialize};
use crate::dtype::{FloatElement, IndexElement};
use crate::error::Result;
use crate::ops::validate::{ensure_axis, ensure_permutation, normalize_insert_axis};
use crate::ops::invert_permutation;
use crate::runtime::Runtime;
use crate::tensor::{PaddingMode, Shape, Tensor};

/// Join list cotangents of `shapes` back into one tensor of `original`
fn joining_pullback<T, R, F>(
    shapes: Vec<Shape>,
    original: Shape,
    reduced: bool,
    device: R::Device,
    join: F,
) -> Pullback<Vec<Tensor<T, R>>, Tensor<T, R>>
where
    T: FloatElement,
    R: Runtime,
    F: Fn(&[Tensor<T, R>]) -> Result<Tensor<T, R>> + Send + Sync + 'static,
{
    Pullback::new(move |cotangents: Vec<Tensor<T, R>>| {
        if cotangents.is_empty() {
            let count = original.contiguous_size();
            return Tensor::from_slice_with_precision(&vec![T::zero(); count], &original, reduced, &device);
        }
        assert_eq!(
            cotangents.len(),
            shapes.len(),
            "pullback: {} cotangents for {} outputs",
            cotangents.len(),
            shapes.len()
        );
        let pieces = cotangents
            .iter()
            .zip(&shapes)
            .map(|(c, shape)| materialize(c, shape, &device))
            .collect::<Result<Vec<_>>>()?;
        join(&pieces)
    })
}

impl<T: FloatElement, R: Runtime> Tensor<T, R> {
    /// Pullback that reshapes the cotangent to this tensor's shape
    fn relabel_vjp(&self, value: Self) -> TensorVjp<T, R> {
        let shape = self.shape().clone();
        ValueWithPullback::new(value, linear(move |v: Self| Ok(v.reshaped(shape.clone()))))
    }

    /// [`unstacked`](Self::unstacked) with its pullback
    ///
    /// Gradient: stack the slice cotangents back along `axis`.
    #[track_caller]
    pub fn vjp_unstacked(
        &self,
        axis: isize,
    ) -> Result<ValueWithPullback<Vec<Self>, Vec<Self>, Self>> {
        let value = self.unstacked(axis)?;
        let axis = ensure_axis(axis, self.rank(), "unstacked");
        let shapes = value.iter().map(|t| t.shape().clone()).collect();
        let pullback = joining_pullback(
            shapes,
            self.shape().clone(),
            self.is_reduced_precision(),
            self.device().clone(),
            move |pieces| Self::stacking(pieces, axis as isize),
        );
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`split_count`](Self::split_count) with its pullback
    ///
    /// Gradient: concatenate the piece cotangents along `axis`.
    #[track_caller]
    pub fn vjp_split_count(
        &self,
        count: usize,
        axis: isize,
    ) -> Result<ValueWithPullback<Vec<Self>, Vec<Self>, Self>> {
        let value = self.split_count(count, axis)?;
        Ok(self.split_vjp(value, axis))
    }

    /// [`split_sizes`](Self::split_sizes) with its pullback
    ///
    /// Gradient: concatenate the piece cotangents along `axis`.
    #[track_caller]
    pub fn vjp_split_sizes(
        &self,
        sizes: &[usize],
        axis: isize,
    ) -> Result<ValueWithPullback<Vec<Self>, Vec<Self>, Self>> {
        let value = self.split_sizes(sizes, axis)?;
        Ok(self.split_vjp(value, axis))
    }

    fn split_vjp(
        &self,
        value: Vec<Self>,
        axis: isize,
    ) -> ValueWithPullback<Vec<Self>, Vec<Self>, Self> {
        let shapes = value.iter().map(|t| t.shape().clone()).collect();
        let pullback = joining_pullback(
            shapes,
            self.shape().clone(),
            self.is_reduced_precision(),
            self.device().clone(),
            move |pieces| Self::concatenating(pieces, axis),
        );
        ValueWithPullback::new(value, pullback)
    }

    /// [`tiled`](Self::tiled) with its pullback
    ///
    /// Gradient: view the cotangent as `[m0, d0, m1, d1, ...]` and sum over
    /// the tile axes `m_i`.
    #[track_caller]
    pub fn vjp_tiled(&self, multiples: &[usize]) -> Result<TensorVjp<T, R>> {
        let value = self.tiled(multiples)?;
        let split: Vec<usize> = multiples
            .iter()
            .zip(self.shape().iter())
            .flat_map(|(&m, &d)| [m, d])
            .collect();
        let tile_axes: Vec<isize> = (0..self.rank() as isize).map(|k| 2 * k).collect();
        let pullback = linear(move |v: Self| v.reshaped(split.clone()).sum_squeezing_axes(&tile_axes));
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`reshaped`](Self::reshaped) with its pullback
    ///
    /// Gradient: reshape the cotangent to the original shape.
    #[track_caller]
    pub fn vjp_reshaped(&self, shape: impl Into<Shape>) -> Result<TensorVjp<T, R>> {
        Ok(self.relabel_vjp(self.reshaped(shape)))
    }

    /// [`flattened`](Self::flattened) with its pullback
    pub fn vjp_flattened(&self) -> Result<TensorVjp<T, R>> {
        Ok(self.relabel_vjp(self.flattened()))
    }

    /// [`expanding_shape`](Self::expanding_shape) with its pullback
    ///
    /// Gradient: drop the inserted dimensions again.
    #[track_caller]
    pub fn vjp_expanding_shape(&self, axes: &[isize]) -> Result<TensorVjp<T, R>> {
        Ok(self.relabel_vjp(self.expanding_shape(axes)))
    }

    /// [`rank_lifted`](Self::rank_lifted) with its pullback
    pub fn vjp_rank_lifted(&self) -> Result<TensorVjp<T, R>> {
        Ok(self.relabel_vjp(self.rank_lifted()))
    }

    /// [`squeezing_shape`](Self::squeezing_shape) with its pullback
    ///
    /// Gradient: reshape the cotangent to the original shape.
    #[track_caller]
    pub fn vjp_squeezing_shape(&self, axes: &[isize]) -> Result<TensorVjp<T, R>> {
        Ok(self.relabel_vjp(self.squeezing_shape(axes)))
    }

    /// [`transposed`](Self::transposed) with its pullback
    ///
    /// Gradient: transpose the cotangent by the inverse permutation.
    #[track_caller]
    pub fn vjp_transposed(&self, permutation: &[isize]) -> Result<TensorVjp<T, R>> {
        let value = self.transposed(permutation)?;
        let normalized = ensure_permutation(permutation, self.rank(), "transposed");
        let inverse: Vec<isize> = invert_permutation(&normalized)
            .unwrap_or_default()
            .into_iter()
            .map(|p| p as isize)
            .collect();
        Ok(ValueWithPullback::new(value, linear(move |v: Self| v.transposed(&inverse))))
    }

    /// [`t`](Self::t) with its pullback
    ///
    /// Gradient: reverse the cotangent's dimensions again.
    pub fn vjp_t(&self) -> Result<TensorVjp<T, R>> {
        Ok(ValueWithPullback::new(self.t()?, linear(|v: Self| v.t())))
    }

    /// [`reversed`](Self::reversed) with its pullback
    ///
    /// Gradient: reverse the cotangent along the same axes.
    #[track_caller]
    pub fn vjp_reversed(&self, axes: &[isize]) -> Result<TensorVjp<T, R>> {
        let value = self.reversed(axes)?;
        let axes = axes.to_vec();
        Ok(ValueWithPullback::new(value, linear(move |v: Self| v.reversed(&axes))))
    }

    /// [`concatenated`](Self::concatenated) with its pullback
    ///
    /// Gradient: split the cotangent along `axis` at the original sizes.
    #[track_caller]
    pub fn vjp_concatenated(
        &self,
        other: &Self,
        axis: isize,
    ) -> Result<ValueWithPullback<Self, Self, TensorPair<T, R>>> {
        let value = self.concatenated(other, axis)?;
        let k = ensure_axis(axis, self.rank(), "concatenating");
        let sizes = [self.shape()[k], other.shape()[k]];
        let pullback = Pullback::new(move |v: Self| {
            if v.is_scalar_zero() {
                return Ok((v.clone(), v));
            }
            let mut pieces = v.split_sizes(&sizes, axis)?.into_iter();
            match (pieces.next(), pieces.next()) {
                (Some(a), Some(b)) => Ok((a, b)),
                _ => unreachable!("split into two sizes yields two pieces"),
            }
        });
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`concatenating`](Self::concatenating) with its pullback
    ///
    /// Gradient: split the cotangent along `axis` at the original sizes.
    #[track_caller]
    pub fn vjp_concatenating(
        tensors: &[Self],
        axis: isize,
    ) -> Result<ValueWithPullback<Self, Self, Vec<Self>>> {
        let value = Self::concatenating(tensors, axis)?;
        let k = ensure_axis(axis, value.rank(), "concatenating");
        let sizes: Vec<usize> = tensors.iter().map(|t| t.shape()[k]).collect();
        let pullback = Pullback::new(move |v: Self| {
            if v.is_scalar_zero() {
                return Ok(vec![v; sizes.len()]);
            }
            v.split_sizes(&sizes, axis)
        });
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`stacking`](Self::stacking) with its pullback
    ///
    /// Gradient: unstack the cotangent along the new axis.
    #[track_caller]
    pub fn vjp_stacking(
        tensors: &[Self],
        axis: isize,
    ) -> Result<ValueWithPullback<Self, Self, Vec<Self>>> {
        let value = Self::stacking(tensors, axis)?;
        let count = tensors.len();
        let position = normalize_insert_axis(axis, value.rank() - 1).unwrap_or_default();
        let pullback = Pullback::new(move |v: Self| {
            if v.is_scalar_zero() {
                return Ok(vec![v; count]);
            }
            v.unstacked(position as isize)
        });
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`gathering`](Self::gathering) with its pullback
    ///
    /// Gradient: scatter-add the cotangent slices back to the gathered
    /// positions; repeated indices accumulate.
    #[track_caller]
    pub fn vjp_gathering<I: IndexElement>(
        &self,
        indices: &Tensor<I, R>,
        axis: isize,
    ) -> Result<TensorVjp<T, R>> {
        let value = self.gathering(indices, axis)?;
        let axis = ensure_axis(axis, self.rank(), "gathering");
        let indices = indices.clone();
        let shape = self.shape().clone();
        let pullback = linear(move |v: Self| v.scatter_added(&indices, axis, 0, shape.clone()));
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`batch_gathering`](Self::batch_gathering) with its pullback
    ///
    /// Gradient: each batch entry scatter-adds its cotangent slices back
    /// with its own row of indices.
    #[track_caller]
    pub fn vjp_batch_gathering<I: IndexElement>(
        &self,
        indices: &Tensor<I, R>,
        axis: isize,
        batch_dims: usize,
    ) -> Result<TensorVjp<T, R>> {
        let value = self.batch_gathering(indices, axis, batch_dims)?;
        let axis = ensure_axis(axis, self.rank(), "batch_gathering");
        let indices = indices.clone();
        let shape = self.shape().clone();
        let pullback =
            linear(move |v: Self| v.scatter_added(&indices, axis, batch_dims, shape.clone()));
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`broadcasted`](Self::broadcasted) with its pullback
    ///
    /// Gradient: sum the cotangent over the broadcast dimensions.
    #[track_caller]
    pub fn vjp_broadcasted(&self, shape: impl Into<Shape>) -> Result<TensorVjp<T, R>> {
        let value = self.broadcasted(shape)?;
        let original = self.shape().clone();
        Ok(ValueWithPullback::new(
            value,
            linear(move |v: Self| v.unbroadcasted(original.clone())),
        ))
    }

    /// [`unbroadcasted`](Self::unbroadcasted) with its pullback
    ///
    /// Gradient: broadcast the cotangent back to the original shape.
    #[track_caller]
    pub fn vjp_unbroadcasted(&self, shape: impl Into<Shape>) -> Result<TensorVjp<T, R>> {
        let value = self.unbroadcasted(shape)?;
        let original = self.shape().clone();
        Ok(ValueWithPullback::new(
            value,
            linear(move |v: Self| v.broadcasted(original.clone())),
        ))
    }

    /// [`padded`](Self::padded) with its pullback
    ///
    /// Gradient: for constant padding, the interior slice of the cotangent;
    /// for mirror padding, the cotangent with every mirrored border element
    /// added back onto its source.
    #[track_caller]
    pub fn vjp_padded(
        &self,
        paddings: &[(usize, usize)],
        mode: PaddingMode<T>,
    ) -> Result<TensorVjp<T, R>> {
        let value = self.padded(paddings, mode)?;
        let paddings = paddings.to_vec();
        let shape = self.shape().clone();
        let pullback = match mode.mirror() {
            None => linear(move |v: Self| {
                let lower: Vec<usize> = paddings.iter().map(|&(before, _)| before).collect();
                v.slice(&lower, &shape)
            }),
            Some(mirror) => {
                linear(move |v: Self| v.mirror_pad_folded(&paddings, mirror, shape.clone()))
            }
        };
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`slice`](Self::slice) with its pullback
    ///
    /// Gradient: zero-pad the cotangent back to the original shape.
    #[track_caller]
    pub fn vjp_slice(&self, lower_bounds: &[usize], sizes: &[usize]) -> Result<TensorVjp<T, R>> {
        let value = self.slice(lower_bounds, sizes)?;
        let paddings: Vec<(usize, usize)> = lower_bounds
            .iter()
            .zip(sizes)
            .zip(self.shape().iter())
            .map(|((&lower, &size), &dim)| (lower, dim - lower - size))
            .collect();
        let pullback =
            linear(move |v: Self| v.padded(&paddings, PaddingMode::Constant(T::zero())));
        Ok(ValueWithPullback::new(value, pullback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::AdditiveArithmetic;
    use crate::runtime::cpu::CpuDevice;

    fn range(shape: &[usize]) -> Tensor<f64> {
        let n: usize = shape.iter().product();
        let data: Vec<f64> = (0..n).map(|i| i as f64).collect();
        Tensor::from_slice(&data, shape, &CpuDevice::new()).unwrap()
    }

    fn ones(shape: &[usize]) -> Tensor<f64> {
        Tensor::repeating(1.0, shape, &CpuDevice::new()).unwrap()
    }

    #[test]
    fn test_tiled_pullback_sums_copies() {
        let x = range(&[2, 3]);
        let y = x.vjp_tiled(&[2, 1]).unwrap();
        assert_eq!(y.value.shape(), &[4, 3]);
        let grad = y.pullback.apply(range(&[4, 3])).unwrap();
        // rows 0 and 2, rows 1 and 3 land on the same source row
        assert_eq!(grad.scalars().unwrap(), vec![6.0, 8.0, 10.0, 12.0, 14.0, 16.0]);
    }

    #[test]
    fn test_split_pullback_with_unused_piece() {
        let x = range(&[2, 4]);
        let y = x.vjp_split_count(2, 1).unwrap();
        let zero = Tensor::<f64>::zero().unwrap();
        let grad = y.pullback.apply(vec![ones(&[2, 2]), zero]).unwrap();
        assert_eq!(grad.shape(), &[2, 4]);
        assert_eq!(grad.scalars().unwrap(), vec![1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_list_cotangent_is_zero() {
        let x = range(&[3, 2]);
        let y = x.vjp_unstacked(0).unwrap();
        let grad = y.pullback.apply(Vec::new()).unwrap();
        assert_eq!(grad.scalars().unwrap(), vec![0.0; 6]);
    }

    #[test]
    fn test_transposed_pullback_uses_inverse() {
        let x = range(&[2, 3, 4]);
        let y = x.vjp_transposed(&[2, 0, 1]).unwrap();
        assert_eq!(y.value.shape(), &[4, 2, 3]);
        let grad = y.pullback.apply(y.value.clone()).unwrap();
        assert_eq!(grad, x);
    }

    #[test]
    fn test_gathering_pullback_accumulates_repeats() {
        let device = CpuDevice::new();
        let x = range(&[3]);
        let indices = Tensor::<i32>::from_slice(&[0, 2, 0], &[3], &device).unwrap();
        let y = x.vjp_gathering(&indices, 0).unwrap();
        assert_eq!(y.value.scalars().unwrap(), vec![0.0, 2.0, 0.0]);
        let grad = y.pullback.apply(ones(&[3])).unwrap();
        assert_eq!(grad.scalars().unwrap(), vec![2.0, 0.0, 1.0]);
    }

    #[test]
    fn test_batch_gathering_pullback_keeps_rows_apart() {
        let device = CpuDevice::new();
        let x = range(&[2, 3]);
        // both rows pick column 0 twice; the gradients must not mix
        let indices = Tensor::<i64>::from_slice(&[0, 0, 2, 0], &[2, 2], &device).unwrap();
        let y = x.vjp_batch_gathering(&indices, 1, 1).unwrap();
        assert_eq!(y.value.scalars().unwrap(), vec![0.0, 0.0, 5.0, 3.0]);
        let grad = y.pullback.apply(range(&[2, 2])).unwrap();
        assert_eq!(grad.scalars().unwrap(), vec![1.0, 0.0, 0.0, 3.0, 0.0, 2.0]);
    }

    #[test]
    fn test_mirror_pad_pullback() {
        let x = range(&[3]);
        let y = x.vjp_padded(&[(2, 1)], PaddingMode::Reflect).unwrap();
        // [2, 1 | 0, 1, 2 | 1]
        assert_eq!(y.value.scalars().unwrap(), vec![2.0, 1.0, 0.0, 1.0, 2.0, 1.0]);
        let grad = y.pullback.apply(ones(&[6])).unwrap();
        assert_eq!(grad.scalars().unwrap(), vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_slice_pullback_pads_with_zeros() {
        let x = range(&[4]);
        let y = x.vjp_slice(&[1], &[2]).unwrap();
        let grad = y.pullback.apply(ones(&[2])).unwrap();
        assert_eq!(grad.scalars().unwrap(), vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_concatenated_pullback_splits() {
        let a = range(&[2, 1]);
        let b = range(&[2, 2]);
        let y = a.vjp_concatenated(&b, 1).unwrap();
        let (ga, gb) = y.pullback.apply(range(&[2, 3])).unwrap();
        assert_eq!(ga.scalars().unwrap(), vec![0.0, 3.0]);
        assert_eq!(gb.scalars().unwrap(), vec![1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_zero_cotangent_passes_through() {
        let y = range(&[2, 2]).vjp_broadcasted([3, 2, 2]).unwrap();
        let zero = Tensor::<f64>::zero().unwrap();
        let grad = y.pullback.apply(zero).unwrap();
        assert!(grad.is_scalar_zero());
    }
}
