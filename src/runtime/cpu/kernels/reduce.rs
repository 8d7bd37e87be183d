//! Accumulating kernels: sums, boolean reductions, gradient folds

use super::layout::mirror_coordinate;
use super::{IndexRows, checked_index, for_each_index, offset_of};
use crate::dtype::NumericElement;
use crate::error::Result;
use crate::ops::MirrorMode;

/// Sum over `axes`
///
/// The result holds one element per position of the non-reduced dims, in
/// row-major order, which is the layout of both the kept-dims and the
/// squeezed output shapes.
pub(crate) fn sum<T: NumericElement>(src: &[T], shape: &[usize], axes: &[usize]) -> Vec<T> {
    let mut kept: Vec<usize> = shape.to_vec();
    for &axis in axes {
        kept[axis] = 1;
    }
    let mut kept_strides = super::strides(&kept);
    for &axis in axes {
        kept_strides[axis] = 0;
    }

    let mut out = vec![T::zero(); kept.iter().product()];
    for_each_index(shape, |linear, index| {
        let target = offset_of(index, &kept_strides);
        out[target] = out[target] + src[linear];
    });
    out
}

/// Logical reduction of bool bytes to one value
pub(crate) fn all_any(values: &[bool], all: bool) -> bool {
    if all {
        values.iter().all(|&v| v)
    } else {
        values.iter().any(|&v| v)
    }
}

/// Fold a gradient of a mirror-padded tensor back onto the unpadded shape
pub(crate) fn mirror_pad_grad<T: NumericElement>(
    grad: &[T],
    padded_shape: &[usize],
    out_shape: &[usize],
    paddings: &[(usize, usize)],
    mode: MirrorMode,
) -> Vec<T> {
    let out_strides = super::strides(out_shape);
    let mut out = vec![T::zero(); out_shape.iter().product()];
    for_each_index(padded_shape, |linear, index| {
        let target: usize = index
            .iter()
            .enumerate()
            .map(|(k, &i)| {
                let shifted = i as isize - paddings[k].0 as isize;
                mirror_coordinate(shifted, out_shape[k], mode) * out_strides[k]
            })
            .sum();
        out[target] = out[target] + grad[linear];
    });
    out
}

/// `out[o, row[j], i] += updates[o, j, i]` over a zero output, where `row`
/// is the index row of the batch entry owning `o`
pub(crate) fn scatter_add<T: NumericElement>(
    updates: &[T],
    indices: &IndexRows<'_>,
    out_shape: &[usize],
    axis: usize,
) -> Result<Vec<T>> {
    let outer: usize = out_shape[..axis].iter().product();
    let inner: usize = out_shape[axis + 1..].iter().product();
    let size = out_shape[axis];
    let count = indices.row_len();
    let mut out = vec![T::zero(); out_shape.iter().product()];

    for o in 0..outer {
        for (j, &index) in indices.row_for(o, out_shape, axis).iter().enumerate() {
            let i = checked_index(index, size)?;
            let src = (o * count + j) * inner;
            let dst = (o * size + i) * inner;
            for k in 0..inner {
                out[dst + k] = out[dst + k] + updates[src + k];
            }
        }
    }
    Ok(out)
}
