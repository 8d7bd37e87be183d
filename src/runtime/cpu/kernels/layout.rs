//! Data movement kernels
//!
//! These only move whole elements around, so they work on raw bytes with an
//! element size and never look at the dtype.

use super::{IndexRows, for_each_index, offset_of};
use crate::ops::MirrorMode;

#[inline]
fn copy_element(dst: &mut [u8], dst_index: usize, src: &[u8], src_index: usize, elem: usize) {
    dst[dst_index * elem..(dst_index + 1) * elem]
        .copy_from_slice(&src[src_index * elem..(src_index + 1) * elem]);
}

/// Output dim `k` reads input dim `permutation[k]`
pub(crate) fn transpose(
    src: &[u8],
    in_shape: &[usize],
    dst: &mut [u8],
    out_shape: &[usize],
    permutation: &[usize],
    elem: usize,
) {
    let in_strides = super::strides(in_shape);
    let permuted: Vec<usize> = permutation.iter().map(|&p| in_strides[p]).collect();
    for_each_index(out_shape, |linear, index| {
        copy_element(dst, linear, src, offset_of(index, &permuted), elem);
    });
}

pub(crate) fn reverse(src: &[u8], shape: &[usize], dst: &mut [u8], axes: &[usize], elem: usize) {
    let strides = super::strides(shape);
    let mut flipped = vec![false; shape.len()];
    for &axis in axes {
        flipped[axis] = true;
    }
    for_each_index(shape, |linear, index| {
        let source: usize = index
            .iter()
            .enumerate()
            .map(|(k, &i)| {
                let i = if flipped[k] { shape[k] - 1 - i } else { i };
                i * strides[k]
            })
            .sum();
        copy_element(dst, linear, src, source, elem);
    });
}

pub(crate) fn slice(
    src: &[u8],
    in_shape: &[usize],
    dst: &mut [u8],
    out_shape: &[usize],
    lower_bounds: &[usize],
    elem: usize,
) {
    let in_strides = super::strides(in_shape);
    for_each_index(out_shape, |linear, index| {
        let source: usize = index
            .iter()
            .zip(lower_bounds)
            .zip(&in_strides)
            .map(|((&i, &lo), &stride)| (i + lo) * stride)
            .sum();
        copy_element(dst, linear, src, source, elem);
    });
}

/// Position in an unpadded dimension of size `n` that padded coordinate
/// `i - before` mirrors
#[inline]
pub(crate) fn mirror_coordinate(shifted: isize, n: usize, mode: MirrorMode) -> usize {
    let n = n as isize;
    let source = if shifted < 0 {
        match mode {
            MirrorMode::Reflect => -shifted,
            MirrorMode::Symmetric => -shifted - 1,
        }
    } else if shifted >= n {
        match mode {
            MirrorMode::Reflect => 2 * (n - 1) - shifted,
            MirrorMode::Symmetric => 2 * n - 1 - shifted,
        }
    } else {
        shifted
    };
    source as usize
}

pub(crate) fn pad_constant(
    src: &[u8],
    in_shape: &[usize],
    dst: &mut [u8],
    out_shape: &[usize],
    paddings: &[(usize, usize)],
    fill: &[u8],
) {
    let elem = fill.len();
    let in_strides = super::strides(in_shape);
    for_each_index(out_shape, |linear, index| {
        let mut source = 0;
        for (k, &i) in index.iter().enumerate() {
            let before = paddings[k].0;
            if i < before || i - before >= in_shape[k] {
                dst[linear * elem..(linear + 1) * elem].copy_from_slice(fill);
                return;
            }
            source += (i - before) * in_strides[k];
        }
        copy_element(dst, linear, src, source, elem);
    });
}

pub(crate) fn pad_mirror(
    src: &[u8],
    in_shape: &[usize],
    dst: &mut [u8],
    out_shape: &[usize],
    paddings: &[(usize, usize)],
    mode: MirrorMode,
    elem: usize,
) {
    let in_strides = super::strides(in_shape);
    for_each_index(out_shape, |linear, index| {
        let source: usize = index
            .iter()
            .enumerate()
            .map(|(k, &i)| {
                let shifted = i as isize - paddings[k].0 as isize;
                mirror_coordinate(shifted, in_shape[k], mode) * in_strides[k]
            })
            .sum();
        copy_element(dst, linear, src, source, elem);
    });
}

/// Outer block count and inner block size around `axis`
#[inline]
fn blocks(shape: &[usize], axis: usize) -> (usize, usize) {
    let outer = shape[..axis].iter().product();
    let inner = shape[axis + 1..].iter().product();
    (outer, inner)
}

pub(crate) fn concat(
    parts: &[(&[u8], &[usize])],
    dst: &mut [u8],
    out_shape: &[usize],
    axis: usize,
    elem: usize,
) {
    let (outer, inner) = blocks(out_shape, axis);
    let row = out_shape[axis] * inner * elem;
    let mut axis_offset = 0;

    for (src, shape) in parts {
        let chunk = shape[axis] * inner * elem;
        for o in 0..outer {
            let dst_start = o * row + axis_offset * inner * elem;
            dst[dst_start..dst_start + chunk].copy_from_slice(&src[o * chunk..(o + 1) * chunk]);
        }
        axis_offset += shape[axis];
    }
}

pub(crate) fn split(
    src: &[u8],
    in_shape: &[usize],
    parts: &mut [(&mut [u8], &[usize])],
    axis: usize,
    elem: usize,
) {
    let (outer, inner) = blocks(in_shape, axis);
    let row = in_shape[axis] * inner * elem;
    let mut axis_offset = 0;

    for (dst, shape) in parts.iter_mut() {
        let chunk = shape[axis] * inner * elem;
        for o in 0..outer {
            let src_start = o * row + axis_offset * inner * elem;
            dst[o * chunk..(o + 1) * chunk].copy_from_slice(&src[src_start..src_start + chunk]);
        }
        axis_offset += shape[axis];
    }
}

pub(crate) fn tile(src: &[u8], in_shape: &[usize], dst: &mut [u8], out_shape: &[usize], elem: usize) {
    let in_strides = super::strides(in_shape);
    for_each_index(out_shape, |linear, index| {
        let source: usize = index
            .iter()
            .enumerate()
            .map(|(k, &i)| (i % in_shape[k]) * in_strides[k])
            .sum();
        copy_element(dst, linear, src, source, elem);
    });
}

pub(crate) fn broadcast_to(
    src: &[u8],
    in_shape: &[usize],
    dst: &mut [u8],
    out_shape: &[usize],
    elem: usize,
) {
    let in_strides = super::strides(in_shape);
    let lead = out_shape.len() - in_shape.len();
    for_each_index(out_shape, |linear, index| {
        let source: usize = in_shape
            .iter()
            .enumerate()
            .filter(|&(_, &dim)| dim != 1)
            .map(|(k, _)| index[lead + k] * in_strides[k])
            .sum();
        copy_element(dst, linear, src, source, elem);
    });
}

/// `dst[o, j, i] = params[o, indices[j], i]`
pub(crate) fn gather(
    params: &[u8],
    params_shape: &[usize],
    indices: &IndexRows<'_>,
    dst: &mut [u8],
    axis: usize,
    elem: usize,
) -> crate::error::Result<()> {
    let (outer, inner) = blocks(params_shape, axis);
    let size = params_shape[axis];
    let block = inner * elem;
    let count = indices.row_len();

    for o in 0..outer {
        for (j, &index) in indices.row_for(o, params_shape, axis).iter().enumerate() {
            let i = super::checked_index(index, size)?;
            let src_start = (o * size + i) * block;
            let dst_start = (o * count + j) * block;
            dst[dst_start..dst_start + block].copy_from_slice(&params[src_start..src_start + block]);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transpose_bytes() {
        // [[1, 2, 3], [4, 5, 6]] as u8
        let src = [1u8, 2, 3, 4, 5, 6];
        let mut dst = [0u8; 6];
        transpose(&src, &[2, 3], &mut dst, &[3, 2], &[1, 0], 1);
        assert_eq!(dst, [1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn test_reverse_both_axes() {
        let src = [1u8, 2, 3, 4, 5, 6];
        let mut dst = [0u8; 6];
        reverse(&src, &[2, 3], &mut dst, &[0, 1], 1);
        assert_eq!(dst, [6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_mirror_coordinates() {
        // x = [a, b, c]; reflect pad 2 on each side: c b | a b c | b a
        let reflect: Vec<usize> = (-2..5)
            .map(|i| mirror_coordinate(i, 3, MirrorMode::Reflect))
            .collect();
        assert_eq!(reflect, vec![2, 1, 0, 1, 2, 1, 0]);

        // symmetric: b a | a b c | c b
        let symmetric: Vec<usize> = (-2..5)
            .map(|i| mirror_coordinate(i, 3, MirrorMode::Symmetric))
            .collect();
        assert_eq!(symmetric, vec![1, 0, 0, 1, 2, 2, 1]);
    }

    #[test]
    fn test_pad_constant_bytes() {
        let src = [1u8, 2];
        let mut dst = [0u8; 5];
        pad_constant(&src, &[2], &mut dst, &[5], &[(1, 2)], &[9]);
        assert_eq!(dst, [9, 1, 2, 9, 9]);
    }

    #[test]
    fn test_concat_then_split() {
        let a = [1u8, 2, 3, 4]; // [2, 2]
        let b = [5u8, 6]; // [2, 1]
        let mut joined = [0u8; 6];
        concat(
            &[(&a[..], &[2, 2][..]), (&b[..], &[2, 1][..])],
            &mut joined,
            &[2, 3],
            1,
            1,
        );
        assert_eq!(joined, [1, 2, 5, 3, 4, 6]);

        let mut x = [0u8; 4];
        let mut y = [0u8; 2];
        split(
            &joined,
            &[2, 3],
            &mut [(&mut x[..], &[2, 2][..]), (&mut y[..], &[2, 1][..])],
            1,
            1,
        );
        assert_eq!(x, a);
        assert_eq!(y, b);
    }

    #[test]
    fn test_broadcast_row() {
        let src = [1u8, 2, 3];
        let mut dst = [0u8; 6];
        broadcast_to(&src, &[3], &mut dst, &[2, 3], 1);
        assert_eq!(dst, [1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_gather_rejects_out_of_range() {
        let params = [1u8, 2, 3];
        let mut dst = [0u8; 1];
        let rows = |values: &'static [i64]| IndexRows::new(values, &[1], 0);
        assert!(gather(&params, &[3], &rows(&[3]), &mut dst, 0, 1).is_err());
        assert!(gather(&params, &[3], &rows(&[-1]), &mut dst, 0, 1).is_err());
        gather(&params, &[3], &rows(&[2]), &mut dst, 0, 1).unwrap();
        assert_eq!(dst, [3]);
    }

    #[test]
    fn test_gather_per_batch_rows() {
        // params [[1, 2, 3], [4, 5, 6]], indices [[2, 0], [1, 1]], one batch dim
        let params = [1u8, 2, 3, 4, 5, 6];
        let indices = [2i64, 0, 1, 1];
        let rows = IndexRows::new(&indices, &[2, 2], 1);
        let mut dst = [0u8; 4];
        gather(&params, &[2, 3], &rows, &mut dst, 1, 1).unwrap();
        assert_eq!(dst, [3, 1, 5, 5]);
    }
}
