//! Broadcasting element-wise kernels

use crate::dtype::NumericElement;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Below this many outputs the sequential loop wins over thread dispatch
#[cfg(feature = "rayon")]
const PARALLEL_THRESHOLD: usize = 1 << 14;

/// Binary arithmetic operation kinds
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
}

impl BinaryOp {
    #[inline]
    fn apply<T: NumericElement>(self, a: T, b: T) -> T {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
        }
    }
}

/// Strides of `shape` against a trailing-aligned output of rank `rank`;
/// broadcast (size-1 or missing) dims get stride 0
fn broadcast_strides(shape: &[usize], rank: usize) -> Vec<usize> {
    let own = super::strides(shape);
    let lead = rank - shape.len();
    (0..rank)
        .map(|k| {
            if k < lead || shape[k - lead] == 1 {
                0
            } else {
                own[k - lead]
            }
        })
        .collect()
}

/// Offset into a broadcast operand for a linear output position
#[inline]
fn source_offset(mut linear: usize, out_shape: &[usize], strides: &[usize]) -> usize {
    let mut offset = 0;
    for k in (0..out_shape.len()).rev() {
        let dim = out_shape[k];
        offset += (linear % dim) * strides[k];
        linear /= dim;
    }
    offset
}

/// Evaluate `f(a[i'], b[i''])` for every output position
fn zip_broadcast<T, U, F>(
    a: &[T],
    a_shape: &[usize],
    b: &[T],
    b_shape: &[usize],
    out_shape: &[usize],
    f: F,
) -> Vec<U>
where
    T: NumericElement,
    U: Send,
    F: Fn(T, T) -> U + Sync,
{
    let rank = out_shape.len();
    let a_strides = broadcast_strides(a_shape, rank);
    let b_strides = broadcast_strides(b_shape, rank);
    let total: usize = out_shape.iter().product();

    let at = |i: usize| {
        f(
            a[source_offset(i, out_shape, &a_strides)],
            b[source_offset(i, out_shape, &b_strides)],
        )
    };

    #[cfg(feature = "rayon")]
    {
        if total >= PARALLEL_THRESHOLD {
            return (0..total).into_par_iter().map(&at).collect();
        }
    }

    (0..total).map(&at).collect()
}

pub(crate) fn binary<T: NumericElement>(
    op: BinaryOp,
    a: &[T],
    a_shape: &[usize],
    b: &[T],
    b_shape: &[usize],
    out_shape: &[usize],
) -> Vec<T> {
    zip_broadcast(a, a_shape, b, b_shape, out_shape, |x, y| op.apply(x, y))
}

/// Element-wise (in)equality
pub(crate) fn compare<T: NumericElement>(
    equal: bool,
    a: &[T],
    a_shape: &[usize],
    b: &[T],
    b_shape: &[usize],
    out_shape: &[usize],
) -> Vec<bool> {
    zip_broadcast(a, a_shape, b, b_shape, out_shape, |x, y| (x == y) == equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_shape() {
        let out = binary(BinaryOp::Sub, &[5.0f32, 7.0], &[2], &[1.0, 2.0], &[2], &[2]);
        assert_eq!(out, vec![4.0, 5.0]);
    }

    #[test]
    fn test_row_and_column_broadcast() {
        // [2, 1] + [3] -> [2, 3]
        let out = binary(
            BinaryOp::Add,
            &[10i64, 20],
            &[2, 1],
            &[1, 2, 3],
            &[3],
            &[2, 3],
        );
        assert_eq!(out, vec![11, 12, 13, 21, 22, 23]);
    }

    #[test]
    fn test_scalar_operand() {
        let out = binary(BinaryOp::Mul, &[2i32], &[], &[1, 2, 3], &[3], &[3]);
        assert_eq!(out, vec![2, 4, 6]);
    }

    #[test]
    fn test_compare_float_semantics() {
        let eq = compare(true, &[0.0f64, f64::NAN], &[2], &[-0.0, f64::NAN], &[2], &[2]);
        assert_eq!(eq, vec![true, false]);
        let ne = compare(false, &[1u8, 2], &[2], &[1], &[1], &[2]);
        assert_eq!(ne, vec![false, true]);
    }

    #[test]
    fn test_large_input_matches_sequential_result() {
        let n = 1 << 15;
        let a: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let out = binary(BinaryOp::Add, &a, &[n], &[1.0], &[1], &[n]);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[n - 1], n as f64);
    }
}
