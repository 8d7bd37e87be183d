//! Axis and shape validation shared by all tensor operations
//!
//! The `Option`-returning functions are plain checks. The `ensure_*`
//! functions are the precondition form used by tensor methods: they panic
//! with a message naming the operation and the offending values, so a
//! malformed call never reaches a backend.

use crate::tensor::Shape;

// ============================================================================
// Axes
// ============================================================================

/// Normalize an axis index, supporting negative indexing.
///
/// `axis < 0` denotes `axis + rank`. Returns `None` outside `-rank..rank`.
#[inline]
pub fn normalize_axis(axis: isize, rank: usize) -> Option<usize> {
    let idx = if axis < 0 {
        axis.checked_add(rank as isize)?
    } else {
        axis
    };
    if (0..rank as isize).contains(&idx) {
        Some(idx as usize)
    } else {
        None
    }
}

/// Normalize an insertion position for an operation that adds one dimension.
///
/// The valid range is `-(rank + 1)..=rank`.
#[inline]
pub fn normalize_insert_axis(axis: isize, rank: usize) -> Option<usize> {
    normalize_axis(axis, rank + 1)
}

/// Axis precondition
#[track_caller]
pub(crate) fn ensure_axis(axis: isize, rank: usize, op: &str) -> usize {
    match normalize_axis(axis, rank) {
        Some(idx) => idx,
        None => panic!(
            "{op}: axis {axis} out of range for rank {rank} (expected -{rank}..{rank})"
        ),
    }
}

/// Precondition for a list of axes; duplicates after normalization are
/// rejected when `unique` is set
#[track_caller]
pub(crate) fn ensure_axes(axes: &[isize], rank: usize, unique: bool, op: &str) -> Vec<usize> {
    let normalized: Vec<usize> = axes.iter().map(|&a| ensure_axis(a, rank, op)).collect();
    if unique {
        let mut seen = vec![false; rank];
        for (&axis, &raw) in normalized.iter().zip(axes) {
            assert!(
                !seen[axis],
                "{op}: duplicate axis {raw} (normalized {axis}) in {axes:?}"
            );
            seen[axis] = true;
        }
    }
    normalized
}

// ============================================================================
// Permutations
// ============================================================================

/// Inverse of a permutation of `0..len`, or `None` if it is not a bijection
pub fn invert_permutation(permutation: &[usize]) -> Option<Vec<usize>> {
    let n = permutation.len();
    let mut inverse = vec![usize::MAX; n];
    for (i, &p) in permutation.iter().enumerate() {
        if p >= n || inverse[p] != usize::MAX {
            return None;
        }
        inverse[p] = i;
    }
    Some(inverse)
}

/// Permutation precondition; returns the normalized permutation
#[track_caller]
pub(crate) fn ensure_permutation(permutation: &[isize], rank: usize, op: &str) -> Vec<usize> {
    assert_eq!(
        permutation.len(),
        rank,
        "{op}: permutation {permutation:?} has length {} but rank is {rank}",
        permutation.len()
    );
    let normalized: Vec<usize> = permutation
        .iter()
        .map(|&a| ensure_axis(a, rank, op))
        .collect();
    assert!(
        invert_permutation(&normalized).is_some(),
        "{op}: {permutation:?} is not a permutation of 0..{rank}"
    );
    normalized
}

// ============================================================================
// Broadcasting
// ============================================================================

/// Broadcast result of two shapes (trailing-aligned, size-1 stretches)
///
/// Returns `None` if the shapes are incompatible.
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Option<Shape> {
    let rank = a.len().max(b.len());
    let mut result = vec![0; rank];

    for i in 0..rank {
        let a_dim = if i < a.len() { a[a.len() - 1 - i] } else { 1 };
        let b_dim = if i < b.len() { b[b.len() - 1 - i] } else { 1 };

        result[rank - 1 - i] = if a_dim == b_dim || b_dim == 1 {
            a_dim
        } else if a_dim == 1 {
            b_dim
        } else {
            return None;
        };
    }

    Some(Shape::from(result))
}

/// Whether `source` can be stretched to exactly `target`
pub fn is_broadcastable_to(source: &[usize], target: &[usize]) -> bool {
    if source.len() > target.len() {
        return false;
    }
    let offset = target.len() - source.len();
    source
        .iter()
        .enumerate()
        .all(|(i, &dim)| dim == target[offset + i] || dim == 1)
}

/// Axes of `from` that must be summed to reduce it to `to`
///
/// `to` is aligned to the trailing dims of `from`. Leading axes missing from
/// `to` are always reduced; other axes are reduced where `to` has size 1 and
/// `from` does not. Returns `None` if some dim is neither equal nor 1.
pub fn unbroadcast_axes(from: &[usize], to: &[usize]) -> Option<Vec<usize>> {
    if to.len() > from.len() {
        return None;
    }
    let offset = from.len() - to.len();
    let mut axes: Vec<usize> = (0..offset).collect();
    for (i, &dim) in to.iter().enumerate() {
        let source = from[offset + i];
        if dim == source {
            continue;
        }
        if dim != 1 {
            return None;
        }
        axes.push(offset + i);
    }
    Some(axes)
}
