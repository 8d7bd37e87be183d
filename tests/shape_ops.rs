//! Integration tests for shape operations
//!
//! Tests verify:
//! - The concrete split, tile and broadcast scenarios
//! - Negative axis indexing
//! - Joining and splitting round trips
//! - Precondition panics name the operation

mod common;

use common::{device, range};
use difftensor::prelude::*;

// ============================================================================
// Split / concatenate
// ============================================================================

#[test]
fn test_split_count_then_concatenate() {
    let x = range(&[5, 30]);
    let pieces = x.split_count(3, 1).unwrap();
    assert_eq!(pieces.len(), 3);
    for piece in &pieces {
        assert_eq!(piece.shape(), &[5, 10]);
    }
    // piece k, row r starts at r * 30 + k * 10
    assert_eq!(pieces[2].scalars().unwrap()[0], 20.0);
    assert_eq!(pieces[1].scalars().unwrap()[10], 40.0);

    let joined = Tensor::concatenating(&pieces, 1).unwrap();
    assert_eq!(joined, x);
}

#[test]
fn test_split_sizes_negative_axis() {
    let x = range(&[2, 5]);
    let pieces = x.split_sizes(&[2, 0, 3], -1).unwrap();
    assert_eq!(pieces[0].scalars().unwrap(), vec![0.0, 1.0, 5.0, 6.0]);
    assert_eq!(pieces[1].shape(), &[2, 0]);
    assert_eq!(pieces[2].scalars().unwrap(), vec![2.0, 3.0, 4.0, 7.0, 8.0, 9.0]);
}

#[test]
#[should_panic(expected = "split: 4 does not evenly divide dimension 1 of size 30")]
fn test_split_count_not_dividing() {
    let _ = range(&[5, 30]).split_count(4, 1);
}

#[test]
#[should_panic(expected = "concatenating")]
fn test_concatenate_mismatch() {
    let _ = range(&[2, 3]).concatenated(&range(&[3, 3]), 1);
}

// ============================================================================
// Stack / unstack
// ============================================================================

#[test]
fn test_stack_unstack_round_trip() {
    let a = range(&[2, 3]);
    let b = a.add(&a).unwrap();
    let stacked = Tensor::stacking(&[a.clone(), b.clone()], -1).unwrap();
    assert_eq!(stacked.shape(), &[2, 3, 2]);
    assert_eq!(stacked.scalars().unwrap()[..4], [0.0, 0.0, 1.0, 2.0]);

    let parts = stacked.unstacked(2).unwrap();
    assert_eq!(parts, vec![a, b]);
}

// ============================================================================
// Tile / broadcast
// ============================================================================

#[test]
fn test_tile_vector() {
    let x = Tensor::<f64>::from_slice(&[1.0, 2.0, 3.0, 4.0], &[4], &device()).unwrap();
    let tiled = x.tiled(&[2]).unwrap();
    assert_eq!(tiled.shape(), &[8]);
    assert_eq!(tiled.scalars().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_tile_zero_multiple() {
    let tiled = range(&[2, 2]).tiled(&[0, 3]).unwrap();
    assert_eq!(tiled.shape(), &[0, 6]);
    assert!(tiled.scalars().unwrap().is_empty());
}

#[test]
fn test_broadcast_then_unbroadcast() {
    let x = Tensor::<f64>::from_slice(&[1.0, 2.0, 3.0], &[3], &device()).unwrap();
    let wide = x.broadcasted([2, 3]).unwrap();
    assert_eq!(wide.scalars().unwrap(), vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);

    let back = wide.unbroadcasted([3]).unwrap();
    assert_eq!(back.shape(), &[3]);
    assert_eq!(back.scalars().unwrap(), vec![2.0, 4.0, 6.0]);

    let y = x.vjp_broadcasted([2, 3]).unwrap();
    let upstream = Tensor::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3], &device()).unwrap();
    let grad = y.pullback.apply(upstream).unwrap();
    assert_eq!(grad.shape(), &[3]);
    assert_eq!(grad.scalars().unwrap(), vec![5.0, 7.0, 9.0]);
}

#[test]
fn test_broadcast_like_and_assign() {
    let mut target = range(&[2, 2]);
    let row = Tensor::<f64>::from_slice(&[7.0, 8.0], &[2], &device()).unwrap();
    target.assign_broadcast(&row).unwrap();
    assert_eq!(target.scalars().unwrap(), vec![7.0, 8.0, 7.0, 8.0]);
    assert_eq!(row.broadcasted_like(&target).unwrap(), target);
}

#[test]
#[should_panic(expected = "broadcasted: cannot broadcast [2] to [3]")]
fn test_broadcast_incompatible() {
    let _ = range(&[2]).broadcasted([3]);
}

// ============================================================================
// Metadata
// ============================================================================

#[test]
fn test_reshape_shares_and_round_trips() {
    let x = range(&[2, 3, 4]);
    let r = x.reshaped([4, 6]);
    assert_eq!(r.shape(), &[4, 6]);
    assert_eq!(r.reshaped(x.shape()), x);
    assert_eq!(x.flattened().shape(), &[24]);
    assert_eq!(x.rank_lifted().shape(), &[1, 2, 3, 4]);
}

#[test]
fn test_expand_and_squeeze() {
    let x = range(&[3, 4]);
    let e = x.expanding_shape(&[1, -1]);
    assert_eq!(e.shape(), &[3, 1, 4, 1]);
    assert_eq!(e.squeezing_shape(&[1]).shape(), &[3, 4, 1]);
    assert_eq!(e.squeezing_shape(&[]).shape(), &[3, 4]);
}

#[test]
#[should_panic(expected = "has size 4, expected 1")]
fn test_squeeze_non_unit() {
    let _ = range(&[3, 4]).squeezing_shape(&[1]);
}

// ============================================================================
// Transpose / reverse
// ============================================================================

#[test]
fn test_transpose_involution() {
    let x = range(&[3, 5]);
    assert_eq!(x.t().unwrap().t().unwrap(), x);
    assert_eq!(x.transposed(&[1, 0]).unwrap(), x.t().unwrap());
}

#[test]
#[should_panic(expected = "transposed")]
fn test_transpose_not_a_permutation() {
    let _ = range(&[2, 2]).transposed(&[0, 0]);
}

#[test]
fn test_reverse_negative_axis() {
    let x = range(&[2, 3]);
    let r = x.reversed(&[-1]).unwrap();
    assert_eq!(r.scalars().unwrap(), vec![2.0, 1.0, 0.0, 5.0, 4.0, 3.0]);
}

#[test]
#[should_panic(expected = "reversed")]
fn test_reverse_duplicate_axes() {
    let _ = range(&[2, 3]).reversed(&[1, -1]);
}

// ============================================================================
// Pad / slice
// ============================================================================

#[test]
fn test_pad_modes() {
    let x = Tensor::<f64>::from_slice(&[1.0, 2.0, 3.0], &[3], &device()).unwrap();
    let pads = [(2, 2)];
    assert_eq!(
        x.padded(&pads, PaddingMode::Constant(0.0)).unwrap().scalars().unwrap(),
        vec![0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0]
    );
    assert_eq!(
        x.padded(&pads, PaddingMode::Reflect).unwrap().scalars().unwrap(),
        vec![3.0, 2.0, 1.0, 2.0, 3.0, 2.0, 1.0]
    );
    assert_eq!(
        x.padded(&pads, PaddingMode::Symmetric).unwrap().scalars().unwrap(),
        vec![2.0, 1.0, 1.0, 2.0, 3.0, 3.0, 2.0]
    );
}

#[test]
#[should_panic(expected = "padded: Reflect padding")]
fn test_reflect_pad_too_wide() {
    let x = range(&[3]);
    let _ = x.padded(&[(3, 0)], PaddingMode::Reflect);
}

#[test]
fn test_slice_and_bounds() {
    let x = range(&[3, 4]);
    let s = x.slice(&[1, 1], &[2, 2]).unwrap();
    assert_eq!(s.scalars().unwrap(), vec![5.0, 6.0, 9.0, 10.0]);
    assert_eq!(x.slice_bounds(&[1, 1], &[3, 3]).unwrap(), s);
}

#[test]
#[should_panic(expected = "slice")]
fn test_slice_out_of_bounds() {
    let _ = range(&[3, 4]).slice(&[2, 0], &[2, 4]);
}

// ============================================================================
// Gather
// ============================================================================

#[test]
fn test_gather_rows() {
    let x = range(&[3, 2]);
    let idx = Tensor::<i32>::from_slice(&[2, 0], &[2], &device()).unwrap();
    let g = x.gathering(&idx, 0).unwrap();
    assert_eq!(g.scalars().unwrap(), vec![4.0, 5.0, 0.0, 1.0]);
}

#[test]
fn test_gather_out_of_range_is_error() {
    let x = range(&[3]);
    let idx = Tensor::<i64>::from_slice(&[5], &[1], &device()).unwrap();
    let err = x.gathering(&idx, 0).unwrap_err();
    assert!(matches!(err, Error::IndexOutOfBounds { index: 5, size: 3 }));
}

#[test]
fn test_batch_gather_rows_per_batch() {
    // pick one token per sequence: [batch 2, seq 3, features 2]
    let x = range(&[2, 3, 2]);
    let idx = Tensor::<i32>::from_slice(&[2, 0], &[2], &device()).unwrap();
    let g = x.batch_gathering(&idx, 1, 1).unwrap();
    assert_eq!(g.shape(), &[2, 2]);
    assert_eq!(g.scalars().unwrap(), vec![4.0, 5.0, 6.0, 7.0]);

    let idx = Tensor::<i32>::from_slice(&[0, 3], &[2], &device()).unwrap();
    let err = x.batch_gathering(&idx, 1, 1).unwrap_err();
    assert!(matches!(err, Error::IndexOutOfBounds { index: 3, size: 3 }));
}

#[test]
fn test_gather_where_mask() {
    let x = range(&[4, 2]);
    let mask = Tensor::<bool>::from_slice(&[true, false, false, true], &[4], &device()).unwrap();
    let g = x.gathering_where(&mask, 0).unwrap();
    assert_eq!(g.shape(), &[2, 2]);
    assert_eq!(g.scalars().unwrap(), vec![0.0, 1.0, 6.0, 7.0]);

    let idx = mask.non_zero_indices().unwrap();
    assert_eq!(idx.shape(), &[2, 1]);
    assert_eq!(idx.scalars().unwrap(), vec![0, 3]);
}

// ============================================================================
// Devices
// ============================================================================

#[test]
#[should_panic(expected = "operand on cpu:0 cannot be combined with operand on cpu:1")]
fn test_cross_device_is_usage_error() {
    let a = range(&[2]);
    let b = a.copied_to(&CpuDevice::with_id(1)).unwrap();
    let _ = a.add(&b);
}
