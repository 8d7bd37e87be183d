//! Integration tests for reduced precision storage and the zero identity

mod common;

use common::{assert_allclose_f32, device, range};
use difftensor::prelude::*;

#[test]
fn test_reduced_tensors_keep_element_type() {
    let x = Tensor::<f32>::from_slice(&[0.1, 0.2, 0.3], &[3], &device()).unwrap();
    let r = x.to_reduced_precision().unwrap();
    assert_eq!(r.dtype(), DType::BF16);
    assert!(r.is_reduced_precision());
    assert_allclose_f32(&r.scalars().unwrap(), &[0.1, 0.2, 0.3], 1e-2, 0.0, "bf16 readback");
}

#[test]
fn test_reduced_arithmetic_stays_reduced() {
    let x = Tensor::<f32>::from_slice(&[1.0, 2.0], &[2], &device()).unwrap();
    let r = x.to_reduced_precision().unwrap();
    let sum = r.add(&r).unwrap();
    assert!(sum.is_reduced_precision());
    assert_eq!(sum.scalars().unwrap(), vec![2.0, 4.0]);
    assert_eq!(sum.to_full_precision().unwrap().dtype(), DType::F32);
}

#[test]
#[should_panic(expected = "precision mismatch")]
fn test_mixed_precision_is_usage_error() {
    let x = Tensor::<f32>::from_slice(&[1.0, 2.0], &[2], &device()).unwrap();
    let _ = x.add(&x.to_reduced_precision().unwrap());
}

#[test]
fn test_precision_vjps_are_inverse() {
    let x = Tensor::<f64>::from_slice(&[1.5, -2.0], &[2], &device()).unwrap();
    let down = x.vjp_to_reduced_precision().unwrap();
    let up = down.value.vjp_to_full_precision().unwrap();
    assert_eq!(up.value, x);

    let g = Tensor::<f64>::from_slice(&[0.5, 4.0], &[2], &device()).unwrap();
    let through_up = up.pullback.apply(g.clone()).unwrap();
    assert!(through_up.is_reduced_precision());
    let through_down = down.pullback.apply(through_up).unwrap();
    assert_eq!(through_down, g);
}

#[test]
fn test_zero_follows_ambient_precision() {
    let ctx = ExecutionContext::<CpuRuntime>::current().with_reduced_precision(true);
    let zero = ctx.scope(|| Tensor::<f32>::zero().unwrap());
    assert!(zero.is_reduced_precision());

    // integer tensors have no reduced form and ignore the flag
    let ctx = ExecutionContext::<CpuRuntime>::current().with_reduced_precision(true);
    let zero = ctx.scope(|| Tensor::<i32>::try_zero().unwrap());
    assert_eq!(zero.dtype(), DType::I32);
}

#[test]
fn test_zero_identity_matches_explicit_zeros() {
    let x = range(&[2, 3]);
    let zero = Tensor::<f64>::zero().unwrap();
    let zeros = Tensor::<f64>::zeros(&[2, 3], &device()).unwrap();

    assert_eq!(zero.add(&x).unwrap(), zeros.add(&x).unwrap());
    assert_eq!(x.add(&zero).unwrap(), x.add(&zeros).unwrap());
    assert_eq!(x.subtract(&zero).unwrap(), x.subtract(&zeros).unwrap());
    assert_eq!(zero.subtract(&x).unwrap(), zeros.subtract(&x).unwrap());
    assert_eq!(x.multiply(&zero).unwrap(), zeros);
}

#[test]
fn test_zero_adopts_operand_placement() {
    let x = Tensor::<f64>::from_slice(&[1.0, 2.0], &[2], &CpuDevice::with_id(4)).unwrap();
    let zero = Tensor::<f64>::zero().unwrap();
    let diff = zero.subtract(&x).unwrap();
    assert_eq!(diff.device().id(), 4);
    assert_eq!(diff.scalars().unwrap(), vec![-1.0, -2.0]);
}
