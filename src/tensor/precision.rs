//! Reduced precision conversion

use super::Tensor;
use crate::dtype::{DType, FloatElement};
use crate::error::Result;
use crate::ops::Op;
use crate::ops::dispatch::{OutputSpec, dispatch_one};
use crate::runtime::Runtime;

impl<T: FloatElement, R: Runtime> Tensor<T, R> {
    /// Same values stored as `bf16`
    ///
    /// # Panics
    ///
    /// Panics if the tensor is already in reduced precision.
    #[track_caller]
    pub fn to_reduced_precision(&self) -> Result<Self> {
        assert!(
            !self.is_reduced_precision(),
            "to_reduced_precision: tensor is already in reduced precision"
        );
        self.cast_to(DType::BF16)
    }

    /// Same values widened back to `T`
    ///
    /// # Panics
    ///
    /// Panics if the tensor is already in full precision.
    #[track_caller]
    pub fn to_full_precision(&self) -> Result<Self> {
        assert!(
            self.is_reduced_precision(),
            "to_full_precision: tensor is already in full precision"
        );
        self.cast_to(T::DTYPE)
    }

    fn cast_to(&self, dtype: DType) -> Result<Self> {
        let spec = OutputSpec::new(self.shape().clone(), dtype);
        let handle = dispatch_one(&Op::Cast, self.device(), &[self.handle()], spec)?;
        let converted = Self::from_handle(handle);
        Ok(if self.is_scalar_zero() {
            converted.marked_zero()
        } else {
            converted
        })
    }

    /// Rank-0 tensor holding `value` on the device and in the precision
    /// of `like`
    pub fn scalar_like(value: T, like: &Self) -> Result<Self> {
        Self::from_slice_with_precision(&[value], &[], like.is_reduced_precision(), like.device())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuDevice;

    #[test]
    fn test_round_trip_through_bf16() {
        let t = Tensor::<f64>::from_slice(&[1.0, 0.5, -3.0], &[3], &CpuDevice::new()).unwrap();
        let reduced = t.to_reduced_precision().unwrap();
        assert_eq!(reduced.dtype(), DType::BF16);
        assert!(reduced.is_reduced_precision());
        let full = reduced.to_full_precision().unwrap();
        assert_eq!(full.dtype(), DType::F64);
        assert_eq!(full, t);
    }

    #[test]
    fn test_reduction_rounds() {
        let t = Tensor::<f32>::from_slice(&[1.0 + 1.0 / 512.0], &[1], &CpuDevice::new()).unwrap();
        let back = t.to_reduced_precision().unwrap().to_full_precision().unwrap();
        assert_eq!(back.scalars().unwrap(), vec![1.0]);
    }

    #[test]
    #[should_panic(expected = "already in reduced precision")]
    fn test_double_reduce() {
        let t = Tensor::<f32>::from_slice(&[1.0], &[1], &CpuDevice::new()).unwrap();
        let _ = t.to_reduced_precision().unwrap().to_reduced_precision();
    }

    #[test]
    #[should_panic(expected = "already in full precision")]
    fn test_double_promote() {
        let t = Tensor::<f32>::from_slice(&[1.0], &[1], &CpuDevice::new()).unwrap();
        let _ = t.to_full_precision();
    }

    #[test]
    fn test_scalar_like_follows_precision() {
        let device = CpuDevice::with_id(2);
        let t = Tensor::<f32>::from_slice_with_precision(&[1.0, 2.0], &[2], true, &device)
            .unwrap();
        let s = Tensor::scalar_like(4.0, &t).unwrap();
        assert!(s.is_reduced_precision());
        assert_eq!(s.device(), &device);
        assert_eq!(t.multiply(&s).unwrap().scalars().unwrap(), vec![4.0, 8.0]);
    }
}
