//! Pullbacks of precision conversion and host transfer

use super::{TensorVjp, Pullback, ValueWithPullback, linear};
use crate::dtype::FloatElement;
use crate::error::Result;
use crate::runtime::Runtime;
use crate::tensor::Tensor;

impl<T: FloatElement, R: Runtime> Tensor<T, R> {
    /// [`to_reduced_precision`](Self::to_reduced_precision) with its pullback
    ///
    /// Gradient: the cotangent widened back to full precision.
    #[track_caller]
    pub fn vjp_to_reduced_precision(&self) -> Result<TensorVjp<T, R>> {
        Ok(ValueWithPullback::new(
            self.to_reduced_precision()?,
            linear(|v: Self| v.to_full_precision()),
        ))
    }

    /// [`to_full_precision`](Self::to_full_precision) with its pullback
    ///
    /// Gradient: the cotangent narrowed back to reduced precision.
    #[track_caller]
    pub fn vjp_to_full_precision(&self) -> Result<TensorVjp<T, R>> {
        Ok(ValueWithPullback::new(
            self.to_full_precision()?,
            linear(|v: Self| v.to_reduced_precision()),
        ))
    }

    /// [`scalar_like`](Self::scalar_like) with its pullback to the scalar
    pub fn vjp_scalar_like(value: T, like: &Self) -> Result<ValueWithPullback<Self, Self, T>> {
        let pullback = Pullback::new(|v: Self| {
            if v.is_scalar_zero() {
                return Ok(T::zero());
            }
            v.scalarized()
        });
        Ok(ValueWithPullback::new(Self::scalar_like(value, like)?, pullback))
    }

    /// [`scalarized`](Self::scalarized) with its pullback
    ///
    /// The scalar cotangent comes back as a tensor of this tensor's shape,
    /// device and precision.
    #[track_caller]
    pub fn vjp_scalarized(&self) -> Result<ValueWithPullback<T, T, Self>> {
        let value = self.scalarized()?;
        let shape = self.shape().clone();
        let reduced = self.is_reduced_precision();
        let device = self.device().clone();
        let pullback = Pullback::new(move |g: T| {
            Self::from_slice_with_precision(&[g], &shape, reduced, &device)
        });
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`from_slice`](Self::from_slice) with its pullback to the host values
    #[track_caller]
    pub fn vjp_from_slice(
        data: &[T],
        shape: &[usize],
        device: &R::Device,
    ) -> Result<ValueWithPullback<Self, Self, Vec<T>>> {
        let value = Self::from_slice(data, shape, device)?;
        let count = data.len();
        let pullback = Pullback::new(move |v: Self| {
            if v.is_scalar_zero() {
                return Ok(vec![T::zero(); count]);
            }
            v.scalars()
        });
        Ok(ValueWithPullback::new(value, pullback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::AdditiveArithmetic;
    use crate::dtype::DType;
    use crate::runtime::cpu::CpuDevice;

    #[test]
    fn test_precision_pullbacks_restore_dtype() {
        let x = Tensor::<f32>::from_slice(&[1.0, 2.0], &[2], &CpuDevice::new()).unwrap();
        let y = x.vjp_to_reduced_precision().unwrap();
        assert_eq!(y.value.dtype(), DType::BF16);
        let upstream = Tensor::from_slice_with_precision(&[0.5, 0.25], &[2], true, x.device()).unwrap();
        let grad = y.pullback.apply(upstream).unwrap();
        assert_eq!(grad.dtype(), DType::F32);
        assert_eq!(grad.scalars().unwrap(), vec![0.5, 0.25]);

        let back = y.value.vjp_to_full_precision().unwrap();
        assert!(back.pullback.apply(grad).unwrap().is_reduced_precision());
    }

    #[test]
    fn test_scalarized_pullback_keeps_shape() {
        let x = Tensor::<f64>::from_slice(&[3.0], &[1, 1], &CpuDevice::new()).unwrap();
        let y = x.vjp_scalarized().unwrap();
        assert_eq!(y.value, 3.0);
        let grad = y.pullback.apply(2.0).unwrap();
        assert_eq!(grad.shape(), &[1, 1]);
        assert_eq!(grad.scalars().unwrap(), vec![2.0]);
    }

    #[test]
    fn test_host_transfer_pullbacks() {
        let device = CpuDevice::new();
        let y = Tensor::<f64>::vjp_from_slice(&[1.0, 2.0], &[2], &device).unwrap();
        let zero = Tensor::<f64>::zero().unwrap();
        assert_eq!(y.pullback.apply(zero.clone()).unwrap(), vec![0.0, 0.0]);
        let grad = Tensor::from_slice(&[4.0, 5.0], &[2], &device).unwrap();
        assert_eq!(y.pullback.apply(grad).unwrap(), vec![4.0, 5.0]);

        let s = Tensor::vjp_scalar_like(1.5, &y.value).unwrap();
        assert_eq!(s.pullback.apply(zero).unwrap(), 0.0);
        assert_eq!(s.pullback.apply(Tensor::from_scalar_on(7.0, &device).unwrap()).unwrap(), 7.0);
    }
}
