//! Pullbacks of broadcasting arithmetic and reductions

use super::{TensorPair, TensorVjp, Pullback, ValueWithPullback, linear};
use crate::dtype::FloatElement;
use crate::error::Result;
use crate::ops::validate::ensure_axes;
use crate::runtime::Runtime;
use crate::tensor::{Shape, Tensor};

/// Value with the pullback of a two-input operation
pub type BinaryVjp<T, R> = ValueWithPullback<Tensor<T, R>, Tensor<T, R>, TensorPair<T, R>>;

impl<T: FloatElement, R: Runtime> Tensor<T, R> {
    fn negated(&self) -> Result<Self> {
        self.multiply(&Self::scalar_like(T::from_f64(-1.0), self)?)
    }

    /// [`add`](Self::add) with its pullback
    ///
    /// Gradients: dL/da = unbroadcast(dL/dy), dL/db = unbroadcast(dL/dy)
    #[track_caller]
    pub fn vjp_add(&self, other: &Self) -> Result<BinaryVjp<T, R>> {
        let value = self.add(other)?;
        let (a, b) = (self.shape().clone(), other.shape().clone());
        let pullback = Pullback::new(move |v: Self| {
            if v.is_scalar_zero() {
                return Ok((v.clone(), v));
            }
            Ok((v.unbroadcasted(a.clone())?, v.unbroadcasted(b.clone())?))
        });
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`subtract`](Self::subtract) with its pullback
    ///
    /// Gradients: dL/da = unbroadcast(dL/dy), dL/db = -unbroadcast(dL/dy)
    #[track_caller]
    pub fn vjp_subtract(&self, other: &Self) -> Result<BinaryVjp<T, R>> {
        let value = self.subtract(other)?;
        let (a, b) = (self.shape().clone(), other.shape().clone());
        let pullback = Pullback::new(move |v: Self| {
            if v.is_scalar_zero() {
                return Ok((v.clone(), v));
            }
            Ok((v.unbroadcasted(a.clone())?, v.negated()?.unbroadcasted(b.clone())?))
        });
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`multiply`](Self::multiply) with its pullback
    ///
    /// Gradients: dL/da = unbroadcast(dL/dy * b), dL/db = unbroadcast(dL/dy * a)
    #[track_caller]
    pub fn vjp_multiply(&self, other: &Self) -> Result<BinaryVjp<T, R>> {
        let value = self.multiply(other)?;
        let (a, b) = (self.clone(), other.clone());
        let pullback = Pullback::new(move |v: Self| {
            if v.is_scalar_zero() {
                return Ok((v.clone(), v));
            }
            Ok((
                v.multiply(&b)?.unbroadcasted(a.shape())?,
                v.multiply(&a)?.unbroadcasted(b.shape())?,
            ))
        });
        Ok(ValueWithPullback::new(value, pullback))
    }

    /// [`sum`](Self::sum) with its pullback
    ///
    /// Gradient: the scalar cotangent broadcast to every element.
    pub fn vjp_sum(&self) -> Result<TensorVjp<T, R>> {
        let value = self.sum()?;
        let shape = self.shape().clone();
        Ok(ValueWithPullback::new(
            value,
            linear(move |v: Self| v.broadcasted(shape.clone())),
        ))
    }

    /// [`sum_along_axes`](Self::sum_along_axes) with its pullback
    ///
    /// Gradient: the cotangent broadcast back over the summed axes.
    #[track_caller]
    pub fn vjp_sum_along_axes(&self, axes: &[isize]) -> Result<TensorVjp<T, R>> {
        let value = self.sum_along_axes(axes)?;
        let shape = self.shape().clone();
        Ok(ValueWithPullback::new(
            value,
            linear(move |v: Self| v.broadcasted(shape.clone())),
        ))
    }

    /// [`sum_squeezing_axes`](Self::sum_squeezing_axes) with its pullback
    ///
    /// Gradient: the cotangent with the summed axes restored as size 1,
    /// then broadcast back over them.
    #[track_caller]
    pub fn vjp_sum_squeezing_axes(&self, axes: &[isize]) -> Result<TensorVjp<T, R>> {
        let value = self.sum_squeezing_axes(axes)?;
        let kept = self.kept_shape(axes, "sum_squeezing_axes");
        let shape = self.shape().clone();
        Ok(ValueWithPullback::new(
            value,
            linear(move |v: Self| v.reshaped(kept.clone()).broadcasted(shape.clone())),
        ))
    }

    /// [`mean`](Self::mean) with its pullback
    ///
    /// Gradient: dL/dx = dL/dy / n for every element.
    pub fn vjp_mean(&self) -> Result<TensorVjp<T, R>> {
        let value = self.mean()?;
        let shape = self.shape().clone();
        let scale = T::from_f64(1.0 / self.scalar_count() as f64);
        Ok(ValueWithPullback::new(
            value,
            linear(move |v: Self| {
                v.multiply(&Self::scalar_like(scale, &v)?)?
                    .broadcasted(shape.clone())
            }),
        ))
    }

    /// [`mean_along_axes`](Self::mean_along_axes) with its pullback
    ///
    /// Gradient: dL/dx = dL/dy / n broadcast back, with `n` the number of
    /// elements averaged into each output.
    #[track_caller]
    pub fn vjp_mean_along_axes(&self, axes: &[isize]) -> Result<TensorVjp<T, R>> {
        let value = self.mean_along_axes(axes)?;
        let kept = self.kept_shape(axes, "mean_along_axes");
        let count = self.scalar_count() / kept.contiguous_size().max(1);
        let scale = T::from_f64(1.0 / count.max(1) as f64);
        let shape = self.shape().clone();
        Ok(ValueWithPullback::new(
            value,
            linear(move |v: Self| {
                v.multiply(&Self::scalar_like(scale, &v)?)?
                    .broadcasted(shape.clone())
            }),
        ))
    }

    /// Own shape with `axes` set to 1
    #[track_caller]
    fn kept_shape(&self, axes: &[isize], op: &str) -> Shape {
        let axes = ensure_axes(axes, self.rank(), false, op);
        let mut shape = self.shape().clone();
        for axis in axes {
            shape = shape.with_dim(axis, 1);
        }
        shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::CpuDevice;

    fn tensor(data: &[f64], shape: &[usize]) -> Tensor<f64> {
        Tensor::from_slice(data, shape, &CpuDevice::new()).unwrap()
    }

    #[test]
    fn test_add_pullback_unbroadcasts() {
        let a = tensor(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let b = tensor(&[10.0, 20.0, 30.0], &[3]);
        let y = a.vjp_add(&b).unwrap();
        assert_eq!(y.value.scalars().unwrap(), vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
        let (ga, gb) = y.pullback.apply(tensor(&[1.0; 6], &[2, 3])).unwrap();
        assert_eq!(ga.shape(), &[2, 3]);
        assert_eq!(gb.shape(), &[3]);
        assert_eq!(gb.scalars().unwrap(), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_subtract_pullback_negates_rhs() {
        let a = tensor(&[1.0, 2.0], &[2]);
        let b = tensor(&[3.0], &[1]);
        let (ga, gb) = a
            .vjp_subtract(&b)
            .unwrap()
            .pullback
            .apply(tensor(&[1.0, 2.0], &[2]))
            .unwrap();
        assert_eq!(ga.scalars().unwrap(), vec![1.0, 2.0]);
        assert_eq!(gb.scalars().unwrap(), vec![-3.0]);
    }

    #[test]
    fn test_multiply_pullback_swaps_operands() {
        let a = tensor(&[2.0, 3.0], &[2]);
        let b = tensor(&[5.0, 7.0], &[2]);
        let (ga, gb) = a
            .vjp_multiply(&b)
            .unwrap()
            .pullback
            .apply(tensor(&[1.0, 1.0], &[2]))
            .unwrap();
        assert_eq!(ga.scalars().unwrap(), vec![5.0, 7.0]);
        assert_eq!(gb.scalars().unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_sum_squeezing_pullback() {
        let x = tensor(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]);
        let y = x.vjp_sum_squeezing_axes(&[1]).unwrap();
        assert_eq!(y.value.scalars().unwrap(), vec![6.0, 15.0]);
        let grad = y.pullback.apply(tensor(&[1.0, 2.0], &[2])).unwrap();
        assert_eq!(grad.scalars().unwrap(), vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_mean_along_axes_pullback() {
        let x = tensor(&[1.0, 2.0, 3.0, 4.0], &[2, 2]);
        let y = x.vjp_mean_along_axes(&[0]).unwrap();
        assert_eq!(y.value.scalars().unwrap(), vec![2.0, 3.0]);
        let grad = y.pullback.apply(tensor(&[2.0, 4.0], &[1, 2])).unwrap();
        assert_eq!(grad.scalars().unwrap(), vec![1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_mean_pullback() {
        let x = tensor(&[1.0, 2.0, 3.0, 4.0], &[4]);
        let grad = x
            .vjp_mean()
            .unwrap()
            .pullback
            .apply(Tensor::from_scalar_on(2.0, &CpuDevice::new()).unwrap())
            .unwrap();
        assert_eq!(grad.scalars().unwrap(), vec![0.5; 4]);
    }
}
