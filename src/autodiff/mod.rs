//! Reverse-mode differentiation primitives
//!
//! This module does not build or walk a computation graph. It supplies, for
//! every differentiable tensor operation, a `vjp_*` method returning the
//! forward result together with its [`Pullback`]: the vector-Jacobian
//! product that maps the result's cotangent to the input's. A reverse-mode
//! driver chains pullbacks ([`ValueWithPullback::and_then`]) and adds
//! cotangents that reach one value along several paths
//! ([`AdditiveArithmetic::adding`]).
//!
//! # Zero cotangents
//!
//! Every pullback is linear, so a cotangent that is the additive identity
//! from [`AdditiveArithmetic::zero`] is passed straight through: the pullback
//! returns it without touching the backend. The identity is rank-0 and
//! shape-agnostic; it combines with tensors of any shape.
//!
//! # Example
//!
//! ```
//! use difftensor::prelude::*;
//!
//! # fn main() -> difftensor::error::Result<()> {
//! let device = CpuDevice::new();
//! let x = Tensor::<f64>::from_slice(&[1.0, 2.0, 3.0], &[3], &device)?;
//!
//! let y = x.vjp_broadcasted([2, 3])?;
//! assert_eq!(y.value.shape(), &[2, 3]);
//!
//! let upstream = Tensor::<f64>::repeating(1.0, &[2, 3], &device)?;
//! let grad = y.pullback.apply(upstream)?;
//! assert_eq!(grad.scalars()?, vec![2.0, 2.0, 2.0]);
//! # Ok(())
//! # }
//! ```

mod arith;
pub mod check;
mod precision;
mod pullback;
mod shape;

pub use arith::BinaryVjp;
pub use pullback::{Pullback, ValueWithPullback};

use crate::dtype::FloatElement;
use crate::error::Result;
use crate::runtime::Runtime;
use crate::tensor::Tensor;

/// Tensor-to-tensor value with pullback, the shape of most vjps
pub type TensorVjp<T, R> = ValueWithPullback<Tensor<T, R>, Tensor<T, R>, Tensor<T, R>>;

/// Cotangent pair of a two-input operation
pub type TensorPair<T, R> = (Tensor<T, R>, Tensor<T, R>);

/// Types with an additive identity, addition and subtraction
///
/// Cotangents that reach one value along several paths are summed with
/// [`adding`](Self::adding).
pub trait AdditiveArithmetic: Sized {
    /// The additive identity
    fn zero() -> Result<Self>;

    /// `self + other`
    fn adding(&self, other: &Self) -> Result<Self>;

    /// `self - other`
    fn subtracting(&self, other: &Self) -> Result<Self>;
}

/// Values that can be moved along a tangent direction
pub trait Differentiable {
    /// Type of tangents and cotangents
    type TangentVector: AdditiveArithmetic;

    /// Move `self` by `direction`
    fn move_along(&mut self, direction: &Self::TangentVector) -> Result<()>;
}

impl<T: FloatElement, R: Runtime> AdditiveArithmetic for Tensor<T, R> {
    fn zero() -> Result<Self> {
        Tensor::try_zero()
    }

    fn adding(&self, other: &Self) -> Result<Self> {
        self.add(other)
    }

    fn subtracting(&self, other: &Self) -> Result<Self> {
        self.subtract(other)
    }
}

impl<T: FloatElement, R: Runtime> Differentiable for Tensor<T, R> {
    type TangentVector = Self;

    fn move_along(&mut self, direction: &Self) -> Result<()> {
        *self = self.add(direction)?;
        Ok(())
    }
}

/// Cotangents of tensor lists, such as the outputs of `split`
///
/// The empty list is the identity; otherwise lists are combined entry by
/// entry and must have equal lengths.
impl<T: FloatElement, R: Runtime> AdditiveArithmetic for Vec<Tensor<T, R>> {
    fn zero() -> Result<Self> {
        Ok(Vec::new())
    }

    fn adding(&self, other: &Self) -> Result<Self> {
        combine(self, other, "adding", |a, b| a.add(b))
    }

    fn subtracting(&self, other: &Self) -> Result<Self> {
        combine(self, other, "subtracting", |a, b| a.subtract(b))
    }
}

#[track_caller]
fn combine<T: FloatElement, R: Runtime>(
    a: &[Tensor<T, R>],
    b: &[Tensor<T, R>],
    op: &str,
    f: impl Fn(&Tensor<T, R>, &Tensor<T, R>) -> Result<Tensor<T, R>>,
) -> Result<Vec<Tensor<T, R>>> {
    if b.is_empty() {
        return Ok(a.to_vec());
    }
    let lhs: Vec<Tensor<T, R>> = if a.is_empty() {
        b.iter().map(|_| Tensor::try_zero()).collect::<Result<_>>()?
    } else {
        a.to_vec()
    };
    assert_eq!(
        lhs.len(),
        b.len(),
        "{op}: tensor lists of length {} and {}",
        lhs.len(),
        b.len()
    );
    lhs.iter().zip(b).map(|(x, y)| f(x, y)).collect()
}

/// Wrap a linear tensor pullback so zero cotangents pass straight through
pub(crate) fn linear<T: FloatElement, R: Runtime>(
    f: impl Fn(Tensor<T, R>) -> Result<Tensor<T, R>> + Send + Sync + 'static,
) -> Pullback<Tensor<T, R>, Tensor<T, R>> {
    Pullback::new(move |cotangent: Tensor<T, R>| {
        if cotangent.is_scalar_zero() {
            return Ok(cotangent);
        }
        f(cotangent)
    })
}

/// Replace a zero cotangent by real zeros of `shape` on `device`
pub(crate) fn materialize<T: FloatElement, R: Runtime>(
    cotangent: &Tensor<T, R>,
    shape: &[usize],
    device: &R::Device,
) -> Result<Tensor<T, R>> {
    if !cotangent.is_scalar_zero() {
        return Ok(cotangent.clone());
    }
    let count: usize = shape.iter().product();
    Tensor::from_slice_with_precision(
        &vec![T::zero(); count],
        shape,
        cotangent.is_reduced_precision(),
        device,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Device;
    use crate::runtime::cpu::CpuDevice;

    fn vector(data: &[f64]) -> Tensor<f64> {
        Tensor::from_slice(data, &[data.len()], &CpuDevice::new()).unwrap()
    }

    #[test]
    fn test_move_along() {
        let mut x = vector(&[1.0, 2.0]);
        x.move_along(&vector(&[0.5, -1.0])).unwrap();
        assert_eq!(x.scalars().unwrap(), vec![1.5, 1.0]);

        x.move_along(&<Tensor<f64> as AdditiveArithmetic>::zero().unwrap())
            .unwrap();
        assert_eq!(x.scalars().unwrap(), vec![1.5, 1.0]);
    }

    #[test]
    fn test_list_accumulation() {
        let a = vec![vector(&[1.0]), vector(&[2.0])];
        let zero = <Vec<Tensor<f64>> as AdditiveArithmetic>::zero().unwrap();
        assert_eq!(zero.adding(&a).unwrap(), a);
        assert_eq!(a.subtracting(&zero).unwrap(), a);

        let doubled = a.adding(&a).unwrap();
        assert_eq!(doubled[1].scalars().unwrap(), vec![4.0]);

        let negated = zero.subtracting(&a).unwrap();
        assert_eq!(negated[0].scalars().unwrap(), vec![-1.0]);
    }

    #[test]
    fn test_materialize() {
        let zero = Tensor::<f32>::try_zero().unwrap();
        let real = materialize(&zero, &[2, 2], &CpuDevice::with_id(1)).unwrap();
        assert_eq!(real.device().id(), 1);
        assert_eq!(real.shape(), &[2, 2]);
        assert_eq!(real.scalars().unwrap(), vec![0.0; 4]);
    }
}
