//! Numerical verification of pullbacks
//!
//! A pullback `J^T` is correct when, for random directions `v` (input side)
//! and `g` (output side), the adjoint identity holds:
//!
//! ```text
//! <g, J v>  ==  <J^T g, v>
//! ```
//!
//! The left side is estimated with a central difference
//! `(f(x + eps v) - f(x - eps v)) / 2 eps`, so no Jacobian is ever formed.
//!
//! ```
//! use difftensor::autodiff::check::{CheckConfig, check_pullback};
//! use difftensor::prelude::*;
//!
//! # fn main() -> difftensor::error::Result<()> {
//! let x = Tensor::<f64>::from_slice(&[1.0, 2.0, 3.0, 4.0], &[2, 2], &CpuDevice::new())?;
//! let report = check_pullback(&x, |x| x.vjp_tiled(&[2, 3]), &CheckConfig::default())?;
//! assert!(report.passed(), "{report:?}");
//! # Ok(())
//! # }
//! ```

use super::ValueWithPullback;
use crate::dtype::FloatElement;
use crate::error::Result;
use crate::runtime::Runtime;
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Step size, tolerance and seed of a check
#[derive(Clone, Debug)]
pub struct CheckConfig {
    /// Finite difference step
    pub epsilon: f64,
    /// Largest accepted relative error
    pub tolerance: f64,
    /// Seed for the random directions
    pub seed: u64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-3,
            tolerance: 1e-3,
            seed: 0x5eed,
        }
    }
}

/// Both sides of the adjoint identity
#[derive(Clone, Debug)]
pub struct CheckReport {
    /// `<g, J v>` by central difference
    pub numeric: f64,
    /// `<J^T g, v>` through the pullback
    pub analytic: f64,
    /// Tolerance the report is judged against
    pub tolerance: f64,
}

impl CheckReport {
    /// Difference relative to the larger side, or absolute below 1
    pub fn error(&self) -> f64 {
        let scale = self.numeric.abs().max(self.analytic.abs()).max(1.0);
        (self.numeric - self.analytic).abs() / scale
    }

    /// Whether the error is within tolerance
    pub fn passed(&self) -> bool {
        self.error() <= self.tolerance
    }
}

/// Values that can be treated as a flat vector of reals
///
/// Implemented by every input and cotangent type the `vjp_*` methods use,
/// so that [`check_pullback`] can pick random directions and take inner
/// products. The zero cotangent contributes nothing to an inner product.
pub trait FlatTangent: Clone {
    /// Random value of the same structure, entries uniform in `[-1, 1)`
    fn random_like(&self, rng: &mut StdRng) -> Result<Self>;

    /// `self + step * direction`
    fn offset(&self, direction: &Self, step: f64) -> Result<Self>;

    /// Euclidean inner product
    fn inner(&self, other: &Self) -> Result<f64>;
}

macro_rules! impl_flat_scalar {
    ($($t:ty),*) => {
        $(
            impl FlatTangent for $t {
                fn random_like(&self, rng: &mut StdRng) -> Result<Self> {
                    Ok(rng.random_range(-1.0..1.0))
                }

                fn offset(&self, direction: &Self, step: f64) -> Result<Self> {
                    Ok(self + (step as $t) * direction)
                }

                fn inner(&self, other: &Self) -> Result<f64> {
                    Ok(f64::from(*self) * f64::from(*other))
                }
            }
        )*
    };
}

impl_flat_scalar!(f32, f64);

impl<T: FloatElement, R: Runtime> FlatTangent for Tensor<T, R> {
    fn random_like(&self, rng: &mut StdRng) -> Result<Self> {
        let data: Vec<T> = (0..self.scalar_count())
            .map(|_| T::from_f64(rng.random_range(-1.0..1.0)))
            .collect();
        Self::from_slice_with_precision(&data, self.shape(), self.is_reduced_precision(), self.device())
    }

    fn offset(&self, direction: &Self, step: f64) -> Result<Self> {
        if direction.is_scalar_zero() {
            return Ok(self.clone());
        }
        let data: Vec<T> = self
            .scalars()?
            .into_iter()
            .zip(direction.scalars()?)
            .map(|(x, d)| T::from_f64(x.to_f64() + step * d.to_f64()))
            .collect();
        Self::from_slice_with_precision(&data, self.shape(), self.is_reduced_precision(), self.device())
    }

    fn inner(&self, other: &Self) -> Result<f64> {
        if self.is_scalar_zero() || other.is_scalar_zero() {
            return Ok(0.0);
        }
        assert_eq!(
            self.shape(),
            other.shape(),
            "inner: shapes {} and {} differ",
            self.shape(),
            other.shape()
        );
        Ok(self
            .scalars()?
            .into_iter()
            .zip(other.scalars()?)
            .map(|(a, b)| a.to_f64() * b.to_f64())
            .sum())
    }
}

/// Lists; the empty list is zero
impl<E: FlatTangent> FlatTangent for Vec<E> {
    fn random_like(&self, rng: &mut StdRng) -> Result<Self> {
        self.iter().map(|e| e.random_like(rng)).collect()
    }

    fn offset(&self, direction: &Self, step: f64) -> Result<Self> {
        if direction.is_empty() {
            return Ok(self.clone());
        }
        self.iter()
            .zip(direction)
            .map(|(e, d)| e.offset(d, step))
            .collect()
    }

    fn inner(&self, other: &Self) -> Result<f64> {
        if self.is_empty() || other.is_empty() {
            return Ok(0.0);
        }
        assert_eq!(self.len(), other.len(), "inner: lists of length {} and {}", self.len(), other.len());
        self.iter().zip(other).map(|(a, b)| a.inner(b)).sum()
    }
}

impl<A: FlatTangent, B: FlatTangent> FlatTangent for (A, B) {
    fn random_like(&self, rng: &mut StdRng) -> Result<Self> {
        Ok((self.0.random_like(rng)?, self.1.random_like(rng)?))
    }

    fn offset(&self, direction: &Self, step: f64) -> Result<Self> {
        Ok((self.0.offset(&direction.0, step)?, self.1.offset(&direction.1, step)?))
    }

    fn inner(&self, other: &Self) -> Result<f64> {
        Ok(self.0.inner(&other.0)? + self.1.inner(&other.1)?)
    }
}

/// Check the pullback returned by `f` at `x` against finite differences
///
/// `f` is evaluated three times: at `x` for the value and pullback, and at
/// `x +- epsilon * v` for the numeric side.
pub fn check_pullback<X, Y, F>(x: &X, f: F, config: &CheckConfig) -> Result<CheckReport>
where
    X: FlatTangent + 'static,
    Y: FlatTangent + 'static,
    F: Fn(&X) -> Result<ValueWithPullback<Y, Y, X>>,
{
    let mut rng = StdRng::seed_from_u64(config.seed);
    let center = f(x)?;
    let direction = x.random_like(&mut rng)?;
    let cotangent = center.value.random_like(&mut rng)?;

    let analytic = center.pullback.apply(cotangent.clone())?.inner(&direction)?;

    let plus = f(&x.offset(&direction, config.epsilon)?)?.value;
    let minus = f(&x.offset(&direction, -config.epsilon)?)?.value;
    let numeric = (cotangent.inner(&plus)? - cotangent.inner(&minus)?) / (2.0 * config.epsilon);

    log::debug!("check_pullback: numeric {numeric:.6e}, analytic {analytic:.6e}");
    Ok(CheckReport {
        numeric,
        analytic,
        tolerance: config.tolerance,
    })
}
