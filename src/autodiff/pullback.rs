//! Pullback closures and the value-with-pullback pair

use crate::error::Result;
use std::fmt;
use std::sync::Arc;

/// Map from an output cotangent `C` to the input cotangent `G`
///
/// A pullback closes over whatever forward metadata it needs (shapes, axes,
/// saved operands) and is otherwise a pure function of its argument. It is
/// shared by cloning and may be called any number of times, from any thread.
pub struct Pullback<C, G> {
    f: Arc<dyn Fn(C) -> Result<G> + Send + Sync>,
}

impl<C: 'static, G: 'static> Pullback<C, G> {
    /// Wrap a closure
    pub fn new(f: impl Fn(C) -> Result<G> + Send + Sync + 'static) -> Self {
        Self { f: Arc::new(f) }
    }

    /// Pull a cotangent back through the operation
    pub fn apply(&self, cotangent: C) -> Result<G> {
        (self.f)(cotangent)
    }

    /// Chain rule: pull back through `self`, then through `earlier`
    ///
    /// `self` belongs to the later operation of the two.
    pub fn compose<H: 'static>(self, earlier: Pullback<G, H>) -> Pullback<C, H> {
        Pullback::new(move |cotangent| earlier.apply(self.apply(cotangent)?))
    }
}

impl<C, G> Clone for Pullback<C, G> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<C, G> fmt::Debug for Pullback<C, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pullback")
    }
}

/// A forward result paired with its pullback
///
/// `V` is the value, `C` its cotangent type and `G` the cotangent of the
/// inputs the value was computed from.
pub struct ValueWithPullback<V, C, G> {
    /// Forward result
    pub value: V,
    /// Pullback from the value's cotangent to the inputs' cotangent
    pub pullback: Pullback<C, G>,
}

impl<V, C: 'static, G: 'static> ValueWithPullback<V, C, G> {
    /// Pair a value with its pullback
    pub fn new(value: V, pullback: Pullback<C, G>) -> Self {
        Self { value, pullback }
    }

    /// Split into value and pullback
    pub fn into_parts(self) -> (V, Pullback<C, G>) {
        (self.value, self.pullback)
    }

    /// Apply a further differentiable step to the value
    ///
    /// The result carries the composed pullback, from the new value's
    /// cotangent all the way back to `G`.
    ///
    /// ```
    /// use difftensor::prelude::*;
    ///
    /// # fn main() -> difftensor::error::Result<()> {
    /// let x = Tensor::<f64>::from_slice(&[1.0, 2.0, 3.0, 4.0], &[2, 2], &CpuDevice::new())?;
    /// let y = x.vjp_t()?.and_then(|t| t.vjp_sum())?;
    /// let grad = y.pullback.apply(Tensor::from_scalar_on(1.0, x.device())?)?;
    /// assert_eq!(grad.scalars()?, vec![1.0; 4]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn and_then<W, D: 'static>(
        self,
        step: impl FnOnce(&V) -> Result<ValueWithPullback<W, D, C>>,
    ) -> Result<ValueWithPullback<W, D, G>> {
        let next = step(&self.value)?;
        Ok(ValueWithPullback {
            value: next.value,
            pullback: next.pullback.compose(self.pullback),
        })
    }
}

impl<V: fmt::Debug, C, G> fmt::Debug for ValueWithPullback<V, C, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueWithPullback")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}
