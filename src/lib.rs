//! # difftensor
//!
//! **Device-resident n-dimensional tensors with a reverse-mode
//! differentiation contract.**
//!
//! A [`Tensor`](tensor::Tensor) is a typed handle onto an immutable buffer
//! owned by a runtime backend. Operations validate their preconditions,
//! derive output shapes up front and dispatch one backend
//! [`Op`](ops::Op). Every differentiable operation also has a `vjp_*`
//! form returning the value together with its pullback.
//!
//! ## Features
//!
//! - **Shapes**: reshape, expand, squeeze, flatten, tile, transpose, reverse
//! - **Joining and splitting**: concat, stack, unstack, split by count or sizes
//! - **Broadcasting**: NumPy-style, plus the reverse reduction `unbroadcasted`
//! - **Padding**: constant, reflect and symmetric
//! - **Gathering**: by index tensor, per batch entry, or boolean mask
//! - **Reduced precision**: `bf16` storage behind the same element type
//! - **Gradient checking**: adjoint test of any pullback against finite differences
//!
//! ## Quick Start
//!
//! ```
//! use difftensor::prelude::*;
//!
//! # fn main() -> difftensor::error::Result<()> {
//! let device = CpuDevice::new();
//! let x = Tensor::<f32>::from_slice(&[1.0, 2.0, 3.0, 4.0], &[2, 2], &device)?;
//!
//! let y = x.vjp_tiled(&[1, 2])?;
//! assert_eq!(y.value.shape(), &[2, 4]);
//!
//! let grad = y.pullback.apply(Tensor::repeating(1.0, &[2, 4], &device)?)?;
//! assert_eq!(grad.scalars()?, vec![2.0; 4]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): Multi-threaded CPU element-wise kernels

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod autodiff;
pub mod dtype;
pub mod error;
pub mod ops;
pub mod runtime;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::autodiff::{
        AdditiveArithmetic, Differentiable, Pullback, TensorVjp, ValueWithPullback,
    };
    pub use crate::dtype::{DType, Element, FloatElement, IndexElement, NumericElement};
    pub use crate::error::{Error, Result};
    pub use crate::runtime::cpu::{CpuDevice, CpuRuntime};
    pub use crate::runtime::{Device, ExecutionContext, Runtime, RuntimeClient};
    pub use crate::tensor::{PaddingMode, Shape, Tensor};
}

/// Runtime tensors use unless told otherwise
pub type DefaultRuntime = runtime::cpu::CpuRuntime;
