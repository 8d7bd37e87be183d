//! CPU runtime implementation
//!
//! The CPU runtime uses standard heap allocation and is the reference
//! implementation of every [`Op`](crate::ops::Op).
//!
//! # Broadcasting
//!
//! NumPy-style broadcasting is supported for binary arithmetic and
//! comparison: shapes are right-aligned and size-1 dimensions stretch.
//!
//! # Devices
//!
//! Every `CpuDevice` shares host memory. Distinct ids still model distinct
//! placements, which keeps device-mismatch checks exercisable on one host.

mod client;
mod device;
pub(crate) mod kernels;
mod runtime;

pub use client::CpuClient;
pub use device::CpuDevice;
pub use runtime::CpuRuntime;
