//! Tensor types and operations
//!
//! This module provides the core `Tensor` type, an immutable n-dimensional
//! array stored on a compute device, and every operation on it. Operations
//! are grouped by concern:
//!
//! - `shape_ops`: reshapes, splits, joins, transposes, pads, slices, gathers
//! - `arith`: broadcasting arithmetic, sums and comparisons
//! - `precision`: reduced precision conversion

mod arith;
mod core;
mod handle;
mod precision;
mod shape;
mod shape_ops;
mod storage;

pub use self::core::Tensor;
pub use handle::TensorHandle;
pub use shape::Shape;
pub use shape_ops::PaddingMode;
pub use storage::Storage;
