//! Runtime backends for tensor computation
//!
//! This module defines the `Runtime` trait, the backend-facing operation
//! interface, and the thread-local execution context.
//!
//! # Architecture
//!
//! ```text
//! Runtime (backend identity, memory movement)
//! ├── Device (identifies a specific CPU/accelerator placement)
//! └── Client (executes one Op over pre-allocated operands)
//! ```

mod context;
mod traits;

pub mod cpu;

pub use context::{ContextGuard, ExecutionContext};
pub use traits::{Device, Operand, Runtime, RuntimeClient};
