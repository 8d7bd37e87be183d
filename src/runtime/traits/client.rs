//! Trait for runtime clients that execute operations

use super::Runtime;
use crate::dtype::DType;
use crate::error::Result;
use crate::ops::Op;
use crate::tensor::{Shape, Storage};

/// A buffer passed to a backend call, together with the shape it holds
///
/// Input operands are read-only. Output operands are freshly allocated by the
/// dispatch layer, uniquely owned, and sized for their shape before the call.
pub struct Operand<'a, R: Runtime> {
    storage: &'a Storage<R>,
    shape: &'a Shape,
}

impl<'a, R: Runtime> Operand<'a, R> {
    /// Pair a buffer with its shape
    pub fn new(storage: &'a Storage<R>, shape: &'a Shape) -> Self {
        debug_assert_eq!(storage.len(), shape.contiguous_size());
        Self { storage, shape }
    }

    /// The underlying buffer
    #[inline]
    pub fn storage(&self) -> &'a Storage<R> {
        self.storage
    }

    /// Dimensions of the buffer contents
    #[inline]
    pub fn shape(&self) -> &'a Shape {
        self.shape
    }

    /// Physical element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }
}

/// Trait for runtime clients that execute operations
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Get the device this client operates on
    fn device(&self) -> &R::Device;

    /// Synchronize: wait for all pending operations to complete
    fn synchronize(&self);

    /// Run one operation
    ///
    /// `outputs` are pre-allocated with the shapes and dtypes the dispatch
    /// layer derived from `op` and the inputs. A backend that cannot run the
    /// operation for these dtypes returns an error and leaves outputs unspecified.
    fn execute(&self, op: &Op, inputs: &[Operand<'_, R>], outputs: &[Operand<'_, R>])
    -> Result<()>;
}
