//! A device buffer paired with the shape it holds

use super::{Shape, Storage};
use crate::dtype::DType;
use crate::runtime::{Operand, Runtime};

/// Owning handle to a contiguous device buffer and its shape
///
/// The shape is fixed when the handle is created and always describes
/// exactly as many elements as the buffer holds.
pub struct TensorHandle<R: Runtime> {
    storage: Storage<R>,
    shape: Shape,
}

impl<R: Runtime> TensorHandle<R> {
    /// Pair a buffer with a shape
    ///
    /// # Panics
    ///
    /// Panics if the shape's contiguous size differs from the buffer length.
    #[track_caller]
    pub fn new(storage: Storage<R>, shape: Shape) -> Self {
        assert_eq!(
            shape.contiguous_size(),
            storage.len(),
            "shape {shape:?} describes {} scalars but the buffer holds {}",
            shape.contiguous_size(),
            storage.len()
        );
        Self { storage, shape }
    }

    /// The underlying buffer
    #[inline]
    pub fn storage(&self) -> &Storage<R> {
        &self.storage
    }

    pub(crate) fn storage_mut(&mut self) -> &mut Storage<R> {
        &mut self.storage
    }

    /// Shape of the buffer contents
    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Physical element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Device holding the buffer
    #[inline]
    pub fn device(&self) -> &R::Device {
        self.storage.device()
    }

    /// Same buffer viewed with another shape of equal size
    #[track_caller]
    pub fn reshaped(&self, shape: Shape) -> Self {
        Self::new(self.storage.clone(), shape)
    }

    /// Borrow as a backend operand
    pub fn operand(&self) -> Operand<'_, R> {
        Operand::new(&self.storage, &self.shape)
    }
}

impl<R: Runtime> Clone for TensorHandle<R> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            shape: self.shape.clone(),
        }
    }
}

impl<R: Runtime> std::fmt::Debug for TensorHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensorHandle")
            .field("shape", &self.shape)
            .field("storage", &self.storage)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_reshaped_shares_buffer() {
        let storage =
            Storage::<CpuRuntime>::from_slice(&[1.0f64, 2.0, 3.0, 4.0], &CpuDevice::new()).unwrap();
        let handle = TensorHandle::new(storage, Shape::new(&[2, 2]));
        let flat = handle.reshaped(Shape::new(&[4]));
        assert!(flat.storage().shares_buffer_with(handle.storage()));
        assert_eq!(flat.shape(), &[4]);
    }

    #[test]
    #[should_panic(expected = "describes 6 scalars but the buffer holds 4")]
    fn test_shape_must_match_buffer() {
        let storage = Storage::<CpuRuntime>::from_slice(&[0u8; 4], &CpuDevice::new()).unwrap();
        TensorHandle::new(storage, Shape::new(&[2, 3]));
    }
}
