//! Storage: device memory management with Arc-based sharing

use crate::dtype::{DType, Element, decode, encode};
use crate::error::Result;
use crate::runtime::{Device, Runtime};
use std::sync::Arc;

/// Storage for tensor data on a device
///
/// Storage wraps device memory with reference counting: cloning a tensor
/// clones the `Arc`, not the memory. Writes go through
/// [`make_unique`](Storage::make_unique), which copies a shared buffer first,
/// so sharing is never observable.
///
/// Memory is automatically deallocated when the last reference is dropped.
pub struct Storage<R: Runtime> {
    inner: Arc<StorageInner<R>>,
}

struct StorageInner<R: Runtime> {
    /// Raw device pointer (CPU ptr cast to u64, or a device address)
    ptr: u64,
    /// Number of elements (not bytes)
    len: usize,
    /// Physical element type
    dtype: DType,
    /// Device where memory is allocated
    device: R::Device,
}

impl<R: Runtime> Storage<R> {
    /// Create new zeroed storage
    ///
    /// Allocates `len` elements of type `dtype` on the specified device.
    pub fn new(len: usize, dtype: DType, device: &R::Device) -> Result<Self> {
        let ptr = R::allocate(len * dtype.size_in_bytes(), device)?;
        Ok(Self::wrap(ptr, len, dtype, device))
    }

    /// Create storage from host data with the element's own dtype
    pub fn from_slice<T: Element>(data: &[T], device: &R::Device) -> Result<Self> {
        Self::from_bytes(encode(data), T::DTYPE, device)
    }

    /// Create storage from raw bytes with explicit dtype
    pub fn from_bytes(data: &[u8], dtype: DType, device: &R::Device) -> Result<Self> {
        debug_assert_eq!(data.len() % dtype.size_in_bytes(), 0);
        let len = data.len() / dtype.size_in_bytes();
        let ptr = R::allocate(data.len(), device)?;
        let storage = Self::wrap(ptr, len, dtype, device);
        R::copy_to_device(data, ptr, device)?;
        Ok(storage)
    }

    fn wrap(ptr: u64, len: usize, dtype: DType, device: &R::Device) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                ptr,
                len,
                dtype,
                device: device.clone(),
            }),
        }
    }

    /// Get the raw device pointer
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.inner.ptr
    }

    /// Get the number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// Check if storage is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Get the element type
    #[inline]
    pub fn dtype(&self) -> DType {
        self.inner.dtype
    }

    /// Get the device
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.inner.device
    }

    /// Get size in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.inner.len * self.inner.dtype.size_in_bytes()
    }

    /// Get the reference count
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Check if this is the only reference
    #[inline]
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.inner) == 1
    }

    /// Whether two storages share one allocation
    #[inline]
    pub fn shares_buffer_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Copy the raw contents to the host
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; self.size_in_bytes()];
        R::copy_from_device(self.inner.ptr, &mut bytes, &self.inner.device)?;
        Ok(bytes)
    }

    /// Copy the contents to the host as elements of the storage dtype
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        debug_assert_eq!(T::DTYPE, self.dtype());
        Ok(decode(&self.to_bytes()?))
    }

    /// Ensure this is the only reference, copying the buffer if shared
    pub fn make_unique(&mut self) -> Result<()> {
        if self.is_unique() {
            return Ok(());
        }

        log::debug!(
            "copy-on-write: duplicating {} x {} buffer shared by {} owners",
            self.len(),
            self.dtype(),
            self.ref_count()
        );

        let copy = Self::new(self.len(), self.dtype(), self.device())?;
        R::copy_within_device(self.ptr(), copy.ptr(), self.size_in_bytes(), self.device())?;
        *self = copy;
        Ok(())
    }

    /// Overwrite the element at `index` with raw bytes of the storage dtype
    ///
    /// Copies first if the buffer is shared.
    pub fn write_element(&mut self, index: usize, bytes: &[u8]) -> Result<()> {
        let elem = self.dtype().size_in_bytes();
        assert!(
            index < self.len() && bytes.len() == elem,
            "write_element: index {index} / {} bytes invalid for {} x {}",
            bytes.len(),
            self.len(),
            self.dtype()
        );
        self.make_unique()?;
        R::copy_to_device(bytes, self.ptr() + (index * elem) as u64, self.device())
    }

    /// Copy into a new buffer on another device
    pub fn copy_to(&self, device: &R::Device) -> Result<Self> {
        log::debug!(
            "transferring {} x {} from {} to {}",
            self.len(),
            self.dtype(),
            self.device().name(),
            device.name()
        );
        Self::from_bytes(&self.to_bytes()?, self.dtype(), device)
    }
}

impl<R: Runtime> Clone for Storage<R> {
    /// Clone increments the reference count (zero-copy)
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Runtime> Drop for StorageInner<R> {
    fn drop(&mut self) {
        if self.ptr != 0 {
            R::deallocate(
                self.ptr,
                self.len * self.dtype.size_in_bytes(),
                &self.device,
            );
        }
    }
}

impl<R: Runtime> std::fmt::Debug for Storage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("ptr", &format!("0x{:x}", self.inner.ptr))
            .field("len", &self.inner.len)
            .field("dtype", &self.inner.dtype)
            .field("device", &self.inner.device)
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    #[test]
    fn test_from_slice_round_trip() {
        let device = CpuDevice::new();
        let storage = Storage::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0], &device).unwrap();
        assert_eq!(storage.len(), 3);
        assert_eq!(storage.dtype(), DType::F32);
        assert_eq!(storage.size_in_bytes(), 12);
        assert_eq!(storage.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_clone_shares() {
        let device = CpuDevice::new();
        let a = Storage::<CpuRuntime>::from_slice(&[1i64, 2], &device).unwrap();
        let b = a.clone();
        assert_eq!(a.ref_count(), 2);
        assert!(a.shares_buffer_with(&b));
        drop(b);
        assert!(a.is_unique());
    }

    #[test]
    fn test_write_copies_shared_buffer() {
        let device = CpuDevice::new();
        let a = Storage::<CpuRuntime>::from_slice(&[1i32, 2, 3], &device).unwrap();
        let mut b = a.clone();
        b.write_element(1, encode(&[20i32])).unwrap();

        assert!(!a.shares_buffer_with(&b));
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, 2, 3]);
        assert_eq!(b.to_vec::<i32>().unwrap(), vec![1, 20, 3]);
    }

    #[test]
    fn test_write_unique_buffer_in_place() {
        let device = CpuDevice::new();
        let mut a = Storage::<CpuRuntime>::from_slice(&[1u8, 2], &device).unwrap();
        let ptr = a.ptr();
        a.write_element(0, &[9]).unwrap();
        assert_eq!(a.ptr(), ptr);
        assert_eq!(a.to_vec::<u8>().unwrap(), vec![9, 2]);
    }

    #[test]
    fn test_copy_to_other_device() {
        let a = Storage::<CpuRuntime>::from_slice(&[true, false], &CpuDevice::new()).unwrap();
        let b = a.copy_to(&CpuDevice::with_id(1)).unwrap();
        assert_eq!(b.device().id(), 1);
        assert_eq!(b.to_vec::<bool>().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_empty_storage() {
        let storage = Storage::<CpuRuntime>::new(0, DType::F64, &CpuDevice::new()).unwrap();
        assert!(storage.is_empty());
        assert!(storage.to_vec::<f64>().unwrap().is_empty());
    }
}
