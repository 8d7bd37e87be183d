//! Core trait for compute backends

use crate::error::Result;
use std::fmt;

/// Core trait for compute backends
///
/// `Runtime` abstracts over different compute placements (host CPU,
/// accelerators). It uses static dispatch via generics; a tensor's runtime is
/// part of its type.
///
/// # Associated Types
///
/// - `Device`: Identifies a specific compute unit (e.g., CPU 0, GPU 1)
/// - `Client`: Executes operations on a device
///
/// # Example
///
/// ```
/// use difftensor::runtime::Runtime;
/// use difftensor::runtime::cpu::CpuRuntime;
///
/// let device = CpuRuntime::default_device();
/// let ptr = CpuRuntime::allocate(1024, &device).unwrap();
/// CpuRuntime::deallocate(ptr, 1024, &device);
/// ```
pub trait Runtime: Clone + Send + Sync + fmt::Debug + 'static {
    /// Device identifier type
    type Device: super::Device;

    /// Client for executing operations
    type Client: super::RuntimeClient<Self>;

    /// Human-readable name of this runtime
    fn name() -> &'static str;

    /// Allocate zeroed device memory
    ///
    /// Returns a device pointer (u64). Zero-byte requests return 0.
    /// Returns `Err(OutOfMemory)` if allocation fails.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64>;

    /// Deallocate device memory
    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device);

    /// Copy data from host to device
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()>;

    /// Copy data from device to host
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()>;

    /// Copy data within device (device to device)
    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        device: &Self::Device,
    ) -> Result<()>;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the client for a device
    fn default_client(device: &Self::Device) -> Self::Client;
}
