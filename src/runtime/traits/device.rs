//! Trait for device identification

use std::fmt;

/// Trait for device identification
///
/// Devices are plain values compared by id. Tensors on devices that are not
/// [`is_same`](Device::is_same) cannot be combined without an explicit copy.
pub trait Device: Clone + Send + Sync + fmt::Debug + 'static {
    /// Unique identifier for this device
    fn id(&self) -> usize;

    /// Check if two devices are the same
    fn is_same(&self, other: &Self) -> bool {
        self.id() == other.id()
    }

    /// Human-readable name
    fn name(&self) -> String {
        format!("Device({})", self.id())
    }
}
