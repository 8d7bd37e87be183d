//! CPU device implementation

use crate::runtime::Device;

/// A logical placement on the host CPU
///
/// All CPU devices share host memory, but tensors on differently numbered
/// devices are still distinct placements and are not combined implicitly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CpuDevice {
    id: usize,
}

impl CpuDevice {
    /// The default CPU device (id 0)
    pub fn new() -> Self {
        Self { id: 0 }
    }

    /// A numbered logical CPU device
    pub fn with_id(id: usize) -> Self {
        Self { id }
    }
}

impl Device for CpuDevice {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> String {
        format!("cpu:{}", self.id)
    }
}
