//! CPU client implementation

use super::device::CpuDevice;
use super::kernels;
use super::runtime::CpuRuntime;
use crate::error::Result;
use crate::ops::Op;
use crate::runtime::{Operand, RuntimeClient};

/// CPU client for operation execution
///
/// Kernels run synchronously on the calling thread; element-wise kernels fan
/// out over rayon's pool when the `rayon` feature is enabled.
#[derive(Clone, Debug)]
pub struct CpuClient {
    device: CpuDevice,
}

impl CpuClient {
    /// Create a new CPU client
    pub fn new(device: CpuDevice) -> Self {
        Self { device }
    }
}

impl RuntimeClient<CpuRuntime> for CpuClient {
    fn device(&self) -> &CpuDevice {
        &self.device
    }

    fn synchronize(&self) {
        // CPU operations are synchronous, nothing to do
    }

    fn execute(
        &self,
        op: &Op,
        inputs: &[Operand<'_, CpuRuntime>],
        outputs: &[Operand<'_, CpuRuntime>],
    ) -> Result<()> {
        kernels::execute(op, inputs, outputs)
    }
}
