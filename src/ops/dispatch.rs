//! Dispatch of one operation to the backend of a device
//!
//! The caller has already validated the call and derived every output's
//! shape and dtype. Dispatch allocates the outputs, hands everything to the
//! device's client and wraps the filled buffers as handles, so result shapes
//! are fixed before the backend runs.

use super::Op;
use crate::dtype::DType;
use crate::error::Result;
use crate::runtime::{Device, Operand, Runtime, RuntimeClient};
use crate::tensor::{Shape, Storage, TensorHandle};

/// Shape and physical dtype of one output
#[derive(Clone, Debug)]
pub(crate) struct OutputSpec {
    pub shape: Shape,
    pub dtype: DType,
}

impl OutputSpec {
    pub fn new(shape: impl Into<Shape>, dtype: DType) -> Self {
        Self {
            shape: shape.into(),
            dtype,
        }
    }
}

/// Run `op` on `device` and return one handle per output spec
#[track_caller]
pub(crate) fn dispatch<R: Runtime>(
    op: &Op,
    device: &R::Device,
    inputs: &[&TensorHandle<R>],
    outputs: Vec<OutputSpec>,
) -> Result<Vec<TensorHandle<R>>> {
    for input in inputs {
        assert!(
            input.device().is_same(device),
            "{}: operand on {} cannot be combined with operands on {}",
            op.name(),
            input.device().name(),
            device.name()
        );
    }

    log::trace!(
        "dispatch {} on {}: {} input(s) -> {:?}",
        op.name(),
        device.name(),
        inputs.len(),
        outputs.iter().map(|spec| &spec.shape).collect::<Vec<_>>()
    );

    let storages = outputs
        .iter()
        .map(|spec| Storage::new(spec.shape.contiguous_size(), spec.dtype, device))
        .collect::<Result<Vec<_>>>()?;

    {
        let input_operands: Vec<Operand<'_, R>> =
            inputs.iter().map(|handle| handle.operand()).collect();
        let output_operands: Vec<Operand<'_, R>> = storages
            .iter()
            .zip(&outputs)
            .map(|(storage, spec)| Operand::new(storage, &spec.shape))
            .collect();

        let client = R::default_client(device);
        client.execute(op, &input_operands, &output_operands)?;
    }

    Ok(storages
        .into_iter()
        .zip(outputs)
        .map(|(storage, spec)| TensorHandle::new(storage, spec.shape))
        .collect())
}

/// Single-output form of [`dispatch`]
#[track_caller]
pub(crate) fn dispatch_one<R: Runtime>(
    op: &Op,
    device: &R::Device,
    inputs: &[&TensorHandle<R>],
    output: OutputSpec,
) -> Result<TensorHandle<R>> {
    let mut handles = dispatch(op, device, inputs, vec![output])?;
    Ok(handles.remove(0))
}
