//! CPU kernel implementations
//!
//! [`execute`] is the CPU backend's entry point: it maps each [`Op`] to a
//! kernel over host byte slices. Data movement kernels in [`layout`] are
//! dtype-agnostic; arithmetic kernels are generic over `T: NumericElement`
//! and selected at runtime with `dispatch_numeric!`.

/// Bind `$T` to the Rust type of a numeric dtype and run `$body`
///
/// `Bool` has no arithmetic and yields `UnsupportedDType`.
macro_rules! dispatch_numeric {
    ($dtype:expr, $T:ident => $body:block, $error_op:expr) => {
        match $dtype {
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::dtype::DType::BF16 => {
                type $T = half::bf16;
                $body
            }
            $crate::dtype::DType::I64 => {
                type $T = i64;
                $body
            }
            $crate::dtype::DType::I32 => {
                type $T = i32;
                $body
            }
            $crate::dtype::DType::U8 => {
                type $T = u8;
                $body
            }
            dtype @ $crate::dtype::DType::Bool => {
                return Err($crate::error::Error::unsupported_dtype(dtype, $error_op));
            }
        }
    };
}

pub(crate) mod binary;
pub(crate) mod cast;
pub(crate) mod layout;
pub(crate) mod reduce;

use super::CpuRuntime;
use crate::dtype::{DType, Element, decode, encode};
use crate::error::{Error, Result};
use crate::ops::{Op, PadFill};
use crate::runtime::Operand;
use binary::BinaryOp;

type CpuOperand<'a> = Operand<'a, CpuRuntime>;

// ============================================================================
// Index helpers
// ============================================================================

/// Row-major strides in elements
pub(crate) fn strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

#[inline]
pub(crate) fn offset_of(index: &[usize], strides: &[usize]) -> usize {
    index.iter().zip(strides).map(|(&i, &s)| i * s).sum()
}

/// Call `f(linear, index)` for every multi-index of `shape` in row-major order
pub(crate) fn for_each_index(shape: &[usize], mut f: impl FnMut(usize, &[usize])) {
    let total: usize = shape.iter().product();
    let mut index = vec![0usize; shape.len()];

    for linear in 0..total {
        f(linear, &index);

        // Increment indices (row-major order)
        for dim in (0..shape.len()).rev() {
            index[dim] += 1;
            if index[dim] < shape[dim] {
                break;
            }
            index[dim] = 0;
        }
    }
}

/// Index values split into one row per batch entry
///
/// With `batch_dims` leading dimensions shared between params and indices,
/// batch entry `b` gathers with `row(b)`. Without batch dimensions there is
/// a single row holding every index.
pub(crate) struct IndexRows<'a> {
    values: &'a [i64],
    batch_dims: usize,
    row_len: usize,
}

impl<'a> IndexRows<'a> {
    pub(crate) fn new(values: &'a [i64], shape: &[usize], batch_dims: usize) -> Self {
        Self {
            values,
            batch_dims,
            row_len: shape[batch_dims..].iter().product(),
        }
    }

    /// Indices used by every batch entry
    #[inline]
    pub(crate) fn row_len(&self) -> usize {
        self.row_len
    }

    /// Row of the batch entry owning outer block `outer` of `shape`
    ///
    /// `shape` is the params (or scattered output) shape and `axis` the
    /// gathered axis; outer blocks are the positions of `shape[..axis]`.
    pub(crate) fn row_for(&self, outer: usize, shape: &[usize], axis: usize) -> &'a [i64] {
        let per_batch: usize = shape[self.batch_dims..axis].iter().product();
        let batch = outer / per_batch;
        &self.values[batch * self.row_len..(batch + 1) * self.row_len]
    }
}

/// Validate an index read from tensor data against a dimension size
#[inline]
pub(crate) fn checked_index(index: i64, size: usize) -> Result<usize> {
    if index < 0 || index as u64 >= size as u64 {
        return Err(Error::IndexOutOfBounds { index, size });
    }
    Ok(index as usize)
}

// ============================================================================
// Host access
// ============================================================================

fn host<'a>(operand: &CpuOperand<'a>) -> &'a [u8] {
    let storage = operand.storage();
    let len = storage.size_in_bytes();
    if len == 0 {
        return &[];
    }
    // SAFETY: CPU storage pointers are host allocations of exactly
    // `size_in_bytes` bytes, kept alive by the borrowed storage.
    unsafe { std::slice::from_raw_parts(storage.ptr() as *const u8, len) }
}

/// Mutable views of every output
///
/// Fails unless each output is uniquely owned and shares no memory with any
/// input or other output.
fn output_slices<'a>(
    op: &Op,
    inputs: &[CpuOperand<'_>],
    outputs: &[CpuOperand<'a>],
) -> Result<Vec<&'a mut [u8]>> {
    for (i, out) in outputs.iter().enumerate() {
        let storage = out.storage();
        if storage.is_empty() {
            continue;
        }
        let aliased = inputs
            .iter()
            .chain(&outputs[..i])
            .any(|other| other.storage().ptr() == storage.ptr());
        if !storage.is_unique() || aliased {
            return Err(Error::Internal(format!(
                "{}: output {i} is shared or aliases another operand",
                op.name()
            )));
        }
    }

    Ok(outputs
        .iter()
        .map(|out| {
            let storage = out.storage();
            let len = storage.size_in_bytes();
            if len == 0 {
                return &mut [][..];
            }
            // SAFETY: checked above that this allocation is uniquely owned and
            // disjoint from every other operand, so no other slice aliases it.
            unsafe { std::slice::from_raw_parts_mut(storage.ptr() as *mut u8, len) }
        })
        .collect())
}

fn exactly<'o, 'a, const N: usize>(
    op: &Op,
    what: &str,
    operands: &'o [CpuOperand<'a>],
) -> Result<&'o [CpuOperand<'a>; N]> {
    operands
        .try_into()
        .map_err(|_| Error::arity(op.name(), what, N, operands.len()))
}

fn store<T: Element>(op: &Op, out: &mut [u8], values: &[T]) -> Result<()> {
    let bytes = encode(values);
    if bytes.len() != out.len() {
        return Err(Error::Internal(format!(
            "{}: kernel produced {} bytes for a {}-byte output",
            op.name(),
            bytes.len(),
            out.len()
        )));
    }
    out.copy_from_slice(bytes);
    Ok(())
}

fn same_dtype(op: &Op, a: &CpuOperand<'_>, b: &CpuOperand<'_>) -> Result<DType> {
    if a.dtype() != b.dtype() {
        return Err(Error::Internal(format!(
            "{}: operand dtypes differ ({} vs {})",
            op.name(),
            a.dtype(),
            b.dtype()
        )));
    }
    Ok(a.dtype())
}

fn index_values(op: &Op, indices: &CpuOperand<'_>) -> Result<Vec<i64>> {
    match indices.dtype() {
        DType::I64 => Ok(decode::<i64>(host(indices))),
        DType::I32 => Ok(decode::<i32>(host(indices))
            .into_iter()
            .map(i64::from)
            .collect()),
        dtype => Err(Error::unsupported_dtype(dtype, op.name())),
    }
}

/// Non-zero test for every element, whatever the dtype
fn non_zero_mask(op: &Op, operand: &CpuOperand<'_>) -> Result<Vec<bool>> {
    if operand.dtype() == DType::Bool {
        return Ok(decode::<bool>(host(operand)));
    }
    dispatch_numeric!(operand.dtype(), T => {
        let zero = <T as crate::dtype::NumericElement>::zero();
        Ok(decode::<T>(host(operand)).into_iter().map(|v| v != zero).collect())
    }, op.name())
}

/// Row-major coordinates of set mask positions, flattened `[count, rank]`
fn coordinates(mask: &[bool], shape: &[usize]) -> Vec<i64> {
    let mut coords = Vec::new();
    for_each_index(shape, |linear, index| {
        if mask[linear] {
            coords.extend(index.iter().map(|&i| i as i64));
        }
    });
    coords
}

// ============================================================================
// Entry point
// ============================================================================

/// Run one operation over host buffers
pub(crate) fn execute(
    op: &Op,
    inputs: &[CpuOperand<'_>],
    outputs: &[CpuOperand<'_>],
) -> Result<()> {
    let mut outs = output_slices(op, inputs, outputs)?;
    let name = op.name();

    if let Op::Split { axis } = op {
        let [src] = exactly::<1>(op, "input", inputs)?;
        let elem = src.dtype().size_in_bytes();
        let mut parts: Vec<(&mut [u8], &[usize])> = outs
            .into_iter()
            .zip(outputs)
            .map(|(bytes, operand)| (bytes, operand.shape().dimensions()))
            .collect();
        layout::split(host(src), src.shape(), &mut parts, *axis, elem);
        return Ok(());
    }

    if let Op::Concat { axis } = op {
        let [dst] = exactly::<1>(op, "output", outputs)?;
        let parts: Vec<(&[u8], &[usize])> = inputs
            .iter()
            .map(|operand| (host(operand), operand.shape().dimensions()))
            .collect();
        let elem = dst.dtype().size_in_bytes();
        layout::concat(&parts, &mut outs[0][..], dst.shape(), *axis, elem);
        return Ok(());
    }

    let [dst] = exactly::<1>(op, "output", outputs)?;
    let out: &mut [u8] = outs.swap_remove(0);

    match op {
        Op::Cast => {
            let [src] = exactly::<1>(op, "input", inputs)?;
            cast::cast(host(src), src.dtype(), out, dst.dtype())
        }
        Op::Transpose { permutation } => {
            let [src] = exactly::<1>(op, "input", inputs)?;
            let elem = src.dtype().size_in_bytes();
            layout::transpose(host(src), src.shape(), out, dst.shape(), permutation, elem);
            Ok(())
        }
        Op::Reverse { axes } => {
            let [src] = exactly::<1>(op, "input", inputs)?;
            layout::reverse(host(src), src.shape(), out, axes, src.dtype().size_in_bytes());
            Ok(())
        }
        Op::Slice { lower_bounds } => {
            let [src] = exactly::<1>(op, "input", inputs)?;
            let elem = src.dtype().size_in_bytes();
            layout::slice(host(src), src.shape(), out, dst.shape(), lower_bounds, elem);
            Ok(())
        }
        Op::Pad { paddings, fill } => {
            let [src] = exactly::<1>(op, "input", inputs)?;
            match fill {
                PadFill::Constant(value) => {
                    if value.len() != src.dtype().size_in_bytes() {
                        return Err(Error::Internal(format!(
                            "pad: fill of {} bytes for {} elements",
                            value.len(),
                            src.dtype()
                        )));
                    }
                    layout::pad_constant(host(src), src.shape(), out, dst.shape(), paddings, value);
                }
                PadFill::Mirror(mode) => {
                    let elem = src.dtype().size_in_bytes();
                    layout::pad_mirror(
                        host(src),
                        src.shape(),
                        out,
                        dst.shape(),
                        paddings,
                        *mode,
                        elem,
                    );
                }
            }
            Ok(())
        }
        Op::MirrorPadGrad { paddings, mode } => {
            let [grad] = exactly::<1>(op, "input", inputs)?;
            dispatch_numeric!(grad.dtype(), T => {
                let folded = reduce::mirror_pad_grad(
                    &decode::<T>(host(grad)),
                    grad.shape(),
                    dst.shape(),
                    paddings,
                    *mode,
                );
                store(op, out, &folded)
            }, name)
        }
        Op::Tile { .. } => {
            let [src] = exactly::<1>(op, "input", inputs)?;
            let elem = src.dtype().size_in_bytes();
            layout::tile(host(src), src.shape(), out, dst.shape(), elem);
            Ok(())
        }
        Op::BroadcastTo => {
            let [src] = exactly::<1>(op, "input", inputs)?;
            let elem = src.dtype().size_in_bytes();
            layout::broadcast_to(host(src), src.shape(), out, dst.shape(), elem);
            Ok(())
        }
        Op::Gather { axis, batch_dims } => {
            let [params, index_operand] = exactly::<2>(op, "input", inputs)?;
            let indices = index_values(op, index_operand)?;
            let rows = IndexRows::new(&indices, index_operand.shape(), *batch_dims);
            let elem = params.dtype().size_in_bytes();
            layout::gather(host(params), params.shape(), &rows, out, *axis, elem)
        }
        Op::ScatterAdd { axis, batch_dims } => {
            let [updates, index_operand] = exactly::<2>(op, "input", inputs)?;
            let indices = index_values(op, index_operand)?;
            let rows = IndexRows::new(&indices, index_operand.shape(), *batch_dims);
            dispatch_numeric!(updates.dtype(), T => {
                let summed = reduce::scatter_add(
                    &decode::<T>(host(updates)),
                    &rows,
                    dst.shape(),
                    *axis,
                )?;
                store(op, out, &summed)
            }, name)
        }
        Op::Sum { axes } => {
            let [src] = exactly::<1>(op, "input", inputs)?;
            dispatch_numeric!(src.dtype(), T => {
                let summed = reduce::sum(&decode::<T>(host(src)), src.shape(), axes);
                store(op, out, &summed)
            }, name)
        }
        Op::Add | Op::Sub | Op::Mul => {
            let [a, b] = exactly::<2>(op, "input", inputs)?;
            let kind = match op {
                Op::Add => BinaryOp::Add,
                Op::Sub => BinaryOp::Sub,
                _ => BinaryOp::Mul,
            };
            dispatch_numeric!(same_dtype(op, a, b)?, T => {
                let result = binary::binary(
                    kind,
                    &decode::<T>(host(a)),
                    a.shape(),
                    &decode::<T>(host(b)),
                    b.shape(),
                    dst.shape(),
                );
                store(op, out, &result)
            }, name)
        }
        Op::Equal | Op::NotEqual => {
            let [a, b] = exactly::<2>(op, "input", inputs)?;
            let equal = matches!(op, Op::Equal);
            // bool buffers hold 0/1 bytes, so they compare exactly as u8
            let dtype = match same_dtype(op, a, b)? {
                DType::Bool => DType::U8,
                dtype => dtype,
            };
            dispatch_numeric!(dtype, T => {
                let result = binary::compare(
                    equal,
                    &decode::<T>(host(a)),
                    a.shape(),
                    &decode::<T>(host(b)),
                    b.shape(),
                    dst.shape(),
                );
                store(op, out, &result)
            }, name)
        }
        Op::All | Op::Any => {
            let [src] = exactly::<1>(op, "input", inputs)?;
            if src.dtype() != DType::Bool {
                return Err(Error::unsupported_dtype(src.dtype(), name));
            }
            let value = reduce::all_any(&decode::<bool>(host(src)), matches!(op, Op::All));
            store(op, out, &[value])
        }
        Op::Where => {
            let [src] = exactly::<1>(op, "input", inputs)?;
            let mask = non_zero_mask(op, src)?;
            store(op, out, &coordinates(&mask, src.shape()))
        }
        Op::Split { .. } | Op::Concat { .. } => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_each_index_order() {
        let mut seen = Vec::new();
        for_each_index(&[2, 2], |linear, index| seen.push((linear, index.to_vec())));
        assert_eq!(
            seen,
            vec![
                (0, vec![0, 0]),
                (1, vec![0, 1]),
                (2, vec![1, 0]),
                (3, vec![1, 1])
            ]
        );
    }

    #[test]
    fn test_for_each_index_scalar_and_empty() {
        let mut calls = 0;
        for_each_index(&[], |_, index| {
            assert!(index.is_empty());
            calls += 1;
        });
        assert_eq!(calls, 1);

        for_each_index(&[3, 0], |_, _| panic!("no elements"));
    }

    #[test]
    fn test_coordinates() {
        let mask = [false, true, true, false];
        assert_eq!(coordinates(&mask, &[2, 2]), vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_checked_index() {
        assert_eq!(checked_index(2, 3).unwrap(), 2);
        assert!(matches!(
            checked_index(3, 3),
            Err(Error::IndexOutOfBounds { index: 3, size: 3 })
        ));
    }
}
