//! Element type conversion

use crate::dtype::{DType, NumericElement, decode, encode};
use crate::error::Result;

fn convert<S: NumericElement, D: NumericElement>(src: &[u8], dst: &mut [u8]) {
    let values: Vec<D> = decode::<S>(src)
        .into_iter()
        .map(|v| D::from_f64(v.to_f64()))
        .collect();
    dst.copy_from_slice(encode(&values));
}

/// Convert every element of `src` to `dst_dtype`
///
/// Values pass through f64, which represents every supported element type
/// exactly; narrowing to bf16 rounds to nearest even.
pub(crate) fn cast(src: &[u8], src_dtype: DType, dst: &mut [u8], dst_dtype: DType) -> Result<()> {
    if src_dtype == dst_dtype {
        dst.copy_from_slice(src);
        return Ok(());
    }
    dispatch_numeric!(src_dtype, S => {
        dispatch_numeric!(dst_dtype, D => {
            convert::<S, D>(src, dst);
            Ok(())
        }, "cast")
    }, "cast")
}
