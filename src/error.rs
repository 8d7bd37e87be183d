//! Error types for difftensor
//!
//! Only failures that depend on the backend or on tensor *data* are values.
//! Shape, axis, device and precision misuse are caller bugs and panic at the
//! tensor layer before anything is dispatched.

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using difftensor's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the compute backend
#[derive(Error, Debug)]
pub enum Error {
    /// Allocation failed on the device
    #[error("Out of memory: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Requested size in bytes
        size: usize,
    },

    /// No kernel exists for this dtype
    #[error("Unsupported dtype {dtype} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// An index read from tensor data is outside the indexed dimension
    #[error("Index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index
        index: i64,
        /// Size of the dimension
        size: usize,
    },

    /// Backend-specific failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// Broken internal contract between dispatch and a backend
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an unsupported dtype error
    pub fn unsupported_dtype(dtype: DType, op: &'static str) -> Self {
        Self::UnsupportedDType { dtype, op }
    }

    /// Create an arity error for a backend call that received the wrong
    /// number of operands
    pub(crate) fn arity(op: &'static str, what: &str, expected: usize, got: usize) -> Self {
        Self::Internal(format!(
            "{op} expects {expected} {what} operand(s), got {got}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_values() {
        let err = Error::unsupported_dtype(DType::Bool, "sum");
        assert_eq!(err.to_string(), "Unsupported dtype bool for operation 'sum'");

        let err = Error::IndexOutOfBounds { index: -1, size: 4 };
        assert_eq!(
            err.to_string(),
            "Index -1 out of bounds for dimension of size 4"
        );
    }

    #[test]
    fn test_arity_is_internal() {
        let err = Error::arity("concat", "output", 1, 2);
        assert!(matches!(err, Error::Internal(_)));
        assert!(err.to_string().contains("concat expects 1 output"));
    }
}
