//! Data type system for difftensor tensors
//!
//! `DType` is the runtime tag carried by every buffer. The traits in
//! [`element`] connect Rust scalar types to it and describe what a scalar can
//! do: be stored, take part in arithmetic, be differentiated, or index.

mod element;

pub use element::{Element, FloatElement, IndexElement, NumericElement};
pub(crate) use element::{decode, encode};

use std::fmt;

/// Physical element type of a device buffer
///
/// A tensor's logical scalar type maps to one of these through
/// [`Element::DTYPE`]. Floating tensors stored in reduced precision keep their
/// logical type but carry `BF16` buffers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    /// 64-bit floating point
    F64 = 0,
    /// 32-bit floating point
    F32 = 1,
    /// 16-bit brain floating point (reduced precision storage)
    BF16 = 3,
    /// 64-bit signed integer
    I64 = 10,
    /// 32-bit signed integer
    I32 = 11,
    /// 8-bit unsigned integer
    U8 = 23,
    /// Boolean type, one byte per element
    Bool = 30,
}

impl DType {
    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::F64 | Self::I64 => 8,
            Self::F32 | Self::I32 => 4,
            Self::BF16 => 2,
            Self::U8 | Self::Bool => 1,
        }
    }

    /// Returns true if this is a floating point type
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F64 | Self::F32 | Self::BF16)
    }

    /// Returns true if this is a signed integer type
    #[inline]
    pub const fn is_int(self) -> bool {
        matches!(self, Self::I64 | Self::I32)
    }

    /// Reduced precision storage for this dtype, if it has one
    #[inline]
    pub const fn reduced(self) -> Option<Self> {
        match self {
            Self::F64 | Self::F32 => Some(Self::BF16),
            _ => None,
        }
    }

    /// Whether buffers of this dtype are reduced precision
    #[inline]
    pub const fn is_reduced(self) -> bool {
        matches!(self, Self::BF16)
    }

    /// Short name for display (e.g., "f32", "i64")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::BF16 => "bf16",
            Self::I64 => "i64",
            Self::I32 => "i32",
            Self::U8 => "u8",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::F32.size_in_bytes(), 4);
        assert_eq!(DType::BF16.size_in_bytes(), 2);
        assert_eq!(DType::Bool.size_in_bytes(), 1);
    }

    #[test]
    fn test_reduced_forms() {
        assert_eq!(DType::F32.reduced(), Some(DType::BF16));
        assert_eq!(DType::F64.reduced(), Some(DType::BF16));
        assert_eq!(DType::BF16.reduced(), None);
        assert_eq!(DType::I64.reduced(), None);
        assert!(DType::BF16.is_reduced());
        assert!(!DType::F32.is_reduced());
    }

    #[test]
    fn test_display() {
        assert_eq!(DType::BF16.to_string(), "bf16");
        assert_eq!(format!("{}", DType::I32), "i32");
    }
}
