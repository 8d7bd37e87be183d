//! Element traits for mapping Rust types to DType

use super::DType;
use bytemuck::checked::CheckedBitPattern;
use bytemuck::{NoUninit, Pod};
use half::bf16;
use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Trait for types that can be elements of a tensor
///
/// Anything with a fixed byte layout that can round-trip through a device
/// buffer. `bool` qualifies; its buffers hold one byte per element and are
/// validated when read back.
pub trait Element:
    Copy + Send + Sync + fmt::Debug + PartialEq + NoUninit + CheckedBitPattern + 'static
{
    /// The corresponding DType for this Rust type
    const DTYPE: DType;

    /// Whether this is the zero value (`false` for `bool`)
    fn is_zero(self) -> bool;

    /// Reduced precision form of this scalar, for types that have one
    #[inline]
    fn to_reduced(self) -> Option<bf16> {
        None
    }

    /// Widen a reduced precision scalar back to this type
    #[inline]
    fn from_reduced(_value: bf16) -> Option<Self> {
        None
    }
}

/// Scalars that support arithmetic, sums and ordering
///
/// # Bounds
/// - `Pod` - kernels reinterpret buffers as slices of `Self`
/// - `Add + Sub + Mul` - arithmetic operations (Output = Self)
/// - `PartialOrd` - comparison
pub trait NumericElement:
    Element + Pod + PartialOrd + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self>
{
    /// Convert to f64 for generic numeric operations
    fn to_f64(self) -> f64;

    /// Convert from f64 to this type
    fn from_f64(v: f64) -> Self;

    /// Zero value
    fn zero() -> Self;

    /// One value
    fn one() -> Self;
}

/// Differentiable floating point scalars
///
/// Only tensors of these types have a tangent space and may be stored in
/// reduced precision.
pub trait FloatElement: NumericElement {}

/// Integer scalars usable as gather indices
pub trait IndexElement: NumericElement {
    /// Widen to i64
    fn to_i64(self) -> i64;

    /// Narrow from a position; positions always fit the index type in use
    fn from_usize(v: usize) -> Self;
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    #[inline]
    fn is_zero(self) -> bool {
        !self
    }
}

macro_rules! impl_numeric {
    (@arith $ty:ty, $zero:expr, $one:expr) => {
        impl NumericElement for $ty {
            #[inline]
            fn to_f64(self) -> f64 {
                self as f64
            }

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $ty
            }

            #[inline]
            fn zero() -> Self {
                $zero
            }

            #[inline]
            fn one() -> Self {
                $one
            }
        }
    };
    (float $ty:ty, $dtype:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn is_zero(self) -> bool {
                self == 0.0
            }

            #[inline]
            fn to_reduced(self) -> Option<bf16> {
                Some(bf16::from_f64(self as f64))
            }

            #[inline]
            fn from_reduced(value: bf16) -> Option<Self> {
                Some(value.to_f64() as $ty)
            }
        }

        impl FloatElement for $ty {}

        impl_numeric!(@arith $ty, 0.0, 1.0);
    };
    ($ty:ty, $dtype:expr, $zero:expr, $one:expr) => {
        impl Element for $ty {
            const DTYPE: DType = $dtype;

            #[inline]
            fn is_zero(self) -> bool {
                self == $zero
            }
        }

        impl_numeric!(@arith $ty, $zero, $one);
    };
}

impl_numeric!(float f64, DType::F64);
impl_numeric!(float f32, DType::F32);
impl_numeric!(i64, DType::I64, 0, 1);
impl_numeric!(i32, DType::I32, 0, 1);
impl_numeric!(u8, DType::U8, 0, 1);

impl IndexElement for i64 {
    #[inline]
    fn to_i64(self) -> i64 {
        self
    }

    #[inline]
    fn from_usize(v: usize) -> Self {
        v as i64
    }
}

impl IndexElement for i32 {
    #[inline]
    fn to_i64(self) -> i64 {
        self as i64
    }

    #[inline]
    fn from_usize(v: usize) -> Self {
        v as i32
    }
}

// bf16 is the physical form of reduced precision floats. Kernels work on it
// directly; it is deliberately not a FloatElement.
impl Element for bf16 {
    const DTYPE: DType = DType::BF16;

    #[inline]
    fn is_zero(self) -> bool {
        self == bf16::ZERO
    }
}

impl NumericElement for bf16 {
    #[inline]
    fn to_f64(self) -> f64 {
        bf16::to_f64(self)
    }

    #[inline]
    fn from_f64(v: f64) -> Self {
        bf16::from_f64(v)
    }

    #[inline]
    fn zero() -> Self {
        bf16::ZERO
    }

    #[inline]
    fn one() -> Self {
        bf16::ONE
    }
}

/// Read a host byte buffer as elements, validating bit patterns
pub(crate) fn decode<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::checked::pod_read_unaligned::<T>)
        .collect()
}

/// View elements as their host byte representation
pub(crate) fn encode<T: Element>(values: &[T]) -> &[u8] {
    bytemuck::cast_slice(values)
}
