//! Shape type: dimensions of a tensor

use smallvec::SmallVec;
use std::fmt;
use std::iter::FromIterator;
use std::ops::Deref;

/// Stack allocation threshold for dimensions
/// Most tensors have 4 or fewer dimensions, so we stack-allocate up to 4
pub(crate) const STACK_DIMS: usize = 4;

/// Shape type: dimensions of a tensor
///
/// Immutable once built. A rank-0 shape describes a scalar and has a
/// contiguous size of 1.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(SmallVec<[usize; STACK_DIMS]>);

impl Shape {
    /// Create a shape from a list of dimensions
    pub fn new(dims: &[usize]) -> Self {
        Self(dims.iter().copied().collect())
    }

    /// Create the rank-0 (scalar) shape
    pub fn scalar() -> Self {
        Self(SmallVec::new())
    }

    /// `size` repeated `rank` times
    pub fn repeating(size: usize, rank: usize) -> Self {
        Self(std::iter::repeat_n(size, rank).collect())
    }

    /// Number of dimensions
    #[inline]
    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// View the dimensions as a slice
    #[inline]
    pub fn dimensions(&self) -> &[usize] {
        self.0.as_slice()
    }

    /// Number of scalars a contiguous buffer of this shape holds
    #[inline]
    pub fn contiguous_size(&self) -> usize {
        self.0.iter().product()
    }

    /// Row-major strides in elements
    pub fn strides(&self) -> SmallVec<[usize; STACK_DIMS]> {
        let mut strides: SmallVec<[usize; STACK_DIMS]> = SmallVec::from_elem(1, self.rank());
        for i in (0..self.rank().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * self.0[i + 1];
        }
        strides
    }

    /// Copy of this shape with `dims[axis]` replaced
    pub(crate) fn with_dim(&self, axis: usize, size: usize) -> Self {
        let mut dims = self.0.clone();
        dims[axis] = size;
        Self(dims)
    }

    /// Copy of this shape with `axis` removed
    pub(crate) fn without_dim(&self, axis: usize) -> Self {
        let mut dims = self.0.clone();
        dims.remove(axis);
        Self(dims)
    }
}

impl Deref for Shape {
    type Target = [usize];

    fn deref(&self) -> &Self::Target {
        self.0.as_slice()
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0.as_slice(), f)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0.as_slice(), f)
    }
}

impl AsRef<[usize]> for Shape {
    fn as_ref(&self) -> &[usize] {
        self.0.as_slice()
    }
}

impl PartialEq<[usize]> for Shape {
    fn eq(&self, other: &[usize]) -> bool {
        self.0.as_slice() == other
    }
}

impl<const N: usize> PartialEq<[usize; N]> for Shape {
    fn eq(&self, other: &[usize; N]) -> bool {
        self.0.as_slice() == other.as_slice()
    }
}

impl From<Vec<usize>> for Shape {
    fn from(value: Vec<usize>) -> Self {
        Self(value.into_iter().collect())
    }
}

impl From<&[usize]> for Shape {
    fn from(value: &[usize]) -> Self {
        Self(value.iter().copied().collect())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(value: [usize; N]) -> Self {
        Self(value.into_iter().collect())
    }
}

impl<const N: usize> From<&[usize; N]> for Shape {
    fn from(value: &[usize; N]) -> Self {
        Self(value.iter().copied().collect())
    }
}

impl From<&Shape> for Shape {
    fn from(value: &Shape) -> Self {
        value.clone()
    }
}

impl FromIterator<usize> for Shape {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
