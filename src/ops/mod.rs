//! Operation kinds and the dispatch layer
//!
//! Every tensor operation reaches a backend as one [`Op`] plus operands:
//!
//! ```text
//! Tensor method
//!   ├── precondition checks (panic on misuse)      validate.rs
//!   ├── output shapes/dtypes derived a priori
//!   └── dispatch(op, inputs, outputs)              dispatch.rs
//!         └── RuntimeClient::execute(op, ...)
//! ```
//!
//! Attributes live in the `Op` value. Output shapes are not repeated there:
//! the backend reads them from the pre-allocated output operands.

pub(crate) mod dispatch;
pub mod validate;

pub use validate::{broadcast_shape, invert_permutation, normalize_axis};

/// Which edge rule a mirror pad uses
///
/// With `x = [1, 2, 3]` and one element of padding on each side:
/// `Reflect` gives `[2, 1, 2, 3, 2]` (edge excluded) and `Symmetric` gives
/// `[1, 1, 2, 3, 3]` (edge included).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MirrorMode {
    /// Mirror around the edge element
    Reflect,
    /// Mirror including the edge element
    Symmetric,
}

impl MirrorMode {
    /// Largest padding allowed on one side of a dimension of `size`
    pub fn max_padding(self, size: usize) -> usize {
        match self {
            Self::Reflect => size.saturating_sub(1),
            Self::Symmetric => size,
        }
    }
}

/// How padded positions are filled
#[derive(Clone, Debug, PartialEq)]
pub enum PadFill {
    /// One element of the output dtype, as raw bytes
    Constant(Vec<u8>),
    /// Mirrored from the interior
    Mirror(MirrorMode),
}

/// A backend operation with its attributes
///
/// Axes are already normalized to `0..rank`.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Element type conversion to the output dtype
    Cast,
    /// Permute dimensions: output dim `i` is input dim `permutation[i]`
    Transpose {
        /// Source dimension for every output dimension
        permutation: Vec<usize>,
    },
    /// Reverse element order along axes
    Reverse {
        /// Axes to reverse
        axes: Vec<usize>,
    },
    /// Extract a block starting at `lower_bounds` with the output's shape
    Slice {
        /// First element of the block along every dimension
        lower_bounds: Vec<usize>,
    },
    /// Grow every dimension by `(before, after)` elements
    Pad {
        /// One pair per dimension
        paddings: Vec<(usize, usize)>,
        /// Fill rule
        fill: PadFill,
    },
    /// Gradient of a mirror pad: fold the padded border back onto the interior
    MirrorPadGrad {
        /// Paddings of the forward pad
        paddings: Vec<(usize, usize)>,
        /// Edge rule of the forward pad
        mode: MirrorMode,
    },
    /// Join all inputs along an axis
    Concat {
        /// Axis to join along
        axis: usize,
    },
    /// Cut one input into the outputs along an axis
    Split {
        /// Axis to cut along
        axis: usize,
    },
    /// Repeat the input `multiples[i]` times along each dimension
    Tile {
        /// Repetitions per dimension
        multiples: Vec<usize>,
    },
    /// Stretch the input to the output shape (trailing-aligned)
    BroadcastTo,
    /// Select slices along `axis` with an integer index tensor
    ///
    /// The first `batch_dims` dimensions are shared by params and indices;
    /// each batch entry gathers with its own row of indices.
    Gather {
        /// Gathered axis of the params input
        axis: usize,
        /// Leading dimensions shared with the indices
        batch_dims: usize,
    },
    /// Add update slices into a zero output at gathered positions
    ScatterAdd {
        /// Axis of the output the indices address
        axis: usize,
        /// Leading dimensions shared with the indices
        batch_dims: usize,
    },
    /// Sum over axes; the output shape decides whether reduced dims are kept
    Sum {
        /// Reduced axes of the input
        axes: Vec<usize>,
    },
    /// Broadcasting element-wise addition
    Add,
    /// Broadcasting element-wise subtraction
    Sub,
    /// Broadcasting element-wise multiplication
    Mul,
    /// Broadcasting element-wise equality, boolean output
    Equal,
    /// Broadcasting element-wise inequality, boolean output
    NotEqual,
    /// Logical AND of every element, rank-0 boolean output
    All,
    /// Logical OR of every element, rank-0 boolean output
    Any,
    /// Coordinates of non-zero elements as a `[count, rank]` i64 output
    Where,
}

impl Op {
    /// Operation name for logging and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cast => "cast",
            Self::Transpose { .. } => "transpose",
            Self::Reverse { .. } => "reverse",
            Self::Slice { .. } => "slice",
            Self::Pad { .. } => "pad",
            Self::MirrorPadGrad { .. } => "mirror_pad_grad",
            Self::Concat { .. } => "concat",
            Self::Split { .. } => "split",
            Self::Tile { .. } => "tile",
            Self::BroadcastTo => "broadcast_to",
            Self::Gather { .. } => "gather",
            Self::ScatterAdd { .. } => "scatter_add",
            Self::Sum { .. } => "sum",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Equal => "equal",
            Self::NotEqual => "not_equal",
            Self::All => "all",
            Self::Any => "any",
            Self::Where => "where",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_padding_limits() {
        assert_eq!(MirrorMode::Reflect.max_padding(3), 2);
        assert_eq!(MirrorMode::Symmetric.max_padding(3), 3);
        assert_eq!(MirrorMode::Reflect.max_padding(0), 0);
    }

    #[test]
    fn test_names() {
        assert_eq!(Op::Concat { axis: 0 }.name(), "concat");
        assert_eq!(Op::Where.name(), "where");
    }
}
