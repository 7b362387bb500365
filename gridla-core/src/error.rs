use crate::dist::{Dist, Format};

/// Precondition violations reported by the public entry points.
///
/// Every variant describes a caller contract violation. The checks run before any collective
/// communication, so all processes of a grid observe the same error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The operation requires a square matrix.
    #[error("{what} must be square, found a {nrows}×{ncols} matrix")]
    NotSquare {
        what: &'static str,
        nrows: usize,
        ncols: usize,
    },
    /// An operand does not have the dimension implied by the other operands.
    #[error("{what} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A pivot sign is neither `+1` nor `-1`.
    #[error("pivot sign at index {index} is {value}, expected +1 or -1")]
    InvalidPivotSign { index: usize, value: i8 },
    /// Two operands of a local kernel do not share the alignment of a matched dimension.
    #[error("{what} is misaligned: expected alignment {expected}, found {found}")]
    Misaligned {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// Two operands are distributed over different process grids.
    #[error("operands must be distributed over the same process grid")]
    GridMismatch,
    /// The distribution format cannot be used for this operand.
    #[error("{what} must be distributed as {expected}, found {found}")]
    InvalidFormat {
        what: &'static str,
        expected: Format,
        found: Format,
    },
    /// The format uses the same grid axis for both dimensions.
    #[error("{format} is not a valid distribution format")]
    UnsupportedFormat { format: Format },
    /// Two operands of a local kernel distribute a matched dimension differently.
    #[error("{what} is distributed as {found}, expected {expected}")]
    IncompatibleDist {
        what: &'static str,
        expected: Dist,
        found: Dist,
    },
    /// The processes of a grid were not given the same arguments.
    #[error("{what} differs between the processes of the grid")]
    InconsistentArguments { what: &'static str },
    /// The block size must be positive.
    #[error("block size must be at least 1")]
    InvalidBlockSize,
    /// The grid dimensions are invalid.
    #[error("process grid dimensions must be positive, found {height}×{width}")]
    InvalidGrid { height: usize, width: usize },
}

/// Result type of the fallible operations of the library.
pub type Result<T> = core::result::Result<T, Error>;
