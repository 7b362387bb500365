//! Element-wise cyclic distributions over a process grid.
//!
//! Each dimension of a distributed matrix is distributed according to a [`Dist`]. Along a
//! distributed dimension with stride `s` and alignment `a`, the global index `i` is owned by the
//! processes whose rank in that distribution is `(a + i) mod s`. The calling process owns the
//! indices congruent to its *shift* `(rank − a) mod s`, and stores them contiguously in its local
//! buffer: local index `k` corresponds to global index `shift + k * s`.
//!
//! | dist   | stride  | rank of process `(row, col)` |
//! |--------|---------|------------------------------|
//! | `Mc`   | `r`     | `row`                        |
//! | `Mr`   | `c`     | `col`                        |
//! | `Vc`   | `r × c` | `row + col × r`              |
//! | `Vr`   | `r × c` | `row × c + col`              |
//! | `Star` | `1`     | `0` (replicated)             |

use crate::{
    error::{Error, Result},
    Grid,
};
use core::fmt;

pub mod local;
mod matrix;
mod redist;
mod view;

pub use matrix::DistMatrix;
pub use view::{DistMatMut, DistMatRef};

/// Distribution of one dimension of a matrix over the process grid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Dist {
    /// Cyclic over the process rows.
    Mc,
    /// Cyclic over the process columns.
    Mr,
    /// Cyclic over every process, in column-major order.
    Vc,
    /// Cyclic over every process, in row-major order.
    Vr,
    /// Replicated on every process.
    Star,
}

impl Dist {
    /// Returns the number of distinct owners along this distribution.
    #[inline]
    pub fn stride(self, grid: &Grid) -> usize {
        match self {
            Dist::Mc => grid.height(),
            Dist::Mr => grid.width(),
            Dist::Vc | Dist::Vr => grid.size(),
            Dist::Star => 1,
        }
    }

    /// Returns the rank of the calling process in this distribution.
    #[inline]
    pub fn rank(self, grid: &Grid) -> usize {
        match self {
            Dist::Mc => grid.row(),
            Dist::Mr => grid.col(),
            Dist::Vc => grid.vc_rank(),
            Dist::Vr => grid.vr_rank(),
            Dist::Star => 0,
        }
    }

    /// Returns the grid coordinates `(row, col)` of the processes with the given rank in this
    /// distribution. `None` means any row (or column) of the grid.
    #[inline]
    pub fn owner(self, grid: &Grid, rank: usize) -> (Option<usize>, Option<usize>) {
        match self {
            Dist::Mc => (Some(rank), None),
            Dist::Mr => (None, Some(rank)),
            Dist::Vc => (Some(rank % grid.height()), Some(rank / grid.height())),
            Dist::Vr => (Some(rank / grid.width()), Some(rank % grid.width())),
            Dist::Star => (None, None),
        }
    }

    #[inline]
    fn uses_grid_rows(self) -> bool {
        matches!(self, Dist::Mc | Dist::Vc | Dist::Vr)
    }

    #[inline]
    fn uses_grid_cols(self) -> bool {
        matches!(self, Dist::Mr | Dist::Vc | Dist::Vr)
    }
}

impl fmt::Display for Dist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dist::Mc => "MC",
            Dist::Mr => "MR",
            Dist::Vc => "VC",
            Dist::Vr => "VR",
            Dist::Star => "*",
        })
    }
}

/// Distribution format of a matrix: the distributions of its rows and of its columns.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Format {
    /// Distribution of the row indices.
    pub rows: Dist,
    /// Distribution of the column indices.
    pub cols: Dist,
}

impl Format {
    pub const MC_MR: Self = Self::new(Dist::Mc, Dist::Mr);
    pub const MR_MC: Self = Self::new(Dist::Mr, Dist::Mc);
    pub const MC_STAR: Self = Self::new(Dist::Mc, Dist::Star);
    pub const STAR_MC: Self = Self::new(Dist::Star, Dist::Mc);
    pub const MR_STAR: Self = Self::new(Dist::Mr, Dist::Star);
    pub const STAR_MR: Self = Self::new(Dist::Star, Dist::Mr);
    pub const VC_STAR: Self = Self::new(Dist::Vc, Dist::Star);
    pub const STAR_VC: Self = Self::new(Dist::Star, Dist::Vc);
    pub const VR_STAR: Self = Self::new(Dist::Vr, Dist::Star);
    pub const STAR_VR: Self = Self::new(Dist::Star, Dist::Vr);
    pub const STAR_STAR: Self = Self::new(Dist::Star, Dist::Star);

    #[inline]
    pub const fn new(rows: Dist, cols: Dist) -> Self {
        Self { rows, cols }
    }

    /// Checks that no grid axis is used by both dimensions.
    #[inline]
    pub fn is_valid(self) -> bool {
        !(self.rows.uses_grid_rows() && self.cols.uses_grid_rows())
            && !(self.rows.uses_grid_cols() && self.cols.uses_grid_cols())
    }

    /// Returns an error if the format is not valid.
    #[inline]
    pub fn check(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::UnsupportedFormat { format: self })
        }
    }

    /// Returns the format of the transposed matrix.
    #[inline]
    pub fn transpose(self) -> Self {
        Self::new(self.cols, self.rows)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.rows, self.cols)
    }
}

/// Returns the first global index owned by the process of rank `rank`, along a dimension with
/// the given alignment and stride.
#[inline]
pub fn shift(rank: usize, align: usize, stride: usize) -> usize {
    (rank + stride - align % stride) % stride
}

/// Returns the number of indices in `0..n` that are congruent to `shift` modulo `stride`.
#[inline]
pub fn local_length(n: usize, shift: usize, stride: usize) -> usize {
    if n > shift {
        (n - shift - 1) / stride + 1
    } else {
        0
    }
}

/// Index mapping of one dimension, as seen by the calling process.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Axis {
    pub dist: Dist,
    pub align: usize,
    pub stride: usize,
    pub shift: usize,
}

impl Axis {
    #[inline]
    pub fn new(dist: Dist, align: usize, grid: &Grid) -> Self {
        let stride = dist.stride(grid);
        let align = align % stride;
        Self {
            dist,
            align,
            stride,
            shift: shift(dist.rank(grid), align, stride),
        }
    }

    #[inline]
    pub fn global(self, local: usize) -> usize {
        self.shift + local * self.stride
    }

    /// Number of owned indices in `0..n`.
    #[inline]
    pub fn local_len(self, n: usize) -> usize {
        local_length(n, self.shift, self.stride)
    }

    #[inline]
    pub fn local_index(self, global: usize) -> Option<usize> {
        if global % self.stride == self.shift {
            Some(global / self.stride)
        } else {
            None
        }
    }

    /// Grid coordinates of the owners of `global`.
    #[inline]
    pub fn owner(self, grid: &Grid, global: usize) -> (Option<usize>, Option<usize>) {
        self.dist.owner(grid, (self.align + global) % self.stride)
    }

    /// Local offset, local length and alignment of the global range `start..start + len`.
    #[inline]
    pub fn restrict(self, grid: &Grid, start: usize, len: usize) -> (usize, usize, Axis) {
        let sub = Axis::new(self.dist, self.align + start, grid);
        (self.local_len(start), sub.local_len(len), sub)
    }
}

/// Returns the alignment that makes a dimension distributed as `dist` share the owners of the
/// matching dimension of a matrix with the given format and alignments.
///
/// `Mc` and `Vc` follow the alignment of the `Mc` dimension of the other matrix, `Mr` and `Vr`
/// follow the alignment of its `Mr` dimension. Other combinations align to `0`.
pub fn aligned_like(dist: Dist, format: Format, row_align: usize, col_align: usize) -> usize {
    let like = |target: Dist| {
        if format.rows == target {
            Some(row_align)
        } else if format.cols == target {
            Some(col_align)
        } else {
            None
        }
    };
    match dist {
        Dist::Mc | Dist::Vc => like(Dist::Mc),
        Dist::Mr | Dist::Vr => like(Dist::Mr),
        Dist::Star => None,
    }
    .unwrap_or(0)
}

// grid coordinates that own an entry, given the owners of its row and of its column
#[inline]
pub(crate) fn merge_owners(
    row: (Option<usize>, Option<usize>),
    col: (Option<usize>, Option<usize>),
) -> (Option<usize>, Option<usize>) {
    (row.0.or(col.0), row.1.or(col.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::assert as fancy_assert;

    #[test]
    fn test_local_length() {
        fancy_assert!(local_length(0, 0, 3) == 0);
        fancy_assert!(local_length(7, 0, 3) == 3);
        fancy_assert!(local_length(7, 1, 3) == 2);
        fancy_assert!(local_length(7, 2, 3) == 2);
        fancy_assert!(local_length(2, 2, 3) == 0);
        fancy_assert!(local_length(5, 0, 1) == 5);

        for stride in 1..5 {
            for n in 0..12 {
                let total: usize = (0..stride).map(|s| local_length(n, s, stride)).sum();
                fancy_assert!(total == n);
            }
        }
    }

    #[test]
    fn test_shift() {
        fancy_assert!(shift(0, 0, 3) == 0);
        fancy_assert!(shift(0, 1, 3) == 2);
        fancy_assert!(shift(2, 1, 3) == 1);
        fancy_assert!(shift(0, 0, 1) == 0);
        for stride in 1..5 {
            for align in 0..stride {
                for rank in 0..stride {
                    // the first owned index is owned by `rank`
                    fancy_assert!((align + shift(rank, align, stride)) % stride == rank);
                }
            }
        }
    }

    #[test]
    fn test_formats() {
        for format in [
            Format::MC_MR,
            Format::MR_MC,
            Format::MC_STAR,
            Format::STAR_MC,
            Format::MR_STAR,
            Format::STAR_MR,
            Format::VC_STAR,
            Format::STAR_VC,
            Format::VR_STAR,
            Format::STAR_VR,
            Format::STAR_STAR,
        ] {
            fancy_assert!(format.is_valid());
            fancy_assert!(format.transpose().is_valid());
        }
        fancy_assert!(!Format::new(Dist::Mc, Dist::Mc).is_valid());
        fancy_assert!(!Format::new(Dist::Vc, Dist::Mr).is_valid());
        fancy_assert!(!Format::new(Dist::Vr, Dist::Vc).is_valid());
        fancy_assert!(
            Format::new(Dist::Mc, Dist::Vr).check()
                == Err(Error::UnsupportedFormat {
                    format: Format::new(Dist::Mc, Dist::Vr)
                })
        );
        fancy_assert!(Format::MC_MR.to_string() == "[MC,MR]");
        fancy_assert!(Format::STAR_VR.to_string() == "[*,VR]");
    }

    #[test]
    fn test_aligned_like() {
        fancy_assert!(aligned_like(Dist::Vc, Format::MC_MR, 1, 2) == 1);
        fancy_assert!(aligned_like(Dist::Vr, Format::MC_MR, 1, 2) == 2);
        fancy_assert!(aligned_like(Dist::Mc, Format::STAR_MC, 0, 3) == 3);
        fancy_assert!(aligned_like(Dist::Mr, Format::MC_STAR, 1, 0) == 0);
        fancy_assert!(aligned_like(Dist::Star, Format::MC_MR, 1, 2) == 0);
    }

    #[test]
    fn test_owners_cover_the_grid() {
        let results = Grid::run(2, 3, |grid| {
            let mut counts = Vec::new();
            for dist in [Dist::Mc, Dist::Mr, Dist::Vc, Dist::Vr, Dist::Star] {
                for align in 0..dist.stride(grid) {
                    let axis = Axis::new(dist, align, grid);
                    for i in 0..11 {
                        let (row, col) = axis.owner(grid, i);
                        let owns = row.map_or(true, |row| row == grid.row())
                            && col.map_or(true, |col| col == grid.col());
                        // ownership agrees with the local index mapping
                        fancy_assert!(owns == axis.local_index(i).is_some());
                        if let Some(local) = axis.local_index(i) {
                            fancy_assert!(axis.global(local) == i);
                        }
                    }
                    counts.push(axis.local_len(11));
                }
            }
            counts
        })
        .unwrap();

        // `counts[5]` is `Vc` with alignment 0, each index has exactly one owner
        let vc_total: usize = results.iter().map(|counts| counts[5]).sum();
        fancy_assert!(vc_total == 11);
    }
}
