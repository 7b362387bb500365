use super::{Axis, DistMatrix, Format};
use crate::{Entity, Grid, MatMut, MatRef};
use assert2::assert as fancy_assert;
use reborrow::*;

/// View over a distributed matrix.
///
/// Each process holds a view over the local elements it owns, together with the global
/// dimensions and alignments of the viewed block. Sub-views are computed without communication:
/// the alignment of a view starting at global index `i` is `(align + i) mod stride`.
pub struct DistMatRef<'a, T> {
    pub(super) grid: &'a Grid,
    pub(super) format: Format,
    pub(super) nrows: usize,
    pub(super) ncols: usize,
    pub(super) row_axis: Axis,
    pub(super) col_axis: Axis,
    pub(super) local: MatRef<'a, T>,
}

/// Mutable view over a distributed matrix.
///
/// See [`DistMatRef`].
pub struct DistMatMut<'a, T> {
    pub(super) grid: &'a Grid,
    pub(super) format: Format,
    pub(super) nrows: usize,
    pub(super) ncols: usize,
    pub(super) row_axis: Axis,
    pub(super) col_axis: Axis,
    pub(super) local: MatMut<'a, T>,
}

impl<'a, T> Copy for DistMatRef<'a, T> {}
impl<'a, T> Clone for DistMatRef<'a, T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<'b, 'a, T> Reborrow<'b> for DistMatRef<'a, T> {
    type Target = DistMatRef<'b, T>;
    #[inline]
    fn rb(&'b self) -> Self::Target {
        *self
    }
}

impl<'b, 'a, T> ReborrowMut<'b> for DistMatRef<'a, T> {
    type Target = DistMatRef<'b, T>;
    #[inline]
    fn rb_mut(&'b mut self) -> Self::Target {
        *self
    }
}

impl<'b, 'a, T> Reborrow<'b> for DistMatMut<'a, T> {
    type Target = DistMatRef<'b, T>;
    #[inline]
    fn rb(&'b self) -> Self::Target {
        DistMatRef {
            grid: self.grid,
            format: self.format,
            nrows: self.nrows,
            ncols: self.ncols,
            row_axis: self.row_axis,
            col_axis: self.col_axis,
            local: self.local.rb(),
        }
    }
}

impl<'b, 'a, T> ReborrowMut<'b> for DistMatMut<'a, T> {
    type Target = DistMatMut<'b, T>;
    #[inline]
    fn rb_mut(&'b mut self) -> Self::Target {
        DistMatMut {
            grid: self.grid,
            format: self.format,
            nrows: self.nrows,
            ncols: self.ncols,
            row_axis: self.row_axis,
            col_axis: self.col_axis,
            local: self.local.rb_mut(),
        }
    }
}

impl<'a, T> IntoConst for DistMatMut<'a, T> {
    type Target = DistMatRef<'a, T>;
    #[inline]
    fn into_const(self) -> Self::Target {
        DistMatRef {
            grid: self.grid,
            format: self.format,
            nrows: self.nrows,
            ncols: self.ncols,
            row_axis: self.row_axis,
            col_axis: self.col_axis,
            local: self.local.into_const(),
        }
    }
}

// shared accessors of both view types
macro_rules! impl_view_accessors {
    ($ty: ident) => {
        impl<'a, T> $ty<'a, T> {
            /// Returns the grid the matrix is distributed over.
            #[inline]
            pub fn grid(&self) -> &'a Grid {
                self.grid
            }

            /// Returns the distribution format.
            #[inline]
            pub fn format(&self) -> Format {
                self.format
            }

            /// Returns the number of global rows.
            #[inline]
            pub fn nrows(&self) -> usize {
                self.nrows
            }

            /// Returns the number of global columns.
            #[inline]
            pub fn ncols(&self) -> usize {
                self.ncols
            }

            /// Returns the alignment of the row distribution.
            #[inline]
            pub fn row_align(&self) -> usize {
                self.row_axis.align
            }

            /// Returns the alignment of the column distribution.
            #[inline]
            pub fn col_align(&self) -> usize {
                self.col_axis.align
            }

            /// Returns the first global row owned by the calling process.
            #[inline]
            pub fn row_shift(&self) -> usize {
                self.row_axis.shift
            }

            /// Returns the first global column owned by the calling process.
            #[inline]
            pub fn col_shift(&self) -> usize {
                self.col_axis.shift
            }

            /// Returns the distance between two successive global rows owned by the calling
            /// process.
            #[inline]
            pub fn row_stride(&self) -> usize {
                self.row_axis.stride
            }

            /// Returns the distance between two successive global columns owned by the calling
            /// process.
            #[inline]
            pub fn col_stride(&self) -> usize {
                self.col_axis.stride
            }

            /// Returns the global row index of the local row `i`.
            #[inline]
            pub fn global_row(&self, i: usize) -> usize {
                self.row_axis.global(i)
            }

            /// Returns the global column index of the local column `j`.
            #[inline]
            pub fn global_col(&self, j: usize) -> usize {
                self.col_axis.global(j)
            }

            #[inline]
            pub(crate) fn row_axis(&self) -> Axis {
                self.row_axis
            }

            #[inline]
            pub(crate) fn col_axis(&self) -> Axis {
                self.col_axis
            }
        }
    };
}

impl_view_accessors!(DistMatRef);
impl_view_accessors!(DistMatMut);

impl<'a, T> DistMatRef<'a, T> {
    /// Returns the view over the local elements.
    #[inline]
    pub fn local(self) -> MatRef<'a, T> {
        self.local
    }

    /// Returns a view over the global block starting at `(i, j)` with dimensions
    /// `(nrows, ncols)`.
    ///
    /// # Panics
    ///
    /// Panics if the block does not fit inside `self`.
    #[track_caller]
    pub fn submatrix(self, i: usize, j: usize, nrows: usize, ncols: usize) -> Self {
        fancy_assert!(i <= self.nrows);
        fancy_assert!(j <= self.ncols);
        fancy_assert!(nrows <= self.nrows - i);
        fancy_assert!(ncols <= self.ncols - j);

        let (local_i, local_nrows, row_axis) = self.row_axis.restrict(self.grid, i, nrows);
        let (local_j, local_ncols, col_axis) = self.col_axis.restrict(self.grid, j, ncols);
        Self {
            grid: self.grid,
            format: self.format,
            nrows,
            ncols,
            row_axis,
            col_axis,
            local: self
                .local
                .submatrix(local_i, local_j, local_nrows, local_ncols),
        }
    }

    /// Splits the matrix into four corner parts in the following order: top left, top right,
    /// bottom left, bottom right.
    #[track_caller]
    pub fn split_at(self, i: usize, j: usize) -> (Self, Self, Self, Self) {
        fancy_assert!(i <= self.nrows);
        fancy_assert!(j <= self.ncols);
        let (m, n) = (self.nrows, self.ncols);
        (
            self.submatrix(0, 0, i, j),
            self.submatrix(0, j, i, n - j),
            self.submatrix(i, 0, m - i, j),
            self.submatrix(i, j, m - i, n - j),
        )
    }

    /// Splits the matrix horizontally into two parts in the following order: top, bottom.
    #[track_caller]
    pub fn split_at_row(self, i: usize) -> (Self, Self) {
        let (_, top, _, bottom) = self.split_at(i, 0);
        (top, bottom)
    }

    /// Splits the matrix vertically into two parts in the following order: left, right.
    #[track_caller]
    pub fn split_at_col(self, j: usize) -> (Self, Self) {
        let (_, _, left, right) = self.split_at(0, j);
        (left, right)
    }

    /// Returns the transpose of `self`, whose format is the transposed format.
    #[inline]
    pub fn transpose(self) -> Self {
        Self {
            grid: self.grid,
            format: self.format.transpose(),
            nrows: self.ncols,
            ncols: self.nrows,
            row_axis: self.col_axis,
            col_axis: self.row_axis,
            local: self.local.transpose(),
        }
    }

    /// Returns an owned copy of the view, with the same format and alignments. No communication
    /// is needed.
    pub fn to_owned(self) -> DistMatrix<T>
    where
        T: Entity,
    {
        DistMatrix::from_parts(
            self.grid.clone(),
            self.format,
            self.nrows,
            self.ncols,
            self.row_axis,
            self.col_axis,
            self.local.to_owned(),
        )
    }
}

impl<'a, T> DistMatMut<'a, T> {
    /// Returns the mutable view over the local elements.
    #[inline]
    pub fn local(self) -> MatMut<'a, T> {
        self.local
    }

    /// Returns a mutable view over the global block starting at `(i, j)` with dimensions
    /// `(nrows, ncols)`.
    ///
    /// # Panics
    ///
    /// Panics if the block does not fit inside `self`.
    #[track_caller]
    pub fn submatrix(self, i: usize, j: usize, nrows: usize, ncols: usize) -> Self {
        let sub = self.into_const().submatrix(i, j, nrows, ncols);
        // SAFETY: the view was uniquely borrowed, and the block lies inside it
        unsafe { sub.const_cast() }
    }

    /// Splits the matrix into four corner parts in the following order: top left, top right,
    /// bottom left, bottom right.
    #[track_caller]
    pub fn split_at(self, i: usize, j: usize) -> (Self, Self, Self, Self) {
        let (tl, tr, bl, br) = self.into_const().split_at(i, j);
        // SAFETY: the four parts are disjoint, and we had unique access to all of them
        unsafe {
            (
                tl.const_cast(),
                tr.const_cast(),
                bl.const_cast(),
                br.const_cast(),
            )
        }
    }

    /// Splits the matrix horizontally into two parts in the following order: top, bottom.
    #[track_caller]
    pub fn split_at_row(self, i: usize) -> (Self, Self) {
        let (_, top, _, bottom) = self.split_at(i, 0);
        (top, bottom)
    }

    /// Splits the matrix vertically into two parts in the following order: left, right.
    #[track_caller]
    pub fn split_at_col(self, j: usize) -> (Self, Self) {
        let (_, _, left, right) = self.split_at(0, j);
        (left, right)
    }

    /// Returns the transpose of `self`, whose format is the transposed format.
    #[inline]
    pub fn transpose(self) -> Self {
        // SAFETY: same elements, with swapped dimensions
        unsafe { self.into_const().transpose().const_cast() }
    }

    /// Calls `f(i, j, value)` for each local element, where `(i, j)` are its global indices.
    pub fn for_each_mut(self, mut f: impl FnMut(usize, usize, &mut T)) {
        let row_axis = self.row_axis;
        let col_axis = self.col_axis;
        let mut local = self.local;
        for local_j in 0..local.ncols() {
            let j = col_axis.global(local_j);
            for local_i in 0..local.nrows() {
                let i = row_axis.global(local_i);
                f(i, j, local.rb_mut().get(local_i, local_j));
            }
        }
    }

    /// Sets every local element to `value`.
    pub fn fill(&mut self, value: T)
    where
        T: Copy,
    {
        self.local.fill(value);
    }
}

impl<'a, T> DistMatRef<'a, T> {
    #[inline]
    unsafe fn const_cast(self) -> DistMatMut<'a, T> {
        DistMatMut {
            grid: self.grid,
            format: self.format,
            nrows: self.nrows,
            ncols: self.ncols,
            row_axis: self.row_axis,
            col_axis: self.col_axis,
            local: self.local.const_cast(),
        }
    }
}

impl<'a, T: Entity> DistMatRef<'a, T> {
    /// Reads the local element at local position `(i, j)`.
    #[track_caller]
    #[inline]
    pub fn read_local(&self, i: usize, j: usize) -> T {
        self.local.read(i, j)
    }
}

impl<'a, T: core::fmt::Debug> core::fmt::Debug for DistMatRef<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DistMatRef")
            .field("format", &self.format)
            .field("nrows", &self.nrows)
            .field("ncols", &self.ncols)
            .field("row_align", &self.row_axis.align)
            .field("col_align", &self.col_axis.align)
            .field("local", &self.local)
            .finish()
    }
}

impl<'a, T: core::fmt::Debug> core::fmt::Debug for DistMatMut<'a, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.rb().fmt(f)
    }
}
