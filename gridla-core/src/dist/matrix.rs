use super::{aligned_like, Axis, DistMatMut, DistMatRef, Format};
use crate::{error::Result, Entity, Grid, Mat, MatRef};

/// Matrix distributed over a process grid.
///
/// Every process of the grid holds one `DistMatrix` handle, describing the same global matrix, and
/// stores the elements it owns in a column-major local buffer. Handles are created and
/// redistributed collectively: every process must perform the same calls in the same order.
///
/// # Example
///
/// ```
/// use gridla_core::{DistMatrix, Format, Grid};
///
/// let totals = Grid::run(2, 2, |grid| {
///     let a = DistMatrix::from_fn(grid, Format::MC_MR, 5, 5, |i, j| (i + j) as f64).unwrap();
///     // each process owns a part of the matrix
///     let local_sum: f64 = a.local().as_slice().iter().sum();
///     let full = a.to_mat().unwrap();
///     (local_sum, full.read(4, 3))
/// })
/// .unwrap();
///
/// let total: f64 = totals.iter().map(|&(local_sum, _)| local_sum).sum();
/// assert_eq!(total, 100.0);
/// assert!(totals.iter().all(|&(_, value)| value == 7.0));
/// ```
#[derive(Clone)]
pub struct DistMatrix<T> {
    grid: Grid,
    format: Format,
    nrows: usize,
    ncols: usize,
    row_axis: Axis,
    col_axis: Axis,
    local: Mat<T>,
}

impl<T: Entity> DistMatrix<T> {
    pub(super) fn from_parts(
        grid: Grid,
        format: Format,
        nrows: usize,
        ncols: usize,
        row_axis: Axis,
        col_axis: Axis,
        local: Mat<T>,
    ) -> Self {
        debug_assert!(local.nrows() == row_axis.local_len(nrows));
        debug_assert!(local.ncols() == col_axis.local_len(ncols));
        Self {
            grid,
            format,
            nrows,
            ncols,
            row_axis,
            col_axis,
            local,
        }
    }

    /// Returns an empty `0×0` matrix.
    pub fn new(grid: &Grid, format: Format) -> Result<Self> {
        Self::zeros(grid, format, 0, 0)
    }

    /// Returns an `nrows × ncols` matrix filled with zeros, with both alignments set to `0`.
    pub fn zeros(grid: &Grid, format: Format, nrows: usize, ncols: usize) -> Result<Self> {
        Self::zeros_aligned(grid, format, nrows, ncols, 0, 0)
    }

    /// Returns an `nrows × ncols` matrix filled with zeros, with the given alignments.
    ///
    /// Alignments are reduced modulo the stride of their distribution.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnsupportedFormat`] if `format` is not valid.
    pub fn zeros_aligned(
        grid: &Grid,
        format: Format,
        nrows: usize,
        ncols: usize,
        row_align: usize,
        col_align: usize,
    ) -> Result<Self> {
        format.check()?;
        let row_axis = Axis::new(format.rows, row_align, grid);
        let col_axis = Axis::new(format.cols, col_align, grid);
        Ok(Self::from_parts(
            grid.clone(),
            format,
            nrows,
            ncols,
            row_axis,
            col_axis,
            Mat::zeros(row_axis.local_len(nrows), col_axis.local_len(ncols)),
        ))
    }

    /// Returns an `nrows × ncols` matrix filled with zeros, aligned so that the processes owning
    /// its rows (or columns) also own the matching rows (or columns) of `other`, following
    /// [`super::aligned_like`].
    pub fn zeros_aligned_with<U>(
        format: Format,
        nrows: usize,
        ncols: usize,
        other: DistMatRef<'_, U>,
    ) -> Result<Self> {
        let row_align = aligned_like(format.rows, other.format(), other.row_align(), other.col_align());
        let col_align = aligned_like(format.cols, other.format(), other.row_align(), other.col_align());
        Self::zeros_aligned(other.grid(), format, nrows, ncols, row_align, col_align)
    }

    /// Returns an `nrows × ncols` matrix where the element at position `(i, j)` is `f(i, j)`.
    ///
    /// Each process only evaluates `f` at the positions it owns.
    pub fn from_fn(
        grid: &Grid,
        format: Format,
        nrows: usize,
        ncols: usize,
        mut f: impl FnMut(usize, usize) -> T,
    ) -> Result<Self> {
        let mut this = Self::zeros(grid, format, nrows, ncols)?;
        this.as_mut().for_each_mut(|i, j, value| *value = f(i, j));
        Ok(this)
    }

    /// Returns a distributed copy of `mat`, which must hold the full matrix on every process.
    pub fn from_mat(grid: &Grid, format: Format, mat: MatRef<'_, T>) -> Result<Self> {
        Self::from_fn(grid, format, mat.nrows(), mat.ncols(), |i, j| mat.read(i, j))
    }

    /// Returns the grid the matrix is distributed over.
    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
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

    /// Returns the distance between two successive global rows owned by the calling process.
    #[inline]
    pub fn row_stride(&self) -> usize {
        self.row_axis.stride
    }

    /// Returns the distance between two successive global columns owned by the calling process.
    #[inline]
    pub fn col_stride(&self) -> usize {
        self.col_axis.stride
    }

    /// Returns the local buffer.
    #[inline]
    pub fn local(&self) -> &Mat<T> {
        &self.local
    }

    /// Returns the local buffer.
    #[inline]
    pub fn local_mut(&mut self) -> &mut Mat<T> {
        &mut self.local
    }

    /// Consumes the matrix and returns its local buffer.
    #[inline]
    pub fn into_local(self) -> Mat<T> {
        self.local
    }

    /// Returns the number of rows of the local buffer.
    #[inline]
    pub fn local_nrows(&self) -> usize {
        self.local.nrows()
    }

    /// Returns the number of columns of the local buffer.
    #[inline]
    pub fn local_ncols(&self) -> usize {
        self.local.ncols()
    }

    /// Reads the local element at local position `(i, j)`.
    #[track_caller]
    #[inline]
    pub fn get_local(&self, i: usize, j: usize) -> T {
        self.local.read(i, j)
    }

    /// Writes the local element at local position `(i, j)`.
    #[track_caller]
    #[inline]
    pub fn set_local(&mut self, i: usize, j: usize, value: T) {
        self.local.write(i, j, value)
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

    /// Returns the local row index of the global row `i`, if the calling process owns it.
    #[inline]
    pub fn local_row(&self, i: usize) -> Option<usize> {
        self.row_axis.local_index(i)
    }

    /// Returns the local column index of the global column `j`, if the calling process owns it.
    #[inline]
    pub fn local_col(&self, j: usize) -> Option<usize> {
        self.col_axis.local_index(j)
    }

    /// Returns a view over the matrix.
    #[inline]
    pub fn as_ref(&self) -> DistMatRef<'_, T> {
        DistMatRef {
            grid: &self.grid,
            format: self.format,
            nrows: self.nrows,
            ncols: self.ncols,
            row_axis: self.row_axis,
            col_axis: self.col_axis,
            local: self.local.as_ref(),
        }
    }

    /// Returns a mutable view over the matrix.
    #[inline]
    pub fn as_mut(&mut self) -> DistMatMut<'_, T> {
        DistMatMut {
            grid: &self.grid,
            format: self.format,
            nrows: self.nrows,
            ncols: self.ncols,
            row_axis: self.row_axis,
            col_axis: self.col_axis,
            local: self.local.as_mut(),
        }
    }
}

impl<T: core::fmt::Debug> core::fmt::Debug for DistMatrix<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DistMatrix")
            .field("grid", &self.grid)
            .field("format", &self.format)
            .field("nrows", &self.nrows)
            .field("ncols", &self.ncols)
            .field("row_align", &self.row_axis.align)
            .field("col_align", &self.col_axis.align)
            .field("local", &self.local)
            .finish()
    }
}
