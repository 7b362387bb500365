//! Collective redistribution between distribution formats.
//!
//! Every operator is implemented by a single all-to-all exchange over the whole grid. Senders
//! pack, and receivers unpack, the elements of each message in global column-major order, so both
//! sides agree on the position of every element without sending indices.
//!
//! For a plain copy, each element is sent to each of its new owners by exactly one of its current
//! owners: the one that agrees with the receiver on every grid axis the source format leaves
//! unconstrained. For a sum-scatter, every current owner sends its partial value, and the receiver
//! adds the contributions in increasing rank order.

use super::{merge_owners, DistMatMut, DistMatRef, DistMatrix, Format};
use crate::{
    error::{Error, Result},
    ComplexField, Conj, Entity, Grid, Mat,
};
use core::ops::Range;
use reborrow::*;

type Owners = (Option<usize>, Option<usize>);

#[inline]
fn owner_range(owner: Option<usize>, len: usize) -> Range<usize> {
    match owner {
        Some(idx) => idx..idx + 1,
        None => 0..len,
    }
}

// calls `f(rank)` for every process matching `owners`, in increasing rank order
#[inline]
fn for_each_owner(grid: &Grid, owners: Owners, mut f: impl FnMut(usize)) {
    let rows = owner_range(owners.0, grid.height());
    for col in owner_range(owners.1, grid.width()) {
        for row in rows.clone() {
            f(grid.vc_rank_of(row, col));
        }
    }
}

// the owner in `from` that sends to the process at `(row, col)`
#[inline]
fn designated_sender(grid: &Grid, from: Owners, (row, col): (usize, usize)) -> usize {
    grid.vc_rank_of(from.0.unwrap_or(row), from.1.unwrap_or(col))
}

fn check_grids(dst: &Grid, src: &Grid) -> Result<()> {
    dst.check_same(src)
}

fn check_shape(
    what: &'static str,
    (nrows, ncols): (usize, usize),
    (expected_nrows, expected_ncols): (usize, usize),
) -> Result<()> {
    if nrows != expected_nrows {
        return Err(Error::DimensionMismatch {
            what,
            expected: expected_nrows,
            found: nrows,
        });
    }
    if ncols != expected_ncols {
        return Err(Error::DimensionMismatch {
            what,
            expected: expected_ncols,
            found: ncols,
        });
    }
    Ok(())
}

fn copy_impl<T: Entity>(dst: DistMatMut<'_, T>, src: DistMatRef<'_, T>) {
    let grid = src.grid();
    let (src_rows, src_cols) = (src.row_axis(), src.col_axis());
    let (dst_rows, dst_cols) = (dst.row_axis(), dst.col_axis());
    let same_layout = src.format() == dst.format() && src_rows == dst_rows && src_cols == dst_cols;
    let mut dst_local = dst.local();

    // no communication is needed when both sides own the same elements
    if same_layout {
        dst_local.copy_from(src.local());
        return;
    }

    // a fully replicated source is a local extraction
    if src.format() == Format::STAR_STAR {
        let src_local = src.local();
        for local_j in 0..dst_local.ncols() {
            let j = dst_cols.global(local_j);
            for local_i in 0..dst_local.nrows() {
                let i = dst_rows.global(local_i);
                dst_local.write(local_i, local_j, src_local.read(i, j));
            }
        }
        return;
    }

    let me = grid.vc_rank();
    let coords = (grid.row(), grid.col());
    let mut send: Vec<Vec<T>> = (0..grid.size()).map(|_| Vec::new()).collect();

    let src_local = src.local();
    for local_j in 0..src_local.ncols() {
        let j = src_cols.global(local_j);
        let src_col_owners = src_cols.owner(grid, j);
        let dst_col_owners = dst_cols.owner(grid, j);
        for local_i in 0..src_local.nrows() {
            let i = src_rows.global(local_i);
            let from = merge_owners(src_rows.owner(grid, i), src_col_owners);
            let to = merge_owners(dst_rows.owner(grid, i), dst_col_owners);
            let value = src_local.read(local_i, local_j);
            let rows = owner_range(to.0, grid.height());
            for col in owner_range(to.1, grid.width()) {
                for row in rows.clone() {
                    if designated_sender(grid, from, (row, col)) == me {
                        send[grid.vc_rank_of(row, col)].push(value);
                    }
                }
            }
        }
    }

    let recv = grid.vc_comm().all_to_all(send);
    let mut cursor = vec![0usize; grid.size()];

    for local_j in 0..dst_local.ncols() {
        let j = dst_cols.global(local_j);
        let src_col_owners = src_cols.owner(grid, j);
        for local_i in 0..dst_local.nrows() {
            let i = dst_rows.global(local_i);
            let from = merge_owners(src_rows.owner(grid, i), src_col_owners);
            let sender = designated_sender(grid, from, coords);
            dst_local.write(local_i, local_j, recv[sender][cursor[sender]]);
            cursor[sender] += 1;
        }
    }
    debug_assert!(cursor.iter().zip(&recv).all(|(&c, buf)| c == buf.len()));
}

fn sum_scatter_impl<T: ComplexField>(dst: DistMatMut<'_, T>, partial: DistMatRef<'_, T>) {
    let grid = partial.grid();
    let (src_rows, src_cols) = (partial.row_axis(), partial.col_axis());
    let (dst_rows, dst_cols) = (dst.row_axis(), dst.col_axis());
    let mut send: Vec<Vec<T>> = (0..grid.size()).map(|_| Vec::new()).collect();

    let src_local = partial.local();
    for local_j in 0..src_local.ncols() {
        let j = src_cols.global(local_j);
        let dst_col_owners = dst_cols.owner(grid, j);
        for local_i in 0..src_local.nrows() {
            let i = src_rows.global(local_i);
            let to = merge_owners(dst_rows.owner(grid, i), dst_col_owners);
            let value = src_local.read(local_i, local_j);
            for_each_owner(grid, to, |rank| send[rank].push(value));
        }
    }

    let recv = grid.vc_comm().all_to_all(send);
    let mut cursor = vec![0usize; grid.size()];

    let mut dst_local = dst.local();
    for local_j in 0..dst_local.ncols() {
        let j = dst_cols.global(local_j);
        let src_col_owners = src_cols.owner(grid, j);
        for local_i in 0..dst_local.nrows() {
            let i = dst_rows.global(local_i);
            let from = merge_owners(src_rows.owner(grid, i), src_col_owners);
            let mut acc = T::zero();
            for_each_owner(grid, from, |rank| {
                acc = acc + recv[rank][cursor[rank]];
                cursor[rank] += 1;
            });
            dst_local.write(local_i, local_j, acc);
        }
    }
}

impl<'a, T: Entity> DistMatMut<'a, T> {
    /// Copies `src` into `self`, redistributing its elements to the format and alignments of
    /// `self`.
    ///
    /// This is a collective operation. When the target replicates a dimension that the source
    /// partitions, it acts as an all-gather.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrices are distributed over different grids, or if their
    /// dimensions differ.
    pub fn copy_from(&mut self, src: DistMatRef<'_, T>) -> Result<()> {
        check_grids(self.grid(), src.grid())?;
        check_shape(
            "source",
            (src.nrows(), src.ncols()),
            (self.nrows(), self.ncols()),
        )?;
        log::trace!(
            target: "gridla::comm",
            "copy {}×{} {} -> {}",
            src.nrows(),
            src.ncols(),
            src.format(),
            self.format(),
        );
        copy_impl(self.rb_mut(), src);
        Ok(())
    }
}

impl<'a, T: ComplexField> DistMatMut<'a, T> {
    /// Replaces `self` with the sum of the partial values held by the processes owning each
    /// element of `partial`, redistributed to the format of `self`.
    ///
    /// This is a collective operation. Every process obtains the same rounding, since the
    /// contributions are added in increasing rank order.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrices are distributed over different grids, or if their
    /// dimensions differ.
    pub fn sum_scatter_from(&mut self, partial: DistMatRef<'_, T>) -> Result<()> {
        check_grids(self.grid(), partial.grid())?;
        check_shape(
            "partial sums",
            (partial.nrows(), partial.ncols()),
            (self.nrows(), self.ncols()),
        )?;
        log::trace!(
            target: "gridla::comm",
            "sum-scatter {}×{} {} -> {}",
            partial.nrows(),
            partial.ncols(),
            partial.format(),
            self.format(),
        );
        sum_scatter_impl(self.rb_mut(), partial);
        Ok(())
    }

    /// Replaces `self` with `op(src)ᵀ`, where `op` conjugates the elements if `conj` is
    /// [`Conj::Yes`].
    ///
    /// This is a collective operation. For example, `[*,MC] := [VC,*]ᵀ` gathers the rows of `src`
    /// within each grid column.
    ///
    /// # Errors
    ///
    /// Returns an error if the matrices are distributed over different grids, or if the
    /// dimensions of `self` are not the swapped dimensions of `src`.
    pub fn transpose_from(&mut self, src: DistMatRef<'_, T>, conj: Conj) -> Result<()> {
        check_grids(self.grid(), src.grid())?;
        check_shape(
            "transposed source",
            (src.ncols(), src.nrows()),
            (self.nrows(), self.ncols()),
        )?;

        let mut tmp = DistMatrix::<T>::zeros_aligned(
            self.grid(),
            self.format().transpose(),
            self.ncols(),
            self.nrows(),
            self.col_align(),
            self.row_align(),
        )?;
        tmp.as_mut().copy_from(src)?;

        let tmp = tmp.local().as_ref().transpose();
        let mut dst = self.rb_mut().local();
        for j in 0..dst.ncols() {
            for i in 0..dst.nrows() {
                dst.write(i, j, conj.apply(tmp.read(i, j)));
            }
        }
        Ok(())
    }

    /// Replaces every element of a replicated matrix by the sum of its copies over the whole grid.
    ///
    /// # Errors
    ///
    /// Returns an error if `self` is not distributed as `[*,*]`.
    pub fn sum_over_grid(&mut self) -> Result<()> {
        if self.format() != Format::STAR_STAR {
            return Err(Error::InvalidFormat {
                what: "matrix",
                expected: Format::STAR_STAR,
                found: self.format(),
            });
        }
        let grid = self.grid();
        let mut local = self.rb_mut().local();
        let (m, n) = (local.nrows(), local.ncols());
        let mut buf = Vec::with_capacity(m * n);
        for j in 0..n {
            for i in 0..m {
                buf.push(local.read(i, j));
            }
        }
        grid.vc_comm().all_reduce_sum(&mut buf);
        for j in 0..n {
            for i in 0..m {
                local.write(i, j, buf[i + j * m]);
            }
        }
        Ok(())
    }
}

impl<'a, T: Entity> DistMatRef<'a, T> {
    /// Returns a copy of `self` distributed as `format`, with the given alignments.
    pub fn redistribute_aligned(
        self,
        format: Format,
        row_align: usize,
        col_align: usize,
    ) -> Result<DistMatrix<T>> {
        let mut dst = DistMatrix::zeros_aligned(
            self.grid(),
            format,
            self.nrows(),
            self.ncols(),
            row_align,
            col_align,
        )?;
        dst.as_mut().copy_from(self)?;
        Ok(dst)
    }

    /// Returns a copy of `self` distributed as `format`, with both alignments set to `0`.
    pub fn redistribute(self, format: Format) -> Result<DistMatrix<T>> {
        self.redistribute_aligned(format, 0, 0)
    }

    /// Returns a `[*,*]` copy of `self`: every process holds all the elements.
    pub fn gather_replicated(self) -> Result<DistMatrix<T>> {
        self.redistribute(Format::STAR_STAR)
    }

    /// Returns the full matrix on every process.
    pub fn to_mat(self) -> Result<Mat<T>> {
        Ok(self.gather_replicated()?.into_local())
    }
}

impl<T: Entity> DistMatrix<T> {
    /// See [`DistMatMut::copy_from`].
    pub fn copy_from(&mut self, src: DistMatRef<'_, T>) -> Result<()> {
        self.as_mut().copy_from(src)
    }

    /// See [`DistMatRef::redistribute`].
    pub fn redistribute(&self, format: Format) -> Result<DistMatrix<T>> {
        self.as_ref().redistribute(format)
    }

    /// See [`DistMatRef::to_mat`].
    pub fn to_mat(&self) -> Result<Mat<T>> {
        self.as_ref().to_mat()
    }
}

impl<T: ComplexField> DistMatrix<T> {
    /// See [`DistMatMut::sum_scatter_from`].
    pub fn sum_scatter_from(&mut self, partial: DistMatRef<'_, T>) -> Result<()> {
        self.as_mut().sum_scatter_from(partial)
    }

    /// See [`DistMatMut::transpose_from`].
    pub fn transpose_from(&mut self, src: DistMatRef<'_, T>, conj: Conj) -> Result<()> {
        self.as_mut().transpose_from(src, conj)
    }

    /// See [`DistMatMut::sum_over_grid`].
    pub fn sum_over_grid(&mut self) -> Result<()> {
        self.as_mut().sum_over_grid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{c64, Dist};
    use assert2::assert as fancy_assert;

    const SHAPES: [(usize, usize); 6] = [(1, 1), (1, 2), (2, 1), (2, 2), (2, 3), (3, 2)];

    const FORMATS: [Format; 11] = [
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
    ];

    fn value(i: usize, j: usize) -> c64 {
        c64::new(i as f64, j as f64 + 0.5)
    }

    #[test]
    fn test_copy_between_all_formats() {
        for (height, width) in SHAPES {
            Grid::run(height, width, |grid| {
                for src_format in FORMATS {
                    let src = DistMatrix::from_fn(grid, src_format, 5, 4, value).unwrap();
                    for dst_format in FORMATS {
                        let row_align = 1 % dst_format.rows.stride(grid);
                        let col_align = grid.size() - 1;
                        let dst = src
                            .as_ref()
                            .redistribute_aligned(dst_format, row_align, col_align)
                            .unwrap();
                        fancy_assert!(dst.format() == dst_format);
                        for j in 0..dst.local_ncols() {
                            for i in 0..dst.local_nrows() {
                                let expected = value(dst.global_row(i), dst.global_col(j));
                                fancy_assert!(dst.get_local(i, j) == expected);
                            }
                        }
                    }
                }
            })
            .unwrap();
        }
    }

    #[test]
    fn test_copy_of_views() {
        for (height, width) in SHAPES {
            Grid::run(height, width, |grid| {
                let a = DistMatrix::from_fn(grid, Format::MC_MR, 9, 7, value).unwrap();
                let block = a.as_ref().submatrix(3, 2, 5, 4);
                fancy_assert!(block.row_align() == 3 % height);
                fancy_assert!(block.col_align() == 2 % width);

                let gathered = block.to_mat().unwrap();
                fancy_assert!(gathered == Mat::from_fn(5, 4, |i, j| value(i + 3, j + 2)));

                // write a block of a `[*,*]` matrix into a view of `a`
                let mut a = a;
                let ones =
                    DistMatrix::from_fn(grid, Format::STAR_STAR, 2, 3, |_, _| c64::new(1.0, 0.0))
                        .unwrap();
                a.as_mut()
                    .submatrix(4, 1, 2, 3)
                    .copy_from(ones.as_ref())
                    .unwrap();
                let full = a.to_mat().unwrap();
                for j in 0..7 {
                    for i in 0..9 {
                        let expected = if (4..6).contains(&i) && (1..4).contains(&j) {
                            c64::new(1.0, 0.0)
                        } else {
                            value(i, j)
                        };
                        fancy_assert!(full.read(i, j) == expected);
                    }
                }
            })
            .unwrap();
        }
    }

    #[test]
    fn test_sum_scatter() {
        for (height, width) in SHAPES {
            Grid::run(height, width, |grid| {
                // every process of a grid row holds the same partial value
                let partial = DistMatrix::from_fn(grid, Format::STAR_MR, 3, 5, |i, j| {
                    c64::new((i + j) as f64, 0.0)
                })
                .unwrap();
                let mut sum = DistMatrix::<c64>::zeros(grid, Format::STAR_VR, 3, 5).unwrap();
                sum.sum_scatter_from(partial.as_ref()).unwrap();
                for j in 0..sum.local_ncols() {
                    for i in 0..sum.local_nrows() {
                        let (gi, gj) = (sum.global_row(i), sum.global_col(j));
                        let expected = c64::new((height * (gi + gj)) as f64, 0.0);
                        fancy_assert!(sum.get_local(i, j) == expected);
                    }
                }
            })
            .unwrap();
        }
    }

    #[test]
    fn test_transpose_from() {
        for (height, width) in SHAPES {
            Grid::run(height, width, |grid| {
                let src = DistMatrix::from_fn(grid, Format::VC_STAR, 6, 3, value).unwrap();
                for conj in [Conj::No, Conj::Yes] {
                    let mut dst =
                        DistMatrix::<c64>::zeros_aligned(grid, Format::STAR_MC, 3, 6, 0, 1)
                            .unwrap();
                    dst.transpose_from(src.as_ref(), conj).unwrap();
                    for j in 0..dst.local_ncols() {
                        for i in 0..dst.local_nrows() {
                            let expected =
                                conj.apply(value(dst.global_col(j), dst.global_row(i)));
                            fancy_assert!(dst.get_local(i, j) == expected);
                        }
                    }
                }
            })
            .unwrap();
        }
    }

    #[test]
    fn test_sum_over_grid() {
        Grid::run(2, 3, |grid| {
            let mut a = DistMatrix::from_fn(grid, Format::STAR_STAR, 2, 2, |i, j| {
                (grid.vc_rank() + i + 2 * j) as f64
            })
            .unwrap();
            a.sum_over_grid().unwrap();
            // sum of ranks 0..6 is 15
            let expected = Mat::from_fn(2, 2, |i, j| (15 + 6 * (i + 2 * j)) as f64);
            fancy_assert!(a.to_mat().unwrap() == expected);

            let mut b = DistMatrix::<f64>::zeros(grid, Format::MC_STAR, 2, 2).unwrap();
            fancy_assert!(
                b.sum_over_grid()
                    == Err(Error::InvalidFormat {
                        what: "matrix",
                        expected: Format::STAR_STAR,
                        found: Format::MC_STAR,
                    })
            );
        })
        .unwrap();
    }

    #[test]
    fn test_errors() {
        Grid::run(2, 1, |grid| {
            let a = DistMatrix::<f64>::zeros(grid, Format::MC_MR, 3, 2).unwrap();
            let mut b = DistMatrix::<f64>::zeros(grid, Format::STAR_STAR, 2, 2).unwrap();
            fancy_assert!(
                b.copy_from(a.as_ref())
                    == Err(Error::DimensionMismatch {
                        what: "source",
                        expected: 2,
                        found: 3,
                    })
            );
            let mut c = DistMatrix::<f64>::zeros(grid, Format::new(Dist::Star, Dist::Mc), 2, 3)
                .unwrap();
            fancy_assert!(c.transpose_from(a.as_ref(), Conj::No).is_ok());
        })
        .unwrap();

        // matrices created on different grids
        let other = Grid::run(1, 1, |grid| {
            DistMatrix::<f64>::zeros(grid, Format::STAR_STAR, 1, 1).unwrap()
        })
        .unwrap()
        .pop()
        .unwrap();
        Grid::run(1, 1, |grid| {
            let mut a = DistMatrix::<f64>::zeros(grid, Format::STAR_STAR, 1, 1).unwrap();
            fancy_assert!(a.copy_from(other.as_ref()) == Err(Error::GridMismatch));
        })
        .unwrap();
    }
}
