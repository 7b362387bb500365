//! Local kernels on distributed operands.
//!
//! These routines never communicate. They check that the distributions of the operands line up,
//! then run the corresponding kernel of [`crate::mul`] or [`crate::solve`] on the local buffers.
//! When the contracted dimension of a product is distributed, each process computes its local
//! contribution to the sum, which the caller then combines with
//! [`DistMatMut::sum_scatter_from`] or [`DistMatMut::sum_over_grid`].

use super::{Axis, Dist, DistMatMut, DistMatRef, Format};
use crate::{
    error::{Error, Result},
    join_raw, mul, parallelism_degree, solve, ComplexField, Conj, MatMut, MatRef, Parallelism,
    Side,
};
use reborrow::*;

const PARALLEL_THRESHOLD: usize = 48 * 48 * 48;

fn check_dim(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            what,
            expected,
            found,
        })
    }
}

// two dimensions that are matched elementwise must have the same owners
fn check_matched(what: &'static str, expected: Axis, found: Axis) -> Result<()> {
    if expected.dist != found.dist {
        return Err(Error::IncompatibleDist {
            what,
            expected: expected.dist,
            found: found.dist,
        });
    }
    if expected.align != found.align {
        return Err(Error::Misaligned {
            what,
            expected: expected.align,
            found: found.align,
        });
    }
    Ok(())
}

fn check_product<T>(
    dst: &DistMatMut<'_, T>,
    lhs: &DistMatRef<'_, T>,
    rhs: &DistMatRef<'_, T>,
) -> Result<()> {
    dst.grid().check_same(lhs.grid())?;
    dst.grid().check_same(rhs.grid())?;
    check_dim("lhs rows", dst.nrows(), lhs.nrows())?;
    check_dim("rhs columns", dst.ncols(), rhs.ncols())?;
    check_dim("rhs rows", lhs.ncols(), rhs.nrows())?;
    check_matched("lhs rows", dst.row_axis(), lhs.row_axis())?;
    check_matched("rhs columns", dst.col_axis(), rhs.col_axis())?;
    check_matched("rhs rows", lhs.col_axis(), rhs.row_axis())?;
    Ok(())
}

/// Computes `[alpha * dst] + beta * op(lhs) * op(rhs)` on the local buffers.
///
/// The rows of `dst` and `lhs`, the columns of `dst` and `rhs`, and the columns of `lhs` and rows
/// of `rhs` must be distributed identically.
pub fn local_gemm<T: ComplexField>(
    dst: DistMatMut<'_, T>,
    lhs: DistMatRef<'_, T>,
    conj_lhs: Conj,
    rhs: DistMatRef<'_, T>,
    conj_rhs: Conj,
    alpha: Option<T>,
    beta: T,
    parallelism: Parallelism,
) -> Result<()> {
    check_product(&dst, &lhs, &rhs)?;
    mul::matmul(
        dst.local(),
        lhs.local(),
        conj_lhs,
        rhs.local(),
        conj_rhs,
        alpha,
        beta,
        parallelism,
    );
    Ok(())
}

fn trrk_impl<T: ComplexField>(
    dst: MatMut<'_, T>,
    first_col: usize,
    row_axis: Axis,
    col_axis: Axis,
    side: Side,
    lhs: MatRef<'_, T>,
    conj_lhs: Conj,
    rhs: MatRef<'_, T>,
    conj_rhs: Conj,
    alpha: Option<T>,
    beta: T,
    parallelism: Parallelism,
) {
    let m = dst.nrows();
    let n = dst.ncols();
    let k = lhs.ncols();

    if n > 1 && parallelism_degree(parallelism) > 1 && m * n * k > PARALLEL_THRESHOLD {
        let mid = n / 2;
        let (dst_left, dst_right) = dst.split_at_col(mid);
        let (rhs_left, rhs_right) = rhs.split_at_col(mid);
        join_raw(
            |parallelism| {
                trrk_impl(
                    dst_left, first_col, row_axis, col_axis, side, lhs, conj_lhs, rhs_left,
                    conj_rhs, alpha, beta, parallelism,
                )
            },
            |parallelism| {
                trrk_impl(
                    dst_right,
                    first_col + mid,
                    row_axis,
                    col_axis,
                    side,
                    lhs,
                    conj_lhs,
                    rhs_right,
                    conj_rhs,
                    alpha,
                    beta,
                    parallelism,
                )
            },
            parallelism,
        );
        return;
    }

    let mut dst = dst;
    for c in 0..n {
        let j = col_axis.global(first_col + c);
        // local rows whose global index lies in the requested triangle of column `j`
        let (start, end) = match side {
            Side::Lower => (row_axis.local_len(j), m),
            Side::Upper => (0, row_axis.local_len(j + 1).min(m)),
        };
        if start >= end {
            continue;
        }
        mul::matmul(
            dst.rb_mut().submatrix(start, c, end - start, 1),
            lhs.submatrix(start, 0, end - start, k),
            conj_lhs,
            rhs.col(c),
            conj_rhs,
            alpha,
            beta,
            Parallelism::None,
        );
    }
}

/// Computes `[alpha * dst] + beta * op(lhs) * op(rhs)` on the local buffers, only updating the
/// elements of `dst` whose global indices lie in the triangle selected by `side` (diagonal
/// included).
///
/// The operands must be distributed as in [`local_gemm`], and `dst` must be square.
pub fn local_trrk<T: ComplexField>(
    dst: DistMatMut<'_, T>,
    side: Side,
    lhs: DistMatRef<'_, T>,
    conj_lhs: Conj,
    rhs: DistMatRef<'_, T>,
    conj_rhs: Conj,
    alpha: Option<T>,
    beta: T,
    parallelism: Parallelism,
) -> Result<()> {
    if dst.nrows() != dst.ncols() {
        return Err(Error::NotSquare {
            what: "destination",
            nrows: dst.nrows(),
            ncols: dst.ncols(),
        });
    }
    check_product(&dst, &lhs, &rhs)?;

    let row_axis = dst.row_axis();
    let col_axis = dst.col_axis();
    trrk_impl(
        dst.local(),
        0,
        row_axis,
        col_axis,
        side,
        lhs.local(),
        conj_lhs,
        rhs.local(),
        conj_rhs,
        alpha,
        beta,
        parallelism,
    );
    Ok(())
}

fn check_triangular_solve<T>(tril: &DistMatRef<'_, T>, rhs: &DistMatMut<'_, T>) -> Result<()> {
    rhs.grid().check_same(tril.grid())?;
    if tril.format() != Format::STAR_STAR {
        return Err(Error::InvalidFormat {
            what: "triangular factor",
            expected: Format::STAR_STAR,
            found: tril.format(),
        });
    }
    if tril.nrows() != tril.ncols() {
        return Err(Error::NotSquare {
            what: "triangular factor",
            nrows: tril.nrows(),
            ncols: tril.ncols(),
        });
    }
    if rhs.format().rows != Dist::Star {
        return Err(Error::IncompatibleDist {
            what: "right-hand side rows",
            expected: Dist::Star,
            found: rhs.format().rows,
        });
    }
    check_dim("right-hand side rows", tril.nrows(), rhs.nrows())
}

/// Solves `op(tril) × X = rhs` in place, where `tril` is a replicated lower triangular matrix and
/// the rows of `rhs` are replicated.
pub fn local_solve_lower_triangular_in_place<T: ComplexField>(
    tril: DistMatRef<'_, T>,
    conj_lhs: Conj,
    rhs: DistMatMut<'_, T>,
    parallelism: Parallelism,
) -> Result<()> {
    check_triangular_solve(&tril, &rhs)?;
    solve::solve_lower_triangular_in_place(tril.local(), conj_lhs, rhs.local(), parallelism);
    Ok(())
}

/// Solves `op(tril) × X = rhs` in place, where `tril` is a replicated unit lower triangular matrix
/// and the rows of `rhs` are replicated.
///
/// A solve from the right with the adjoint of `tril` is obtained by passing the transpose of the
/// right-hand side together with `Conj::Yes`, as in [`solve::solve_unit_lower_triangular_in_place`].
pub fn local_solve_unit_lower_triangular_in_place<T: ComplexField>(
    tril: DistMatRef<'_, T>,
    conj_lhs: Conj,
    rhs: DistMatMut<'_, T>,
    parallelism: Parallelism,
) -> Result<()> {
    check_triangular_solve(&tril, &rhs)?;
    solve::solve_unit_lower_triangular_in_place(tril.local(), conj_lhs, rhs.local(), parallelism);
    Ok(())
}

/// Computes `rhs := rhs × op(D)⁻¹` in place, where `D` is the diagonal matrix stored in the
/// replicated column vector `diag`, and the columns of `rhs` are replicated.
pub fn local_solve_diagonal_on_the_right_in_place<T: ComplexField>(
    diag: DistMatRef<'_, T>,
    conj_diag: Conj,
    rhs: DistMatMut<'_, T>,
) -> Result<()> {
    rhs.grid().check_same(diag.grid())?;
    if diag.format() != Format::STAR_STAR {
        return Err(Error::InvalidFormat {
            what: "diagonal",
            expected: Format::STAR_STAR,
            found: diag.format(),
        });
    }
    check_dim("diagonal columns", 1, diag.ncols())?;
    if rhs.format().cols != Dist::Star {
        return Err(Error::IncompatibleDist {
            what: "right-hand side columns",
            expected: Dist::Star,
            found: rhs.format().cols,
        });
    }
    check_dim("right-hand side columns", diag.nrows(), rhs.ncols())?;
    solve::solve_diagonal_on_the_right_in_place(diag.local(), conj_diag, rhs.local());
    Ok(())
}
