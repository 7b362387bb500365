use assert2::debug_assert as fancy_debug_assert;
use gridla_core::{
    dist::local::{
        local_solve_diagonal_on_the_right_in_place, local_solve_unit_lower_triangular_in_place,
        local_trrk,
    },
    mul::triangular::{self, BlockStructure},
    solve, ComplexField, Conj, DistMatMut, DistMatRef, DistMatrix, Error, FactorParams, Format,
    MatMut, PanelState, Result, Side,
};
use reborrow::*;

const TARGET: &str = "gridla::ldl";

/// Dynamic regularization of the pivots.
///
/// The pivot `d` of column `j` is unsafe when `sign[j] * d <= pivot_tolerance`. It is then replaced
/// by `sign[j] * regularization_magnitude`, and the difference is reported in the regularization
/// vector.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LdlRegularization<T: ComplexField> {
    /// Largest signed pivot that is still considered unsafe.
    pub pivot_tolerance: T::Real,
    /// Magnitude of the pivots that replace unsafe ones.
    pub regularization_magnitude: T::Real,
}

/// Info about the result of the regularized LDL factorization.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LdlInfo {
    /// Number of pivots that had to be replaced.
    pub regularization_count: usize,
}

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

fn check_square(nrows: usize, ncols: usize) -> Result<()> {
    if nrows == ncols {
        Ok(())
    } else {
        Err(Error::NotSquare {
            what: "matrix",
            nrows,
            ncols,
        })
    }
}

fn check_signs(signs: &[i8]) -> Result<()> {
    match signs
        .iter()
        .enumerate()
        .find(|&(_, &value)| value != 1 && value != -1)
    {
        Some((index, &value)) => Err(Error::InvalidPivotSign { index, value }),
        None => Ok(()),
    }
}

fn check_serial<T>(matrix: &MatMut<'_, T>, signs: &[i8], regularization_len: usize) -> Result<()> {
    let n = matrix.nrows();
    check_square(n, matrix.ncols())?;
    check_dim("pivot signs", n, signs.len())?;
    check_dim("regularization vector", n, regularization_len)?;
    check_signs(signs)
}

fn report(count: usize, n: usize) -> LdlInfo {
    if count > 0 {
        log::info!(target: TARGET, "regularized {count} of {n} pivots");
    }
    LdlInfo {
        regularization_count: count,
    }
}

fn ldl_unblocked_impl<T: ComplexField>(
    matrix: MatMut<'_, T>,
    signs: &[i8],
    regularization_out: &mut [T::Real],
    regularization: LdlRegularization<T>,
) -> usize {
    fancy_debug_assert!(matrix.nrows() == matrix.ncols());
    fancy_debug_assert!(signs.len() == matrix.nrows());
    fancy_debug_assert!(regularization_out.len() == matrix.nrows());

    let mut matrix = matrix;
    let n = matrix.nrows();
    let tolerance = regularization.pivot_tolerance;
    let magnitude = regularization.regularization_magnitude;

    let mut count = 0;
    for j in 0..n {
        let pivot = matrix.read(j, j).real();
        let (signed_pivot, replacement) = if signs[j] > 0 {
            (pivot, magnitude)
        } else {
            (-pivot, -magnitude)
        };

        let pivot = if signed_pivot <= tolerance {
            regularization_out[j] = replacement - pivot;
            count += 1;
            replacement
        } else {
            regularization_out[j] = T::Real::zero();
            pivot
        };
        matrix.write(j, j, T::from_real(pivot));

        // A22 -= a21 * (a21 / d)ᴴ, lower triangle only
        let inv = pivot.inv();
        for k in j + 1..n {
            let factor = matrix.read(k, j).scale(inv).conj();
            for i in k..n {
                let value = matrix.read(i, k) - matrix.read(i, j) * factor;
                matrix.write(i, k, value);
            }
        }
        for i in j + 1..n {
            let value = matrix.read(i, j).scale(inv);
            matrix.write(i, j, value);
        }
    }
    count
}

/// Computes the regularized $LDL^H$ factorization of `matrix` one column at a time.
///
/// Only the lower triangular part of `matrix` is read. On output, the strictly lower part holds
/// the unit lower triangular factor $L$ and the diagonal holds $D$. The strictly upper part is not
/// accessed.
///
/// `regularization_out[j]` receives the amount that was added to the `j`-th pivot, so that
/// $$LDL^H = A + \text{diag}(\text{regularization\_out}).$$
///
/// # Errors
///
/// - [`Error::NotSquare`] if `matrix` is not square.
/// - [`Error::DimensionMismatch`] if `pivot_signs` or `regularization_out` do not match the matrix
/// dimension.
/// - [`Error::InvalidPivotSign`] if a pivot sign is neither `1` nor `-1`.
pub fn ldl_regularized_unblocked_in_place<T: ComplexField>(
    matrix: MatMut<'_, T>,
    pivot_signs: &[i8],
    regularization_out: &mut [T::Real],
    regularization: LdlRegularization<T>,
) -> Result<LdlInfo> {
    check_serial(&matrix, pivot_signs, regularization_out.len())?;
    let n = matrix.nrows();
    let count = ldl_unblocked_impl(matrix, pivot_signs, regularization_out, regularization);
    Ok(report(count, n))
}

/// Computes the regularized $LDL^H$ factorization of `matrix`, processing `params.block_size`
/// columns at a time.
///
/// The output is the same as the one of [`ldl_regularized_unblocked_in_place`], up to rounding.
///
/// # Errors
///
/// Same as [`ldl_regularized_unblocked_in_place`], and [`Error::InvalidBlockSize`] if the block
/// size is zero.
pub fn ldl_regularized_in_place<T: ComplexField>(
    matrix: MatMut<'_, T>,
    pivot_signs: &[i8],
    regularization_out: &mut [T::Real],
    regularization: LdlRegularization<T>,
    params: FactorParams,
) -> Result<LdlInfo> {
    params.check()?;
    check_serial(&matrix, pivot_signs, regularization_out.len())?;
    #[cfg(feature = "perf-warn")]
    if matrix.row_stride().unsigned_abs() != 1 {
        log::warn!(target: "gridla_perf", "LDL prefers column-major matrix. Found matrix with generic strides.");
    }

    let n = matrix.nrows();
    let parallelism = params.parallelism;
    let mut matrix = matrix;
    let mut count = 0;

    let mut k = 0;
    while k < n {
        let bs = Ord::min(params.block_size, n - k);
        let (_, _, _, trailing) = matrix.rb_mut().split_at(k, k);
        let (mut a11, _, mut a21, a22) = trailing.split_at(bs, bs);

        count += ldl_unblocked_impl(
            a11.rb_mut(),
            &pivot_signs[k..k + bs],
            &mut regularization_out[k..k + bs],
            regularization,
        );
        let a11 = a11.into_const();

        // A21 := A21 L11⁻ᴴ = L21 D1
        solve::solve_unit_lower_triangular_in_place(
            a11,
            Conj::Yes,
            a21.rb_mut().transpose(),
            parallelism,
        );
        let s21 = a21.rb().to_owned();
        solve::solve_diagonal_on_the_right_in_place(a11.diagonal(), Conj::No, a21.rb_mut());

        triangular::matmul(
            a22,
            BlockStructure::TriangularLower,
            s21.as_ref(),
            Conj::No,
            a21.into_const().transpose(),
            Conj::Yes,
            Some(T::one()),
            -T::one(),
            parallelism,
        );

        log::debug!(target: TARGET, "factored panel {k}..{}", k + bs);
        k += bs;
    }

    Ok(report(count, n))
}

// `matrix` is distributed as [MC,MR], and `signs` and `regularization_out` are replicated
fn ldl_dist_impl<T: ComplexField>(
    matrix: DistMatMut<'_, T>,
    signs: &[i8],
    regularization_out: &mut [T::Real],
    regularization: LdlRegularization<T>,
    params: FactorParams,
) -> Result<usize> {
    fancy_debug_assert!(matrix.format() == Format::MC_MR);

    let grid = matrix.grid();
    let n = matrix.nrows();
    let parallelism = params.parallelism;
    let mut matrix = matrix;
    let mut count = 0;

    let mut k = 0;
    while k < n {
        let bs = Ord::min(params.block_size, n - k);
        let rem = n - k - bs;
        let mut state = PanelState::Unprocessed;

        let trailing = matrix.rb_mut().submatrix(k, k, n - k, n - k);
        let (mut a11, _, mut a21, a22) = trailing.split_at(bs, bs);

        let mut a11_star_star = a11.rb().gather_replicated()?;
        state.advance(PanelState::Gathered, TARGET, k);

        count += ldl_unblocked_impl(
            a11_star_star.local_mut().as_mut(),
            &signs[k..k + bs],
            &mut regularization_out[k..k + bs],
            regularization,
        );
        a11.copy_from(a11_star_star.as_ref())?;
        state.advance(PanelState::Factored, TARGET, k);

        // A21 := A21 L11⁻ᴴ = L21 D1, with the rows of A21 spread over the whole grid
        let mut a21_vc_star = DistMatrix::zeros_aligned_with(Format::VC_STAR, rem, bs, a22.rb())?;
        a21_vc_star.copy_from(a21.rb())?;
        local_solve_unit_lower_triangular_in_place(
            a11_star_star.as_ref(),
            Conj::Yes,
            a21_vc_star.as_mut().transpose(),
            parallelism,
        )?;

        let mut s21_trans_star_mc =
            DistMatrix::zeros_aligned_with(Format::STAR_MC, bs, rem, a22.rb())?;
        s21_trans_star_mc.transpose_from(a21_vc_star.as_ref(), Conj::No)?;

        // A21 := L21
        let d1 = DistMatrix::from_fn(grid, Format::STAR_STAR, bs, 1, |i, _| {
            a11_star_star.get_local(i, i)
        })?;
        local_solve_diagonal_on_the_right_in_place(d1.as_ref(), Conj::No, a21_vc_star.as_mut())?;

        let mut a21_vr_star = DistMatrix::zeros_aligned_with(Format::VR_STAR, rem, bs, a22.rb())?;
        a21_vr_star.copy_from(a21_vc_star.as_ref())?;
        let mut a21_adj_star_mr =
            DistMatrix::zeros_aligned_with(Format::STAR_MR, bs, rem, a22.rb())?;
        a21_adj_star_mr.transpose_from(a21_vr_star.as_ref(), Conj::Yes)?;
        state.advance(PanelState::Scattered, TARGET, k);

        // A22 -= S21 L21ᴴ, lower triangle only
        local_trrk(
            a22,
            Side::Lower,
            s21_trans_star_mc.as_ref().transpose(),
            Conj::No,
            a21_adj_star_mr.as_ref(),
            Conj::No,
            Some(T::one()),
            -T::one(),
            parallelism,
        )?;
        a21.copy_from(a21_vc_star.as_ref())?;
        state.advance(PanelState::Applied, TARGET, k);

        log::debug!(target: TARGET, "factored panel {k}..{}", k + bs);
        k += bs;
    }

    Ok(count)
}

/// Computes the regularized $LDL^H$ factorization of the distributed matrix `matrix`.
///
/// This is a collective operation: every process of the grid must call it with the same
/// arguments. The result is the same as the one of [`ldl_regularized_in_place`] applied to the
/// global matrix, up to rounding.
///
/// `pivot_signs` and `regularization_out` are `n × 1` column vectors, and all three operands may
/// use any distribution format. Operands that are not distributed as `[MC,MR]` (for `matrix`) are
/// redistributed to a temporary copy, and the results are copied back.
///
/// # Errors
///
/// - [`Error::InvalidBlockSize`] if the block size is zero.
/// - [`Error::NotSquare`] if `matrix` is not square.
/// - [`Error::DimensionMismatch`] if `pivot_signs` or `regularization_out` is not an `n × 1`
/// column vector.
/// - [`Error::InvalidPivotSign`] if a pivot sign is neither `1` nor `-1`.
/// - If `params.validate` is set, [`Error::GridMismatch`] if the operands are distributed over
/// different grids, and [`Error::InconsistentArguments`] if the processes did not pass the same
/// block size or regularization parameters.
pub fn ldl_regularized_dist_in_place<T: ComplexField>(
    matrix: DistMatMut<'_, T>,
    pivot_signs: DistMatRef<'_, i8>,
    regularization_out: DistMatMut<'_, T::Real>,
    regularization: LdlRegularization<T>,
    params: FactorParams,
) -> Result<LdlInfo> {
    params.check()?;
    let n = matrix.nrows();
    check_square(n, matrix.ncols())?;
    check_dim("pivot signs", n, pivot_signs.nrows())?;
    check_dim("pivot sign columns", 1, pivot_signs.ncols())?;
    check_dim("regularization vector", n, regularization_out.nrows())?;
    check_dim("regularization vector columns", 1, regularization_out.ncols())?;

    let grid = matrix.grid();
    if params.validate {
        grid.check_same(pivot_signs.grid())?;
        grid.check_same(regularization_out.grid())?;
        grid.check_consistent("block size", &[params.block_size])?;
        grid.check_consistent(
            "regularization parameters",
            &[
                regularization.pivot_tolerance,
                regularization.regularization_magnitude,
            ],
        )?;
    }

    let signs = pivot_signs.gather_replicated()?;
    let signs = signs.local().col_as_slice(0);
    check_signs(signs)?;

    let mut regularization_star_star = DistMatrix::<T::Real>::zeros(grid, Format::STAR_STAR, n, 1)?;
    let regularization_local = regularization_star_star.local_mut().col_as_slice_mut(0);

    let mut matrix = matrix;
    let count = if matrix.format() == Format::MC_MR {
        ldl_dist_impl(
            matrix.rb_mut(),
            signs,
            regularization_local,
            regularization,
            params,
        )?
    } else {
        #[cfg(feature = "perf-warn")]
        log::warn!(target: "gridla_perf", "LDL works on [MC,MR] matrices. Found {} matrix.", matrix.format());
        let mut proxy = matrix.rb().redistribute(Format::MC_MR)?;
        let count = ldl_dist_impl(
            proxy.as_mut(),
            signs,
            regularization_local,
            regularization,
            params,
        )?;
        matrix.copy_from(proxy.as_ref())?;
        count
    };

    let mut regularization_out = regularization_out;
    regularization_out.copy_from(regularization_star_star.as_ref())?;

    Ok(report(count, n))
}
