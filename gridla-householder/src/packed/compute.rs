use assert2::{assert as fancy_assert, debug_assert as fancy_debug_assert};
use gridla_core::{
    dist::local::{local_gemm, local_solve_lower_triangular_in_place, local_trrk},
    mul::{
        self,
        triangular::{self, BlockStructure},
    },
    solve, ComplexField, Conj, DistMatMut, DistMatRef, DistMatrix, Error, FactorParams, Format,
    Mat, MatMut, MatRef, PanelState, Parallelism, Result, Side,
};
use reborrow::*;

const TARGET: &str = "gridla::householder";

/// Returns the length of the diagonal of an `nrows × ncols` matrix that starts at `(0, offset)`
/// when `offset` is nonnegative, and at `(-offset, 0)` otherwise.
///
/// The diagonal is empty when it starts outside the matrix.
#[inline]
pub fn diagonal_length(nrows: usize, ncols: usize, offset: isize) -> usize {
    let shift = offset.unsigned_abs();
    if offset >= 0 {
        Ord::min(nrows, ncols.saturating_sub(shift))
    } else {
        Ord::min(nrows.saturating_sub(shift), ncols)
    }
}

/// Returns the position `(row, column)` of the first element of the diagonal selected by
/// `offset`.
#[inline]
pub fn diagonal_start(offset: isize) -> (usize, usize) {
    if offset >= 0 {
        (0, offset.unsigned_abs())
    } else {
        (offset.unsigned_abs(), 0)
    }
}

/// Replaces the diagonal of `s_inv` with `1/tau` if `conj` is [`Conj::No`], or `1/conj(tau)`
/// otherwise.
///
/// # Panics
///
/// Panics if `s_inv` is not square, or if its dimension is not the length of `tau`.
#[track_caller]
pub fn fix_diagonal<T: ComplexField>(conj: Conj, tau: &[T], s_inv: MatMut<'_, T>) {
    fancy_assert!(s_inv.nrows() == s_inv.ncols());
    fancy_assert!(s_inv.nrows() == tau.len());
    let mut s_inv = s_inv;
    for (j, &tau) in tau.iter().enumerate() {
        s_inv.write(j, j, conj.apply(tau).inv());
    }
}

/// Computes the lower triangular factor $S^{-1}$ of the panel `householder_panel`, whose rows are
/// the reflectors, such that
/// $$(I - \tilde\tau_{b-1} v_{b-1}^H v_{b-1}) \cdots (I - \tilde\tau_0 v_0^H v_0) = I - H^H S H,$$
/// where $\tilde\tau$ is `tau` or its conjugate depending on `conj`.
///
/// The panel must already hold explicit zeros to the right of the unit diagonal, and ones on the
/// diagonal that ends at its bottom right corner. The strictly upper triangular part of the result
/// is zero.
///
/// # Panics
///
/// Panics if the number of rows of the panel is not the length of `tau`, or if the panel has
/// fewer columns than rows.
#[track_caller]
pub fn make_inverse_factor<T: ComplexField>(
    conj: Conj,
    householder_panel: MatRef<'_, T>,
    tau: &[T],
    parallelism: Parallelism,
) -> Mat<T> {
    let nb = householder_panel.nrows();
    fancy_assert!(tau.len() == nb);
    fancy_assert!(householder_panel.ncols() >= nb);

    let mut s_inv = Mat::zeros(nb, nb);
    triangular::matmul(
        s_inv.as_mut(),
        BlockStructure::TriangularLower,
        householder_panel,
        Conj::No,
        householder_panel.transpose(),
        Conj::Yes,
        None,
        T::one(),
        parallelism,
    );
    fix_diagonal(conj, tau, s_inv.as_mut());
    s_inv
}

// makes the panel lower trapezoidal with respect to its right edge, with a unit diagonal
fn make_unit_trapezoidal<T: ComplexField>(i: usize, j: usize, diag_col: usize, value: &mut T) {
    if j == diag_col + i {
        *value = T::one();
    } else if j > diag_col + i {
        *value = T::zero();
    }
}

fn check_operands(
    householder_ncols: usize,
    matrix_nrows: usize,
    tau_len: usize,
    diag_len: usize,
) -> Result<()> {
    if householder_ncols != matrix_nrows {
        return Err(Error::DimensionMismatch {
            what: "matrix rows",
            expected: householder_ncols,
            found: matrix_nrows,
        });
    }
    if tau_len != diag_len {
        return Err(Error::DimensionMismatch {
            what: "householder scalars",
            expected: diag_len,
            found: tau_len,
        });
    }
    Ok(())
}

/// Applies the packed reflectors stored in the rows of `householder_factor` to `matrix` from the
/// left, in forward order.
///
/// The `k`-th reflector is stored in row `k + i` of `householder_factor`, where `(i, j)` is the
/// start of the diagonal selected by `offset`. Its element at column `k + j` is an implicit one,
/// the elements to its left are stored explicitly, and the elements to its right are implicit
/// zeros. The reflector is $I - \tilde\tau_k v_k^H v_k$ with $\tilde\tau_k$ equal to `tau[k]` if
/// `conj` is [`Conj::No`] and `conj(tau[k])` otherwise.
///
/// Reflector `0` is applied first. Only the elements of `householder_factor` that are part of the
/// reflectors are accessed.
///
/// # Errors
///
/// - [`Error::InvalidBlockSize`] if the block size is zero.
/// - [`Error::DimensionMismatch`] if the number of columns of `householder_factor` is not the
/// number of rows of `matrix`, or if `tau` is not as long as the selected diagonal.
pub fn apply_packed_reflectors_llhf<T: ComplexField>(
    conj: Conj,
    offset: isize,
    householder_factor: MatRef<'_, T>,
    tau: &[T],
    matrix: MatMut<'_, T>,
    params: FactorParams,
) -> Result<()> {
    params.check()?;
    let diag_len = diagonal_length(householder_factor.nrows(), householder_factor.ncols(), offset);
    check_operands(householder_factor.ncols(), matrix.nrows(), tau.len(), diag_len)?;

    let (i_off, j_off) = diagonal_start(offset);
    let n = matrix.ncols();
    let parallelism = params.parallelism;
    let mut matrix = matrix;

    let mut k = 0;
    while k < diag_len {
        let nb = Ord::min(params.block_size, diag_len - k);
        let ki = k + i_off;
        let kj = k + j_off;

        let mut h_pan = householder_factor.submatrix(ki, 0, nb, kj + nb).to_owned();
        for j in 0..h_pan.ncols() {
            for i in 0..nb {
                make_unit_trapezoidal(i, j, kj, &mut h_pan[(i, j)]);
            }
        }
        let s_inv = make_inverse_factor(conj, h_pan.as_ref(), &tau[k..k + nb], parallelism);

        let a_top = matrix.rb_mut().submatrix(0, 0, kj + nb, n);

        let mut z = Mat::zeros(nb, n);
        mul::matmul(
            z.as_mut(),
            h_pan.as_ref(),
            Conj::No,
            a_top.rb(),
            Conj::No,
            None,
            T::one(),
            parallelism,
        );
        solve::solve_lower_triangular_in_place(s_inv.as_ref(), Conj::No, z.as_mut(), parallelism);
        mul::matmul(
            a_top,
            h_pan.transpose(),
            Conj::Yes,
            z.as_ref(),
            Conj::No,
            Some(T::one()),
            -T::one(),
            parallelism,
        );

        log::debug!(target: TARGET, "applied reflectors {k}..{}", k + nb);
        k += nb;
    }
    Ok(())
}

// `householder_factor` and `matrix` are distributed as [MC,MR], and `tau` is replicated
fn apply_dist_impl<T: ComplexField>(
    conj: Conj,
    offset: isize,
    householder_factor: DistMatRef<'_, T>,
    tau: &[T],
    matrix: DistMatMut<'_, T>,
    params: FactorParams,
) -> Result<()> {
    fancy_debug_assert!(householder_factor.format() == Format::MC_MR);
    fancy_debug_assert!(matrix.format() == Format::MC_MR);

    let grid = matrix.grid();
    let diag_len = tau.len();
    let (i_off, j_off) = diagonal_start(offset);
    let n = matrix.ncols();
    let parallelism = params.parallelism;
    let mut matrix = matrix;

    let mut k = 0;
    while k < diag_len {
        let nb = Ord::min(params.block_size, diag_len - k);
        let ki = k + i_off;
        let kj = k + j_off;
        let mut state = PanelState::Unprocessed;

        let h_pan = householder_factor.submatrix(ki, 0, nb, kj + nb);
        let a_top = matrix.rb_mut().submatrix(0, 0, kj + nb, n);

        let mut h_pan_star_vr = DistMatrix::zeros(grid, Format::STAR_VR, nb, kj + nb)?;
        h_pan_star_vr.copy_from(h_pan)?;
        h_pan_star_vr
            .as_mut()
            .for_each_mut(|i, j, value| make_unit_trapezoidal(i, j, kj, value));
        state.advance(PanelState::Gathered, TARGET, k);

        // S⁻¹ = tril(H Hᴴ), with the columns of H spread over the whole grid
        let mut s_inv_star_star = DistMatrix::zeros(grid, Format::STAR_STAR, nb, nb)?;
        local_trrk(
            s_inv_star_star.as_mut(),
            Side::Lower,
            h_pan_star_vr.as_ref(),
            Conj::No,
            h_pan_star_vr.as_ref().transpose(),
            Conj::Yes,
            None,
            T::one(),
            parallelism,
        )?;
        s_inv_star_star.sum_over_grid()?;
        fix_diagonal(
            conj,
            &tau[k..k + nb],
            s_inv_star_star.local_mut().as_mut(),
        );
        state.advance(PanelState::Factored, TARGET, k);

        let mut h_pan_star_mc =
            DistMatrix::zeros_aligned_with(Format::STAR_MC, nb, kj + nb, a_top.rb())?;
        h_pan_star_mc.copy_from(h_pan_star_vr.as_ref())?;

        // Z = S⁻¹ H ATop
        let mut z_star_mr = DistMatrix::zeros_aligned_with(Format::STAR_MR, nb, n, a_top.rb())?;
        local_gemm(
            z_star_mr.as_mut(),
            h_pan_star_mc.as_ref(),
            Conj::No,
            a_top.rb(),
            Conj::No,
            None,
            T::one(),
            parallelism,
        )?;
        let mut z_star_vr = DistMatrix::zeros_aligned_with(Format::STAR_VR, nb, n, a_top.rb())?;
        z_star_vr.sum_scatter_from(z_star_mr.as_ref())?;
        state.advance(PanelState::Scattered, TARGET, k);

        local_solve_lower_triangular_in_place(
            s_inv_star_star.as_ref(),
            Conj::No,
            z_star_vr.as_mut(),
            parallelism,
        )?;
        z_star_mr.copy_from(z_star_vr.as_ref())?;

        // ATop -= Hᴴ Z
        local_gemm(
            a_top,
            h_pan_star_mc.as_ref().transpose(),
            Conj::Yes,
            z_star_mr.as_ref(),
            Conj::No,
            Some(T::one()),
            -T::one(),
            parallelism,
        )?;
        state.advance(PanelState::Applied, TARGET, k);

        log::debug!(target: TARGET, "applied reflectors {k}..{}", k + nb);
        k += nb;
    }
    Ok(())
}

/// Distributed version of [`apply_packed_reflectors_llhf`].
///
/// This is a collective operation: every process of the grid must call it with the same
/// arguments. `tau` is a column vector, and all three operands may use any distribution format.
/// Operands that are not distributed as `[MC,MR]` (for `householder_factor` and `matrix`) are
/// redistributed to a temporary copy, and the result is copied back.
///
/// # Errors
///
/// Same as [`apply_packed_reflectors_llhf`], and if `params.validate` is set,
/// [`Error::GridMismatch`] if the operands are distributed over different grids, and
/// [`Error::InconsistentArguments`] if the processes did not pass the same block size, offset and
/// conjugation.
pub fn apply_packed_reflectors_llhf_dist<T: ComplexField>(
    conj: Conj,
    offset: isize,
    householder_factor: DistMatRef<'_, T>,
    tau: DistMatRef<'_, T>,
    matrix: DistMatMut<'_, T>,
    params: FactorParams,
) -> Result<()> {
    params.check()?;
    let diag_len = diagonal_length(householder_factor.nrows(), householder_factor.ncols(), offset);
    check_operands(householder_factor.ncols(), matrix.nrows(), tau.nrows(), diag_len)?;
    if tau.ncols() != 1 {
        return Err(Error::DimensionMismatch {
            what: "householder scalar columns",
            expected: 1,
            found: tau.ncols(),
        });
    }

    let grid = matrix.grid();
    if params.validate {
        grid.check_same(householder_factor.grid())?;
        grid.check_same(tau.grid())?;
        grid.check_consistent(
            "block size, offset or conjugation",
            &[(params.block_size, offset, conj)],
        )?;
    }

    let tau = tau.gather_replicated()?;
    let tau = tau.local().col_as_slice(0);

    let householder_proxy;
    let householder_factor = if householder_factor.format() == Format::MC_MR {
        householder_factor
    } else {
        #[cfg(feature = "perf-warn")]
        log::warn!(target: "gridla_perf", "LLHF works on [MC,MR] reflectors. Found {} matrix.", householder_factor.format());
        householder_proxy = householder_factor.redistribute(Format::MC_MR)?;
        householder_proxy.as_ref()
    };

    let mut matrix = matrix;
    if matrix.format() == Format::MC_MR {
        apply_dist_impl(conj, offset, householder_factor, tau, matrix.rb_mut(), params)
    } else {
        #[cfg(feature = "perf-warn")]
        log::warn!(target: "gridla_perf", "LLHF works on [MC,MR] matrices. Found {} matrix.", matrix.format());
        let mut proxy = matrix.rb().redistribute(Format::MC_MR)?;
        apply_dist_impl(conj, offset, householder_factor, tau, proxy.as_mut(), params)?;
        matrix.copy_from(proxy.as_ref())
    }
}
