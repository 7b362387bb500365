//! Local matrix multiplication.
//!
//! These kernels act on the local buffers of a single process. The distributed drivers call them
//! on gathered panels and on the local parts of distributed matrices.

use crate::{join_raw, parallelism_degree, ComplexField, Conj, MatMut, MatRef, Parallelism};
use assert2::assert as fancy_assert;
use reborrow::*;

const PARALLEL_THRESHOLD: usize = 48 * 48 * 48;

/// Computes the matrix product `[alpha * dst] + beta * op(lhs) * op(rhs)` and stores the result in
/// `dst`.
///
/// If `alpha` is not provided, `dst` is overwritten and its previous contents are never read.
/// `op(x)` is `x` or `conj(x)` depending on the corresponding conjugation flag. Transposed and
/// adjoint products are obtained by passing [`MatRef::transpose`] views.
///
/// # Panics
///
/// Panics if the matrix dimensions are not compatible for matrix multiplication.
#[track_caller]
pub fn matmul<T: ComplexField>(
    dst: MatMut<'_, T>,
    lhs: MatRef<'_, T>,
    conj_lhs: Conj,
    rhs: MatRef<'_, T>,
    conj_rhs: Conj,
    alpha: Option<T>,
    beta: T,
    parallelism: Parallelism,
) {
    triangular::matmul(
        dst,
        triangular::BlockStructure::Rectangular,
        lhs,
        conj_lhs,
        rhs,
        conj_rhs,
        alpha,
        beta,
        parallelism,
    )
}

/// Matrix multiplication where only a triangular part of the destination is computed.
pub mod triangular {
    use super::*;

    /// Part of a square block that is read or written.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum BlockStructure {
        /// Every element.
        Rectangular,
        /// Elements on and below the diagonal.
        TriangularLower,
        /// Elements strictly below the diagonal.
        StrictTriangularLower,
        /// Elements on and above the diagonal.
        TriangularUpper,
        /// Elements strictly above the diagonal.
        StrictTriangularUpper,
    }

    impl BlockStructure {
        /// Checks if `self` is full.
        #[inline]
        pub fn is_dense(self) -> bool {
            matches!(self, BlockStructure::Rectangular)
        }

        /// Checks if `self` is lower triangular.
        #[inline]
        pub fn is_lower(self) -> bool {
            matches!(
                self,
                BlockStructure::TriangularLower | BlockStructure::StrictTriangularLower
            )
        }

        /// Checks if `self` is upper triangular.
        #[inline]
        pub fn is_upper(self) -> bool {
            matches!(
                self,
                BlockStructure::TriangularUpper | BlockStructure::StrictTriangularUpper
            )
        }

        /// Returns the block structure corresponding to the transposed matrix.
        #[inline]
        pub fn transpose(self) -> Self {
            use BlockStructure::*;
            match self {
                Rectangular => Rectangular,
                TriangularLower => TriangularUpper,
                StrictTriangularLower => StrictTriangularUpper,
                TriangularUpper => TriangularLower,
                StrictTriangularUpper => StrictTriangularLower,
            }
        }

        /// Checks whether the element at position `(i, j)` belongs to the structure.
        #[inline(always)]
        pub fn contains(self, i: usize, j: usize) -> bool {
            use BlockStructure::*;
            match self {
                Rectangular => true,
                TriangularLower => i >= j,
                StrictTriangularLower => i > j,
                TriangularUpper => i <= j,
                StrictTriangularUpper => i < j,
            }
        }
    }

    /// Computes the matrix product `[alpha * dst] + beta * op(lhs) * op(rhs)` and stores the
    /// result in the part of `dst` described by `dst_structure`. Elements of `dst` outside of
    /// that part are neither read nor written.
    ///
    /// This covers the rank-k updates of the blocked drivers: `Herk` is
    /// `matmul(c, TriangularLower, a, No, a.transpose(), Yes, ..)`, and `Trrk` is the same with two
    /// different operands.
    ///
    /// # Panics
    ///
    /// Panics if the matrix dimensions are not compatible for matrix multiplication, or if
    /// `dst_structure` is triangular and `dst` is not square.
    #[track_caller]
    pub fn matmul<T: ComplexField>(
        dst: MatMut<'_, T>,
        dst_structure: BlockStructure,
        lhs: MatRef<'_, T>,
        conj_lhs: Conj,
        rhs: MatRef<'_, T>,
        conj_rhs: Conj,
        alpha: Option<T>,
        beta: T,
        parallelism: Parallelism,
    ) {
        fancy_assert!(dst.nrows() == lhs.nrows());
        fancy_assert!(dst.ncols() == rhs.ncols());
        fancy_assert!(lhs.ncols() == rhs.nrows());
        if !dst_structure.is_dense() {
            fancy_assert!(dst.nrows() == dst.ncols());
        }

        matmul_impl(
            dst,
            0,
            dst_structure,
            lhs,
            conj_lhs,
            rhs,
            conj_rhs,
            alpha,
            beta,
            parallelism,
        );
    }

    // `col_offset` is the index of the first column of `dst` inside the block that the structure
    // refers to
    fn matmul_impl<T: ComplexField>(
        dst: MatMut<'_, T>,
        col_offset: usize,
        dst_structure: BlockStructure,
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
                    matmul_impl(
                        dst_left,
                        col_offset,
                        dst_structure,
                        lhs,
                        conj_lhs,
                        rhs_left,
                        conj_rhs,
                        alpha,
                        beta,
                        parallelism,
                    )
                },
                |parallelism| {
                    matmul_impl(
                        dst_right,
                        col_offset + mid,
                        dst_structure,
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
        for j in 0..n {
            for i in 0..m {
                if !dst_structure.contains(i, j + col_offset) {
                    continue;
                }
                let mut acc = T::zero();
                for p in 0..k {
                    // SAFETY: `i < m`, `j < n` and `p < k`
                    let (l, r) = unsafe {
                        (
                            *lhs.get_unchecked(i, p),
                            *rhs.get_unchecked(p, j),
                        )
                    };
                    acc = acc + conj_lhs.apply(l) * conj_rhs.apply(r);
                }
                let value = match alpha {
                    Some(alpha) => alpha * dst.read(i, j) + beta * acc,
                    None => beta * acc,
                };
                dst.write(i, j, value);
            }
        }
    }
}

/// Returns `lhsᴴ · rhs` for two column vectors stored as `n × 1` matrices.
#[track_caller]
pub fn inner_prod<T: ComplexField>(lhs: MatRef<'_, T>, rhs: MatRef<'_, T>) -> T {
    fancy_assert!(lhs.ncols() == 1);
    fancy_assert!(rhs.ncols() == 1);
    fancy_assert!(lhs.nrows() == rhs.nrows());
    let mut acc = T::zero();
    for i in 0..lhs.nrows() {
        acc = acc + lhs.read(i, 0).conj() * rhs.read(i, 0);
    }
    acc
}

/// Scales every element of `dst` by `factor`.
pub fn scale<T: ComplexField>(dst: MatMut<'_, T>, factor: T) {
    let mut dst = dst;
    for j in 0..dst.ncols() {
        for i in 0..dst.nrows() {
            let value = dst.read(i, j);
            dst.rb_mut().write(i, j, value * factor);
        }
    }
}
