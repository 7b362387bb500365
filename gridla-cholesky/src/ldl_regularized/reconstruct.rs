use assert2::assert as fancy_assert;
use gridla_core::{
    mul::triangular::{self, BlockStructure},
    ComplexField, Conj, Mat, MatRef, Parallelism,
};

/// Returns the lower triangular part of $LDL^H$, where the unit lower triangular factor $L$ and
/// the diagonal $D$ are read from `factors` as stored by the factorization routines.
///
/// The strictly upper triangular part of the result is zero. The strictly upper triangular part of
/// `factors` is not accessed.
///
/// # Panics
///
/// Panics if `factors` is not square.
#[track_caller]
pub fn reconstruct_lower<T: ComplexField>(factors: MatRef<'_, T>, parallelism: Parallelism) -> Mat<T> {
    fancy_assert!(factors.nrows() == factors.ncols());
    let n = factors.nrows();

    let l = Mat::from_fn(n, n, |i, j| {
        if i == j {
            T::one()
        } else if i > j {
            factors.read(i, j)
        } else {
            T::zero()
        }
    });
    let lxd = Mat::from_fn(n, n, |i, j| l.read(i, j).scale(factors.read(j, j).real()));

    let mut reconstructed = Mat::zeros(n, n);
    triangular::matmul(
        reconstructed.as_mut(),
        BlockStructure::TriangularLower,
        lxd.as_ref(),
        Conj::No,
        l.as_ref().transpose(),
        Conj::Yes,
        None,
        T::one(),
        parallelism,
    );
    reconstructed
}
