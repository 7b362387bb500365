//! Local triangular and diagonal solves.

use crate::{join_raw, parallelism_degree, ComplexField, Conj, MatMut, MatRef, Parallelism};
use assert2::assert as fancy_assert;
use reborrow::*;

const PARALLEL_THRESHOLD: usize = 64 * 64;

#[derive(Copy, Clone)]
enum Diag {
    Unit,
    Generic,
}

fn solve_lower_impl<T: ComplexField>(
    tril: MatRef<'_, T>,
    conj_lhs: Conj,
    rhs: MatMut<'_, T>,
    diag: Diag,
    parallelism: Parallelism,
) {
    let n = tril.nrows();
    let k = rhs.ncols();

    if k > 1 && parallelism_degree(parallelism) > 1 && n * n * k > PARALLEL_THRESHOLD * 64 {
        let mid = k / 2;
        let (left, right) = rhs.split_at_col(mid);
        join_raw(
            |parallelism| solve_lower_impl(tril, conj_lhs, left, diag, parallelism),
            |parallelism| solve_lower_impl(tril, conj_lhs, right, diag, parallelism),
            parallelism,
        );
        return;
    }

    let mut rhs = rhs;
    for c in 0..k {
        for j in 0..n {
            let mut x = rhs.read(j, c);
            if let Diag::Generic = diag {
                x = x * conj_lhs.apply(tril.read(j, j)).inv();
                rhs.write(j, c, x);
            }
            for i in j + 1..n {
                let l = conj_lhs.apply(tril.read(i, j));
                let value = rhs.read(i, c) - l * x;
                rhs.write(i, c, value);
            }
        }
    }
}

/// Computes the solution of `op(triangular_lower) × X = rhs`, and stores the result in `rhs`.
///
/// `triangular_lower` is interpreted as a lower triangular matrix (diagonal included). Its strictly
/// upper triangular part is not accessed. `op(x)` is `x` or `conj(x)` depending on `conj_lhs`.
///
/// # Panics
///
/// Panics if `triangular_lower` is not square, or if its dimension does not match the number of
/// rows of `rhs`.
#[track_caller]
pub fn solve_lower_triangular_in_place<T: ComplexField>(
    triangular_lower: MatRef<'_, T>,
    conj_lhs: Conj,
    rhs: MatMut<'_, T>,
    parallelism: Parallelism,
) {
    fancy_assert!(triangular_lower.nrows() == triangular_lower.ncols());
    fancy_assert!(rhs.nrows() == triangular_lower.ncols());
    solve_lower_impl(triangular_lower, conj_lhs, rhs, Diag::Generic, parallelism);
}

/// Computes the solution of `op(triangular_lower) × X = rhs`, and stores the result in `rhs`.
///
/// `triangular_lower` is interpreted as a unit lower triangular matrix. Its diagonal and strictly
/// upper triangular parts are not accessed.
///
/// A solve from the right with the adjoint, `X := X × L⁻ᴴ`, is obtained by calling this function
/// with `conj_lhs = Conj::Yes` on `X.transpose()`.
///
/// # Panics
///
/// Panics if `triangular_lower` is not square, or if its dimension does not match the number of
/// rows of `rhs`.
#[track_caller]
pub fn solve_unit_lower_triangular_in_place<T: ComplexField>(
    triangular_lower: MatRef<'_, T>,
    conj_lhs: Conj,
    rhs: MatMut<'_, T>,
    parallelism: Parallelism,
) {
    fancy_assert!(triangular_lower.nrows() == triangular_lower.ncols());
    fancy_assert!(rhs.nrows() == triangular_lower.ncols());
    solve_lower_impl(triangular_lower, conj_lhs, rhs, Diag::Unit, parallelism);
}

/// Computes `rhs := rhs × op(D)⁻¹`, where `D` is the diagonal matrix whose diagonal is stored in
/// the column vector `diag`.
///
/// # Panics
///
/// Panics if `diag` is not a column vector with as many rows as `rhs` has columns.
#[track_caller]
pub fn solve_diagonal_on_the_right_in_place<T: ComplexField>(
    diag: MatRef<'_, T>,
    conj_diag: Conj,
    rhs: MatMut<'_, T>,
) {
    fancy_assert!(diag.ncols() == 1);
    fancy_assert!(diag.nrows() == rhs.ncols());
    let mut rhs = rhs;
    for j in 0..rhs.ncols() {
        let inv = conj_diag.apply(diag.read(j, 0)).inv();
        for i in 0..rhs.nrows() {
            let value = rhs.read(i, j) * inv;
            rhs.rb_mut().write(i, j, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{c64, mul, Mat};
    use rand::prelude::*;

    fn random_lower(rng: &mut StdRng, n: usize) -> Mat<c64> {
        Mat::from_fn(n, n, |i, j| {
            if i == j {
                c64::new(2.0 + rng.gen::<f64>(), rng.gen())
            } else if i > j {
                c64::new(rng.gen(), rng.gen())
            } else {
                // never read by the solvers
                c64::new(f64::NAN, f64::NAN)
            }
        })
    }

    fn lower_part(l: &Mat<c64>, unit: bool) -> Mat<c64> {
        Mat::from_fn(l.nrows(), l.ncols(), |i, j| {
            if i == j && unit {
                c64::one()
            } else if i >= j {
                l.read(i, j)
            } else {
                c64::zero()
            }
        })
    }

    #[test]
    fn test_lower_solves() {
        let mut rng = StdRng::seed_from_u64(3);
        for n in [0, 1, 5, 33] {
            let l = random_lower(&mut rng, n);
            let b = Mat::from_fn(n, 4, |_, _| c64::new(rng.gen(), rng.gen()));
            for unit in [false, true] {
                for conj in [Conj::No, Conj::Yes] {
                    for parallelism in [Parallelism::None, Parallelism::Rayon(2)] {
                        let mut x = b.clone();
                        if unit {
                            solve_unit_lower_triangular_in_place(
                                l.as_ref(),
                                conj,
                                x.as_mut(),
                                parallelism,
                            );
                        } else {
                            solve_lower_triangular_in_place(
                                l.as_ref(),
                                conj,
                                x.as_mut(),
                                parallelism,
                            );
                        }

                        let mut lx = Mat::<c64>::zeros(n, 4);
                        mul::matmul(
                            lx.as_mut(),
                            lower_part(&l, unit).as_ref(),
                            conj,
                            x.as_ref(),
                            Conj::No,
                            None,
                            c64::one(),
                            Parallelism::None,
                        );
                        for j in 0..4 {
                            for i in 0..n {
                                assert!((lx.read(i, j) - b.read(i, j)).abs() < 1e-10);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_right_adjoint_solve() {
        // X := B × L⁻ᴴ, checked through X × Lᴴ = B
        let mut rng = StdRng::seed_from_u64(4);
        let n = 6;
        let l = random_lower(&mut rng, n);
        let b = Mat::from_fn(9, n, |_, _| c64::new(rng.gen(), rng.gen()));
        let mut x = b.clone();
        solve_unit_lower_triangular_in_place(
            l.as_ref(),
            Conj::Yes,
            x.as_mut().transpose(),
            Parallelism::None,
        );
        let l_unit = lower_part(&l, true);
        let mut xlh = Mat::<c64>::zeros(9, n);
        mul::matmul(
            xlh.as_mut(),
            x.as_ref(),
            Conj::No,
            l_unit.transpose(),
            Conj::Yes,
            None,
            c64::one(),
            Parallelism::None,
        );
        for j in 0..n {
            for i in 0..9 {
                assert!((xlh.read(i, j) - b.read(i, j)).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn test_diagonal_solve() {
        let d = Mat::from_fn(3, 1, |i, _| (i + 1) as f64);
        let mut a = Mat::from_fn(2, 3, |i, j| ((i + 1) * (j + 1)) as f64);
        solve_diagonal_on_the_right_in_place(d.as_ref(), Conj::No, a.as_mut());
        for j in 0..3 {
            for i in 0..2 {
                assert!(a.read(i, j) == (i + 1) as f64);
            }
        }
    }
}
