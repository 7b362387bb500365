//! The regularized $LDL^H$ decomposition of a Hermitian matrix $A$ is such that:
//! $$LDL^H = A + \text{diag}(r),$$
//! where $L$ is a unit lower triangular matrix, $D$ is a real diagonal matrix, and $r$ is the
//! regularization vector.
//!
//! Each pivot comes with an expected sign. A pivot whose signed value falls below the pivot
//! tolerance is replaced by the signed regularization magnitude, so the factorization never breaks
//! down. The amount added to each pivot is reported in $r$, and the number of replaced pivots is
//! returned.
//!
//! The blocked drivers process the matrix in panels of `block_size` columns. For each panel, the
//! diagonal block is factored with the unblocked kernel, the subdiagonal block is solved against
//! it, and the trailing block receives a rank-`block_size` update. The distributed driver gathers
//! each diagonal block on every process and splits the subdiagonal block over the whole grid for
//! the solves.

/// Computing the decomposition.
pub mod compute;
/// Multiplying the factors back together.
pub mod reconstruct;

#[cfg(test)]
mod tests {
    use super::{compute::*, reconstruct::reconstruct_lower};
    use assert_approx_eq::assert_approx_eq;
    use gridla_core::{
        c64, ComplexField, DistMatrix, Error, FactorParams, Format, Grid, Mat, MatRef,
        Parallelism,
    };
    use rand::prelude::*;

    type E = c64;

    const GRIDS: [(usize, usize); 6] = [(1, 1), (1, 2), (2, 1), (2, 2), (2, 3), (3, 2)];

    fn pivot_signs(n: usize) -> Vec<i8> {
        (0..n).map(|j| if j % 3 == 1 { -1 } else { 1 }).collect()
    }

    // columns whose diagonal has the opposite of the expected sign
    fn is_flipped(j: usize) -> bool {
        j % 5 == 2
    }

    // Hermitian matrix with dominant diagonal entries, whose sign follows `signs` except on the
    // flipped columns when `flip` is set
    fn random_hermitian(rng: &mut StdRng, signs: &[i8], flip: bool) -> Mat<E> {
        let n = signs.len();
        let mut a = Mat::zeros(n, n);
        for j in 0..n {
            let mut sign = signs[j] as f64;
            if flip && is_flipped(j) {
                sign = -sign;
            }
            a.write(j, j, E::new(sign * (n as f64 + 1.0 + rng.gen::<f64>()), 0.0));
            for i in j + 1..n {
                let value = E::new(0.1 * (rng.gen::<f64>() - 0.5), 0.1 * (rng.gen::<f64>() - 0.5));
                a.write(i, j, value);
                a.write(j, i, value.conj());
            }
        }
        a
    }

    fn regularization(n: usize) -> LdlRegularization<E> {
        LdlRegularization {
            pivot_tolerance: 1e-3,
            regularization_magnitude: n as f64,
        }
    }

    fn assert_lower_close(a: MatRef<'_, E>, b: MatRef<'_, E>) {
        assert_eq!(a.nrows(), b.nrows());
        for j in 0..a.ncols() {
            for i in j..a.nrows() {
                assert_approx_eq!(a.read(i, j), b.read(i, j));
            }
        }
    }

    fn regularized_target(a: &Mat<E>, reg: &[f64]) -> Mat<E> {
        let mut target = a.clone();
        for (j, &r) in reg.iter().enumerate() {
            let value = target.read(j, j) + E::new(r, 0.0);
            target.write(j, j, value);
        }
        target
    }

    // textbook LDLᴴ without any pivot correction
    fn reference_ldl(a: MatRef<'_, E>) -> Mat<E> {
        let n = a.nrows();
        let mut l = Mat::<E>::zeros(n, n);
        let mut d = vec![0.0; n];
        for j in 0..n {
            let mut dj = a.read(j, j).re;
            for k in 0..j {
                dj -= l.read(j, k).norm_sqr() * d[k];
            }
            d[j] = dj;
            l.write(j, j, E::new(dj, 0.0));
            for i in j + 1..n {
                let mut x = a.read(i, j);
                for k in 0..j {
                    x = x - l.read(i, k) * l.read(j, k).conj() * d[k];
                }
                l.write(i, j, x / dj);
            }
        }
        l
    }

    #[test]
    fn test_reconstruct() {
        let mut rng = StdRng::seed_from_u64(0);
        for n in [0, 1, 2, 5, 17, 37] {
            let signs = pivot_signs(n);
            let a = random_hermitian(&mut rng, &signs, true);
            let expected_count = (0..n).filter(|&j| is_flipped(j)).count();

            for block_size in [1, 4, 16, n.max(1)] {
                let mut factors = a.clone();
                let mut reg = vec![f64::NAN; n];
                let info = ldl_regularized_in_place(
                    factors.as_mut(),
                    &signs,
                    &mut reg,
                    regularization(n),
                    FactorParams::default().with_block_size(block_size),
                )
                .unwrap();

                assert_eq!(info.regularization_count, expected_count);
                for j in 0..n {
                    if is_flipped(j) {
                        assert!(reg[j] != 0.0);
                        assert_approx_eq!(factors.read(j, j).re, signs[j] as f64 * n as f64);
                    } else {
                        assert!(reg[j] == 0.0);
                    }
                }

                let reconstructed = reconstruct_lower(factors.as_ref(), Parallelism::None);
                assert_lower_close(
                    reconstructed.as_ref(),
                    regularized_target(&a, &reg).as_ref(),
                );
            }
        }
    }

    #[test]
    fn test_block_size_invariance() {
        let mut rng = StdRng::seed_from_u64(1);
        let n = 33;
        let signs = pivot_signs(n);
        let a = random_hermitian(&mut rng, &signs, true);

        let mut unblocked = a.clone();
        let mut unblocked_reg = vec![0.0; n];
        let unblocked_info = ldl_regularized_unblocked_in_place(
            unblocked.as_mut(),
            &signs,
            &mut unblocked_reg,
            regularization(n),
        )
        .unwrap();

        for block_size in [1, 4, 16, n] {
            for parallelism in [Parallelism::None, Parallelism::Rayon(4)] {
                let mut blocked = a.clone();
                let mut blocked_reg = vec![0.0; n];
                let info = ldl_regularized_in_place(
                    blocked.as_mut(),
                    &signs,
                    &mut blocked_reg,
                    regularization(n),
                    FactorParams::default()
                        .with_block_size(block_size)
                        .with_parallelism(parallelism),
                )
                .unwrap();

                assert_eq!(info, unblocked_info);
                assert_lower_close(blocked.as_ref(), unblocked.as_ref());
                for (r, expected) in blocked_reg.iter().zip(&unblocked_reg) {
                    assert_approx_eq!(*r, *expected);
                }
            }
        }
    }

    #[test]
    fn test_no_regularization() {
        let mut rng = StdRng::seed_from_u64(2);
        let n = 26;
        let signs = pivot_signs(n);
        let a = random_hermitian(&mut rng, &signs, false);

        let mut factors = a.clone();
        let mut reg = vec![f64::NAN; n];
        let info = ldl_regularized_in_place(
            factors.as_mut(),
            &signs,
            &mut reg,
            regularization(n),
            FactorParams::default().with_block_size(8),
        )
        .unwrap();

        assert_eq!(info.regularization_count, 0);
        assert!(reg.iter().all(|&r| r == 0.0));
        assert_lower_close(factors.as_ref(), reference_ldl(a.as_ref()).as_ref());
    }

    #[test]
    fn test_first_pivot_of_hankel_matrix() {
        let n = 4;
        let a = Mat::from_fn(n, n, |i, j| (i + j) as f64);
        let signs = [1i8; 4];
        let regularization = LdlRegularization::<f64> {
            pivot_tolerance: 1e-12,
            regularization_magnitude: 1e-8,
        };

        let mut factors = a.clone();
        let mut reg = vec![f64::NAN; n];
        let info = ldl_regularized_in_place(
            factors.as_mut(),
            &signs,
            &mut reg,
            regularization,
            FactorParams::default().with_block_size(2),
        )
        .unwrap();

        // the first pivot is exactly zero, and every later pivot is pushed far below zero by the
        // tiny replacement of the previous one
        assert!(reg[0] == 1e-8);
        assert_eq!(info.regularization_count, 4);
        for j in 0..n {
            assert!(factors.read(j, j) == 1e-8);
            assert!(reg[j] > 0.0);
        }
        for i in 1..n {
            assert_approx_eq!(factors.read(i, 0) / 1e8, i as f64);
        }
    }

    #[test]
    fn test_errors() {
        let mut a = Mat::<f64>::zeros(3, 3);
        let mut reg = vec![0.0; 3];
        let regularization = LdlRegularization::<f64> {
            pivot_tolerance: 0.0,
            regularization_magnitude: 1.0,
        };
        let params = FactorParams::default();

        let mut rect = Mat::<f64>::zeros(3, 2);
        assert_eq!(
            ldl_regularized_in_place(rect.as_mut(), &[1, 1, 1], &mut reg, regularization, params),
            Err(Error::NotSquare {
                what: "matrix",
                nrows: 3,
                ncols: 2,
            })
        );
        assert_eq!(
            ldl_regularized_in_place(a.as_mut(), &[1, 1], &mut reg, regularization, params),
            Err(Error::DimensionMismatch {
                what: "pivot signs",
                expected: 3,
                found: 2,
            })
        );
        assert_eq!(
            ldl_regularized_in_place(a.as_mut(), &[1, 1, 1], &mut reg[..1], regularization, params),
            Err(Error::DimensionMismatch {
                what: "regularization vector",
                expected: 3,
                found: 1,
            })
        );
        assert_eq!(
            ldl_regularized_unblocked_in_place(a.as_mut(), &[1, -1, 0], &mut reg, regularization),
            Err(Error::InvalidPivotSign { index: 2, value: 0 })
        );
        assert_eq!(
            ldl_regularized_in_place(
                a.as_mut(),
                &[1, 1, 1],
                &mut reg,
                regularization,
                params.with_block_size(0)
            ),
            Err(Error::InvalidBlockSize)
        );
    }

    #[test]
    fn test_distributed_matches_serial() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = 23;
        let signs = pivot_signs(n);
        let a = random_hermitian(&mut rng, &signs, true);

        for block_size in [1, 4, n] {
            let params = FactorParams::default()
                .with_block_size(block_size)
                .with_validation(true);

            let mut serial = a.clone();
            let mut serial_reg = vec![0.0; n];
            let serial_info = ldl_regularized_in_place(
                serial.as_mut(),
                &signs,
                &mut serial_reg,
                regularization(n),
                params,
            )
            .unwrap();

            for (height, width) in GRIDS {
                let results = Grid::run(height, width, |grid| {
                    let mut factors = DistMatrix::from_mat(grid, Format::MC_MR, a.as_ref()).unwrap();
                    let signs =
                        DistMatrix::from_fn(grid, Format::MC_STAR, n, 1, |i, _| signs[i]).unwrap();
                    let mut reg =
                        DistMatrix::<f64>::zeros(grid, Format::MC_STAR, n, 1).unwrap();
                    let info = ldl_regularized_dist_in_place(
                        factors.as_mut(),
                        signs.as_ref(),
                        reg.as_mut(),
                        regularization(n),
                        params,
                    )
                    .unwrap();
                    (factors.to_mat().unwrap(), reg.to_mat().unwrap(), info)
                })
                .unwrap();

                for (factors, reg, info) in &results {
                    assert_eq!(*info, serial_info);
                    assert_lower_close(factors.as_ref(), serial.as_ref());
                    for j in 0..n {
                        assert_approx_eq!(reg.read(j, 0), serial_reg[j]);
                    }
                }
            }
        }
    }

    #[test]
    fn test_distributed_proxies() {
        let mut rng = StdRng::seed_from_u64(4);
        let n = 14;
        let signs = pivot_signs(n);
        let a = random_hermitian(&mut rng, &signs, true);
        let params = FactorParams::default().with_block_size(3);

        let mut serial = a.clone();
        let mut serial_reg = vec![0.0; n];
        ldl_regularized_in_place(
            serial.as_mut(),
            &signs,
            &mut serial_reg,
            regularization(n),
            params,
        )
        .unwrap();

        let results = Grid::run(2, 3, |grid| {
            let mut factors = DistMatrix::from_mat(grid, Format::STAR_VR, a.as_ref()).unwrap();
            let signs = DistMatrix::from_fn(grid, Format::VR_STAR, n, 1, |i, _| signs[i]).unwrap();
            let mut reg = DistMatrix::<f64>::zeros(grid, Format::STAR_STAR, n, 1).unwrap();
            ldl_regularized_dist_in_place(
                factors.as_mut(),
                signs.as_ref(),
                reg.as_mut(),
                regularization(n),
                params,
            )
            .unwrap();
            assert_eq!(factors.format(), Format::STAR_VR);
            (factors.to_mat().unwrap(), reg.into_local())
        })
        .unwrap();

        for (factors, reg) in &results {
            assert_lower_close(factors.as_ref(), serial.as_ref());
            for j in 0..n {
                assert_approx_eq!(reg.read(j, 0), serial_reg[j]);
            }
        }
    }

    #[test]
    fn test_distributed_hankel_matrix() {
        let n = 4;
        let a = Mat::from_fn(n, n, |i, j| (i + j) as f64);
        let regularization = LdlRegularization::<f64> {
            pivot_tolerance: 1e-12,
            regularization_magnitude: 1e-8,
        };
        let params = FactorParams::default().with_block_size(2);

        let results = Grid::run(2, 2, |grid| {
            let mut factors = DistMatrix::from_mat(grid, Format::MC_MR, a.as_ref()).unwrap();
            let signs = DistMatrix::from_fn(grid, Format::MC_STAR, n, 1, |_, _| 1i8).unwrap();
            let mut reg = DistMatrix::<f64>::zeros(grid, Format::MC_STAR, n, 1).unwrap();
            let info = ldl_regularized_dist_in_place(
                factors.as_mut(),
                signs.as_ref(),
                reg.as_mut(),
                regularization,
                params,
            )
            .unwrap();
            (factors.to_mat().unwrap(), reg.to_mat().unwrap(), info)
        })
        .unwrap();

        for (factors, reg, info) in &results {
            assert_eq!(info.regularization_count, 4);
            assert!(reg.read(0, 0) == 1e-8);
            for j in 0..n {
                assert!(factors.read(j, j) == 1e-8);
            }
        }
    }

    #[test]
    fn test_distributed_errors() {
        let n = 6;
        let a = Mat::<f64>::identity(n, n);
        let regularization = LdlRegularization::<f64> {
            pivot_tolerance: 0.0,
            regularization_magnitude: 1.0,
        };

        let results = Grid::run(2, 2, |grid| {
            let mut factors = DistMatrix::from_mat(grid, Format::MC_MR, a.as_ref()).unwrap();
            let mut reg = DistMatrix::<f64>::zeros(grid, Format::MC_STAR, n, 1).unwrap();

            let bad_signs =
                DistMatrix::from_fn(grid, Format::MC_STAR, n, 1, |i, _| if i == 3 { 0 } else { 1 })
                    .unwrap();
            let invalid_sign = ldl_regularized_dist_in_place(
                factors.as_mut(),
                bad_signs.as_ref(),
                reg.as_mut(),
                regularization,
                FactorParams::default(),
            );

            let signs = DistMatrix::from_fn(grid, Format::MC_STAR, n, 1, |_, _| 1i8).unwrap();
            let block_size = if grid.vc_rank() == 0 { 2 } else { 3 };
            let inconsistent = ldl_regularized_dist_in_place(
                factors.as_mut(),
                signs.as_ref(),
                reg.as_mut(),
                regularization,
                FactorParams::default()
                    .with_block_size(block_size)
                    .with_validation(true),
            );

            let mut short_reg = DistMatrix::<f64>::zeros(grid, Format::MC_STAR, n - 1, 1).unwrap();
            let mismatch = ldl_regularized_dist_in_place(
                factors.as_mut(),
                signs.as_ref(),
                short_reg.as_mut(),
                regularization,
                FactorParams::default(),
            );

            (invalid_sign, inconsistent, mismatch)
        })
        .unwrap();

        for (invalid_sign, inconsistent, mismatch) in results {
            assert_eq!(invalid_sign, Err(Error::InvalidPivotSign { index: 3, value: 0 }));
            assert_eq!(
                inconsistent,
                Err(Error::InconsistentArguments { what: "block size" })
            );
            assert_eq!(
                mismatch,
                Err(Error::DimensionMismatch {
                    what: "regularization vector",
                    expected: n,
                    found: n - 1,
                })
            );
        }
    }
}
