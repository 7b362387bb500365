//! Entrywise norms of Hermitian matrices stored in one triangle.

use crate::{
    dist::merge_owners,
    error::{Error, Result},
    ComplexField, DistMatRef, MatRef, Side,
};

#[inline]
fn in_triangle(side: Side, i: usize, j: usize) -> bool {
    match side {
        Side::Lower => i >= j,
        Side::Upper => i <= j,
    }
}

#[inline]
fn contribution<T: ComplexField>(i: usize, j: usize, value: T) -> T::Real {
    let abs = value.abs();
    if i == j {
        abs
    } else {
        abs + abs
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

/// Returns `Σ |a_ij|` over every element of the Hermitian matrix whose triangle `side` is stored
/// in `mat`. The other triangle is not accessed.
///
/// # Errors
///
/// Returns [`Error::NotSquare`] if `mat` is not square.
pub fn hermitian_entrywise_one_norm<T: ComplexField>(
    side: Side,
    mat: MatRef<'_, T>,
) -> Result<T::Real> {
    check_square(mat.nrows(), mat.ncols())?;
    let mut acc = T::Real::zero();
    for j in 0..mat.ncols() {
        for i in 0..mat.nrows() {
            if in_triangle(side, i, j) {
                acc = acc + contribution(i, j, mat.read(i, j));
            }
        }
    }
    Ok(acc)
}

/// Distributed version of [`hermitian_entrywise_one_norm`].
///
/// This is a collective operation, and every process returns the same value. Elements that are
/// replicated on several processes are counted once.
pub fn hermitian_entrywise_one_norm_dist<T: ComplexField>(
    side: Side,
    mat: DistMatRef<'_, T>,
) -> Result<T::Real> {
    check_square(mat.nrows(), mat.ncols())?;
    let grid = mat.grid();
    let row_axis = mat.row_axis();
    let col_axis = mat.col_axis();
    let local = mat.local();

    let mut acc = T::Real::zero();
    for local_j in 0..local.ncols() {
        let j = col_axis.global(local_j);
        for local_i in 0..local.nrows() {
            let i = row_axis.global(local_i);
            if !in_triangle(side, i, j) {
                continue;
            }
            // among the copies of a replicated element, only the one on the first grid row (or
            // column) contributes
            let owners = merge_owners(row_axis.owner(grid, i), col_axis.owner(grid, j));
            if owners.0.unwrap_or(0) == grid.row() && owners.1.unwrap_or(0) == grid.col() {
                acc = acc + contribution(i, j, local.read(local_i, local_j));
            }
        }
    }

    let mut buf = [acc];
    grid.vc_comm().all_reduce_sum(&mut buf);
    Ok(buf[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{c64, DistMatrix, Format, Grid, Mat};
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_serial() {
        let a = crate::mat![
            [1.0, f64::NAN, f64::NAN],
            [-2.0, 3.0, f64::NAN],
            [4.0, -5.0, -6.0],
        ];
        // 1 + 3 + 6 + 2 * (2 + 4 + 5)
        assert_approx_eq!(hermitian_entrywise_one_norm(Side::Lower, a.as_ref()).unwrap(), 32.0);
        assert_approx_eq!(
            hermitian_entrywise_one_norm(Side::Upper, a.transpose()).unwrap(),
            32.0
        );
        assert!(
            hermitian_entrywise_one_norm(Side::Lower, a.as_ref().submatrix(0, 0, 2, 3))
                == Err(Error::NotSquare {
                    what: "matrix",
                    nrows: 2,
                    ncols: 3,
                })
        );
    }

    #[test]
    fn test_complex() {
        let a = Mat::from_fn(2, 2, |i, j| c64::new(3.0 * (i + j) as f64, 4.0 * (i + j) as f64));
        // |a_00| = 0, |a_10| = 5, |a_11| = 10
        assert_approx_eq!(hermitian_entrywise_one_norm(Side::Lower, a.as_ref()).unwrap(), 20.0);
    }

    #[test]
    fn test_distributed_matches_serial() {
        let n = 7;
        let a = Mat::from_fn(n, n, |i, j| (i as f64) - 2.0 * (j as f64) + 0.25);
        let expected_lower = hermitian_entrywise_one_norm(Side::Lower, a.as_ref()).unwrap();
        let expected_upper = hermitian_entrywise_one_norm(Side::Upper, a.as_ref()).unwrap();

        for (height, width) in [(1, 1), (1, 2), (2, 1), (2, 2), (2, 3), (3, 2)] {
            let results = Grid::run(height, width, |grid| {
                let mut norms = Vec::new();
                for format in [
                    Format::MC_MR,
                    Format::MC_STAR,
                    Format::STAR_VR,
                    Format::STAR_STAR,
                ] {
                    let a = DistMatrix::from_mat(grid, format, a.as_ref()).unwrap();
                    norms.push((
                        hermitian_entrywise_one_norm_dist(Side::Lower, a.as_ref()).unwrap(),
                        hermitian_entrywise_one_norm_dist(Side::Upper, a.as_ref()).unwrap(),
                    ));
                }
                norms
            })
            .unwrap();

            for norms in &results {
                for &(lower, upper) in norms {
                    assert_approx_eq!(lower, expected_lower);
                    assert_approx_eq!(upper, expected_upper);
                }
            }
        }
    }
}
