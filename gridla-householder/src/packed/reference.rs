use super::compute::{diagonal_length, diagonal_start};
use gridla_core::{ComplexField, Conj, Error, MatMut, MatRef, Result};

/// Applies the same transformation as [`super::compute::apply_packed_reflectors_llhf`], one
/// reflector at a time.
///
/// # Errors
///
/// [`Error::DimensionMismatch`] if the number of columns of `householder_factor` is not the number
/// of rows of `matrix`, or if `tau` is not as long as the selected diagonal.
pub fn apply_unblocked<T: ComplexField>(
    conj: Conj,
    offset: isize,
    householder_factor: MatRef<'_, T>,
    tau: &[T],
    matrix: MatMut<'_, T>,
) -> Result<()> {
    let diag_len = diagonal_length(householder_factor.nrows(), householder_factor.ncols(), offset);
    if householder_factor.ncols() != matrix.nrows() {
        return Err(Error::DimensionMismatch {
            what: "matrix rows",
            expected: householder_factor.ncols(),
            found: matrix.nrows(),
        });
    }
    if tau.len() != diag_len {
        return Err(Error::DimensionMismatch {
            what: "householder scalars",
            expected: diag_len,
            found: tau.len(),
        });
    }

    let (i_off, j_off) = diagonal_start(offset);

    let mut matrix = matrix;
    for (k, &tau) in tau.iter().enumerate() {
        let ki = k + i_off;
        let kj = k + j_off;
        let tau = conj.apply(tau);
        let v = householder_factor.row(ki);

        for col in 0..matrix.ncols() {
            // w = τ v A[..=kj, col], with v[kj] = 1
            let mut w = matrix.read(kj, col);
            for i in 0..kj {
                w = w + v.read(0, i) * matrix.read(i, col);
            }
            let w = tau * w;

            let value = matrix.read(kj, col) - w;
            matrix.write(kj, col, value);
            for i in 0..kj {
                let value = matrix.read(i, col) - v.read(0, i).conj() * w;
                matrix.write(i, col, value);
            }
        }
    }
    Ok(())
}
