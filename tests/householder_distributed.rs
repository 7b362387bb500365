use assert_approx_eq::assert_approx_eq;
use gridla::{
    c64, householder::*, mul, ComplexField, Conj, DistMatrix, FactorParams, Format, Grid, Mat,
    Parallelism,
};

// reflectors of the form I - τ vᴴv with |1 - τ‖v‖²| = 1
fn reflectors(m: usize) -> (Mat<c64>, Vec<c64>) {
    let h = Mat::from_fn(m, m, |i, j| {
        if j < i {
            c64::new(0.3 / (1.0 + (i + j) as f64), 0.1 * ((i * j) % 3) as f64)
        } else {
            c64::new(f64::NAN, f64::NAN)
        }
    });
    let tau = (0..m)
        .map(|k| {
            let norm2 = 1.0 + (0..k).map(|j| h.read(k, j).norm_sqr()).sum::<f64>();
            (c64::new(1.0, 0.0) - c64::from_polar(1.0, 0.7 + k as f64)) / norm2
        })
        .collect();
    (h, tau)
}

#[test]
fn distributed_application_to_identity_is_unitary() {
    let m = 12;
    let (h, tau) = reflectors(m);

    for (height, width) in [(1, 1), (2, 2), (2, 3), (3, 2)] {
        for conj in [Conj::No, Conj::Yes] {
            let results = Grid::run(height, width, |grid| {
                let h = DistMatrix::from_mat(grid, Format::MC_MR, h.as_ref()).unwrap();
                let tau = DistMatrix::from_fn(grid, Format::MC_STAR, m, 1, |i, _| tau[i]).unwrap();
                let mut q = DistMatrix::from_fn(grid, Format::MC_MR, m, m, |i, j| {
                    if i == j {
                        c64::one()
                    } else {
                        c64::zero()
                    }
                })
                .unwrap();
                apply_packed_reflectors_llhf_dist(
                    conj,
                    0,
                    h.as_ref(),
                    tau.as_ref(),
                    q.as_mut(),
                    FactorParams::default().with_block_size(5),
                )
                .unwrap();
                q.to_mat().unwrap()
            })
            .unwrap();

            let mut serial = Mat::<c64>::identity(m, m);
            apply_unblocked(conj, 0, h.as_ref(), &tau, serial.as_mut()).unwrap();

            for q in &results {
                let mut qhq = Mat::<c64>::zeros(m, m);
                mul::matmul(
                    qhq.as_mut(),
                    q.transpose(),
                    Conj::Yes,
                    q.as_ref(),
                    Conj::No,
                    None,
                    c64::one(),
                    Parallelism::None,
                );
                for j in 0..m {
                    for i in 0..m {
                        let expected = if i == j { c64::one() } else { c64::zero() };
                        assert_approx_eq!(qhq.read(i, j), expected);
                        assert_approx_eq!(q.read(i, j), serial.read(i, j));
                    }
                }
            }
        }
    }
}
