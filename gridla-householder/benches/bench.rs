use criterion::{criterion_group, criterion_main, Criterion};
use gridla_core::{Conj, DistMatrix, FactorParams, Format, Grid, Mat, Parallelism};
use gridla_householder::packed::{compute::*, reference::apply_unblocked};

fn reflectors(m: usize) -> (Mat<f64>, Vec<f64>) {
    let h = Mat::from_fn(m, m, |i, j| if j < i { 1.0 / (1.0 + (i + j) as f64) } else { 0.0 });
    let tau = (0..m)
        .map(|k| {
            let norm2: f64 = 1.0 + (0..k).map(|j| h.read(k, j) * h.read(k, j)).sum::<f64>();
            2.0 / norm2
        })
        .collect();
    (h, tau)
}

pub fn llhf(c: &mut Criterion) {
    for m in [64, 128, 256] {
        let (h, tau) = reflectors(m);
        let n = 64;
        let a = Mat::from_fn(m, n, |i, j| (i + 2 * j) as f64);

        c.bench_function(&format!("gridla-st-llhf-unblocked-{m}"), |b| {
            let mut mat = a.clone();
            b.iter(|| {
                mat.as_mut().copy_from(a.as_ref());
                apply_unblocked(Conj::No, 0, h.as_ref(), &tau, mat.as_mut()).unwrap();
            })
        });

        for (name, parallelism) in [("st", Parallelism::None), ("mt", Parallelism::Rayon(0))] {
            c.bench_function(&format!("gridla-{name}-llhf-blocked-{m}"), |b| {
                let mut mat = a.clone();
                let params = FactorParams::default()
                    .with_block_size(32)
                    .with_parallelism(parallelism)
                    .with_validation(false);
                b.iter(|| {
                    mat.as_mut().copy_from(a.as_ref());
                    apply_packed_reflectors_llhf(Conj::No, 0, h.as_ref(), &tau, mat.as_mut(), params)
                        .unwrap();
                })
            });
        }

        c.bench_function(&format!("gridla-2x2-llhf-dist-{m}"), |b| {
            let params = FactorParams::default()
                .with_block_size(32)
                .with_validation(false);
            b.iter(|| {
                Grid::run(2, 2, |grid| {
                    let h = DistMatrix::from_mat(grid, Format::MC_MR, h.as_ref()).unwrap();
                    let tau = DistMatrix::from_fn(grid, Format::STAR_STAR, m, 1, |i, _| tau[i]).unwrap();
                    let mut mat = DistMatrix::from_mat(grid, Format::MC_MR, a.as_ref()).unwrap();
                    apply_packed_reflectors_llhf_dist(
                        Conj::No,
                        0,
                        h.as_ref(),
                        tau.as_ref(),
                        mat.as_mut(),
                        params,
                    )
                    .unwrap()
                })
                .unwrap()
            })
        });
    }
}

criterion_group!(benches, llhf);
criterion_main!(benches);
