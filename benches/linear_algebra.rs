use ckks_toolkit::{CkksParams, HomomorphicEval, LinearAlgebra, Matrix, NaiveBackend};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

fn bench_products(c: &mut Criterion) {
    let params = Arc::new(CkksParams::new(2048, 2, 30).unwrap());
    let backend = Arc::new(NaiveBackend::new(params.clone()));
    let eval = HomomorphicEval::new(backend, params.clone()).unwrap();
    let la = LinearAlgebra::new(&eval);
    let unit = la.make_unit(64).unwrap();

    let mut group = c.benchmark_group("linear_algebra");
    for dim in [32usize, 96] {
        let mat = Matrix::new(dim, dim, (0..dim * dim).map(|i| (i % 11) as f64).collect()).unwrap();
        let vec: Vec<f64> = (0..dim).map(|i| (i % 5) as f64).collect();
        let enc_mat = la.encrypt_matrix(&mat, unit, None).unwrap();
        let enc_vec = la.encrypt_row_vector(&vec, unit, None).unwrap();

        group.bench_with_input(
            BenchmarkId::new("matrix_vector", dim),
            &dim,
            |b, _| {
                b.iter(|| {
                    let out = la.multiply_matrix_vector(&enc_mat, &enc_vec).unwrap();
                    black_box(out)
                });
            },
        );

        group.bench_with_input(BenchmarkId::new("sum_rows", dim), &dim, |b, _| {
            b.iter(|| {
                let out = la.sum_rows(&enc_mat).unwrap();
                black_box(out)
            });
        });
    }
    group.finish();
}

criterion_group!(linear_algebra, bench_products);
criterion_main!(linear_algebra);
