//! Criterion benchmarks for the 2D restricted-Delaunay pipeline.
//! Focus sizes: spacing h in {0.3, 0.15, 0.075} on the unit square.
//! Results land under target/criterion by default.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Vector2;
use rdel::cfg::RdelOpts;
use rdel::geom2::Pslg2;
use rdel::hfun::Uniform;
use rdel::mesh2::{rdel_make_2d, rdel_mesh_2d};

fn unit_square() -> Pslg2 {
    Pslg2::polygon(vec![
        Vector2::new(0.0, 0.0),
        Vector2::new(1.0, 0.0),
        Vector2::new(1.0, 1.0),
        Vector2::new(0.0, 1.0),
    ])
    .unwrap()
}

fn bench_mesh2(c: &mut Criterion) {
    let mut group = c.benchmark_group("mesh2");
    for &h in &[0.3f64, 0.15, 0.075] {
        group.bench_with_input(BenchmarkId::new("rdel_mesh_square", h), &h, |b, &h| {
            let geom = unit_square();
            let opts = RdelOpts {
                dims: 2,
                iter: 500_000,
                ..RdelOpts::default()
            };
            b.iter(|| {
                let (mesh, stats) = rdel_mesh_2d(&geom, &[], &Uniform(h), &opts);
                assert!(stats.converged);
                mesh.trias.len()
            })
        });
    }
    group.bench_function("rdel_make_square_grid", |b| {
        let geom = unit_square();
        let opts = RdelOpts {
            dims: 2,
            ..RdelOpts::default()
        };
        let mut init = Vec::new();
        for i in 1..20 {
            for j in 1..20 {
                init.push(Vector2::new(i as f64 / 20.0, j as f64 / 20.0));
            }
        }
        b.iter(|| {
            let (mesh, _) = rdel_make_2d(&geom, &init, &opts);
            mesh.trias.len()
        })
    });
    group.finish();
}

criterion_group!(benches, bench_mesh2);
criterion_main!(benches);
