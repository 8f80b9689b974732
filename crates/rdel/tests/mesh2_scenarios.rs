//! End-to-end scenarios for the 2D restricted-Delaunay driver.

use std::collections::BTreeSet;

use nalgebra::Vector2;
use rdel::cfg::RdelOpts;
use rdel::geom2::{Pslg2, Seg2};
use rdel::hfun::Uniform;
use rdel::mesh2::{rdel_make_2d, rdel_mesh_2d, RdelMesh2};

fn unit_square() -> Pslg2 {
    Pslg2::polygon(vec![
        Vector2::new(0.0, 0.0),
        Vector2::new(1.0, 0.0),
        Vector2::new(1.0, 1.0),
        Vector2::new(0.0, 1.0),
    ])
    .unwrap()
}

/// V - E + F over the restricted cell complex.
fn euler(mesh: &RdelMesh2) -> i64 {
    let mut verts: BTreeSet<u32> = BTreeSet::new();
    let mut edges: BTreeSet<[u32; 2]> = BTreeSet::new();
    let faces = mesh.trias.len() as i64;
    for k in mesh.trias.sorted_keys() {
        for n in k {
            verts.insert(n);
        }
        edges.insert([k[0], k[1]]);
        edges.insert([k[0], k[2]]);
        edges.insert([k[1], k[2]]);
    }
    verts.len() as i64 - edges.len() as i64 + faces
}

fn cell_area(mesh: &RdelMesh2) -> f64 {
    let mut area = 0.0;
    for k in mesh.trias.sorted_keys() {
        let (a, b, c) = (
            mesh.dt.node(k[0]).pos,
            mesh.dt.node(k[1]).pos,
            mesh.dt.node(k[2]).pos,
        );
        let u = b - a;
        let w = c - a;
        area += (u.x * w.y - u.y * w.x).abs() * 0.5;
    }
    area
}

#[test]
fn s1_unit_square_uniform_h() {
    let geom = unit_square();
    let opts = RdelOpts {
        dims: 2,
        iter: 1000,
        ..RdelOpts::default()
    };
    let (mesh, stats) = rdel_mesh_2d(&geom, &[], &Uniform(1.0), &opts);
    assert!(stats.converged);
    mesh.check_invariants().unwrap();
    assert_eq!(stats.n_ball, 4);
    assert!(stats.n_edge >= 4);
    assert!(stats.n_cell >= 2);
    assert_eq!(euler(&mesh), 1);
    assert!((cell_area(&mesh) - 1.0).abs() < 1e-9);
}

#[test]
fn s3_single_ridge_dims_1() {
    let geom = Pslg2::new(
        vec![Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0)],
        vec![Seg2 {
            a: 0,
            b: 1,
            part: 0,
        }],
    )
    .unwrap();
    let opts = RdelOpts {
        dims: 1,
        iter: 10_000,
        ..RdelOpts::default()
    };
    let (mesh, stats) = rdel_mesh_2d(&geom, &[], &Uniform(0.25), &opts);
    assert!(stats.converged);
    mesh.check_invariants().unwrap();
    assert_eq!(stats.n_cell, 0, "no interior cell may appear at dims=1");
    assert_eq!(stats.n_ball, 2);
    assert!(stats.n_edge >= 2);
    // Steiner points subdivide the ridge at spacing bounded by siz1 * h.
    let bound = opts.siz1 * 0.25 + 1e-9;
    let mut total = 0.0;
    for k in mesh.edges.sorted_keys() {
        let (a, b) = (mesh.dt.node(k[0]).pos, mesh.dt.node(k[1]).pos);
        let l = (b - a).norm();
        assert!(l <= bound, "edge length {l} exceeds {bound}");
        total += l;
    }
    assert!((total - 1.0).abs() < 1e-9, "edges must tile the ridge");
}

#[test]
fn s4_make_dims_0_produces_balls_only() {
    let geom = unit_square();
    let opts = RdelOpts {
        dims: 0,
        ..RdelOpts::default()
    };
    let (mesh, stats) = rdel_make_2d(&geom, &[], &opts);
    mesh.check_invariants().unwrap();
    assert_eq!(stats.n_ball, 4);
    assert_eq!(stats.n_edge, 0);
    assert_eq!(stats.n_cell, 0);
    assert_eq!(stats.steiner_total(), 0);
}

#[test]
fn s5_converged_input_is_idempotent() {
    let geom = unit_square();
    let opts = RdelOpts {
        dims: 2,
        iter: 1000,
        ..RdelOpts::default()
    };
    let (mesh, stats) = rdel_mesh_2d(&geom, &[], &Uniform(1.0), &opts);
    assert!(stats.converged);
    // Interior nodes of the converged mesh become the init set; boundary
    // nodes come back through the geometry seeds.
    let interior: Vec<Vector2<f64>> = mesh
        .dt
        .live_nodes()
        .filter(|&n| mesh.dt.node(n).fdim == 2)
        .map(|n| mesh.dt.node(n).pos)
        .collect();
    let (mesh2, stats2) = rdel_mesh_2d(&geom, &interior, &Uniform(1.0), &opts);
    assert!(stats2.converged);
    assert_eq!(stats2.steiner_total(), 0, "no refinement on converged input");
    assert_eq!(stats2.n_edge, stats.n_edge);
    assert_eq!(stats2.n_cell, stats.n_cell);
    mesh2.check_invariants().unwrap();
}

#[test]
fn s6_iteration_budget_exits_cleanly() {
    let geom = unit_square();
    let opts = RdelOpts {
        dims: 2,
        iter: 10,
        ..RdelOpts::default()
    };
    let (mesh, stats) = rdel_mesh_2d(&geom, &[], &Uniform(0.05), &opts);
    assert!(!stats.converged);
    assert!(stats.passes >= 10);
    // The partial mesh still satisfies every structural invariant.
    mesh.check_invariants().unwrap();
}

#[test]
fn deterministic_across_runs() {
    let geom = unit_square();
    let mut init = Vec::new();
    for i in 1..5 {
        for j in 1..5 {
            init.push(Vector2::new(i as f64 / 5.0, j as f64 / 5.0));
        }
    }
    let opts = RdelOpts {
        dims: 2,
        iter: 100_000,
        ..RdelOpts::default()
    };
    let (m1, s1) = rdel_mesh_2d(&geom, &init, &Uniform(0.3), &opts);
    let (m2, s2) = rdel_mesh_2d(&geom, &init, &Uniform(0.3), &opts);
    assert!(s1.converged && s2.converged);
    assert_eq!(s1.steiner_edge, s2.steiner_edge);
    assert_eq!(s1.steiner_cell, s2.steiner_cell);
    assert_eq!(m1.edges.sorted_keys(), m2.edges.sorted_keys());
    assert_eq!(m1.trias.sorted_keys(), m2.trias.sorted_keys());
    let p1: Vec<(u64, u64)> = m1
        .dt
        .live_nodes()
        .map(|n| {
            let p = m1.dt.node(n).pos;
            (p.x.to_bits(), p.y.to_bits())
        })
        .collect();
    let p2: Vec<(u64, u64)> = m2
        .dt
        .live_nodes()
        .map(|n| {
            let p = m2.dt.node(n).pos;
            (p.x.to_bits(), p.y.to_bits())
        })
        .collect();
    assert_eq!(p1, p2, "outputs must be bit-identical");
}

mod random_domains {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn jittered_polygon(n: usize, seed: u64) -> Pslg2 {
        let mut rng = StdRng::seed_from_u64(seed);
        let pts = (0..n)
            .map(|k| {
                let th = 2.0 * std::f64::consts::PI * (k as f64) / (n as f64);
                let r = 1.0 + (rng.gen::<f64>() - 0.5) * 0.1;
                Vector2::new(th.cos() * r, th.sin() * r)
            })
            .collect();
        Pslg2::polygon(pts).unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn refined_polygons_converge_with_invariants(
            n in 6usize..12,
            seed in 0u64..1000,
        ) {
            let geom = jittered_polygon(n, seed);
            let opts = RdelOpts {
                dims: 2,
                iter: 50_000,
                ..RdelOpts::default()
            };
            let (mesh, stats) = rdel_mesh_2d(&geom, &[], &Uniform(0.6), &opts);
            prop_assert!(stats.converged);
            prop_assert!(stats.n_cell > 0);
            prop_assert!(stats.n_edge >= n);
            prop_assert!(mesh.check_invariants().is_ok());
        }
    }
}
