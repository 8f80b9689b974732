//! End-to-end scenarios for the 3D restricted-Delaunay driver.

use std::collections::BTreeSet;

use nalgebra::Vector3;
use rdel::cfg::RdelOpts;
use rdel::geom3::TriSurf3;
use rdel::hfun::Uniform;
use rdel::mesh3::{rdel_make_3d, rdel_mesh_3d, RdelMesh3};

fn unit_cube() -> TriSurf3 {
    TriSurf3::cube(Vector3::zeros(), Vector3::from_element(1.0)).unwrap()
}

fn cell_volume(mesh: &RdelMesh3) -> f64 {
    let mut vol = 0.0;
    for k in mesh.cells.sorted_keys() {
        let (a, b, c, d) = (
            mesh.dt.node(k[0]).pos,
            mesh.dt.node(k[1]).pos,
            mesh.dt.node(k[2]).pos,
            mesh.dt.node(k[3]).pos,
        );
        let u = b - a;
        let v = c - a;
        let w = d - a;
        vol += u.dot(&v.cross(&w)).abs() / 6.0;
    }
    vol
}

fn face_parts(mesh: &RdelMesh3) -> BTreeSet<i32> {
    mesh.faces.iter().map(|(_, d)| d.part).collect()
}

fn edge_parts(mesh: &RdelMesh3) -> BTreeSet<i32> {
    mesh.edges.iter().map(|(_, d)| d.part).collect()
}

#[test]
fn s2_unit_cube_make() {
    let geom = unit_cube();
    let opts = RdelOpts {
        dims: 3,
        ..RdelOpts::default()
    };
    let (mesh, stats) = rdel_make_3d(&geom, &[], &opts);
    mesh.check_invariants().unwrap();
    assert_eq!(stats.n_ball, 8, "one protecting ball per corner");
    assert_eq!(stats.n_edge, 12, "the twelve ridges, unsubdivided");
    assert_eq!(edge_parts(&mesh).len(), 12);
    assert!(stats.n_face >= 12);
    assert_eq!(
        face_parts(&mesh),
        (0..6).collect::<BTreeSet<i32>>(),
        "every cube face must carry restricted surface faces"
    );
    assert!(stats.n_cell >= 5);
    assert!((cell_volume(&mesh) - 1.0).abs() < 1e-9);
    assert_eq!(stats.steiner_total(), 0);
}

#[test]
fn s2_unit_cube_mesh_h_half() {
    let geom = unit_cube();
    let opts = RdelOpts {
        dims: 3,
        iter: 200_000,
        ..RdelOpts::default()
    };
    let (mesh, stats) = rdel_mesh_3d(&geom, &[], &Uniform(0.5), &opts);
    assert!(stats.converged);
    mesh.check_invariants().unwrap();
    assert_eq!(stats.n_ball, 8);
    // Each unit ridge must be subdivided to meet the sizing bound.
    assert!(stats.n_edge >= 24, "ridges must be subdivided: {}", stats.n_edge);
    assert_eq!(edge_parts(&mesh).len(), 12, "every ridge carries edges");
    let bound = opts.siz1 * 0.5 + 1e-9;
    for k in mesh.edges.sorted_keys() {
        let (a, b) = (mesh.dt.node(k[0]).pos, mesh.dt.node(k[1]).pos);
        assert!((b - a).norm() <= bound);
    }
    assert_eq!(face_parts(&mesh), (0..6).collect::<BTreeSet<i32>>());
    assert_eq!(stats.dup_last, 0, "boundary duplicates must settle");
    let vol = cell_volume(&mesh);
    assert!(vol > 0.8 && vol < 1.0 + 1e-9, "cell volume {vol}");
}

#[test]
fn s4_make_dims_0_produces_balls_only() {
    let geom = unit_cube();
    let opts = RdelOpts {
        dims: 0,
        ..RdelOpts::default()
    };
    let (mesh, stats) = rdel_make_3d(&geom, &[], &opts);
    mesh.check_invariants().unwrap();
    assert_eq!(stats.n_ball, 8);
    assert_eq!(stats.n_edge, 0);
    assert_eq!(stats.n_face, 0);
    assert_eq!(stats.n_cell, 0);
}

#[test]
fn make_dims_gating_is_monotone() {
    let geom = unit_cube();
    let mut counts = Vec::new();
    for dims in 0..=3u8 {
        let opts = RdelOpts {
            dims,
            ..RdelOpts::default()
        };
        let (_, stats) = rdel_make_3d(&geom, &[], &opts);
        counts.push((stats.n_ball, stats.n_edge, stats.n_face, stats.n_cell));
    }
    assert_eq!(counts[0], (8, 0, 0, 0));
    assert_eq!(counts[1].1, 12);
    assert_eq!(counts[1].2, 0);
    assert!(counts[2].2 >= 12);
    assert_eq!(counts[2].3, 0);
    assert!(counts[3].3 >= 5);
}

#[test]
fn iteration_budget_exits_cleanly() {
    let geom = unit_cube();
    let opts = RdelOpts {
        dims: 3,
        iter: 10,
        ..RdelOpts::default()
    };
    let (mesh, stats) = rdel_mesh_3d(&geom, &[], &Uniform(0.1), &opts);
    assert!(!stats.converged);
    mesh.check_invariants().unwrap();
}

#[test]
fn deterministic_across_runs() {
    let geom = unit_cube();
    let init = vec![
        Vector3::new(0.4, 0.4, 0.4),
        Vector3::new(0.6, 0.3, 0.7),
        Vector3::new(0.2, 0.8, 0.5),
    ];
    let opts = RdelOpts {
        dims: 3,
        iter: 200_000,
        ..RdelOpts::default()
    };
    let (m1, s1) = rdel_mesh_3d(&geom, &init, &Uniform(0.5), &opts);
    let (m2, s2) = rdel_mesh_3d(&geom, &init, &Uniform(0.5), &opts);
    assert!(s1.converged && s2.converged);
    assert_eq!(s1.steiner_edge, s2.steiner_edge);
    assert_eq!(s1.steiner_cell, s2.steiner_cell);
    assert_eq!(m1.edges.sorted_keys(), m2.edges.sorted_keys());
    assert_eq!(m1.faces.sorted_keys(), m2.faces.sorted_keys());
    assert_eq!(m1.cells.sorted_keys(), m2.cells.sorted_keys());
    let bits = |m: &RdelMesh3| -> Vec<[u64; 3]> {
        m.dt.live_nodes()
            .map(|n| {
                let p = m.dt.node(n).pos;
                [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
            })
            .collect()
    };
    assert_eq!(bits(&m1), bits(&m2), "outputs must be bit-identical");
}
