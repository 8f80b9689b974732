//! Restricted-face records and queue entries in R^3.

use nalgebra::Vector3;
use rustc_hash::FxHashMap;

use crate::cfg::Feat;
use crate::heap::HeapItem;
use crate::index::FaceTable;
use crate::tri3::Del3;

pub use crate::mesh2::BallKind;

/// Protecting ball record; one per protected node.
#[derive(Clone, Copy, Debug)]
pub struct Ball3 {
    pub node: u32,
    pub kind: BallKind,
    pub center: Vector3<f64>,
    pub rsq: f64,
    pub pass: u32,
}

/// Restricted edge record: the ridge crossing of the edge's dual Voronoi
/// polygon.
#[derive(Clone, Copy, Debug)]
pub struct EdgeDat3 {
    pub key: [u32; 2],
    /// Owning Delaunay cell and the local edge index (0..6) within it.
    pub tadj: u32,
    pub eadj: u8,
    pub pass: u32,
    pub center: Vector3<f64>,
    pub rsq: f64,
    pub feat: Feat,
    pub topo: u8,
    pub part: i32,
}

/// Restricted face record: the surface crossing of the face's dual Voronoi
/// segment. `dups` counts insertions from a second adjacent cell within
/// one cavity; unresolved duplicates veto cell-sign seeding.
#[derive(Clone, Copy, Debug)]
pub struct FaceDat3 {
    pub key: [u32; 3],
    /// Owning Delaunay cell and the local face index (0..4) within it.
    pub tadj: u32,
    pub fadj: u8,
    pub pass: u32,
    pub center: Vector3<f64>,
    pub rsq: f64,
    pub feat: Feat,
    pub topo: u8,
    pub part: i32,
    pub dups: u32,
}

/// Restricted cell record: the circumcentre lies inside the domain.
#[derive(Clone, Copy, Debug)]
pub struct TetDat3 {
    pub key: [u32; 4],
    pub tadj: u32,
    pub pass: u32,
    pub part: i32,
}

/// Queued bad edge.
#[derive(Clone, Copy, Debug)]
pub struct EdgeCost3 {
    pub key: [u32; 2],
    pub pass: u32,
    pub cost: f64,
}

impl HeapItem for EdgeCost3 {
    fn before(&self, other: &Self) -> bool {
        if self.cost != other.cost {
            return self.cost > other.cost;
        }
        (self.pass, self.key) < (other.pass, other.key)
    }
}

/// Queued bad cell.
#[derive(Clone, Copy, Debug)]
pub struct TetCost3 {
    pub key: [u32; 4],
    pub pass: u32,
    pub cost: f64,
}

impl HeapItem for TetCost3 {
    fn before(&self, other: &Self) -> bool {
        if self.cost != other.cost {
            return self.cost > other.cost;
        }
        (self.pass, self.key) < (other.pass, other.key)
    }
}

/// Output mesh: the Delaunay triangulation plus the restricted face sets.
#[derive(Debug, Default)]
pub struct RdelMesh3 {
    pub dt: Del3,
    pub balls: FxHashMap<u32, Ball3>,
    pub edges: FaceTable<2, EdgeDat3>,
    pub faces: FaceTable<3, FaceDat3>,
    pub cells: FaceTable<4, TetDat3>,
}

impl RdelMesh3 {
    /// Validate the structural invariants of the restricted face sets.
    /// Debug helper used by the test suites.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (key, dat) in self.edges.iter() {
            if key[0] >= key[1] {
                return Err(format!("edge key {key:?} not strictly ascending"));
            }
            let t = self.dt.tet(dat.tadj);
            if !t.alive {
                return Err(format!("edge {key:?} owned by dead cell {}", dat.tadj));
            }
            let (a, b) = t.edge(dat.eadj as usize);
            if crate::index::key([a, b]) != *key {
                return Err(format!("edge {key:?} does not resolve in cell {}", dat.tadj));
            }
            for &n in key {
                if self.dt.node(n).fdim > 1 {
                    return Err(format!("edge {key:?} touches fdim>1 node {n}"));
                }
            }
        }
        for (key, dat) in self.faces.iter() {
            if !(key[0] < key[1] && key[1] < key[2]) {
                return Err(format!("face key {key:?} not strictly ascending"));
            }
            let t = self.dt.tet(dat.tadj);
            if !t.alive {
                return Err(format!("face {key:?} owned by dead cell {}", dat.tadj));
            }
            if crate::index::key(t.face(dat.fadj as usize)) != *key {
                return Err(format!("face {key:?} does not resolve in cell {}", dat.tadj));
            }
            for &n in key {
                if self.dt.node(n).fdim > 2 {
                    return Err(format!("face {key:?} touches fdim>2 node {n}"));
                }
            }
        }
        for (key, dat) in self.cells.iter() {
            let t = self.dt.tet(dat.tadj);
            if !t.alive {
                return Err(format!("cell {key:?} owned by dead cell {}", dat.tadj));
            }
            if crate::index::key(t.nodes) != *key {
                return Err(format!("cell {key:?} does not resolve in cell {}", dat.tadj));
            }
            for &n in key {
                if self.dt.node(n).fdim > 3 {
                    return Err(format!("cell {key:?} touches fdim>3 node {n}"));
                }
            }
        }
        for (node, ball) in self.balls.iter() {
            if *node != ball.node || !self.dt.node(*node).alive {
                return Err(format!("bad ball record on node {node}"));
            }
        }
        Ok(())
    }
}
