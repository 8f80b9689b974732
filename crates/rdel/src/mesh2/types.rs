//! Restricted-face records and queue entries in R^2.
//!
//! Records live in the face index keyed by their sorted node tuple; queue
//! entries embed the `(key, pass)` stamp only, and are re-validated against
//! the index at pop time. A stamp mismatch means the record was re-derived
//! since the entry was queued and the entry is dead.

use nalgebra::Vector2;
use rustc_hash::FxHashMap;

use crate::cfg::Feat;
use crate::heap::HeapItem;
use crate::index::FaceTable;
use crate::tri2::Del2;

/// Protecting-ball kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BallKind {
    /// Ball protecting a sharp feature node.
    Feat,
    /// Any other collar ball.
    Other,
}

/// Protecting ball record; one per protected node.
#[derive(Clone, Copy, Debug)]
pub struct Ball2 {
    pub node: u32,
    pub kind: BallKind,
    pub center: Vector2<f64>,
    pub rsq: f64,
    pub pass: u32,
}

/// Restricted edge record: the boundary-curve crossing of the edge's dual
/// Voronoi segment, plus classification.
#[derive(Clone, Copy, Debug)]
pub struct EdgeDat2 {
    pub key: [u32; 2],
    /// Owning Delaunay cell and the local edge index within it.
    pub tadj: u32,
    pub eadj: u8,
    pub pass: u32,
    /// Surface ball: crossing point and squared distance to the edge ends.
    pub center: Vector2<f64>,
    pub rsq: f64,
    pub feat: Feat,
    pub topo: u8,
    pub part: i32,
}

/// Restricted cell record: the cell's circumcentre lies inside the domain.
#[derive(Clone, Copy, Debug)]
pub struct TriaDat2 {
    pub key: [u32; 3],
    pub tadj: u32,
    pub pass: u32,
    pub part: i32,
}

/// Queued bad edge.
#[derive(Clone, Copy, Debug)]
pub struct EdgeCost2 {
    pub key: [u32; 2],
    pub pass: u32,
    pub cost: f64,
}

impl HeapItem for EdgeCost2 {
    fn before(&self, other: &Self) -> bool {
        if self.cost != other.cost {
            return self.cost > other.cost;
        }
        (self.pass, self.key) < (other.pass, other.key)
    }
}

/// Queued bad cell.
#[derive(Clone, Copy, Debug)]
pub struct TriaCost2 {
    pub key: [u32; 3],
    pub pass: u32,
    pub cost: f64,
}

impl HeapItem for TriaCost2 {
    fn before(&self, other: &Self) -> bool {
        if self.cost != other.cost {
            return self.cost > other.cost;
        }
        (self.pass, self.key) < (other.pass, other.key)
    }
}

/// Output mesh: the Delaunay triangulation plus the restricted face sets.
#[derive(Debug, Default)]
pub struct RdelMesh2 {
    pub dt: Del2,
    pub balls: FxHashMap<u32, Ball2>,
    pub edges: FaceTable<2, EdgeDat2>,
    pub trias: FaceTable<3, TriaDat2>,
}

impl RdelMesh2 {
    /// Validate the structural invariants of the restricted face sets.
    /// Debug helper used by the test suites.
    pub fn check_invariants(&self) -> Result<(), String> {
        for (key, dat) in self.edges.iter() {
            if key[0] >= key[1] {
                return Err(format!("edge key {key:?} not strictly ascending"));
            }
            let t = self.dt.tria(dat.tadj);
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
        for (key, dat) in self.trias.iter() {
            if !(key[0] < key[1] && key[1] < key[2]) {
                return Err(format!("cell key {key:?} not strictly ascending"));
            }
            let t = self.dt.tria(dat.tadj);
            if !t.alive {
                return Err(format!("cell {key:?} owned by dead cell {}", dat.tadj));
            }
            if crate::index::key(t.nodes) != *key {
                return Err(format!("cell {key:?} does not resolve in cell {}", dat.tadj));
            }
            for &n in key {
                if self.dt.node(n).fdim > 2 {
                    return Err(format!("cell {key:?} touches fdim>2 node {n}"));
                }
            }
        }
        for (node, ball) in self.balls.iter() {
            if *node != ball.node {
                return Err(format!("ball keyed {node} stores node {}", ball.node));
            }
            if !self.dt.node(*node).alive {
                return Err(format!("ball on dead node {node}"));
            }
        }
        Ok(())
    }
}
