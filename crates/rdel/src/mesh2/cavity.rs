//! Cavity update in R^2: re-derive restricted-face records for the cells
//! created by an insertion (or for the whole triangulation at a phase
//! entry).
//!
//! Faces whose bounding nodes carry a too-high `fdim` are never tested;
//! edges shared by several new cells are tested once per cavity via the
//! `eprv` scratch set. Records are written to the driver's buffers and
//! merged into the global index afterwards, after the dead cells' records
//! have been scrubbed.

use rustc_hash::FxHashSet;

use crate::geom2::Geom2;
use crate::index::key;
use crate::tri2::{Del2, NIL};

use super::types::{Ball2, BallKind, EdgeDat2, TriaDat2};

/// Per-iteration cavity buffers, reused across the run.
#[derive(Debug, Default)]
pub struct Bufs2 {
    pub bdat: Vec<Ball2>,
    pub edat: Vec<EdgeDat2>,
    pub tdat: Vec<TriaDat2>,
    /// Edge keys already tested in this cavity.
    pub eprv: FxHashSet<[u32; 2]>,
    /// Edge keys scrubbed from the index this iteration (topology feed).
    pub eold: Vec<[u32; 2]>,
}

impl Bufs2 {
    pub fn clear(&mut self) {
        self.bdat.clear();
        self.edat.clear();
        self.tdat.clear();
        self.eprv.clear();
        self.eold.clear();
    }
}

/// Test the faces of `tnew` cells (and balls of `nnew` nodes) whose
/// dimension lies in `dlo..=dhi`, pushing restricted records to `bufs`.
pub(crate) fn push_rdel<G: Geom2>(
    geom: &G,
    dt: &Del2,
    tnew: &[u32],
    nnew: &[u32],
    pass: u32,
    dlo: u8,
    dhi: u8,
    bufs: &mut Bufs2,
) {
    if dlo == 0 {
        for &n in nnew {
            let node = dt.node(n);
            if !node.alive || node.feat != crate::cfg::Feat::Hard {
                continue;
            }
            bufs.bdat.push(Ball2 {
                node: n,
                kind: BallKind::Feat,
                center: node.pos,
                rsq: 0.0,
                pass,
            });
        }
    }

    if dlo <= 1 && 1 <= dhi {
        for &t in tnew {
            let tria = dt.tria(t);
            if !tria.alive {
                continue;
            }
            for e in 0..3 {
                let (a, b) = tria.edge(e);
                if dt.node(a).fdim > 1 || dt.node(b).fdim > 1 {
                    continue;
                }
                let k = key([a, b]);
                if !bufs.eprv.insert(k) {
                    continue;
                }
                let nb = tria.neigh[e];
                if nb == NIL {
                    continue;
                }
                // Dual Voronoi edge, endpoints in canonical cell order.
                let (t0, t1) = if t < nb { (t, nb) } else { (nb, t) };
                let d0 = dt.tria(t0).circ;
                let d1 = dt.tria(t1).circ;
                if let Some(hit) =
                    geom.edge_ball(d0, d1, dt.node(a).pos, dt.node(b).pos, -1)
                {
                    bufs.edat.push(EdgeDat2 {
                        key: k,
                        tadj: t,
                        eadj: e as u8,
                        pass,
                        center: hit.center,
                        rsq: hit.rsq,
                        feat: hit.feat,
                        topo: hit.topo,
                        part: hit.part,
                    });
                }
            }
        }
    }

    if dlo <= 2 && 2 <= dhi {
        let mut sign = -1i32;
        for &t in tnew {
            let tria = dt.tria(t);
            if !tria.alive {
                continue;
            }
            if tria.nodes.iter().any(|&n| dt.node(n).fdim > 2) {
                continue;
            }
            if let Some(part) = geom.tria_ball(tria.circ, sign) {
                bufs.tdat.push(TriaDat2 {
                    key: key(tria.nodes),
                    tadj: t,
                    pass,
                    part,
                });
                sign = part;
            }
        }
    }
}
