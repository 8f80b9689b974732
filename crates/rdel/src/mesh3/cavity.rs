//! Cavity update in R^3.
//!
//! Besides the 2D duties, the face pass counts restricted faces reached
//! from a second adjacent cell (`ndup`); a non-zero count vetoes the
//! inside/outside sign seeding of the subsequent cell pass, which then
//! queries the oracle with no part hint for every cell.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::cfg::Feat;
use crate::geom3::Geom3;
use crate::index::key;
use crate::tri3::{Del3, NIL};

use super::types::{Ball3, BallKind, EdgeDat3, FaceDat3, TetDat3};

/// Per-iteration cavity buffers, reused across the run.
#[derive(Debug, Default)]
pub struct Bufs3 {
    pub bdat: Vec<Ball3>,
    pub edat: Vec<EdgeDat3>,
    pub fdat: Vec<FaceDat3>,
    pub tdat: Vec<TetDat3>,
    /// Edge keys already tested in this cavity.
    pub eprv: FxHashSet<[u32; 2]>,
    /// Face keys already tested in this cavity; the value points into
    /// `fdat` when the first test was restricted.
    pub fprv: FxHashMap<[u32; 3], Option<usize>>,
    /// Edge keys scrubbed from the index this iteration (topology feed).
    pub eold: Vec<[u32; 2]>,
    /// Restricted faces re-encountered from a second cell in this pass.
    pub ndup: usize,
}

impl Bufs3 {
    pub fn clear(&mut self) {
        self.bdat.clear();
        self.edat.clear();
        self.fdat.clear();
        self.tdat.clear();
        self.eprv.clear();
        self.fprv.clear();
        self.eold.clear();
        self.ndup = 0;
    }
}

/// Test the faces of `tnew` cells (and balls of `nnew` nodes) whose
/// dimension lies in `dlo..=dhi`, pushing restricted records to `bufs`.
pub(crate) fn push_rdel<G: Geom3>(
    geom: &G,
    dt: &Del3,
    tnew: &[u32],
    nnew: &[u32],
    pass: u32,
    dlo: u8,
    dhi: u8,
    bufs: &mut Bufs3,
) {
    if dlo == 0 {
        for &n in nnew {
            let node = dt.node(n);
            if !node.alive || node.feat != Feat::Hard {
                continue;
            }
            bufs.bdat.push(Ball3 {
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
            let tet = dt.tet(t);
            if !tet.alive {
                continue;
            }
            for e in 0..6 {
                let (a, b) = tet.edge(e);
                if dt.node(a).fdim > 1 || dt.node(b).fdim > 1 {
                    continue;
                }
                let k = key([a, b]);
                if !bufs.eprv.insert(k) {
                    continue;
                }
                // Dual Voronoi polygon: circumcentres of the cell ring.
                let Some(ring) = dt.edge_ring(t, a, b) else {
                    continue;
                };
                let poly: SmallVec<[nalgebra::Vector3<f64>; 16]> =
                    ring.iter().map(|&r| dt.tet(r).circ).collect();
                if let Some(hit) =
                    geom.edge_ball(&poly, dt.node(a).pos, dt.node(b).pos, -1)
                {
                    bufs.edat.push(EdgeDat3 {
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
        for &t in tnew {
            let tet = dt.tet(t);
            if !tet.alive {
                continue;
            }
            for f in 0..4 {
                let fac = tet.face(f);
                if fac.iter().any(|&n| dt.node(n).fdim > 2) {
                    continue;
                }
                let k = key(fac);
                if let Some(prev) = bufs.fprv.get(&k) {
                    // Second adjacent cell: count the boundary repeat.
                    if let Some(pos) = prev {
                        bufs.fdat[*pos].dups += 1;
                        bufs.ndup += 1;
                    }
                    continue;
                }
                let nb = tet.neigh[f];
                if nb == NIL {
                    bufs.fprv.insert(k, None);
                    continue;
                }
                let (t0, t1) = if t < nb { (t, nb) } else { (nb, t) };
                let d0 = dt.tet(t0).circ;
                let d1 = dt.tet(t1).circ;
                let hit = geom.face_ball(d0, d1, dt.node(fac[0]).pos, -1);
                match hit {
                    Some(hit) => {
                        bufs.fdat.push(FaceDat3 {
                            key: k,
                            tadj: t,
                            fadj: f as u8,
                            pass,
                            center: hit.center,
                            rsq: hit.rsq,
                            feat: hit.feat,
                            topo: hit.topo,
                            part: hit.part,
                            dups: 1,
                        });
                        bufs.fprv.insert(k, Some(bufs.fdat.len() - 1));
                    }
                    None => {
                        bufs.fprv.insert(k, None);
                    }
                }
            }
        }
    }

    if dlo <= 3 && 3 <= dhi {
        // Sign seeding is only sound when no boundary face was seen from
        // both sides in this pass.
        let safe = bufs.ndup == 0;
        let mut sign = -1i32;
        for &t in tnew {
            let tet = dt.tet(t);
            if !tet.alive {
                continue;
            }
            if tet.nodes.iter().any(|&n| dt.node(n).fdim > 3) {
                continue;
            }
            if !safe {
                sign = -1;
            }
            if let Some(part) = geom.tria_ball(tet.circ, sign) {
                bufs.tdat.push(TetDat3 {
                    key: key(tet.nodes),
                    tadj: t,
                    pass,
                    part,
                });
                sign = part;
            }
        }
    }
}
