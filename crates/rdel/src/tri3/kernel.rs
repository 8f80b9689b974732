//! Node/tet arena and Bowyer-Watson insertion in R^3.

use nalgebra::Vector3;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::cfg::{Feat, DUPL_TOL, PRED_EPS};
use crate::hfun::Hint;

use super::predicates::{circ_ball_3d, orient_3d, orient_eps_3d};

/// Sentinel index for "no node/tet".
pub const NIL: u32 = u32::MAX;

/// Local vertex triples of the face opposite each vertex, ordered so the
/// face normal points out of a positively oriented tet.
pub const FACES_3: [[usize; 3]; 4] = [[1, 2, 3], [0, 3, 2], [0, 1, 3], [0, 2, 1]];

/// Local vertex pairs of the six tet edges.
pub const EDGES_3: [[usize; 2]; 6] = [[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]];

/// Mesh vertex. Positions never move after insertion.
#[derive(Clone, Copy, Debug)]
pub struct Node3 {
    pub pos: Vector3<f64>,
    /// Dimension of the domain feature the node lies on
    /// (0 corner, 1 ridge, 2 surface, 3 interior, 4 super-simplex).
    pub fdim: u8,
    pub feat: Feat,
    /// Expected restricted-edge count at this node (topology target).
    pub topo: u8,
    /// Cached spacing-function location hint.
    pub idxh: Hint,
    pub alive: bool,
}

/// Delaunay cell with positive orientation; `neigh[i]` lies across the
/// face opposite `nodes[i]`.
#[derive(Clone, Copy, Debug)]
pub struct Tet3 {
    pub nodes: [u32; 4],
    pub neigh: [u32; 4],
    /// Cached circumball, written once at creation.
    pub circ: Vector3<f64>,
    pub rsq: f64,
    pub alive: bool,
}

impl Tet3 {
    /// Nodes of the face opposite local vertex `f`, outward-oriented.
    #[inline]
    pub fn face(&self, f: usize) -> [u32; 3] {
        let [i, j, k] = FACES_3[f];
        [self.nodes[i], self.nodes[j], self.nodes[k]]
    }

    /// Nodes of local edge `e`.
    #[inline]
    pub fn edge(&self, e: usize) -> (u32, u32) {
        let [i, j] = EDGES_3[e];
        (self.nodes[i], self.nodes[j])
    }
}

/// Outcome of one insertion; see `tri2::Cavity2`.
#[derive(Clone, Debug, Default)]
pub struct Cavity3 {
    pub node: u32,
    pub tnew: Vec<u32>,
    pub told: Vec<u32>,
}

/// Incremental 3D Delaunay triangulation over an arena.
#[derive(Clone, Debug, Default)]
pub struct Del3 {
    nodes: Vec<Node3>,
    tets: Vec<Tet3>,
    free: Vec<u32>,
    hint: u32,
}

impl Del3 {
    /// Seed with a regular super-tetrahedron whose insphere contains the
    /// box `[pmin, pmax]`. Must be called exactly once, first.
    pub fn push_root(&mut self, pmin: Vector3<f64>, pmax: Vector3<f64>) {
        debug_assert!(self.nodes.is_empty());
        let mid = (pmin + pmax) * 0.5;
        let r = 4.0 * (pmax - pmin).norm().max(1.0);
        let k = r / 3f64.sqrt();
        let verts = [
            mid + Vector3::new(k, k, k),
            mid + Vector3::new(k, -k, -k),
            mid + Vector3::new(-k, -k, k),
            mid + Vector3::new(-k, k, -k),
        ];
        debug_assert!(orient_3d(verts[0], verts[1], verts[2], verts[3]) > 0.0);
        for v in verts {
            self.nodes.push(Node3 {
                pos: v,
                fdim: 0,
                feat: Feat::None,
                topo: 0,
                idxh: Hint::NULL,
                alive: true,
            });
        }
        let (circ, rsq) = circ_ball_3d(verts[0], verts[1], verts[2], verts[3])
            .expect("super-tetrahedron is non-degenerate");
        self.tets.push(Tet3 {
            nodes: [0, 1, 2, 3],
            neigh: [NIL; 4],
            circ,
            rsq,
            alive: true,
        });
        self.hint = 0;
    }

    #[inline]
    pub fn node(&self, n: u32) -> &Node3 {
        &self.nodes[n as usize]
    }

    #[inline]
    pub fn node_mut(&mut self, n: u32) -> &mut Node3 {
        &mut self.nodes[n as usize]
    }

    #[inline]
    pub fn tet(&self, t: u32) -> &Tet3 {
        &self.tets[t as usize]
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn n_tets(&self) -> usize {
        self.tets.len()
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.alive)
            .map(|(i, _)| i as u32)
    }

    pub fn live_tets(&self) -> impl Iterator<Item = u32> + '_ {
        self.tets
            .iter()
            .enumerate()
            .filter(|(_, t)| t.alive)
            .map(|(i, _)| i as u32)
    }

    /// Return dead cells to the free list. The caller must have scrubbed
    /// any face records referring to them first.
    pub fn recycle(&mut self, told: &[u32]) {
        for &t in told {
            debug_assert!(!self.tets[t as usize].alive);
            self.free.push(t);
        }
    }

    /// Recompute the cached circumball of every live cell from its sorted
    /// node tuple.
    pub fn reseed_circumballs(&mut self) {
        for t in 0..self.tets.len() {
            if !self.tets[t].alive {
                continue;
            }
            let mut nod = self.tets[t].nodes;
            nod.sort_unstable();
            let p: [Vector3<f64>; 4] = [
                self.nodes[nod[0] as usize].pos,
                self.nodes[nod[1] as usize].pos,
                self.nodes[nod[2] as usize].pos,
                self.nodes[nod[3] as usize].pos,
            ];
            if let Some((circ, rsq)) = circ_ball_3d(p[0], p[1], p[2], p[3]) {
                self.tets[t].circ = circ;
                self.tets[t].rsq = rsq;
            }
        }
    }

    /// The ring of cells around the edge `(a, b)` starting from `t0`,
    /// in pivot order. `None` when the ring is open (reaches the hull) or
    /// degenerate; the dual Voronoi polygon is then unbounded.
    pub fn edge_ring(&self, t0: u32, a: u32, b: u32) -> Option<SmallVec<[u32; 16]>> {
        let mut ring: SmallVec<[u32; 16]> = SmallVec::new();
        let mut prev = NIL;
        let mut cur = t0;
        for _ in 0..128 {
            ring.push(cur);
            let t = &self.tets[cur as usize];
            let mut cand: SmallVec<[u32; 2]> = SmallVec::new();
            for (i, &n) in t.nodes.iter().enumerate() {
                if n != a && n != b {
                    cand.push(t.neigh[i]);
                }
            }
            debug_assert_eq!(cand.len(), 2);
            let next = if cand[0] != prev {
                cand[0]
            } else {
                cand[1]
            };
            if next == NIL {
                return None;
            }
            if next == t0 {
                return Some(ring);
            }
            prev = cur;
            cur = next;
        }
        None
    }

    fn locate(&self, p: Vector3<f64>) -> Option<u32> {
        let mut cur =
            if (self.hint as usize) < self.tets.len() && self.tets[self.hint as usize].alive {
                self.hint
            } else {
                self.live_tets().next()?
            };
        let max_steps = 4 * self.tets.len() + 64;
        'walk: for _ in 0..max_steps {
            let t = &self.tets[cur as usize];
            for f in 0..4 {
                let [a, b, c] = t.face(f);
                let (pa, pb, pc) = (
                    self.nodes[a as usize].pos,
                    self.nodes[b as usize].pos,
                    self.nodes[c as usize].pos,
                );
                if orient_3d(pa, pb, pc, p) > orient_eps_3d(pa, pb, pc, p) {
                    let nb = t.neigh[f];
                    if nb == NIL {
                        return None;
                    }
                    cur = nb;
                    continue 'walk;
                }
            }
            return Some(cur);
        }
        self.live_tets().find(|&t| self.contains(t, p))
    }

    fn contains(&self, t: u32, p: Vector3<f64>) -> bool {
        let tt = &self.tets[t as usize];
        (0..4).all(|f| {
            let [a, b, c] = tt.face(f);
            let (pa, pb, pc) = (
                self.nodes[a as usize].pos,
                self.nodes[b as usize].pos,
                self.nodes[c as usize].pos,
            );
            orient_3d(pa, pb, pc, p) <= orient_eps_3d(pa, pb, pc, p)
        })
    }

    #[inline]
    fn in_ball(&self, t: u32, p: Vector3<f64>) -> bool {
        let tt = &self.tets[t as usize];
        (p - tt.circ).norm_squared() < tt.rsq - PRED_EPS * (1.0 + tt.rsq)
    }

    /// Insert `p`; see `tri2::Del2::push_node` for the contract.
    pub fn push_node(&mut self, p: Vector3<f64>, out: &mut Cavity3) -> Option<u32> {
        out.tnew.clear();
        out.told.clear();
        out.node = NIL;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return None;
        }
        let t0 = self.locate(p)?;
        for &n in &self.tets[t0 as usize].nodes {
            if (self.nodes[n as usize].pos - p).norm_squared() < DUPL_TOL * DUPL_TOL {
                return None;
            }
        }

        let mut cavity: SmallVec<[u32; 32]> = SmallVec::new();
        let mut seen: FxHashSet<u32> = FxHashSet::default();
        let mut stack: SmallVec<[u32; 32]> = SmallVec::new();
        cavity.push(t0);
        seen.insert(t0);
        stack.push(t0);
        while let Some(t) = stack.pop() {
            for f in 0..4 {
                let nb = self.tets[t as usize].neigh[f];
                if nb == NIL || seen.contains(&nb) {
                    continue;
                }
                if self.in_ball(nb, p) {
                    seen.insert(nb);
                    cavity.push(nb);
                    stack.push(nb);
                }
            }
        }

        // Boundary shell; every face must be visible from p.
        let mut bnd: SmallVec<[([u32; 3], u32, u32); 32]> = SmallVec::new();
        for &t in &cavity {
            for f in 0..4 {
                let nb = self.tets[t as usize].neigh[f];
                if nb != NIL && seen.contains(&nb) {
                    continue;
                }
                let fac = self.tets[t as usize].face(f);
                let (pa, pb, pc) = (
                    self.nodes[fac[0] as usize].pos,
                    self.nodes[fac[1] as usize].pos,
                    self.nodes[fac[2] as usize].pos,
                );
                if orient_3d(pa, pb, pc, p) >= -orient_eps_3d(pa, pb, pc, p) {
                    return None;
                }
                bnd.push((fac, nb, t));
            }
        }
        if bnd.is_empty() {
            return None;
        }

        let v = self.nodes.len() as u32;
        self.nodes.push(Node3 {
            pos: p,
            fdim: 3,
            feat: Feat::None,
            topo: 2,
            idxh: Hint::NULL,
            alive: true,
        });
        for &t in &cavity {
            self.tets[t as usize].alive = false;
            out.told.push(t);
        }
        // Fan tets [a, c, b, v] (re-orient the outward shell face toward v)
        // and a face map to stitch the shell interior.
        let mut shared: FxHashMap<[u32; 2], (u32, usize)> = FxHashMap::default();
        for &(fac, outer, dead) in &bnd {
            let nodes = [fac[0], fac[2], fac[1], v];
            let (pa, pb, pc, pd) = (
                self.nodes[nodes[0] as usize].pos,
                self.nodes[nodes[1] as usize].pos,
                self.nodes[nodes[2] as usize].pos,
                p,
            );
            let (circ, rsq) =
                circ_ball_3d(pa, pb, pc, pd).unwrap_or(((pa + pb + pc + pd) / 4.0, 0.0));
            let idx = self.alloc_tet(Tet3 {
                nodes,
                neigh: [NIL, NIL, NIL, outer],
                circ,
                rsq,
                alive: true,
            });
            if outer != NIL {
                if let Some(j) = (0..4).find(|&j| self.tets[outer as usize].neigh[j] == dead) {
                    self.tets[outer as usize].neigh[j] = idx;
                }
            }
            for f in 0..3 {
                let ff = self.tets[idx as usize].face(f);
                let mut k: SmallVec<[u32; 2]> = ff.iter().copied().filter(|&n| n != v).collect();
                k.sort_unstable();
                let kk = [k[0], k[1]];
                if let Some((other, of)) = shared.remove(&kk) {
                    self.tets[idx as usize].neigh[f] = other;
                    self.tets[other as usize].neigh[of] = idx;
                } else {
                    shared.insert(kk, (idx, f));
                }
            }
            out.tnew.push(idx);
        }
        self.hint = out.tnew[0];
        out.node = v;
        Some(v)
    }

    fn alloc_tet(&mut self, t: Tet3) -> u32 {
        if let Some(idx) = self.free.pop() {
            self.tets[idx as usize] = t;
            idx
        } else {
            self.tets.push(t);
            (self.tets.len() - 1) as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn boxed() -> Del3 {
        let mut dt = Del3::default();
        dt.push_root(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        dt
    }

    fn insert(dt: &mut Del3, x: f64, y: f64, z: f64) -> Option<u32> {
        let mut cav = Cavity3::default();
        let n = dt.push_node(Vector3::new(x, y, z), &mut cav)?;
        dt.recycle(&cav.told);
        Some(n)
    }

    #[test]
    fn single_insertion_makes_a_shell() {
        let mut dt = boxed();
        let mut cav = Cavity3::default();
        let v = dt.push_node(Vector3::new(0.5, 0.5, 0.5), &mut cav).unwrap();
        assert_eq!(cav.told.len(), 1);
        assert_eq!(cav.tnew.len(), 4);
        for &t in &cav.tnew {
            assert!(dt.tet(t).nodes.contains(&v));
        }
    }

    #[test]
    fn duplicate_points_are_rejected() {
        let mut dt = boxed();
        insert(&mut dt, 0.5, 0.5, 0.5).unwrap();
        assert!(insert(&mut dt, 0.5, 0.5, 0.5).is_none());
    }

    #[test]
    fn neighbours_stay_mutual_and_oriented() {
        let mut dt = boxed();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            insert(&mut dt, rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>());
        }
        for t in dt.live_tets() {
            let tt = dt.tet(t);
            let o = orient_3d(
                dt.node(tt.nodes[0]).pos,
                dt.node(tt.nodes[1]).pos,
                dt.node(tt.nodes[2]).pos,
                dt.node(tt.nodes[3]).pos,
            );
            assert!(o > 0.0, "tet {t} inverted (orient {o})");
            for f in 0..4 {
                let nb = tt.neigh[f];
                if nb == NIL {
                    continue;
                }
                assert!(dt.tet(nb).alive);
                assert!(dt.tet(nb).neigh.contains(&t));
            }
        }
    }

    #[test]
    fn delaunay_within_tolerance() {
        let mut dt = boxed();
        let mut rng = StdRng::seed_from_u64(23);
        let mut pts = Vec::new();
        for _ in 0..30 {
            let p = Vector3::new(rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>());
            if insert(&mut dt, p.x, p.y, p.z).is_some() {
                pts.push(p);
            }
        }
        for t in dt.live_tets() {
            let tt = dt.tet(t);
            for p in &pts {
                let dsq = (*p - tt.circ).norm_squared();
                assert!(dsq >= tt.rsq - 1e-6 * (1.0 + tt.rsq));
            }
        }
    }

    #[test]
    fn interior_edge_ring_closes() {
        let mut dt = boxed();
        let mut rng = StdRng::seed_from_u64(29);
        let mut mid = NIL;
        for i in 0..40 {
            let p = if i == 0 {
                Vector3::new(0.5, 0.5, 0.5)
            } else {
                Vector3::new(rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>())
            };
            if let Some(n) = insert(&mut dt, p.x, p.y, p.z) {
                if i == 0 {
                    mid = n;
                }
            }
        }
        // Any live edge out of the interior point should close its ring.
        let t0 = dt
            .live_tets()
            .find(|&t| dt.tet(t).nodes.contains(&mid))
            .unwrap();
        let other = *dt
            .tet(t0)
            .nodes
            .iter()
            .find(|&&n| n != mid && n > 3)
            .unwrap_or(&dt.tet(t0).nodes[0]);
        if other != mid {
            let ring = dt.edge_ring(t0, mid, other);
            if let Some(r) = ring {
                assert!(r.len() >= 3);
                for &t in &r {
                    let nn = dt.tet(t).nodes;
                    assert!(nn.contains(&mid) && nn.contains(&other));
                }
            }
        }
    }
}
