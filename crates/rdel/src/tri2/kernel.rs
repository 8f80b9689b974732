//! Node/tria arena and Bowyer-Watson insertion in R^2.

use nalgebra::Vector2;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::cfg::{Feat, DUPL_TOL, PRED_EPS};
use crate::hfun::Hint;

use super::predicates::{circ_ball_2d, orient_2d, orient_eps_2d};

/// Sentinel index for "no node/tria".
pub const NIL: u32 = u32::MAX;

/// Mesh vertex. Positions never move after insertion.
#[derive(Clone, Copy, Debug)]
pub struct Node2 {
    pub pos: Vector2<f64>,
    /// Dimension of the domain feature the node lies on
    /// (0 corner, 1 ridge/curve, 2 interior, 3 super-simplex).
    pub fdim: u8,
    pub feat: Feat,
    /// Expected restricted-edge count at this node (topology target).
    pub topo: u8,
    /// Cached spacing-function location hint.
    pub idxh: Hint,
    pub alive: bool,
}

/// Delaunay cell. Nodes are in CCW order; `neigh[i]` is the tria across
/// the edge opposite `nodes[i]` (`NIL` on the super-simplex hull).
#[derive(Clone, Copy, Debug)]
pub struct Tria2 {
    pub nodes: [u32; 3],
    pub neigh: [u32; 3],
    /// Cached circumball, written once at creation.
    pub circ: Vector2<f64>,
    pub rsq: f64,
    pub alive: bool,
}

impl Tria2 {
    /// Nodes of the edge opposite local vertex `e`, CCW (interior left).
    #[inline]
    pub fn edge(&self, e: usize) -> (u32, u32) {
        (self.nodes[(e + 1) % 3], self.nodes[(e + 2) % 3])
    }
}

/// Outcome of one insertion: the new node, the cells it created and the
/// cells it destroyed. Destroyed cells stay allocated (marked dead) until
/// `recycle` is called.
#[derive(Clone, Debug, Default)]
pub struct Cavity2 {
    pub node: u32,
    pub tnew: Vec<u32>,
    pub told: Vec<u32>,
}

/// Incremental 2D Delaunay triangulation over an arena.
#[derive(Clone, Debug, Default)]
pub struct Del2 {
    nodes: Vec<Node2>,
    trias: Vec<Tria2>,
    free: Vec<u32>,
    hint: u32,
}

impl Del2 {
    /// Seed the triangulation with a super-triangle enclosing the box
    /// `[pmin, pmax]`. Must be called exactly once, before any insertion.
    pub fn push_root(&mut self, pmin: Vector2<f64>, pmax: Vector2<f64>) {
        debug_assert!(self.nodes.is_empty());
        let mid = (pmin + pmax) * 0.5;
        let s = 4.0 * (pmax - pmin).amax().max(1.0);
        let verts = [
            mid + Vector2::new(-s, -s),
            mid + Vector2::new(s, -s),
            mid + Vector2::new(0.0, 1.5 * s),
        ];
        for v in verts {
            self.nodes.push(Node2 {
                pos: v,
                fdim: 0,
                feat: Feat::None,
                topo: 0,
                idxh: Hint::NULL,
                alive: true,
            });
        }
        let (circ, rsq) =
            circ_ball_2d(verts[0], verts[1], verts[2]).expect("super-triangle is non-degenerate");
        self.trias.push(Tria2 {
            nodes: [0, 1, 2],
            neigh: [NIL; 3],
            circ,
            rsq,
            alive: true,
        });
        self.hint = 0;
    }

    #[inline]
    pub fn node(&self, n: u32) -> &Node2 {
        &self.nodes[n as usize]
    }

    #[inline]
    pub fn node_mut(&mut self, n: u32) -> &mut Node2 {
        &mut self.nodes[n as usize]
    }

    #[inline]
    pub fn tria(&self, t: u32) -> &Tria2 {
        &self.trias[t as usize]
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn n_trias(&self) -> usize {
        self.trias.len()
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.alive)
            .map(|(i, _)| i as u32)
    }

    pub fn live_trias(&self) -> impl Iterator<Item = u32> + '_ {
        self.trias
            .iter()
            .enumerate()
            .filter(|(_, t)| t.alive)
            .map(|(i, _)| i as u32)
    }

    /// Return dead cells to the free list. The caller must have scrubbed
    /// any face records referring to them first.
    pub fn recycle(&mut self, told: &[u32]) {
        for &t in told {
            debug_assert!(!self.trias[t as usize].alive);
            self.free.push(t);
        }
    }

    /// Recompute the cached circumball of every live cell from its sorted
    /// node tuple, making the cache independent of creation history.
    pub fn reseed_circumballs(&mut self) {
        for t in 0..self.trias.len() {
            if !self.trias[t].alive {
                continue;
            }
            let mut nod = self.trias[t].nodes;
            nod.sort_unstable();
            let (a, b, c) = (
                self.nodes[nod[0] as usize].pos,
                self.nodes[nod[1] as usize].pos,
                self.nodes[nod[2] as usize].pos,
            );
            if let Some((circ, rsq)) = circ_ball_2d(a, b, c) {
                self.trias[t].circ = circ;
                self.trias[t].rsq = rsq;
            }
        }
    }

    /// Walk from the hint tria to one containing `p`. `None` when `p`
    /// falls outside the super-simplex or the walk degenerates.
    fn locate(&self, p: Vector2<f64>) -> Option<u32> {
        let mut cur = if (self.hint as usize) < self.trias.len()
            && self.trias[self.hint as usize].alive
        {
            self.hint
        } else {
            self.live_trias().next()?
        };
        let max_steps = 4 * self.trias.len() + 64;
        'walk: for _ in 0..max_steps {
            let t = &self.trias[cur as usize];
            for e in 0..3 {
                let (a, b) = t.edge(e);
                let (pa, pb) = (self.nodes[a as usize].pos, self.nodes[b as usize].pos);
                if orient_2d(pa, pb, p) < -orient_eps_2d(pa, pb, p) {
                    let nb = t.neigh[e];
                    if nb == NIL {
                        return None;
                    }
                    cur = nb;
                    continue 'walk;
                }
            }
            return Some(cur);
        }
        // Walk cycled on a degenerate band; fall back to an exhaustive scan.
        self.live_trias().find(|&t| self.contains(t, p))
    }

    fn contains(&self, t: u32, p: Vector2<f64>) -> bool {
        let tr = &self.trias[t as usize];
        (0..3).all(|e| {
            let (a, b) = tr.edge(e);
            let (pa, pb) = (self.nodes[a as usize].pos, self.nodes[b as usize].pos);
            orient_2d(pa, pb, p) >= -orient_eps_2d(pa, pb, p)
        })
    }

    /// Strict circumball membership used to grow cavities.
    #[inline]
    fn in_ball(&self, t: u32, p: Vector2<f64>) -> bool {
        let tr = &self.trias[t as usize];
        (p - tr.circ).norm_squared() < tr.rsq - PRED_EPS * (1.0 + tr.rsq)
    }

    /// Insert `p`; on success fills `out` with the cavity delta and
    /// returns the new node index. `None` rejects the point (duplicate,
    /// out of bounds, or degenerate cavity); the triangulation is then
    /// unchanged.
    pub fn push_node(&mut self, p: Vector2<f64>, out: &mut Cavity2) -> Option<u32> {
        out.tnew.clear();
        out.told.clear();
        out.node = NIL;
        if !(p.x.is_finite() && p.y.is_finite()) {
            return None;
        }
        let t0 = self.locate(p)?;
        for &n in &self.trias[t0 as usize].nodes {
            if (self.nodes[n as usize].pos - p).norm_squared() < DUPL_TOL * DUPL_TOL {
                return None;
            }
        }

        // Cavity: BFS over circumball-violating neighbours of t0.
        let mut cavity: SmallVec<[u32; 16]> = SmallVec::new();
        let mut seen: FxHashSet<u32> = FxHashSet::default();
        let mut stack: SmallVec<[u32; 16]> = SmallVec::new();
        cavity.push(t0);
        seen.insert(t0);
        stack.push(t0);
        while let Some(t) = stack.pop() {
            for e in 0..3 {
                let nb = self.trias[t as usize].neigh[e];
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

        // Boundary edges (CCW as seen from the cavity interior).
        let mut bnd: SmallVec<[(u32, u32, u32, u32); 16]> = SmallVec::new();
        for &t in &cavity {
            for e in 0..3 {
                let nb = self.trias[t as usize].neigh[e];
                if nb != NIL && seen.contains(&nb) {
                    continue;
                }
                let (a, b) = self.trias[t as usize].edge(e);
                let (pa, pb) = (self.nodes[a as usize].pos, self.nodes[b as usize].pos);
                // The new fan tria must keep positive orientation.
                if orient_2d(pa, pb, p) <= orient_eps_2d(pa, pb, p) {
                    return None;
                }
                bnd.push((a, b, nb, t));
            }
        }
        if bnd.is_empty() {
            return None;
        }

        // Commit: new node, dead cavity, fan retriangulation.
        let v = self.nodes.len() as u32;
        self.nodes.push(Node2 {
            pos: p,
            fdim: 2,
            feat: Feat::None,
            topo: 2,
            idxh: Hint::NULL,
            alive: true,
        });
        for &t in &cavity {
            self.trias[t as usize].alive = false;
            out.told.push(t);
        }
        let mut by_first: FxHashMap<u32, u32> = FxHashMap::default();
        let mut by_second: FxHashMap<u32, u32> = FxHashMap::default();
        for &(a, b, outer, dead) in &bnd {
            let (pa, pb) = (self.nodes[a as usize].pos, self.nodes[b as usize].pos);
            let (circ, rsq) = circ_ball_2d(pa, pb, p).unwrap_or(((pa + pb + p) / 3.0, 0.0));
            let idx = self.alloc_tria(Tria2 {
                nodes: [a, b, v],
                neigh: [NIL, NIL, outer],
                circ,
                rsq,
                alive: true,
            });
            if outer != NIL {
                // Re-aim the slot that pointed at the dead tria we crossed.
                if let Some(j) = (0..3).find(|&j| self.trias[outer as usize].neigh[j] == dead) {
                    self.trias[outer as usize].neigh[j] = idx;
                }
            }
            by_first.insert(a, idx);
            by_second.insert(b, idx);
            out.tnew.push(idx);
        }
        for &idx in &out.tnew {
            let [a, b, _] = self.trias[idx as usize].nodes;
            let across_bv = by_first.get(&b).copied().unwrap_or(NIL);
            let across_va = by_second.get(&a).copied().unwrap_or(NIL);
            self.trias[idx as usize].neigh[0] = across_bv;
            self.trias[idx as usize].neigh[1] = across_va;
        }
        self.hint = out.tnew[0];
        out.node = v;
        Some(v)
    }

    fn alloc_tria(&mut self, t: Tria2) -> u32 {
        if let Some(idx) = self.free.pop() {
            self.trias[idx as usize] = t;
            idx
        } else {
            self.trias.push(t);
            (self.trias.len() - 1) as u32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn boxed() -> Del2 {
        let mut dt = Del2::default();
        dt.push_root(Vector2::new(0.0, 0.0), Vector2::new(1.0, 1.0));
        dt
    }

    fn insert(dt: &mut Del2, x: f64, y: f64) -> Option<u32> {
        let mut cav = Cavity2::default();
        let n = dt.push_node(Vector2::new(x, y), &mut cav)?;
        dt.recycle(&cav.told);
        Some(n)
    }

    #[test]
    fn single_insertion_makes_a_fan() {
        let mut dt = boxed();
        let mut cav = Cavity2::default();
        let v = dt.push_node(Vector2::new(0.5, 0.5), &mut cav).unwrap();
        assert_eq!(cav.told.len(), 1);
        assert_eq!(cav.tnew.len(), 3);
        for &t in &cav.tnew {
            assert!(dt.tria(t).alive);
            assert!(dt.tria(t).nodes.contains(&v));
        }
        assert_eq!(dt.live_trias().count(), 3);
    }

    #[test]
    fn duplicate_points_are_rejected() {
        let mut dt = boxed();
        insert(&mut dt, 0.5, 0.5).unwrap();
        assert!(insert(&mut dt, 0.5, 0.5).is_none());
        assert!(insert(&mut dt, 0.5 + 1e-14, 0.5).is_none());
    }

    #[test]
    fn neighbours_stay_mutual() {
        let mut dt = boxed();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..60 {
            insert(&mut dt, rng.gen::<f64>(), rng.gen::<f64>());
        }
        for t in dt.live_trias() {
            for e in 0..3 {
                let nb = dt.tria(t).neigh[e];
                if nb == NIL {
                    continue;
                }
                assert!(dt.tria(nb).alive);
                assert!(
                    dt.tria(nb).neigh.contains(&t),
                    "neighbour link {t}<->{nb} is one-sided"
                );
            }
        }
    }

    #[test]
    fn triangles_keep_positive_orientation() {
        let mut dt = boxed();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..80 {
            insert(&mut dt, rng.gen::<f64>(), rng.gen::<f64>());
        }
        for t in dt.live_trias() {
            let [a, b, c] = dt.tria(t).nodes;
            let o = orient_2d(
                dt.node(a).pos,
                dt.node(b).pos,
                dt.node(c).pos,
            );
            assert!(o > 0.0, "tria {t} inverted (orient {o})");
        }
    }

    #[test]
    fn delaunay_within_tolerance() {
        let mut dt = boxed();
        let mut rng = StdRng::seed_from_u64(19);
        let mut pts = Vec::new();
        for _ in 0..40 {
            let p = Vector2::new(rng.gen::<f64>(), rng.gen::<f64>());
            if insert(&mut dt, p.x, p.y).is_some() {
                pts.push(p);
            }
        }
        for t in dt.live_trias() {
            let tr = dt.tria(t);
            for p in &pts {
                let dsq = (*p - tr.circ).norm_squared();
                assert!(
                    dsq >= tr.rsq - 1e-7 * (1.0 + tr.rsq),
                    "point {p:?} strictly inside circumball of {t}"
                );
            }
        }
    }

    #[test]
    fn out_of_bounds_points_are_rejected() {
        let mut dt = boxed();
        assert!(insert(&mut dt, 1e9, 1e9).is_none());
        assert!(insert(&mut dt, f64::NAN, 0.0).is_none());
    }
}
