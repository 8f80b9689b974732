//! Driver state machine for restricted Delaunay meshing in R^2.
//!
//! Phases run Null -> Node -> Edge -> Etop -> Tria. Each phase entry
//! re-derives the restricted face set for the new dimension over the whole
//! triangulation; each refinement iteration pops the highest-priority
//! fresh entry from the first non-empty queue (balls, edges, topology,
//! cells), inserts one Steiner point, and re-derives the records around
//! its cavity. The loop ends when every queue is empty or the iteration
//! budget is exhausted.

use log::{debug, trace};
use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashSet;

use crate::brio::brio_order;
use crate::cfg::{Feat, Mode, PointKind, RdelOpts, SUPER_FDIM_2};
use crate::geom2::{FeatPoint2, Geom2};
use crate::heap::{trim_vec, BallCost, CostHeap, EtopCost};
use crate::hfun::{Hfun, Hint, Uniform};
use crate::index::key;
use crate::stats::RdelStats;
use crate::tri2::Cavity2;

use super::cavity::{push_rdel, Bufs2};
use super::rules::{RuleSet2, StdRules2};
use super::types::{EdgeCost2, RdelMesh2, TriaCost2};

/// One-shot restricted construction (no refinement) up to `opts.dims`.
pub fn rdel_make_2d<G: Geom2>(
    geom: &G,
    init: &[Vector2<f64>],
    opts: &RdelOpts,
) -> (RdelMesh2, RdelStats) {
    let hfun = Uniform(f64::INFINITY);
    let rules = StdRules2::from_opts(opts);
    let mut drv = Driver2::new(geom, &hfun, &rules, *opts);
    drv.init_mesh(init);
    drv.make();
    drv.finish()
}

/// Full restricted construction plus refinement with the standard rules.
pub fn rdel_mesh_2d<G: Geom2, H: Hfun<Vector2<f64>>>(
    geom: &G,
    init: &[Vector2<f64>],
    hfun: &H,
    opts: &RdelOpts,
) -> (RdelMesh2, RdelStats) {
    let rules = StdRules2::from_opts(opts);
    rdel_mesh_2d_with(geom, init, hfun, &rules, opts)
}

/// Full construction/refinement with an injected rule policy.
pub fn rdel_mesh_2d_with<G: Geom2, H: Hfun<Vector2<f64>>, R: RuleSet2>(
    geom: &G,
    init: &[Vector2<f64>],
    hfun: &H,
    rules: &R,
    opts: &RdelOpts,
) -> (RdelMesh2, RdelStats) {
    let mut drv = Driver2::new(geom, hfun, rules, *opts);
    drv.init_mesh(init);
    drv.run();
    drv.finish()
}

struct Driver2<'a, G, H, R> {
    geom: &'a G,
    hfun: &'a H,
    rules: &'a R,
    opts: RdelOpts,
    mesh: RdelMesh2,
    nbpq: CostHeap<BallCost>,
    eepq: CostHeap<EdgeCost2>,
    etpq: CostHeap<EtopCost>,
    ttpq: CostHeap<TriaCost2>,
    bufs: Bufs2,
    cav: Cavity2,
    /// Restricted-edge valence per node (topology checks).
    einc: Vec<u32>,
    /// Nodes currently queued in `etpq`.
    emrk: FxHashSet<u32>,
    mode: Mode,
    pass: u32,
    stats: RdelStats,
    rng: StdRng,
}

impl<'a, G: Geom2, H: Hfun<Vector2<f64>>, R: RuleSet2> Driver2<'a, G, H, R> {
    fn new(geom: &'a G, hfun: &'a H, rules: &'a R, opts: RdelOpts) -> Self {
        Self {
            geom,
            hfun,
            rules,
            opts,
            mesh: RdelMesh2::default(),
            nbpq: CostHeap::default(),
            eepq: CostHeap::default(),
            etpq: CostHeap::default(),
            ttpq: CostHeap::default(),
            bufs: Bufs2::default(),
            cav: Cavity2::default(),
            einc: Vec::new(),
            emrk: FxHashSet::default(),
            mode: Mode::Null,
            pass: 0,
            stats: RdelStats::default(),
            rng: StdRng::seed_from_u64(opts.seed),
        }
    }

    /// Super-simplex, feature seeds, BRIO-ordered initial points.
    fn init_mesh(&mut self, init: &[Vector2<f64>]) {
        let (mut lo, mut hi) = self.geom.bbox();
        for p in init {
            lo = lo.inf(p);
            hi = hi.sup(p);
        }
        let len = (hi - lo) * 2.0;
        self.mesh.dt.push_root(lo - len, hi + len);
        for n in 0..3 {
            let node = self.mesh.dt.node_mut(n);
            node.fdim = SUPER_FDIM_2;
            node.feat = Feat::None;
            node.topo = 0;
        }

        let mut feat: Vec<FeatPoint2> = Vec::new();
        self.geom.seed_feat(&mut feat);
        for f in &feat {
            self.seed_point(f.pos, f.fdim, f.feat, f.topo);
        }

        // BRIO order, starting from the point closest to the centroid.
        if !init.is_empty() {
            let order = brio_order(init, &mut self.rng);
            let mut mid = Vector2::zeros();
            for &i in &order {
                mid += init[i as usize];
            }
            mid /= order.len() as f64;
            let first = *order
                .iter()
                .min_by(|&&a, &&b| {
                    let da = (init[a as usize] - mid).norm_squared();
                    let db = (init[b as usize] - mid).norm_squared();
                    da.partial_cmp(&db)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.cmp(&b))
                })
                .unwrap_or(&order[0]);
            self.seed_point(init[first as usize], 2, Feat::None, 2);
            for &i in &order {
                if i != first {
                    self.seed_point(init[i as usize], 2, Feat::None, 2);
                }
            }
        }

        let mut extra: Vec<FeatPoint2> = Vec::new();
        self.geom.seed_mesh(&mut extra);
        for f in &extra {
            self.seed_point(f.pos, f.fdim, f.feat, f.topo);
        }

        // Reset spacing hints on everything that survived seeding.
        for n in 0..self.mesh.dt.n_nodes() {
            self.mesh.dt.node_mut(n as u32).idxh = Hint::NULL;
        }
        debug!(
            "2d init: {} nodes seeded ({} feature)",
            self.mesh.dt.live_nodes().count(),
            feat.len()
        );
    }

    fn seed_point(&mut self, p: Vector2<f64>, fdim: u8, feat: Feat, topo: u8) {
        if let Some(v) = self.mesh.dt.push_node(p, &mut self.cav) {
            let node = self.mesh.dt.node_mut(v);
            node.fdim = fdim;
            node.feat = feat;
            node.topo = topo;
            let told = std::mem::take(&mut self.cav.told);
            self.mesh.dt.recycle(&told);
            self.cav.told = told;
        }
    }

    /// One-shot restricted construction: a single full-face-set pass.
    fn make(&mut self) {
        self.bufs.clear();
        self.init_rdel(0, self.opts.dims.min(2));
        self.merge(false);
        self.mode = Mode::Tria;
        self.stats.converged = true;
    }

    /// The refinement loop.
    fn run(&mut self) {
        self.stats.converged = false;
        loop {
            self.pass += 1;
            if self.pass > self.opts.iter {
                debug!("2d mesh: iteration budget {} exhausted", self.opts.iter);
                break;
            }
            self.bufs.clear();
            let mut irdt = false;

            if self.mode == Mode::Null {
                self.mode = Mode::Node;
                irdt = true;
                self.init_rdel(0, 0);
                debug!("2d mesh: node phase ({} balls)", self.bufs.bdat.len());
            }
            if self.mode == Mode::Node && self.nbpq.is_empty() && self.bufs.bdat.is_empty() {
                self.mode = Mode::Edge;
                irdt = true;
                if self.opts.dims >= 1 {
                    self.init_rdel(1, 1);
                }
                debug!("2d mesh: edge phase ({} edges)", self.bufs.edat.len());
            }
            if self.mode == Mode::Edge && self.eepq.is_empty() && self.bufs.edat.is_empty() {
                self.mode = Mode::Etop;
            }
            if self.mode == Mode::Etop && self.etpq.is_empty() && self.bufs.edat.is_empty() {
                self.mode = Mode::Tria;
                irdt = true;
                if self.opts.dims >= 2 {
                    self.init_rdel(2, 2);
                }
                debug!("2d mesh: tria phase ({} cells)", self.bufs.tdat.len());
            }

            let mut done = false;
            if !irdt {
                let worked = if !self.nbpq.is_empty() {
                    self.refine_ball()
                } else if !self.eepq.is_empty() {
                    self.refine_edge()
                } else if !self.etpq.is_empty() {
                    self.refine_etop()
                } else if !self.ttpq.is_empty() {
                    self.refine_tria()
                } else {
                    done = true;
                    None
                };
                if let Some((kind, tdim)) = worked {
                    self.stats.count(kind, tdim);
                }
                if self.pass % 50_000 == 0 {
                    trace!(
                        "2d mesh: pass {} |edges| {} |cells| {}",
                        self.pass,
                        self.mesh.edges.len(),
                        self.mesh.trias.len()
                    );
                }
            }

            self.fill_topo();
            self.merge(true);

            if self.pass % self.opts.trim_freq == 0 {
                self.trim();
            }
            if done {
                self.stats.converged = true;
                break;
            }
        }
    }

    fn finish(mut self) -> (RdelMesh2, RdelStats) {
        self.stats.passes = self.pass;
        self.stats.n_ball = self.mesh.balls.len();
        self.stats.n_edge = self.mesh.edges.len();
        self.stats.n_cell = self.mesh.trias.len();
        if self.opts.verb >= 1 {
            debug!(
                "2d mesh: done after {} passes: |rDEL-0| {} |rDEL-1| {} |rDEL-2| {} ({} steiner)",
                self.stats.passes,
                self.stats.n_ball,
                self.stats.n_edge,
                self.stats.n_cell,
                self.stats.steiner_total()
            );
        }
        if self.opts.verb >= 2 {
            let e = &self.stats.steiner_edge;
            let t = &self.stats.steiner_cell;
            debug!(
                "2d mesh: edge steiner circ {} offh {} disk {}; cell steiner circ {} offh {} \
                 sink {}",
                e[PointKind::Circ.slot()],
                e[PointKind::Offh.slot()],
                e[PointKind::Disk.slot()],
                t[PointKind::Circ.slot()],
                t[PointKind::Offh.slot()],
                t[PointKind::Sink.slot()],
            );
        }
        (self.mesh, self.stats)
    }

    /// Dimension cap of the faces rebuilt after an insertion.
    fn dim_cap(&self) -> u8 {
        let d = match self.mode {
            Mode::Null | Mode::Node => 0,
            Mode::Edge | Mode::Etop => 1,
            Mode::Tria => 2,
        };
        d.min(self.opts.dims)
    }

    /// Re-derive the restricted face set of dimensions `dlo..=dhi` over
    /// the whole triangulation (phase entry).
    fn init_rdel(&mut self, dlo: u8, dhi: u8) {
        let tnew: Vec<u32> = self.mesh.dt.live_trias().collect();
        let nnew: Vec<u32> = self.mesh.dt.live_nodes().collect();
        push_rdel(
            self.geom,
            &self.mesh.dt,
            &tnew,
            &nnew,
            self.pass,
            dlo,
            dhi,
            &mut self.bufs,
        );
    }

    fn eval_h(&mut self, at: Vector2<f64>, hint_node: u32) -> f64 {
        let hint = self.mesh.dt.node(hint_node).idxh;
        let (h, nh) = self.hfun.eval(at, hint);
        self.mesh.dt.node_mut(hint_node).idxh = nh;
        h
    }

    /// Insert a Steiner point and resynchronise index + buffers around its
    /// cavity. `None` when the kernel rejects the point; the popped bad
    /// face is then dropped without retry.
    fn insert_steiner(
        &mut self,
        p: Vector2<f64>,
        fdim: u8,
        kind: PointKind,
        tdim: u8,
    ) -> Option<(PointKind, u8)> {
        let v = self.mesh.dt.push_node(p, &mut self.cav)?;
        {
            let node = self.mesh.dt.node_mut(v);
            node.fdim = fdim;
            node.feat = Feat::None;
            node.topo = 2;
        }
        let told = std::mem::take(&mut self.cav.told);
        let tnew = std::mem::take(&mut self.cav.tnew);
        self.scrub(&told);
        push_rdel(
            self.geom,
            &self.mesh.dt,
            &tnew,
            &[v],
            self.pass,
            0,
            self.dim_cap(),
            &mut self.bufs,
        );
        self.mesh.dt.recycle(&told);
        self.cav.told = told;
        self.cav.tnew = tnew;
        Some((kind, tdim))
    }

    /// Drop the face records of destroyed cells from the global index.
    fn scrub(&mut self, told: &[u32]) {
        for &t in told {
            let tria = *self.mesh.dt.tria(t);
            for e in 0..3 {
                let (a, b) = tria.edge(e);
                let k = key([a, b]);
                if self.mesh.edges.remove(&k).is_some() {
                    self.bump_einc(k, -1);
                    self.bufs.eold.push(k);
                }
            }
            self.mesh.trias.remove(&key(tria.nodes));
        }
    }

    fn bump_einc(&mut self, k: [u32; 2], delta: i32) {
        let need = self.mesh.dt.n_nodes();
        if self.einc.len() < need {
            self.einc.resize(need, 0);
        }
        for n in k {
            let slot = &mut self.einc[n as usize];
            *slot = slot.saturating_add_signed(delta);
        }
    }

    /// Queue topology checks for nodes whose restricted star changed.
    fn fill_topo(&mut self) {
        if !self.opts.top1 || self.opts.dims < 1 {
            return;
        }
        let mut cand: Vec<u32> = Vec::new();
        for d in &self.bufs.edat {
            cand.extend_from_slice(&d.key);
        }
        for k in &self.bufs.eold {
            cand.extend_from_slice(k);
        }
        for n in cand {
            let node = self.mesh.dt.node(n);
            if !node.alive || node.fdim > 1 {
                continue;
            }
            if self.emrk.insert(n) {
                self.etpq.push(EtopCost {
                    node: n,
                    pass: self.pass,
                });
            }
        }
    }

    /// Merge cavity buffers into the global index (and heaps when
    /// `score`).
    fn merge(&mut self, score: bool) {
        let bdat = std::mem::take(&mut self.bufs.bdat);
        for b in &bdat {
            if self.mesh.balls.contains_key(&b.node) {
                continue;
            }
            self.mesh.balls.insert(b.node, *b);
            if score {
                let h = self.eval_h(b.center, b.node);
                if self.rules.ball_cost(b.rsq, h).is_some() {
                    self.nbpq.push(BallCost {
                        node: b.node,
                        pass: b.pass,
                        rsq: b.rsq,
                    });
                }
            }
        }
        self.bufs.bdat = bdat;

        let edat = std::mem::take(&mut self.bufs.edat);
        for d in &edat {
            if !self.mesh.edges.insert(d.key, *d) {
                continue;
            }
            self.bump_einc(d.key, 1);
            if score {
                let h = self.eval_h(d.center, d.key[0]);
                if let Some(cost) = self.rules.edge_cost(d.rsq, h) {
                    self.eepq.push(EdgeCost2 {
                        key: d.key,
                        pass: d.pass,
                        cost,
                    });
                }
            }
        }
        self.bufs.edat = edat;

        let tdat = std::mem::take(&mut self.bufs.tdat);
        for d in &tdat {
            if !self.mesh.trias.insert(d.key, *d) {
                continue;
            }
            if score {
                let tria = *self.mesh.dt.tria(d.tadj);
                let (lmin, _) = self.shortest_edge(&tria);
                let h = self.eval_h(tria.circ, d.key[0]);
                if let Some(cost) = self.rules.tria_cost(tria.rsq, lmin, h) {
                    self.ttpq.push(TriaCost2 {
                        key: d.key,
                        pass: d.pass,
                        cost,
                    });
                }
            }
        }
        self.bufs.tdat = tdat;
    }

    fn shortest_edge(&self, tria: &crate::tri2::Tria2) -> (f64, Vector2<f64>) {
        let mut lmin = f64::INFINITY;
        let mut emid = Vector2::zeros();
        for e in 0..3 {
            let (a, b) = tria.edge(e);
            let (pa, pb) = (self.mesh.dt.node(a).pos, self.mesh.dt.node(b).pos);
            let l = (pb - pa).norm();
            if l < lmin {
                lmin = l;
                emid = (pa + pb) * 0.5;
            }
        }
        (lmin, emid)
    }

    fn refine_ball(&mut self) -> Option<(PointKind, u8)> {
        loop {
            let top = self.nbpq.pop()?;
            let Some(ball) = self.mesh.balls.get(&top.node).copied() else {
                continue;
            };
            if ball.pass != top.pass {
                continue;
            }
            let h = self.eval_h(ball.center, ball.node);
            if self.rules.ball_cost(ball.rsq, h).is_none() {
                continue;
            }
            return self.insert_steiner(ball.center, 1, PointKind::Disk, 1);
        }
    }

    fn refine_edge(&mut self) -> Option<(PointKind, u8)> {
        loop {
            let top = self.eepq.pop()?;
            let Some(dat) = self.mesh.edges.find(&top.key).copied() else {
                continue;
            };
            if dat.pass != top.pass {
                continue;
            }
            let pa = self.mesh.dt.node(dat.key[0]).pos;
            let pb = self.mesh.dt.node(dat.key[1]).pos;
            let h = self.eval_h(dat.center, dat.key[0]);
            let (pt, kind) = self.rules.edge_point(pa, pb, dat.center, h);
            return self.insert_steiner(pt, 1, kind, 1);
        }
    }

    fn refine_etop(&mut self) -> Option<(PointKind, u8)> {
        loop {
            let top = self.etpq.pop()?;
            self.emrk.remove(&top.node);
            let node = *self.mesh.dt.node(top.node);
            if !node.alive || node.fdim > 1 {
                continue;
            }
            let have = self.einc.get(top.node as usize).copied().unwrap_or(0);
            if have == 0 || have == node.topo as u32 {
                continue;
            }
            // Split the widest incident restricted edge at its ball centre.
            let mut best: Option<([u32; 2], f64, Vector2<f64>)> = None;
            for (k, d) in self.mesh.edges.iter() {
                if k[0] != top.node && k[1] != top.node {
                    continue;
                }
                let better = match &best {
                    None => true,
                    Some((bk, brsq, _)) => d.rsq > *brsq || (d.rsq == *brsq && *k < *bk),
                };
                if better {
                    best = Some((*k, d.rsq, d.center));
                }
            }
            let Some((_, _, center)) = best else {
                continue;
            };
            return self.insert_steiner(center, 1, PointKind::Disk, 1);
        }
    }

    fn refine_tria(&mut self) -> Option<(PointKind, u8)> {
        loop {
            let top = self.ttpq.pop()?;
            let Some(dat) = self.mesh.trias.find(&top.key).copied() else {
                continue;
            };
            if dat.pass != top.pass {
                continue;
            }
            let tria = *self.mesh.dt.tria(dat.tadj);
            let (lmin, emid) = self.shortest_edge(&tria);
            let h = self.eval_h(tria.circ, top.key[0]);
            let (mut pt, mut kind) = self.rules.tria_point(tria.circ, emid, lmin, h);
            if self.geom.tria_ball(pt, dat.part).is_none() {
                let (pa, pb, pc) = (
                    self.mesh.dt.node(tria.nodes[0]).pos,
                    self.mesh.dt.node(tria.nodes[1]).pos,
                    self.mesh.dt.node(tria.nodes[2]).pos,
                );
                pt = (pa + pb + pc) / 3.0;
                kind = PointKind::Sink;
            }
            return self.insert_steiner(pt, 2, kind, 2);
        }
    }

    /// Periodic lazy-heap compaction and scratch shrink.
    fn trim(&mut self) {
        let edges = &self.mesh.edges;
        self.eepq
            .trim(|e| edges.find(&e.key).is_some_and(|d| d.pass == e.pass));
        let trias = &self.mesh.trias;
        self.ttpq
            .trim(|t| trias.find(&t.key).is_some_and(|d| d.pass == t.pass));
        trim_vec(&mut self.bufs.eold);
        trim_vec(&mut self.cav.tnew);
        trim_vec(&mut self.cav.told);
    }
}
