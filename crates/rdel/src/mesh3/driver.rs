//! Driver state machine for restricted Delaunay meshing in R^3.
//!
//! Same phase machine as the 2D driver, with the 3D extras: the edge-phase
//! entry re-seeds every cached cell circumball, the cell-phase entry also
//! derives the restricted surface faces, and cell-sign seeding is gated by
//! the duplicate-face safety flag. Surface faces are constructed but not
//! refined; the refinement queues cover balls, edges, topology and cells.

use log::{debug, trace};
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashSet;

use crate::brio::brio_order;
use crate::cfg::{Feat, Mode, PointKind, RdelOpts, SUPER_FDIM_3};
use crate::geom3::{FeatPoint3, Geom3};
use crate::heap::{trim_vec, BallCost, CostHeap, EtopCost};
use crate::hfun::{Hfun, Hint, Uniform};
use crate::index::key;
use crate::stats::RdelStats;
use crate::tri3::Cavity3;

use super::cavity::{push_rdel, Bufs3};
use super::rules::{RuleSet3, StdRules3};
use super::types::{EdgeCost3, RdelMesh3, TetCost3};

/// One-shot restricted construction (no refinement) up to `opts.dims`.
pub fn rdel_make_3d<G: Geom3>(
    geom: &G,
    init: &[Vector3<f64>],
    opts: &RdelOpts,
) -> (RdelMesh3, RdelStats) {
    let hfun = Uniform(f64::INFINITY);
    let rules = StdRules3::from_opts(opts);
    let mut drv = Driver3::new(geom, &hfun, &rules, *opts);
    drv.init_mesh(init);
    drv.make();
    drv.finish()
}

/// Full restricted construction plus refinement with the standard rules.
pub fn rdel_mesh_3d<G: Geom3, H: Hfun<Vector3<f64>>>(
    geom: &G,
    init: &[Vector3<f64>],
    hfun: &H,
    opts: &RdelOpts,
) -> (RdelMesh3, RdelStats) {
    let rules = StdRules3::from_opts(opts);
    rdel_mesh_3d_with(geom, init, hfun, &rules, opts)
}

/// Full construction/refinement with an injected rule policy.
pub fn rdel_mesh_3d_with<G: Geom3, H: Hfun<Vector3<f64>>, R: RuleSet3>(
    geom: &G,
    init: &[Vector3<f64>],
    hfun: &H,
    rules: &R,
    opts: &RdelOpts,
) -> (RdelMesh3, RdelStats) {
    let mut drv = Driver3::new(geom, hfun, rules, *opts);
    drv.init_mesh(init);
    drv.run();
    drv.finish()
}

struct Driver3<'a, G, H, R> {
    geom: &'a G,
    hfun: &'a H,
    rules: &'a R,
    opts: RdelOpts,
    mesh: RdelMesh3,
    nbpq: CostHeap<BallCost>,
    eepq: CostHeap<EdgeCost3>,
    etpq: CostHeap<EtopCost>,
    ttpq: CostHeap<TetCost3>,
    bufs: Bufs3,
    cav: Cavity3,
    einc: Vec<u32>,
    emrk: FxHashSet<u32>,
    mode: Mode,
    pass: u32,
    stats: RdelStats,
    rng: StdRng,
}

impl<'a, G: Geom3, H: Hfun<Vector3<f64>>, R: RuleSet3> Driver3<'a, G, H, R> {
    fn new(geom: &'a G, hfun: &'a H, rules: &'a R, opts: RdelOpts) -> Self {
        Self {
            geom,
            hfun,
            rules,
            opts,
            mesh: RdelMesh3::default(),
            nbpq: CostHeap::default(),
            eepq: CostHeap::default(),
            etpq: CostHeap::default(),
            ttpq: CostHeap::default(),
            bufs: Bufs3::default(),
            cav: Cavity3::default(),
            einc: Vec::new(),
            emrk: FxHashSet::default(),
            mode: Mode::Null,
            pass: 0,
            stats: RdelStats::default(),
            rng: StdRng::seed_from_u64(opts.seed),
        }
    }

    fn init_mesh(&mut self, init: &[Vector3<f64>]) {
        let (mut lo, mut hi) = self.geom.bbox();
        for p in init {
            lo = lo.inf(p);
            hi = hi.sup(p);
        }
        let len = (hi - lo) * 2.0;
        self.mesh.dt.push_root(lo - len, hi + len);
        for n in 0..4 {
            let node = self.mesh.dt.node_mut(n);
            node.fdim = SUPER_FDIM_3;
            node.feat = Feat::None;
            node.topo = 0;
        }

        let mut feat: Vec<FeatPoint3> = Vec::new();
        self.geom.seed_feat(&mut feat);
        for f in &feat {
            self.seed_point(f.pos, f.fdim, f.feat, f.topo);
        }
        if !init.is_empty() {
            let order = brio_order(init, &mut self.rng);
            for &i in &order {
                self.seed_point(init[i as usize], 3, Feat::None, 2);
            }
        }
        let mut extra: Vec<FeatPoint3> = Vec::new();
        self.geom.seed_mesh(&mut extra);
        for f in &extra {
            self.seed_point(f.pos, f.fdim, f.feat, f.topo);
        }
        for n in 0..self.mesh.dt.n_nodes() {
            self.mesh.dt.node_mut(n as u32).idxh = Hint::NULL;
        }
        debug!(
            "3d init: {} nodes seeded ({} feature)",
            self.mesh.dt.live_nodes().count(),
            feat.len()
        );
    }

    fn seed_point(&mut self, p: Vector3<f64>, fdim: u8, feat: Feat, topo: u8) {
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

    /// One-shot restricted construction: circumballs, then every face
    /// dimension up to `opts.dims` in one pass, with the safety gate.
    fn make(&mut self) {
        self.bufs.clear();
        self.mesh.dt.reseed_circumballs();
        self.init_rdel(0, self.opts.dims.min(3));
        self.stats.dup_last = self.bufs.ndup;
        self.merge(false);
        self.mode = Mode::Tria;
        self.stats.converged = true;
    }

    fn run(&mut self) {
        self.stats.converged = false;
        loop {
            self.pass += 1;
            if self.pass > self.opts.iter {
                debug!("3d mesh: iteration budget {} exhausted", self.opts.iter);
                break;
            }
            self.bufs.clear();
            let mut irdt = false;

            if self.mode == Mode::Null {
                self.mode = Mode::Node;
                irdt = true;
                self.init_rdel(0, 0);
                debug!("3d mesh: node phase ({} balls)", self.bufs.bdat.len());
            }
            if self.mode == Mode::Node && self.nbpq.is_empty() && self.bufs.bdat.is_empty() {
                self.mode = Mode::Edge;
                irdt = true;
                // Re-seed circumballs before any dual object is derived.
                self.mesh.dt.reseed_circumballs();
                if self.opts.dims >= 1 {
                    self.init_rdel(1, 1);
                }
                debug!("3d mesh: edge phase ({} edges)", self.bufs.edat.len());
            }
            if self.mode == Mode::Edge && self.eepq.is_empty() && self.bufs.edat.is_empty() {
                self.mode = Mode::Etop;
            }
            if self.mode == Mode::Etop && self.etpq.is_empty() && self.bufs.edat.is_empty() {
                self.mode = Mode::Tria;
                irdt = true;
                if self.opts.dims >= 2 {
                    self.init_rdel(2, self.opts.dims.min(3));
                    self.stats.dup_last = self.bufs.ndup;
                }
                debug!(
                    "3d mesh: tria phase ({} faces, {} cells, {} dups)",
                    self.bufs.fdat.len(),
                    self.bufs.tdat.len(),
                    self.bufs.ndup
                );
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
                        "3d mesh: pass {} |edges| {} |faces| {} |cells| {}",
                        self.pass,
                        self.mesh.edges.len(),
                        self.mesh.faces.len(),
                        self.mesh.cells.len()
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

    fn finish(mut self) -> (RdelMesh3, RdelStats) {
        self.stats.passes = self.pass;
        self.stats.n_ball = self.mesh.balls.len();
        self.stats.n_edge = self.mesh.edges.len();
        self.stats.n_face = self.mesh.faces.len();
        self.stats.n_cell = self.mesh.cells.len();
        if self.opts.verb >= 1 {
            debug!(
                "3d mesh: done after {} passes: |rDEL-0| {} |rDEL-1| {} |rDEL-2| {} |rDEL-3| {} \
                 ({} steiner)",
                self.stats.passes,
                self.stats.n_ball,
                self.stats.n_edge,
                self.stats.n_face,
                self.stats.n_cell,
                self.stats.steiner_total()
            );
        }
        if self.opts.verb >= 2 {
            let e = &self.stats.steiner_edge;
            let t = &self.stats.steiner_cell;
            debug!(
                "3d mesh: edge steiner circ {} offh {} disk {}; cell steiner circ {} offc {} \
                 sink {}",
                e[PointKind::Circ.slot()],
                e[PointKind::Offh.slot()],
                e[PointKind::Disk.slot()],
                t[PointKind::Circ.slot()],
                t[PointKind::Offc.slot()],
                t[PointKind::Sink.slot()],
            );
        }
        (self.mesh, self.stats)
    }

    fn dim_cap(&self) -> u8 {
        let d = match self.mode {
            Mode::Null | Mode::Node => 0,
            Mode::Edge | Mode::Etop => 1,
            Mode::Tria => 3,
        };
        d.min(self.opts.dims)
    }

    fn init_rdel(&mut self, dlo: u8, dhi: u8) {
        let tnew: Vec<u32> = self.mesh.dt.live_tets().collect();
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

    fn eval_h(&mut self, at: Vector3<f64>, hint_node: u32) -> f64 {
        let hint = self.mesh.dt.node(hint_node).idxh;
        let (h, nh) = self.hfun.eval(at, hint);
        self.mesh.dt.node_mut(hint_node).idxh = nh;
        h
    }

    fn insert_steiner(
        &mut self,
        p: Vector3<f64>,
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
        let dcap = self.dim_cap();
        push_rdel(
            self.geom,
            &self.mesh.dt,
            &tnew,
            &[v],
            self.pass,
            0,
            dcap,
            &mut self.bufs,
        );
        if dcap >= 2 {
            self.stats.dup_last = self.bufs.ndup;
        }
        self.mesh.dt.recycle(&told);
        self.cav.told = told;
        self.cav.tnew = tnew;
        Some((kind, tdim))
    }

    fn scrub(&mut self, told: &[u32]) {
        for &t in told {
            let tet = *self.mesh.dt.tet(t);
            for e in 0..6 {
                let (a, b) = tet.edge(e);
                let k = key([a, b]);
                if self.mesh.edges.remove(&k).is_some() {
                    self.bump_einc(k, -1);
                    self.bufs.eold.push(k);
                }
            }
            for f in 0..4 {
                self.mesh.faces.remove(&key(tet.face(f)));
            }
            self.mesh.cells.remove(&key(tet.nodes));
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
                    self.eepq.push(EdgeCost3 {
                        key: d.key,
                        pass: d.pass,
                        cost,
                    });
                }
            }
        }
        self.bufs.edat = edat;

        let fdat = std::mem::take(&mut self.bufs.fdat);
        for d in &fdat {
            self.mesh.faces.insert(d.key, *d);
        }
        self.bufs.fdat = fdat;

        let tdat = std::mem::take(&mut self.bufs.tdat);
        for d in &tdat {
            if !self.mesh.cells.insert(d.key, *d) {
                continue;
            }
            if score {
                let tet = *self.mesh.dt.tet(d.tadj);
                let (lmin, _) = self.shortest_edge(&tet);
                let h = self.eval_h(tet.circ, d.key[0]);
                if let Some(cost) = self.rules.tria_cost(tet.rsq, lmin, h) {
                    self.ttpq.push(TetCost3 {
                        key: d.key,
                        pass: d.pass,
                        cost,
                    });
                }
            }
        }
        self.bufs.tdat = tdat;
    }

    fn shortest_edge(&self, tet: &crate::tri3::Tet3) -> (f64, Vector3<f64>) {
        let mut lmin = f64::INFINITY;
        let mut emid = Vector3::zeros();
        for e in 0..6 {
            let (a, b) = tet.edge(e);
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
            let mut best: Option<([u32; 2], f64, Vector3<f64>)> = None;
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
            let Some(dat) = self.mesh.cells.find(&top.key).copied() else {
                continue;
            };
            if dat.pass != top.pass {
                continue;
            }
            let tet = *self.mesh.dt.tet(dat.tadj);
            let (lmin, emid) = self.shortest_edge(&tet);
            let h = self.eval_h(tet.circ, top.key[0]);
            let (mut pt, mut kind) = self.rules.tria_point(tet.circ, emid, lmin, h);
            if self.geom.tria_ball(pt, dat.part).is_none() {
                let (pa, pb, pc, pd) = (
                    self.mesh.dt.node(tet.nodes[0]).pos,
                    self.mesh.dt.node(tet.nodes[1]).pos,
                    self.mesh.dt.node(tet.nodes[2]).pos,
                    self.mesh.dt.node(tet.nodes[3]).pos,
                );
                pt = (pa + pb + pc + pd) / 4.0;
                kind = PointKind::Sink;
            }
            return self.insert_steiner(pt, 3, kind, 2);
        }
    }

    fn trim(&mut self) {
        let edges = &self.mesh.edges;
        self.eepq
            .trim(|e| edges.find(&e.key).is_some_and(|d| d.pass == e.pass));
        let cells = &self.mesh.cells;
        self.ttpq
            .trim(|t| cells.find(&t.key).is_some_and(|d| d.pass == t.pass));
        trim_vec(&mut self.bufs.eold);
        trim_vec(&mut self.cav.tnew);
        trim_vec(&mut self.cav.told);
    }
}
