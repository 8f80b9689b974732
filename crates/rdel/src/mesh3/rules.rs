//! Steiner-point chooser for the 3D refinement loop.

use nalgebra::Vector3;

use crate::cfg::{PointKind, RdelOpts};

/// Refinement policy in R^3.
pub trait RuleSet3 {
    fn ball_cost(&self, rsq: f64, h: f64) -> Option<f64>;
    fn edge_cost(&self, rsq: f64, h: f64) -> Option<f64>;
    fn tria_cost(&self, rsq: f64, lmin: f64, h: f64) -> Option<f64>;

    fn edge_point(
        &self,
        pa: Vector3<f64>,
        pb: Vector3<f64>,
        center: Vector3<f64>,
        h: f64,
    ) -> (Vector3<f64>, PointKind);

    /// Steiner point for a bad cell: the circumcentre or the off-centre
    /// between the shortest-edge midpoint and the circumcentre.
    fn tria_point(
        &self,
        circ: Vector3<f64>,
        emid: Vector3<f64>,
        lmin: f64,
        h: f64,
    ) -> (Vector3<f64>, PointKind);
}

/// Threshold-driven standard rules (radius-edge + h-sizing).
#[derive(Clone, Copy, Debug)]
pub struct StdRules3 {
    pub siz1: f64,
    pub siz3: f64,
    pub rad3: f64,
}

impl StdRules3 {
    pub fn from_opts(opts: &RdelOpts) -> Self {
        Self {
            siz1: opts.siz1,
            siz3: opts.siz3,
            rad3: opts.rad3,
        }
    }
}

impl RuleSet3 for StdRules3 {
    fn ball_cost(&self, rsq: f64, h: f64) -> Option<f64> {
        if rsq <= 0.0 {
            return None;
        }
        let diam = 2.0 * rsq.sqrt();
        (diam > self.siz1 * h).then_some(rsq)
    }

    fn edge_cost(&self, rsq: f64, h: f64) -> Option<f64> {
        let diam = 2.0 * rsq.sqrt();
        (diam > self.siz1 * h).then(|| diam / h.max(1e-300))
    }

    fn tria_cost(&self, rsq: f64, lmin: f64, h: f64) -> Option<f64> {
        let rad = rsq.sqrt();
        let size = 2.0 * rad / (self.siz3 * h.max(1e-300));
        let shape = rad / (self.rad3 * lmin.max(1e-300));
        let cost = size.max(shape);
        (cost > 1.0).then_some(cost)
    }

    fn edge_point(
        &self,
        pa: Vector3<f64>,
        pb: Vector3<f64>,
        center: Vector3<f64>,
        h: f64,
    ) -> (Vector3<f64>, PointKind) {
        let la = (center - pa).norm();
        let lb = (center - pb).norm();
        let (near, ln) = if la <= lb { (pa, la) } else { (pb, lb) };
        if h > 0.0 && ln > 1.5 * h {
            let q = near + (center - near) * (h / ln);
            (q, PointKind::Offh)
        } else {
            (center, PointKind::Circ)
        }
    }

    fn tria_point(
        &self,
        circ: Vector3<f64>,
        emid: Vector3<f64>,
        lmin: f64,
        h: f64,
    ) -> (Vector3<f64>, PointKind) {
        let d = (circ - emid).norm();
        let off = (self.siz3 * h).max(lmin);
        if off < d {
            let q = emid + (circ - emid) * (off / d);
            (q, PointKind::Offc)
        } else {
            (circ, PointKind::Circ)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_off_centre_is_tagged_offc() {
        let r = StdRules3::from_opts(&RdelOpts::default());
        let circ = Vector3::new(0.0, 0.0, 10.0);
        let emid = Vector3::zeros();
        let (q, kind) = r.tria_point(circ, emid, 0.5, 0.5);
        assert_eq!(kind, PointKind::Offc);
        assert!(q.z < 10.0 && q.z > 0.0);
        let (q2, kind2) = r.tria_point(Vector3::new(0.0, 0.0, 0.2), emid, 0.5, 1.0);
        assert_eq!(kind2, PointKind::Circ);
        assert_eq!(q2.z, 0.2);
    }
}
