//! Steiner-point chooser for the 2D refinement loop.
//!
//! The rule set is a policy object injected into the driver; the core only
//! relies on the cost queries (None = face is fine) and the point chooser
//! (candidate position + kind tag). The standard rules implement size- and
//! shape-driven refinement from the options thresholds.

use nalgebra::Vector2;

use crate::cfg::{PointKind, RdelOpts};

/// Refinement policy in R^2.
pub trait RuleSet2 {
    /// Cost of a protecting ball, or None when the ball needs no work.
    fn ball_cost(&self, rsq: f64, h: f64) -> Option<f64>;

    /// Cost of a restricted edge from its surface-ball size, or None.
    fn edge_cost(&self, rsq: f64, h: f64) -> Option<f64>;

    /// Cost of a restricted cell from its circumball and shortest edge,
    /// or None.
    fn tria_cost(&self, rsq: f64, lmin: f64, h: f64) -> Option<f64>;

    /// Steiner point for a bad edge: the surface-ball centre or an
    /// h-weighted off-centre toward the nearer endpoint.
    fn edge_point(
        &self,
        pa: Vector2<f64>,
        pb: Vector2<f64>,
        center: Vector2<f64>,
        h: f64,
    ) -> (Vector2<f64>, PointKind);

    /// Steiner point for a bad cell: the circumcentre or a size-limited
    /// off-centre from the shortest-edge midpoint toward it.
    fn tria_point(
        &self,
        circ: Vector2<f64>,
        emid: Vector2<f64>,
        lmin: f64,
        h: f64,
    ) -> (Vector2<f64>, PointKind);
}

/// Threshold-driven standard rules (radius-edge + h-sizing).
#[derive(Clone, Copy, Debug)]
pub struct StdRules2 {
    pub siz1: f64,
    pub siz2: f64,
    pub rad2: f64,
}

impl StdRules2 {
    pub fn from_opts(opts: &RdelOpts) -> Self {
        Self {
            siz1: opts.siz1,
            siz2: opts.siz2,
            rad2: opts.rad2,
        }
    }
}

impl RuleSet2 for StdRules2 {
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
        let size = 2.0 * rad / (self.siz2 * h.max(1e-300));
        let shape = rad / (self.rad2 * lmin.max(1e-300));
        let cost = size.max(shape);
        (cost > 1.0).then_some(cost)
    }

    fn edge_point(
        &self,
        pa: Vector2<f64>,
        pb: Vector2<f64>,
        center: Vector2<f64>,
        h: f64,
    ) -> (Vector2<f64>, PointKind) {
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
        circ: Vector2<f64>,
        emid: Vector2<f64>,
        lmin: f64,
        h: f64,
    ) -> (Vector2<f64>, PointKind) {
        let d = (circ - emid).norm();
        let off = (self.siz2 * h).max(lmin);
        if off < d {
            let q = emid + (circ - emid) * (off / d);
            (q, PointKind::Offh)
        } else {
            (circ, PointKind::Circ)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules() -> StdRules2 {
        StdRules2::from_opts(&RdelOpts::default())
    }

    #[test]
    fn zero_radius_balls_are_never_bad() {
        assert!(rules().ball_cost(0.0, 1.0).is_none());
        assert!(rules().ball_cost(4.0, 0.1).is_some());
    }

    #[test]
    fn edge_cost_thresholds_on_diameter() {
        let r = rules();
        // Unit square side: ball radius 0.5, h = 1.0 -> diameter 1.0 < 1.333.
        assert!(r.edge_cost(0.25, 1.0).is_none());
        assert!(r.edge_cost(0.25, 0.5).is_some());
    }

    #[test]
    fn tria_cost_catches_bad_shape_regardless_of_h() {
        let r = rules();
        // Sliver: big circumradius over a tiny shortest edge.
        assert!(r.tria_cost(1.0, 0.1, f64::INFINITY).is_some());
        // Well-shaped and well-sized.
        assert!(r.tria_cost(0.25, 0.9, 1.0).is_none());
    }

    #[test]
    fn big_edges_get_off_centre_points() {
        let r = rules();
        let pa = Vector2::new(0.0, 0.0);
        let pb = Vector2::new(8.0, 0.0);
        let c = Vector2::new(4.0, 0.0);
        let (q, kind) = r.edge_point(pa, pb, c, 1.0);
        assert_eq!(kind, PointKind::Offh);
        assert!((q - Vector2::new(1.0, 0.0)).norm() < 1e-12);
        let (q2, kind2) = r.edge_point(pa, pb, c, 10.0);
        assert_eq!(kind2, PointKind::Circ);
        assert_eq!(q2, c);
    }
}
