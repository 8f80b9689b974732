//! Domain oracle in R^2: capability trait plus a piecewise-linear
//! reference implementation.
//!
//! The core computes dual Voronoi objects itself and hands them to the
//! oracle, which only answers domain-intersection queries: dual segment vs
//! boundary curve for Delaunay edges, point-inside-domain for cell
//! circumcentres. Oracles must be pure and deterministic.

use nalgebra::Vector2;
use thiserror::Error;

use crate::cfg::Feat;

/// Invalid oracle construction input.
#[derive(Debug, Error)]
pub enum GeomError {
    #[error("geometry has no boundary elements")]
    Empty,
    #[error("coordinate is not finite")]
    NonFinite,
    #[error("element references vertex {0} out of range")]
    BadIndex(u32),
}

/// Seed point handed to the mesh initialiser. `topo` is the expected
/// restricted-edge valence at the node (1 at an open curve end, 2 along a
/// curve, higher at junctions).
#[derive(Clone, Copy, Debug)]
pub struct FeatPoint2 {
    pub pos: Vector2<f64>,
    pub fdim: u8,
    pub feat: Feat,
    pub topo: u8,
}

/// Result of a dual-vs-domain intersection query: the surface ball plus
/// the feature/topology classification of the crossed feature.
#[derive(Clone, Copy, Debug)]
pub struct EdgeHit2 {
    pub center: Vector2<f64>,
    pub rsq: f64,
    pub feat: Feat,
    pub topo: u8,
    pub part: i32,
}

/// Domain-oracle capability in R^2.
pub trait Geom2 {
    /// Axis-aligned bounding box of the domain.
    fn bbox(&self) -> (Vector2<f64>, Vector2<f64>);

    /// Sharp-feature seed points (corners); inserted before refinement.
    fn seed_feat(&self, out: &mut Vec<FeatPoint2>);

    /// Additional boundary seed points.
    fn seed_mesh(&self, out: &mut Vec<FeatPoint2>);

    /// Intersect the dual segment `[d0, d1]` of a Delaunay edge with the
    /// boundary curve. `(ea, eb)` are the edge endpoints, used to size the
    /// surface ball. Deterministic: the hit closest to `d0` wins.
    fn edge_ball(
        &self,
        d0: Vector2<f64>,
        d1: Vector2<f64>,
        ea: Vector2<f64>,
        eb: Vector2<f64>,
        part_hint: i32,
    ) -> Option<EdgeHit2>;

    /// Is `c` inside the domain? Returns the part id on the inside.
    /// `part_hint` carries the caller's seeded sign (-1 = unknown).
    fn tria_ball(&self, c: Vector2<f64>, part_hint: i32) -> Option<i32>;
}

/// One boundary segment of a `Pslg2`.
#[derive(Clone, Copy, Debug)]
pub struct Seg2 {
    pub a: u32,
    pub b: u32,
    pub part: i32,
}

/// Piecewise-straight-line domain: boundary segments forming closed loops.
///
/// Corners (vertices used by a number of segments other than two, or where
/// the two incident segments turn sharply) become hard feature seeds.
#[derive(Clone, Debug)]
pub struct Pslg2 {
    verts: Vec<Vector2<f64>>,
    segs: Vec<Seg2>,
    corner: Vec<bool>,
}

/// Turn sharper than this (cosine of the interior deviation from straight)
/// marks a corner.
const CORNER_COS: f64 = 0.996;

impl Pslg2 {
    pub fn new(verts: Vec<Vector2<f64>>, segs: Vec<Seg2>) -> Result<Self, GeomError> {
        if segs.is_empty() {
            return Err(GeomError::Empty);
        }
        for v in &verts {
            if !(v.x.is_finite() && v.y.is_finite()) {
                return Err(GeomError::NonFinite);
            }
        }
        for s in &segs {
            for idx in [s.a, s.b] {
                if idx as usize >= verts.len() {
                    return Err(GeomError::BadIndex(idx));
                }
            }
        }
        let corner = detect_corners(&verts, &segs);
        Ok(Self {
            verts,
            segs,
            corner,
        })
    }

    /// Closed polygon over `pts` in order, one part.
    pub fn polygon(pts: Vec<Vector2<f64>>) -> Result<Self, GeomError> {
        let n = pts.len() as u32;
        let segs = (0..n)
            .map(|i| Seg2 {
                a: i,
                b: (i + 1) % n,
                part: 0,
            })
            .collect();
        Self::new(pts, segs)
    }

    pub fn n_segs(&self) -> usize {
        self.segs.len()
    }
}

fn detect_corners(verts: &[Vector2<f64>], segs: &[Seg2]) -> Vec<bool> {
    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); verts.len()];
    for (i, s) in segs.iter().enumerate() {
        incident[s.a as usize].push(i);
        incident[s.b as usize].push(i);
    }
    incident
        .iter()
        .enumerate()
        .map(|(v, inc)| match inc.len() {
            0 => false,
            2 => {
                let dir = |si: usize| {
                    let s = segs[si];
                    let (a, b) = (verts[s.a as usize], verts[s.b as usize]);
                    let d = if s.a as usize == v { b - a } else { a - b };
                    d / d.norm().max(1e-300)
                };
                // Straight continuation has the two outgoing directions
                // anti-parallel.
                dir(inc[0]).dot(&dir(inc[1])) > -CORNER_COS
            }
            _ => true,
        })
        .collect()
}

impl Geom2 for Pslg2 {
    fn bbox(&self) -> (Vector2<f64>, Vector2<f64>) {
        let mut lo = Vector2::new(f64::INFINITY, f64::INFINITY);
        let mut hi = Vector2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for v in &self.verts {
            lo = lo.inf(v);
            hi = hi.sup(v);
        }
        (lo, hi)
    }

    fn seed_feat(&self, out: &mut Vec<FeatPoint2>) {
        let mut valence = vec![0u8; self.verts.len()];
        for s in &self.segs {
            valence[s.a as usize] = valence[s.a as usize].saturating_add(1);
            valence[s.b as usize] = valence[s.b as usize].saturating_add(1);
        }
        for (i, v) in self.verts.iter().enumerate() {
            if self.corner[i] {
                out.push(FeatPoint2 {
                    pos: *v,
                    fdim: 0,
                    feat: Feat::Hard,
                    topo: valence[i],
                });
            }
        }
    }

    fn seed_mesh(&self, out: &mut Vec<FeatPoint2>) {
        for (i, v) in self.verts.iter().enumerate() {
            if !self.corner[i] {
                out.push(FeatPoint2 {
                    pos: *v,
                    fdim: 1,
                    feat: Feat::None,
                    topo: 2,
                });
            }
        }
    }

    fn edge_ball(
        &self,
        d0: Vector2<f64>,
        d1: Vector2<f64>,
        ea: Vector2<f64>,
        _eb: Vector2<f64>,
        _part_hint: i32,
    ) -> Option<EdgeHit2> {
        let mut best: Option<(f64, usize, Vector2<f64>)> = None;
        for (i, s) in self.segs.iter().enumerate() {
            let (sa, sb) = (self.verts[s.a as usize], self.verts[s.b as usize]);
            if let Some((t, x)) = seg_seg(d0, d1, sa, sb) {
                let better = match best {
                    None => true,
                    Some((bt, _, _)) => t < bt,
                };
                if better {
                    best = Some((t, i, x));
                }
            }
        }
        best.map(|(_, i, x)| EdgeHit2 {
            center: x,
            rsq: (x - ea).norm_squared(),
            feat: Feat::None,
            topo: 2,
            part: self.segs[i].part,
        })
    }

    fn tria_ball(&self, c: Vector2<f64>, _part_hint: i32) -> Option<i32> {
        let mut crossings = 0usize;
        for s in &self.segs {
            let (a, b) = (self.verts[s.a as usize], self.verts[s.b as usize]);
            if (a.y > c.y) != (b.y > c.y) {
                let x = a.x + (c.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if x > c.x {
                    crossings += 1;
                }
            }
        }
        if crossings % 2 == 1 {
            Some(0)
        } else {
            None
        }
    }
}

/// Intersection of segments `[p, q]` and `[a, b]`; returns the parameter
/// along `[p, q]` and the point. Collinear overlaps report no hit.
/// Endpoint grazes within `END_EPS` count as hits: dual segments often
/// terminate exactly on the boundary.
fn seg_seg(
    p: Vector2<f64>,
    q: Vector2<f64>,
    a: Vector2<f64>,
    b: Vector2<f64>,
) -> Option<(f64, Vector2<f64>)> {
    const END_EPS: f64 = 1e-9;
    let r = q - p;
    let s = b - a;
    let den = r.x * s.y - r.y * s.x;
    let scale = r.norm() * s.norm();
    if den.abs() <= 1e-14 * scale.max(1e-300) {
        return None;
    }
    let ap = a - p;
    let t = (ap.x * s.y - ap.y * s.x) / den;
    let u = (ap.x * r.y - ap.y * r.x) / den;
    if !(-END_EPS..=1.0 + END_EPS).contains(&t) || !(-END_EPS..=1.0 + END_EPS).contains(&u) {
        return None;
    }
    let t = t.clamp(0.0, 1.0);
    Some((t, p + r * t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Pslg2 {
        Pslg2::polygon(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn square_has_four_corners() {
        let g = unit_square();
        let mut feat = Vec::new();
        g.seed_feat(&mut feat);
        assert_eq!(feat.len(), 4);
        assert!(feat.iter().all(|f| f.feat == Feat::Hard && f.fdim == 0));
        let mut mesh = Vec::new();
        g.seed_mesh(&mut mesh);
        assert!(mesh.is_empty());
    }

    #[test]
    fn collinear_chain_vertices_are_not_corners() {
        let g = Pslg2::polygon(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(0.5, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
        ])
        .unwrap();
        let mut feat = Vec::new();
        g.seed_feat(&mut feat);
        assert_eq!(feat.len(), 4);
        let mut mesh = Vec::new();
        g.seed_mesh(&mut mesh);
        assert_eq!(mesh.len(), 1);
        assert_eq!(mesh[0].fdim, 1);
    }

    #[test]
    fn inside_outside() {
        let g = unit_square();
        assert_eq!(g.tria_ball(Vector2::new(0.5, 0.5), -1), Some(0));
        assert!(g.tria_ball(Vector2::new(1.5, 0.5), -1).is_none());
        assert!(g.tria_ball(Vector2::new(-0.1, -0.1), -1).is_none());
    }

    #[test]
    fn dual_segment_hits_boundary() {
        let g = unit_square();
        // Vertical dual segment crossing the bottom side at (0.3, 0).
        let hit = g
            .edge_ball(
                Vector2::new(0.3, 0.4),
                Vector2::new(0.3, -0.4),
                Vector2::new(0.0, 0.0),
                Vector2::new(0.6, 0.0),
                -1,
            )
            .unwrap();
        assert!((hit.center - Vector2::new(0.3, 0.0)).norm() < 1e-12);
        assert!((hit.rsq - 0.09).abs() < 1e-12);
        // Fully interior dual segment misses.
        assert!(g
            .edge_ball(
                Vector2::new(0.4, 0.4),
                Vector2::new(0.6, 0.6),
                Vector2::new(0.5, 0.4),
                Vector2::new(0.5, 0.6),
                -1,
            )
            .is_none());
    }

    #[test]
    fn invalid_input_is_reported() {
        assert!(matches!(
            Pslg2::new(Vec::new(), Vec::new()),
            Err(GeomError::Empty)
        ));
        assert!(matches!(
            Pslg2::polygon(vec![Vector2::new(f64::NAN, 0.0); 3]),
            Err(GeomError::NonFinite)
        ));
        let bad = Pslg2::new(
            vec![Vector2::new(0.0, 0.0)],
            vec![Seg2 {
                a: 0,
                b: 5,
                part: 0,
            }],
        );
        assert!(matches!(bad, Err(GeomError::BadIndex(5))));
    }
}
