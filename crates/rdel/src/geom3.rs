//! Domain oracle in R^3: capability trait plus a triangulated-surface
//! reference implementation.
//!
//! Dual objects arrive from the core: a segment between adjacent cell
//! circumcentres for Delaunay faces, the ring polygon of circumcentres for
//! Delaunay edges, a bare circumcentre for cells. The oracle intersects
//! them with its surface patches and ridge curves.

use nalgebra::Vector3;

use crate::cfg::Feat;
pub use crate::geom2::GeomError;

/// Seed point handed to the mesh initialiser. `topo` is the expected
/// restricted-edge valence at the node (ridge valence at corners).
#[derive(Clone, Copy, Debug)]
pub struct FeatPoint3 {
    pub pos: Vector3<f64>,
    pub fdim: u8,
    pub feat: Feat,
    pub topo: u8,
}

/// Surface/ridge intersection result with classification.
#[derive(Clone, Copy, Debug)]
pub struct Hit3 {
    pub center: Vector3<f64>,
    pub rsq: f64,
    pub feat: Feat,
    pub topo: u8,
    pub part: i32,
}

/// Domain-oracle capability in R^3.
pub trait Geom3 {
    fn bbox(&self) -> (Vector3<f64>, Vector3<f64>);

    /// Sharp-feature seed points (corners).
    fn seed_feat(&self, out: &mut Vec<FeatPoint3>);

    /// Additional boundary seed points.
    fn seed_mesh(&self, out: &mut Vec<FeatPoint3>);

    /// Intersect the dual segment `[d0, d1]` of a Delaunay face with the
    /// domain surface; `fa` is one face node, used to size the ball.
    /// Deterministic: the hit closest to `d0` wins.
    fn face_ball(
        &self,
        d0: Vector3<f64>,
        d1: Vector3<f64>,
        fa: Vector3<f64>,
        part_hint: i32,
    ) -> Option<Hit3>;

    /// Intersect the dual polygon of a Delaunay edge `(ea, eb)` (the ring
    /// of adjacent circumcentres, in pivot order) with the domain ridges.
    fn edge_ball(
        &self,
        poly: &[Vector3<f64>],
        ea: Vector3<f64>,
        eb: Vector3<f64>,
        part_hint: i32,
    ) -> Option<Hit3>;

    /// Is `c` inside the domain? Returns the part id on the inside.
    /// `part_hint` carries the caller's seeded sign (-1 = unknown).
    fn tria_ball(&self, c: Vector3<f64>, part_hint: i32) -> Option<i32>;
}

/// One surface triangle.
#[derive(Clone, Copy, Debug)]
pub struct Tri3 {
    pub n: [u32; 3],
    pub part: i32,
}

/// One ridge segment.
#[derive(Clone, Copy, Debug)]
pub struct Seg3 {
    pub a: u32,
    pub b: u32,
    pub part: i32,
}

/// Triangulated closed surface with tagged ridge curves and corners.
#[derive(Clone, Debug)]
pub struct TriSurf3 {
    verts: Vec<Vector3<f64>>,
    tris: Vec<Tri3>,
    ridges: Vec<Seg3>,
    corners: Vec<u32>,
}

/// Fixed, slightly skew parity-ray direction; dodges the axis-aligned
/// edge/vertex grazing cases of boxy inputs.
#[inline]
fn ray_dir() -> Vector3<f64> {
    Vector3::new(0.9631, 0.2345, 0.1297)
}

impl TriSurf3 {
    pub fn new(
        verts: Vec<Vector3<f64>>,
        tris: Vec<Tri3>,
        ridges: Vec<Seg3>,
        corners: Vec<u32>,
    ) -> Result<Self, GeomError> {
        if tris.is_empty() {
            return Err(GeomError::Empty);
        }
        for v in &verts {
            if !(v.x.is_finite() && v.y.is_finite() && v.z.is_finite()) {
                return Err(GeomError::NonFinite);
            }
        }
        let nv = verts.len() as u32;
        let check = |idx: u32| {
            if idx >= nv {
                Err(GeomError::BadIndex(idx))
            } else {
                Ok(())
            }
        };
        for t in &tris {
            for &i in &t.n {
                check(i)?;
            }
        }
        for r in &ridges {
            check(r.a)?;
            check(r.b)?;
        }
        for &c in &corners {
            check(c)?;
        }
        Ok(Self {
            verts,
            tris,
            ridges,
            corners,
        })
    }

    /// Axis-aligned box surface: 12 triangles, 12 ridges, 8 corners.
    pub fn cube(pmin: Vector3<f64>, pmax: Vector3<f64>) -> Result<Self, GeomError> {
        let (x0, y0, z0) = (pmin.x, pmin.y, pmin.z);
        let (x1, y1, z1) = (pmax.x, pmax.y, pmax.z);
        let verts = vec![
            Vector3::new(x0, y0, z0),
            Vector3::new(x1, y0, z0),
            Vector3::new(x1, y1, z0),
            Vector3::new(x0, y1, z0),
            Vector3::new(x0, y0, z1),
            Vector3::new(x1, y0, z1),
            Vector3::new(x1, y1, z1),
            Vector3::new(x0, y1, z1),
        ];
        let quads: [([u32; 4], i32); 6] = [
            ([0, 3, 2, 1], 0), // z = z0
            ([4, 5, 6, 7], 1), // z = z1
            ([0, 1, 5, 4], 2), // y = y0
            ([2, 3, 7, 6], 3), // y = y1
            ([0, 4, 7, 3], 4), // x = x0
            ([1, 2, 6, 5], 5), // x = x1
        ];
        let mut tris = Vec::with_capacity(12);
        for (q, part) in quads {
            tris.push(Tri3 {
                n: [q[0], q[1], q[2]],
                part,
            });
            tris.push(Tri3 {
                n: [q[0], q[2], q[3]],
                part,
            });
        }
        let edges: [[u32; 2]; 12] = [
            [0, 1],
            [1, 2],
            [2, 3],
            [3, 0],
            [4, 5],
            [5, 6],
            [6, 7],
            [7, 4],
            [0, 4],
            [1, 5],
            [2, 6],
            [3, 7],
        ];
        let ridges = edges
            .iter()
            .enumerate()
            .map(|(i, e)| Seg3 {
                a: e[0],
                b: e[1],
                part: i as i32,
            })
            .collect();
        Self::new(verts, tris, ridges, (0..8).collect())
    }

    pub fn n_ridges(&self) -> usize {
        self.ridges.len()
    }

    fn tri_verts(&self, t: &Tri3) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        (
            self.verts[t.n[0] as usize],
            self.verts[t.n[1] as usize],
            self.verts[t.n[2] as usize],
        )
    }
}

impl Geom3 for TriSurf3 {
    fn bbox(&self) -> (Vector3<f64>, Vector3<f64>) {
        let mut lo = Vector3::from_element(f64::INFINITY);
        let mut hi = Vector3::from_element(f64::NEG_INFINITY);
        for v in &self.verts {
            lo = lo.inf(v);
            hi = hi.sup(v);
        }
        (lo, hi)
    }

    fn seed_feat(&self, out: &mut Vec<FeatPoint3>) {
        let mut valence = vec![0u8; self.verts.len()];
        for r in &self.ridges {
            valence[r.a as usize] = valence[r.a as usize].saturating_add(1);
            valence[r.b as usize] = valence[r.b as usize].saturating_add(1);
        }
        for &c in &self.corners {
            out.push(FeatPoint3 {
                pos: self.verts[c as usize],
                fdim: 0,
                feat: Feat::Hard,
                topo: valence[c as usize],
            });
        }
    }

    fn seed_mesh(&self, out: &mut Vec<FeatPoint3>) {
        let corner: std::collections::HashSet<u32> = self.corners.iter().copied().collect();
        let mut on_ridge: Vec<bool> = vec![false; self.verts.len()];
        for r in &self.ridges {
            on_ridge[r.a as usize] = true;
            on_ridge[r.b as usize] = true;
        }
        for (i, v) in self.verts.iter().enumerate() {
            if corner.contains(&(i as u32)) {
                continue;
            }
            out.push(FeatPoint3 {
                pos: *v,
                fdim: if on_ridge[i] { 1 } else { 2 },
                feat: Feat::None,
                topo: 2,
            });
        }
    }

    fn face_ball(
        &self,
        d0: Vector3<f64>,
        d1: Vector3<f64>,
        fa: Vector3<f64>,
        _part_hint: i32,
    ) -> Option<Hit3> {
        let dir = d1 - d0;
        let mut best: Option<(f64, usize, Vector3<f64>)> = None;
        for (i, tri) in self.tris.iter().enumerate() {
            let (a, b, c) = self.tri_verts(tri);
            if let Some(t) = seg_tri(d0, dir, a, b, c) {
                let better = match best {
                    None => true,
                    Some((bt, _, _)) => t < bt,
                };
                if better {
                    best = Some((t, i, d0 + dir * t));
                }
            }
        }
        best.map(|(_, i, x)| Hit3 {
            center: x,
            rsq: (x - fa).norm_squared(),
            feat: Feat::None,
            topo: 2,
            part: self.tris[i].part,
        })
    }

    fn edge_ball(
        &self,
        poly: &[Vector3<f64>],
        ea: Vector3<f64>,
        eb: Vector3<f64>,
        _part_hint: i32,
    ) -> Option<Hit3> {
        if poly.len() < 3 {
            return None;
        }
        // The dual polygon lies in the bisector plane of (ea, eb).
        let n = eb - ea;
        let m = (ea + eb) * 0.5;
        let (u, v) = plane_basis(n);
        let poly2: Vec<(f64, f64)> = poly
            .iter()
            .map(|p| ((p - m).dot(&u), (p - m).dot(&v)))
            .collect();
        let mut best: Option<(usize, f64, Vector3<f64>)> = None;
        for (i, r) in self.ridges.iter().enumerate() {
            let (r0, r1) = (self.verts[r.a as usize], self.verts[r.b as usize]);
            let den = n.dot(&(r1 - r0));
            if den.abs() <= 1e-14 * n.norm() * (r1 - r0).norm().max(1e-300) {
                continue;
            }
            let t = n.dot(&(m - r0)) / den;
            if !(0.0..=1.0).contains(&t) {
                continue;
            }
            let x = r0 + (r1 - r0) * t;
            let x2 = ((x - m).dot(&u), (x - m).dot(&v));
            if !inside_poly2(&poly2, x2) {
                continue;
            }
            let better = match best {
                None => true,
                Some((bi, bt, _)) => (i, t) < (bi, bt),
            };
            if better {
                best = Some((i, t, x));
            }
        }
        best.map(|(i, _, x)| Hit3 {
            center: x,
            rsq: (x - ea).norm_squared(),
            feat: Feat::None,
            topo: 2,
            part: self.ridges[i].part,
        })
    }

    fn tria_ball(&self, c: Vector3<f64>, _part_hint: i32) -> Option<i32> {
        let mut crossings = 0usize;
        for tri in &self.tris {
            let (a, b, t) = self.tri_verts(tri);
            if let Some(s) = ray_tri(c, ray_dir(), a, b, t) {
                if s > 1e-12 {
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

/// Orthonormal basis of the plane with normal `n`.
fn plane_basis(n: Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let nn = n / n.norm().max(1e-300);
    let seed = if nn.x.abs() < 0.9 {
        Vector3::new(1.0, 0.0, 0.0)
    } else {
        Vector3::new(0.0, 1.0, 0.0)
    };
    let u = nn.cross(&seed);
    let u = u / u.norm().max(1e-300);
    let v = nn.cross(&u);
    (u, v)
}

/// Crossing-parity point-in-polygon in plane coordinates.
fn inside_poly2(poly: &[(f64, f64)], p: (f64, f64)) -> bool {
    let mut inside = false;
    let n = poly.len();
    for i in 0..n {
        let (x0, y0) = poly[i];
        let (x1, y1) = poly[(i + 1) % n];
        if (y0 > p.1) != (y1 > p.1) {
            let x = x0 + (p.1 - y0) * (x1 - x0) / (y1 - y0);
            if x > p.0 {
                inside = !inside;
            }
        }
    }
    inside
}

/// Moller-Trumbore for the segment `o + dir*t`, `t` in [0, 1].
///
/// Barycentric bounds carry a small slack: face duals cross right
/// triangles exactly at the hypotenuse midpoint, and a strict test would
/// flip on rounding noise. The parity ray (`ray_tri`) stays strict; there
/// the slack would double-count shared triangle edges.
fn seg_tri(
    o: Vector3<f64>,
    dir: Vector3<f64>,
    a: Vector3<f64>,
    b: Vector3<f64>,
    c: Vector3<f64>,
) -> Option<f64> {
    const BARY_EPS: f64 = 1e-9;
    let e1 = b - a;
    let e2 = c - a;
    let pv = dir.cross(&e2);
    let det = e1.dot(&pv);
    if det.abs() <= 1e-14 * e1.norm() * e2.norm() * dir.norm().max(1e-300) {
        return None;
    }
    let inv = 1.0 / det;
    let tv = o - a;
    let uu = tv.dot(&pv) * inv;
    if !(-BARY_EPS..=1.0 + BARY_EPS).contains(&uu) {
        return None;
    }
    let qv = tv.cross(&e1);
    let vv = dir.dot(&qv) * inv;
    if vv < -BARY_EPS || uu + vv > 1.0 + BARY_EPS {
        return None;
    }
    let t = e2.dot(&qv) * inv;
    if !(-BARY_EPS..=1.0 + BARY_EPS).contains(&t) {
        return None;
    }
    Some(t.clamp(0.0, 1.0))
}

/// Moller-Trumbore ray-triangle intersection parameter.
fn ray_tri(
    o: Vector3<f64>,
    dir: Vector3<f64>,
    a: Vector3<f64>,
    b: Vector3<f64>,
    c: Vector3<f64>,
) -> Option<f64> {
    let e1 = b - a;
    let e2 = c - a;
    let pv = dir.cross(&e2);
    let det = e1.dot(&pv);
    if det.abs() <= 1e-14 * e1.norm() * e2.norm() * dir.norm().max(1e-300) {
        return None;
    }
    let inv = 1.0 / det;
    let tv = o - a;
    let uu = tv.dot(&pv) * inv;
    if !(0.0..=1.0).contains(&uu) {
        return None;
    }
    let qv = tv.cross(&e1);
    let vv = dir.dot(&qv) * inv;
    if vv < 0.0 || uu + vv > 1.0 {
        return None;
    }
    Some(e2.dot(&qv) * inv)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cube() -> TriSurf3 {
        TriSurf3::cube(Vector3::zeros(), Vector3::from_element(1.0)).unwrap()
    }

    #[test]
    fn cube_seeds() {
        let g = unit_cube();
        let mut feat = Vec::new();
        g.seed_feat(&mut feat);
        assert_eq!(feat.len(), 8);
        assert!(feat.iter().all(|f| f.feat == Feat::Hard && f.fdim == 0));
        let mut mesh = Vec::new();
        g.seed_mesh(&mut mesh);
        assert!(mesh.is_empty());
    }

    #[test]
    fn inside_outside() {
        let g = unit_cube();
        assert_eq!(g.tria_ball(Vector3::from_element(0.5), -1), Some(0));
        assert!(g.tria_ball(Vector3::new(1.5, 0.5, 0.5), -1).is_none());
        assert!(g.tria_ball(Vector3::from_element(-0.2), -1).is_none());
    }

    #[test]
    fn dual_segment_hits_a_face() {
        let g = unit_cube();
        let hit = g
            .face_ball(
                Vector3::new(0.5, 0.5, 0.5),
                Vector3::new(0.5, 0.5, -0.5),
                Vector3::new(0.25, 0.25, 0.0),
                -1,
            )
            .unwrap();
        assert!((hit.center - Vector3::new(0.5, 0.5, 0.0)).norm() < 1e-12);
        assert_eq!(hit.part, 0);
        assert!(g
            .face_ball(
                Vector3::new(0.4, 0.4, 0.4),
                Vector3::new(0.6, 0.6, 0.6),
                Vector3::new(0.5, 0.5, 0.5),
                -1,
            )
            .is_none());
    }

    #[test]
    fn dual_polygon_hits_a_ridge() {
        let g = unit_cube();
        // Edge along x at the bottom-front ridge (y=0, z=0); the dual
        // polygon straddles the ridge in the x = 0.5 bisector plane.
        let ea = Vector3::new(0.25, 0.0, 0.0);
        let eb = Vector3::new(0.75, 0.0, 0.0);
        let poly = [
            Vector3::new(0.5, -0.4, -0.4),
            Vector3::new(0.5, 0.6, -0.4),
            Vector3::new(0.5, 0.6, 0.6),
            Vector3::new(0.5, -0.4, 0.6),
        ];
        let hit = g.edge_ball(&poly, ea, eb, -1).unwrap();
        assert!((hit.center - Vector3::new(0.5, 0.0, 0.0)).norm() < 1e-12);
        assert!((hit.rsq - 0.0625).abs() < 1e-12);
        // A polygon far from every ridge misses.
        let far = [
            Vector3::new(0.5, 0.3, 0.3),
            Vector3::new(0.5, 0.7, 0.3),
            Vector3::new(0.5, 0.7, 0.7),
            Vector3::new(0.5, 0.3, 0.7),
        ];
        assert!(g.edge_ball(&far, ea, eb, -1).is_none());
    }
}
