//! Floating-point predicates for the 3D kernel.

use nalgebra::{Matrix3, Vector3};

use crate::cfg::PRED_EPS;

/// Signed volume form: positive when `(b-a, c-a, d-a)` is right-handed,
/// i.e. `d` lies on the positive-normal side of the triangle (a, b, c).
#[inline]
pub fn orient_3d(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>, d: Vector3<f64>) -> f64 {
    let u = b - a;
    let v = c - a;
    let w = d - a;
    u.dot(&v.cross(&w))
}

/// Magnitude-scaled degeneracy slack for `orient_3d` values.
#[inline]
pub fn orient_eps_3d(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>, d: Vector3<f64>) -> f64 {
    let m = a.norm().max(b.norm()).max(c.norm()).max(d.norm()).max(1.0);
    PRED_EPS * m * m * m
}

/// Circumball of the tetrahedron (a, b, c, d): centre and squared radius.
///
/// Returns `None` when the points are coplanar within the slack band.
pub fn circ_ball_3d(
    a: Vector3<f64>,
    b: Vector3<f64>,
    c: Vector3<f64>,
    d: Vector3<f64>,
) -> Option<(Vector3<f64>, f64)> {
    let u = b - a;
    let v = c - a;
    let w = d - a;
    let det = u.dot(&v.cross(&w));
    if det.abs() <= orient_eps_3d(a, b, c, d) {
        return None;
    }
    let m = Matrix3::from_rows(&[u.transpose(), v.transpose(), w.transpose()]) * 2.0;
    let rhs = Vector3::new(u.norm_squared(), v.norm_squared(), w.norm_squared());
    let y = m.try_inverse()? * rhs;
    Some((a + y, y.norm_squared()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orientation_signs() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(1.0, 0.0, 0.0);
        let c = Vector3::new(0.0, 1.0, 0.0);
        assert!(orient_3d(a, b, c, Vector3::new(0.0, 0.0, 1.0)) > 0.0);
        assert!(orient_3d(a, b, c, Vector3::new(0.0, 0.0, -1.0)) < 0.0);
        assert_eq!(orient_3d(a, b, c, Vector3::new(0.3, 0.3, 0.0)), 0.0);
    }

    #[test]
    fn circumball_of_corner_tet() {
        let (c, rsq) = circ_ball_3d(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(0.0, 2.0, 0.0),
            Vector3::new(0.0, 0.0, 2.0),
        )
        .unwrap();
        assert!((c - Vector3::new(1.0, 1.0, 1.0)).norm() < 1e-12);
        assert!((rsq - 3.0).abs() < 1e-12);
    }

    #[test]
    fn coplanar_points_have_no_ball() {
        assert!(circ_ball_3d(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        )
        .is_none());
    }
}
