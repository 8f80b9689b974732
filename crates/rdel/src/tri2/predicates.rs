//! Floating-point predicates for the 2D kernel.
//!
//! Side tests are determinant-based with a magnitude-scaled slack;
//! configurations inside the slack band are reported as degenerate and
//! handled conservatively by the callers (smaller cavities, rejected
//! insertions) rather than propagated as errors.

use nalgebra::Vector2;

use crate::cfg::PRED_EPS;

/// Twice the signed area of (a, b, c); positive when the turn is CCW.
#[inline]
pub fn orient_2d(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> f64 {
    let u = b - a;
    let w = c - a;
    u.x * w.y - u.y * w.x
}

/// Magnitude-scaled degeneracy slack for `orient_2d` values.
#[inline]
pub fn orient_eps_2d(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> f64 {
    let m = a.norm().max(b.norm()).max(c.norm()).max(1.0);
    PRED_EPS * m * m
}

/// Circumball of the triangle (a, b, c): centre and squared radius.
///
/// Returns `None` when the points are collinear within the slack band.
pub fn circ_ball_2d(
    a: Vector2<f64>,
    b: Vector2<f64>,
    c: Vector2<f64>,
) -> Option<(Vector2<f64>, f64)> {
    let u = b - a;
    let w = c - a;
    let det = 2.0 * (u.x * w.y - u.y * w.x);
    if det.abs() <= orient_eps_2d(a, b, c) {
        return None;
    }
    let su = u.norm_squared();
    let sw = w.norm_squared();
    let y = Vector2::new((su * w.y - sw * u.y) / det, (sw * u.x - su * w.x) / det);
    Some((a + y, y.norm_squared()))
}
