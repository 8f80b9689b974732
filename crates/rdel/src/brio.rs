//! Biased randomised insertion order (BRIO) over a recursive AABB split.
//!
//! The point set is partitioned by a recursive longest-axis median split
//! with leaf size `8^d`; the emission order walks the tree with the child
//! order shuffled by the driver's PRNG. This keeps spatial locality for the
//! Delaunay kernel's locate walk while breaking adversarial orderings, and
//! is fully reproducible from the PRNG seed.

use nalgebra::SVector;
use rand::rngs::StdRng;
use rand::Rng;

/// Return indices into `pts` in BRIO order.
pub fn brio_order<const D: usize>(pts: &[SVector<f64, D>], rng: &mut StdRng) -> Vec<u32> {
    let leaf = 8usize.pow(D as u32);
    let mut idx: Vec<u32> = (0..pts.len() as u32).collect();
    let mut out = Vec::with_capacity(idx.len());
    emit(pts, &mut idx, leaf, rng, &mut out);
    out
}

fn emit<const D: usize>(
    pts: &[SVector<f64, D>],
    idx: &mut [u32],
    leaf: usize,
    rng: &mut StdRng,
    out: &mut Vec<u32>,
) {
    if idx.len() <= leaf {
        out.extend_from_slice(idx);
        return;
    }
    // Split across the longest axis of the bounding box at the median.
    let mut lo = [f64::INFINITY; D];
    let mut hi = [f64::NEG_INFINITY; D];
    for &i in idx.iter() {
        let p = &pts[i as usize];
        for a in 0..D {
            lo[a] = lo[a].min(p[a]);
            hi[a] = hi[a].max(p[a]);
        }
    }
    let mut axis = 0usize;
    for a in 1..D {
        if hi[a] - lo[a] > hi[axis] - lo[axis] {
            axis = a;
        }
    }
    let mid = idx.len() / 2;
    idx.select_nth_unstable_by(mid, |&a, &b| {
        let pa = pts[a as usize][axis];
        let pb = pts[b as usize][axis];
        pa.partial_cmp(&pb)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let (left, right) = idx.split_at_mut(mid);
    if rng.gen_bool(0.5) {
        emit(pts, right, leaf, rng, out);
        emit(pts, left, leaf, rng, out);
    } else {
        emit(pts, left, leaf, rng, out);
        emit(pts, right, leaf, rng, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;
    use rand::SeedableRng;

    fn grid(n: usize) -> Vec<Vector2<f64>> {
        let mut pts = Vec::new();
        for i in 0..n {
            for j in 0..n {
                pts.push(Vector2::new(i as f64, j as f64));
            }
        }
        pts
    }

    #[test]
    fn emits_every_point_exactly_once() {
        let pts = grid(20);
        let mut rng = StdRng::seed_from_u64(1);
        let order = brio_order(&pts, &mut rng);
        let mut seen = vec![false; pts.len()];
        for i in &order {
            assert!(!seen[*i as usize]);
            seen[*i as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn reproducible_for_equal_seeds() {
        let pts = grid(17);
        let mut r1 = StdRng::seed_from_u64(42);
        let mut r2 = StdRng::seed_from_u64(42);
        assert_eq!(brio_order(&pts, &mut r1), brio_order(&pts, &mut r2));
    }

    #[test]
    fn small_sets_pass_through() {
        let pts = grid(3); // 9 points, below the 2D leaf size
        let mut rng = StdRng::seed_from_u64(7);
        let order = brio_order(&pts, &mut rng);
        assert_eq!(order, (0..9).collect::<Vec<u32>>());
    }
}
