//! Options, phase/kind enums and tolerance defaults.
//!
//! Policy
//! - Tolerances are fixed constants; they are not part of the public options
//!   block. Adjustments are rare and would go through a small config struct
//!   without changing call sites broadly.

/// Degeneracy threshold for orientation/side predicates, scaled by the
/// magnitude of the operands before use.
pub(crate) const PRED_EPS: f64 = 1e-12;

/// Two points closer than this (Euclidean distance) are treated as one;
/// the kernel rejects the second insertion.
pub(crate) const DUPL_TOL: f64 = 1e-12;

/// Feature dimension assigned to super-simplex vertices in R^2.
pub(crate) const SUPER_FDIM_2: u8 = 3;
/// Feature dimension assigned to super-simplex vertices in R^3.
pub(crate) const SUPER_FDIM_3: u8 = 4;

/// Feature classification carried on nodes and restricted faces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Feat {
    /// Not on a sharp feature.
    #[default]
    None,
    /// On a smooth-but-tagged feature; protected by positive-radius balls.
    Soft,
    /// On a sharp feature (corner); protected by a zero-radius ball.
    Hard,
}

/// Refinement phase of the driver state machine.
///
/// Transitions are monotone: Null -> Node -> Edge -> Etop -> Tria, never
/// backwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Mode {
    #[default]
    Null,
    Node,
    Edge,
    Etop,
    Tria,
}

/// Kind tag of an inserted Steiner point, reported by the refinement rules
/// so the driver can keep per-kind histograms.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointKind {
    /// Circumcentre (edge surface-ball centre, or cell circumcentre).
    Circ,
    /// h-weighted off-centre along the face.
    Offh,
    /// Circumcentre off-centre for cells.
    Offc,
    /// Disk/ridge point from a topology split.
    Disk,
    /// Sink-rule fallback (cell centroid).
    Sink,
}

impl PointKind {
    /// Number of distinct kinds (histogram width).
    pub const COUNT: usize = 5;

    #[inline]
    pub(crate) fn slot(self) -> usize {
        match self {
            PointKind::Circ => 0,
            PointKind::Offh => 1,
            PointKind::Offc => 2,
            PointKind::Disk => 3,
            PointKind::Sink => 4,
        }
    }
}

/// Options for `rdel_make` / `rdel_mesh`.
///
/// `dims` bounds the dimension of restricted faces that are built; `iter`
/// is a hard safety cap on refinement iterations; the `siz*`/`rad*`
/// thresholds are consumed by the standard rule set, not by the core loop.
#[derive(Clone, Copy, Debug)]
pub struct RdelOpts {
    /// Upper dimension of restricted faces to build (0..=3).
    pub dims: u8,
    /// Hard cap on refinement iterations.
    pub iter: u32,
    /// Verbosity of the end-of-run statistics log.
    pub verb: u8,
    /// Enable the edge-topology (Etop) phase.
    pub top1: bool,
    /// Seed for the driver-owned PRNG (BRIO shuffling).
    pub seed: u64,
    /// Edge size threshold: an edge is bad when its surface-ball diameter
    /// exceeds `siz1 * h`.
    pub siz1: f64,
    /// Cell size threshold in R^2.
    pub siz2: f64,
    /// Cell size threshold in R^3.
    pub siz3: f64,
    /// Radius-edge ratio limit for cells in R^2.
    pub rad2: f64,
    /// Radius-edge ratio limit for cells in R^3.
    pub rad3: f64,
    /// Heap/scratch compaction cadence, in iterations.
    pub trim_freq: u32,
}

impl Default for RdelOpts {
    fn default() -> Self {
        Self {
            dims: 3,
            iter: 1_000_000,
            verb: 0,
            top1: true,
            seed: 1,
            siz1: 1.333,
            siz2: 1.300,
            siz3: 1.167,
            rad2: 1.05,
            rad3: 2.05,
            trim_freq: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_order_is_monotone() {
        assert!(Mode::Null < Mode::Node);
        assert!(Mode::Node < Mode::Edge);
        assert!(Mode::Edge < Mode::Etop);
        assert!(Mode::Etop < Mode::Tria);
    }

    #[test]
    fn kind_slots_are_distinct() {
        let slots = [
            PointKind::Circ.slot(),
            PointKind::Offh.slot(),
            PointKind::Offc.slot(),
            PointKind::Disk.slot(),
            PointKind::Sink.slot(),
        ];
        for (i, a) in slots.iter().enumerate() {
            assert!(*a < PointKind::COUNT);
            for b in slots.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
