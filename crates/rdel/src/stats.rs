//! Run statistics reported by the construction/refinement entry points.

use crate::cfg::PointKind;

/// Counters for one `rdel_make`/`rdel_mesh` run.
#[derive(Clone, Copy, Debug, Default)]
pub struct RdelStats {
    /// Iterations consumed (phase transitions included).
    pub passes: u32,
    /// Steiner points inserted on 1-dimensional faces, per point kind.
    pub steiner_edge: [u64; PointKind::COUNT],
    /// Steiner points inserted on 2/3-dimensional faces, per point kind.
    pub steiner_cell: [u64; PointKind::COUNT],
    /// Restricted face counts at exit (|rDEL-0| .. |rDEL-3|).
    pub n_ball: usize,
    pub n_edge: usize,
    pub n_face: usize,
    pub n_cell: usize,
    /// Duplicate boundary faces seen by the most recent face re-test (3D).
    pub dup_last: usize,
    /// False when the iteration budget ran out first.
    pub converged: bool,
}

impl RdelStats {
    /// Total Steiner points inserted.
    pub fn steiner_total(&self) -> u64 {
        self.steiner_edge.iter().sum::<u64>() + self.steiner_cell.iter().sum::<u64>()
    }

    pub(crate) fn count(&mut self, kind: PointKind, tdim: u8) {
        if tdim <= 1 {
            self.steiner_edge[kind.slot()] += 1;
        } else {
            self.steiner_cell[kind.slot()] += 1;
        }
    }
}
