//! Restricted Delaunay construction and refinement in R^2.
//!
//! `rdel_make_2d` builds the restricted face sets (balls, edges, cells up
//! to `opts.dims`) over the Delaunay triangulation of the input points;
//! `rdel_mesh_2d` additionally refines bad faces with Steiner insertions
//! until convergence. See `driver` for the phase machine, `cavity` for the
//! incremental face-set updates and `rules` for the Steiner policy.

mod cavity;
mod driver;
mod rules;
mod types;

pub use driver::{rdel_make_2d, rdel_mesh_2d, rdel_mesh_2d_with};
pub use rules::{RuleSet2, StdRules2};
pub use types::{Ball2, BallKind, EdgeDat2, RdelMesh2, TriaDat2};

pub use crate::stats::RdelStats;
