//! Restricted Delaunay construction and refinement in R^3.
//!
//! `rdel_make_3d` builds the restricted face sets (balls, ridge edges,
//! surface faces, cells up to `opts.dims`) over the Delaunay triangulation
//! of the input points; `rdel_mesh_3d` additionally refines bad balls,
//! edges, topology defects and cells. Surface faces are constructed but
//! carry no refinement queue; their duplicate counter gates the cell-sign
//! seeding instead.

mod cavity;
mod driver;
mod rules;
mod types;

pub use driver::{rdel_make_3d, rdel_mesh_3d, rdel_mesh_3d_with};
pub use rules::{RuleSet3, StdRules3};
pub use types::{Ball3, BallKind, EdgeDat3, FaceDat3, RdelMesh3, TetDat3};

pub use crate::stats::RdelStats;
