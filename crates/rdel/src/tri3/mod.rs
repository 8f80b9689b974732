//! Incremental Delaunay kernel in R^3.
//!
//! Tetrahedral counterpart of `tri2`: arena, orientation-walk location,
//! circumball cavity growth and boundary-shell retriangulation. Also
//! exposes the edge-ring walk used to assemble the Voronoi polygon dual to
//! a Delaunay edge.

mod kernel;
mod predicates;

pub use kernel::{Cavity3, Del3, Node3, Tet3, EDGES_3, FACES_3, NIL};
pub use predicates::{circ_ball_3d, orient_3d};
