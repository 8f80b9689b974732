//! Incremental Delaunay kernel in R^2.
//!
//! A node/tria arena with explicit liveness flags and free lists, plus
//! Bowyer-Watson point insertion: locate by orientation walk, grow the
//! cavity of circumball-violating trias, retriangulate the cavity boundary
//! as a fan around the new node. Dead cells are only recycled when the
//! caller says so, after it has scrubbed any face records derived from
//! them.

mod kernel;
mod predicates;

pub use kernel::{Cavity2, Del2, Node2, Tria2, NIL};
pub use predicates::{circ_ball_2d, orient_2d};
