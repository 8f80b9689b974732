//! Restricted Delaunay mesh generation in R^2 and R^3.
//!
//! The crate builds a restricted Delaunay triangulation (rDT) over a
//! piecewise-linear domain: the subset of Delaunay simplexes whose dual
//! Voronoi objects intersect the domain. `rdel_make` constructs the rDT for
//! an existing point set in one shot; `rdel_mesh` additionally runs the
//! guided refinement loop, inserting Steiner points until every queued
//! "bad" simplex is eliminated or the iteration budget runs out.
//!
//! Layout
//! - `tri2`/`tri3`: incremental Delaunay kernels (arena + cavity insertion).
//! - `geom2`/`geom3`: domain-oracle traits plus piecewise-linear reference
//!   oracles.
//! - `mesh2`/`mesh3`: the restricted construction-and-refinement cores.
//! - `hfun`, `heap`, `index`, `brio`, `cfg`: spacing oracle, cost heaps,
//!   restricted-face tables, BRIO ordering, options.

pub mod brio;
pub mod cfg;
pub mod geom2;
pub mod geom3;
pub mod heap;
pub mod hfun;
pub mod index;
pub mod mesh2;
pub mod mesh3;
pub mod stats;
pub mod tri2;
pub mod tri3;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::cfg::{Feat, Mode, PointKind, RdelOpts};
    pub use crate::geom2::{Geom2, Pslg2};
    pub use crate::geom3::{Geom3, TriSurf3};
    pub use crate::hfun::{Hfun, Hint, Uniform};
    pub use crate::mesh2::{rdel_make_2d, rdel_mesh_2d, RdelMesh2, RdelStats};
    pub use crate::mesh3::{rdel_make_3d, rdel_mesh_3d, RdelMesh3};
    pub use nalgebra::{Vector2 as Vec2, Vector3 as Vec3};
}
