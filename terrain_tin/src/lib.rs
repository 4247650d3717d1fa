//! Terrain surface modelling from elevation rasters.
//!
//! Turns regular elevation grids into simplified, boundary-constrained
//! triangulated surfaces and derives analytics from them: slope, aspect,
//! solar shadow masks and geometric terrain classification.

pub mod boundary;
pub mod bvh;
pub mod classify;
pub mod dtm;
pub mod error;
pub mod geometry;
pub mod io;
pub mod metrics;
pub mod raster;
pub mod shadow;
pub mod simplify;

pub use dtm::Tin;
pub use error::{TerrainError, TerrainResult};
