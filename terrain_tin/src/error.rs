//! Error types for terrain construction.

use thiserror::Error;

/// Errors that can occur while building terrain surfaces.
#[derive(Debug, Error)]
pub enum TerrainError {
    /// Raster grid with fewer than two nodes along an axis.
    #[error("Raster too small: {num_points_x}x{num_points_y} nodes (need at least 2x2)")]
    RasterTooSmall {
        num_points_x: usize,
        num_points_y: usize,
    },

    /// Raster node spacing that is zero or negative.
    #[error("Invalid raster spacing: {delta_x}x{delta_y} (must be positive)")]
    RasterSpacing { delta_x: f64, delta_y: f64 },

    /// Raster data not matching the declared grid shape.
    #[error("Raster data length mismatch: expected {expected} values, got {actual}")]
    RasterDataLength { expected: usize, actual: usize },

    /// Input sites or constraints rejected by the triangulation engine.
    #[error("Triangulation failed: {0}")]
    Triangulation(String),
}

/// Result type for terrain construction operations.
pub type TerrainResult<T> = std::result::Result<T, TerrainError>;
