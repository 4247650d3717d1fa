//! Regular elevation grids with bilinear sampling.

use geo_types::{LineString, Polygon};

use crate::error::{TerrainError, TerrainResult};
use crate::geometry::Point3;

/// Regular elevation grid anchored at its upper-left node.
///
/// `data` is stored row-major from the top row (`y_max`) downward, `x_min`
/// rightward.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RasterTile {
    pub x_min: f64,
    pub y_max: f64,
    pub delta_x: f64,
    pub delta_y: f64,
    pub num_points_x: usize,
    pub num_points_y: usize,
    pub data: Vec<f64>,
}

impl RasterTile {
    /// Creates a raster tile, validating grid shape, spacing and data length.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        x_min: f64,
        y_max: f64,
        delta_x: f64,
        delta_y: f64,
        num_points_x: usize,
        num_points_y: usize,
        data: Vec<f64>,
    ) -> TerrainResult<Self> {
        if num_points_x < 2 || num_points_y < 2 {
            return Err(TerrainError::RasterTooSmall {
                num_points_x,
                num_points_y,
            });
        }
        if delta_x <= 0.0 || delta_y <= 0.0 {
            return Err(TerrainError::RasterSpacing { delta_x, delta_y });
        }
        let expected = num_points_x * num_points_y;
        if data.len() != expected {
            return Err(TerrainError::RasterDataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            x_min,
            y_max,
            delta_x,
            delta_y,
            num_points_x,
            num_points_y,
            data,
        })
    }

    /// X coordinate of the rightmost column of nodes.
    pub fn x_max(&self) -> f64 {
        self.x_min + (self.num_points_x - 1) as f64 * self.delta_x
    }

    /// Y coordinate of the bottom row of nodes.
    pub fn y_min(&self) -> f64 {
        self.y_max - (self.num_points_y - 1) as f64 * self.delta_y
    }

    /// Elevation stored at node `(row, col)`.
    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.num_points_x + col]
    }

    /// Materializes every grid node as a 3D point, row-major from the top
    /// row downward. Downstream indexing by position relies on this order.
    pub fn raster_points(&self) -> Vec<Point3> {
        let mut points = Vec::with_capacity(self.num_points_x * self.num_points_y);
        for row in 0..self.num_points_y {
            let y = self.y_max - row as f64 * self.delta_y;
            for col in 0..self.num_points_x {
                let x = self.x_min + col as f64 * self.delta_x;
                points.push(Point3::new(x, y, self.value(row, col)));
            }
        }
        points
    }

    /// Maps a planar coordinate to the `(row, col)` of the upper-left node
    /// of the cell containing it. Coordinates outside the grid clamp to the
    /// nearest node instead of erroring.
    pub fn cell_indices(&self, x: f64, y: f64) -> (usize, usize) {
        let col = ((x - self.x_min) / self.delta_x) as isize;
        let row = ((self.y_max - y) / self.delta_y) as isize;
        (
            row.clamp(0, self.num_points_y as isize - 1) as usize,
            col.clamp(0, self.num_points_x as isize - 1) as usize,
        )
    }

    /// Bilinear interpolation of the elevation at `(x, y)` over the four
    /// corners of the containing cell. Reproduces stored values exactly at
    /// grid nodes; the cell clamps to the grid so queries on the last row or
    /// column stay in bounds.
    pub fn interpolate(&self, x: f64, y: f64) -> f64 {
        let (row, col) = self.cell_indices(x, y);
        let i = row.min(self.num_points_y - 2);
        let j = col.min(self.num_points_x - 2);
        let x0 = self.x_min + j as f64 * self.delta_x;
        let x1 = self.x_min + (j + 1) as f64 * self.delta_x;
        let y0 = self.y_max - i as f64 * self.delta_y;
        let y1 = self.y_max - (i + 1) as f64 * self.delta_y;
        self.value(i, j) * (x1 - x) / self.delta_x * (y - y1) / self.delta_y
            + self.value(i + 1, j) * (x1 - x) / self.delta_x * (y0 - y) / self.delta_y
            + self.value(i, j + 1) * (x - x0) / self.delta_x * (y - y1) / self.delta_y
            + self.value(i + 1, j + 1) * (x - x0) / self.delta_x * (y0 - y) / self.delta_y
    }

    /// Strict interior test with a small margin on every side, used to tell
    /// interior boundary crossings apart from edges lying on the grid
    /// rectangle itself.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let eps = 1e-10 * (self.delta_x.powi(2) + self.delta_y.powi(2)).sqrt();
        x > self.x_min + eps
            && x < self.x_max() - eps
            && y > self.y_min() + eps
            && y < self.y_max - eps
    }

    /// Bounding rectangle of the grid, counter-clockwise from the lower-left
    /// corner.
    pub fn exterior_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.x_min, self.y_min()),
                (self.x_max(), self.y_min()),
                (self.x_max(), self.y_max),
                (self.x_min, self.y_max),
            ]),
            vec![],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_3x3() -> RasterTile {
        // Top row first: z rises with x, falls with y.
        let data = vec![
            6.0, 7.0, 8.0, //
            3.0, 4.0, 5.0, //
            0.0, 1.0, 2.0,
        ];
        RasterTile::new(0.0, 2.0, 1.0, 1.0, 3, 3, data).unwrap()
    }

    #[test]
    fn new_rejects_small_grid() {
        let err = RasterTile::new(0.0, 0.0, 1.0, 1.0, 1, 3, vec![0.0; 3]);
        assert!(matches!(err, Err(TerrainError::RasterTooSmall { .. })));
    }

    #[test]
    fn new_rejects_bad_spacing() {
        let err = RasterTile::new(0.0, 0.0, 1.0, -0.5, 2, 2, vec![0.0; 4]);
        assert!(matches!(err, Err(TerrainError::RasterSpacing { .. })));
    }

    #[test]
    fn new_rejects_data_mismatch() {
        let err = RasterTile::new(0.0, 0.0, 1.0, 1.0, 2, 2, vec![0.0; 3]);
        assert!(matches!(
            err,
            Err(TerrainError::RasterDataLength {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn extents_derive_from_spacing() {
        let tile = tile_3x3();
        assert!((tile.x_max() - 2.0).abs() < 1e-12);
        assert!((tile.y_min() - 0.0).abs() < 1e-12);
    }

    #[test]
    fn raster_points_run_row_major_from_top() {
        let tile = RasterTile::new(0.0, 1.0, 1.0, 1.0, 2, 2, vec![10.0, 11.0, 12.0, 13.0]).unwrap();
        let points = tile.raster_points();
        assert_eq!(points.len(), 4);
        assert_eq!((points[0].x, points[0].y, points[0].z), (0.0, 1.0, 10.0));
        assert_eq!((points[1].x, points[1].y, points[1].z), (1.0, 1.0, 11.0));
        assert_eq!((points[2].x, points[2].y, points[2].z), (0.0, 0.0, 12.0));
        assert_eq!((points[3].x, points[3].y, points[3].z), (1.0, 0.0, 13.0));
    }

    #[test]
    fn cell_indices_clamp_outside_coordinates() {
        let tile = tile_3x3();
        assert_eq!(tile.cell_indices(-5.0, 10.0), (0, 0));
        assert_eq!(tile.cell_indices(10.0, -5.0), (2, 2));
        assert_eq!(tile.cell_indices(0.5, 1.5), (0, 0));
        assert_eq!(tile.cell_indices(1.5, 0.5), (1, 1));
    }

    #[test]
    fn interpolate_reproduces_node_values() {
        let tile = tile_3x3();
        for row in 0..3 {
            for col in 0..3 {
                let x = col as f64;
                let y = 2.0 - row as f64;
                assert_eq!(tile.interpolate(x, y), tile.value(row, col));
            }
        }
    }

    #[test]
    fn interpolate_cell_center_averages_corners() {
        let tile = tile_3x3();
        // Center of the top-left cell: corners 6, 7, 3, 4.
        assert!((tile.interpolate(0.5, 1.5) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn interpolate_extends_edge_cells_beyond_grid() {
        // The grid samples the plane z = x + 3y, which bilinear interpolation
        // continues across the clamped edge cell.
        let tile = tile_3x3();
        assert_eq!(tile.interpolate(5.0, -3.0), 5.0 + 3.0 * -3.0);
    }

    #[test]
    fn contains_excludes_rectangle_edges() {
        let tile = tile_3x3();
        assert!(tile.contains(1.0, 1.0));
        assert!(!tile.contains(0.0, 1.0));
        assert!(!tile.contains(1.0, 2.0));
        assert!(!tile.contains(2.0, 1.0));
        assert!(!tile.contains(1.0, 0.0));
        assert!(!tile.contains(-1.0, 1.0));
    }

    #[test]
    fn exterior_polygon_starts_at_lower_left() {
        let tile = tile_3x3();
        let polygon = tile.exterior_polygon();
        let ring = polygon.exterior();
        assert_eq!(ring.0[0].x, 0.0);
        assert_eq!(ring.0[0].y, 0.0);
        assert_eq!(ring.0[2].x, 2.0);
        assert_eq!(ring.0[2].y, 2.0);
        assert_eq!(ring.0.len(), 5);
    }
}
