//! Resampling of boundary polygons against raster grids.

use geo::BooleanOps;
use geo_types::Polygon;

use crate::geometry::Point3;
use crate::raster::RasterTile;

/// One polyline of constraint points for the triangulation.
pub type ConstraintSequence = Vec<Point3>;

/// Intersects `boundary` with the raster's bounding rectangle and resamples
/// the outline of the intersection into constraint point sequences at raster
/// resolution, one sequence per retained edge.
///
/// Edges lying on the raster rectangle itself are skipped because the grid
/// nodes already represent them. Holes in the intersection are not
/// resampled.
pub fn resample_boundary(tile: &RasterTile, boundary: &Polygon<f64>) -> Vec<ConstraintSequence> {
    let clipped = tile.exterior_polygon().intersection(boundary);
    let mut sequences = Vec::new();
    for part in &clipped {
        for edge in part.exterior().lines() {
            let mid_x = (edge.start.x + edge.end.x) / 2.0;
            let mid_y = (edge.start.y + edge.end.y) / 2.0;
            if !tile.contains(mid_x, mid_y) {
                continue;
            }
            let len_x = edge.end.x - edge.start.x;
            let len_y = edge.end.y - edge.start.y;
            let ratio = (len_x / tile.delta_x).abs().max((len_y / tile.delta_y).abs());
            let num_subedges = (ratio as usize).max(1);
            let mut sequence: ConstraintSequence = Vec::with_capacity(num_subedges + 1);
            for step in 0..=num_subedges {
                let t = step as f64 / num_subedges as f64;
                let x = edge.start.x + t * len_x;
                let y = edge.start.y + t * len_y;
                let is_new = sequence.last().map_or(true, |p| p.x != x || p.y != y);
                if is_new {
                    sequence.push(Point3::new(x, y, tile.interpolate(x, y)));
                }
            }
            sequences.push(sequence);
        }
    }
    sequences
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::LineString;

    fn flat_tile() -> RasterTile {
        // 10x10 nodes spanning a 9x9 square, sampling the plane z = x.
        let mut data = Vec::new();
        for _row in 0..10 {
            for col in 0..10 {
                data.push(col as f64);
            }
        }
        RasterTile::new(0.0, 9.0, 1.0, 1.0, 10, 10, data).unwrap()
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]),
            vec![],
        )
    }

    #[test]
    fn raster_rectangle_produces_no_sequences() {
        let tile = flat_tile();
        let sequences = resample_boundary(&tile, &square(0.0, 0.0, 9.0, 9.0));
        assert!(sequences.is_empty());
    }

    #[test]
    fn boundary_outside_raster_produces_no_sequences() {
        let tile = flat_tile();
        let sequences = resample_boundary(&tile, &square(20.0, 20.0, 30.0, 30.0));
        assert!(sequences.is_empty());
    }

    #[test]
    fn interior_square_resamples_every_edge() {
        let tile = flat_tile();
        let sequences = resample_boundary(&tile, &square(2.5, 2.5, 6.5, 6.5));
        assert_eq!(sequences.len(), 4);
        for sequence in &sequences {
            // Each 4-unit edge splits into 4 subedges sampled at 5 points.
            assert_eq!(sequence.len(), 5);
            for point in sequence {
                assert!((point.z - point.x).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn short_edges_still_produce_both_endpoints() {
        let tile = flat_tile();
        let sequences = resample_boundary(&tile, &square(4.0, 4.0, 4.4, 4.4));
        assert_eq!(sequences.len(), 4);
        for sequence in &sequences {
            assert_eq!(sequence.len(), 2);
        }
    }

    #[test]
    fn straddling_square_keeps_only_interior_edges() {
        let tile = flat_tile();
        // Extends past the left edge of the raster; the clipped western edge
        // lies on the raster rectangle and is dropped.
        let sequences = resample_boundary(&tile, &square(-3.0, 3.0, 4.0, 6.0));
        assert_eq!(sequences.len(), 3);
        let mut lengths: Vec<usize> = sequences.iter().map(|s| s.len()).collect();
        lengths.sort_unstable();
        // Two 4-unit edges and one 3-unit edge survive the clip.
        assert_eq!(lengths, vec![4, 5, 5]);
        for sequence in &sequences {
            for point in sequence {
                assert!((point.z - point.x).abs() < 1e-9);
            }
        }
    }
}
