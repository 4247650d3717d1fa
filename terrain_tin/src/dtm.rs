//! TIN construction from point clouds, raster tiles and boundary constraints.

use std::collections::HashMap;

use geo::Contains;
use geo_types::{Coord, Polygon};

use crate::boundary::{resample_boundary, ConstraintSequence};
use crate::error::{TerrainError, TerrainResult};
use crate::geometry::{triangle_centroid, Point3};
use crate::raster::RasterTile;
use crate::simplify::{simplify, CollapseCost, StopCondition, VertexPlacement};

/// Triangulated irregular network. Vertex and face identity are positional
/// indices into the dense arrays; every face index is valid.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tin {
    pub vertices: Vec<Point3>,
    pub faces: Vec<[usize; 3]>,
}

/// Points deduplicated by exact planar coordinates. The first occurrence of
/// an `(x, y)` pair wins; later z values at the same spot are dropped.
struct PlanarIndex {
    points: Vec<Point3>,
    seen: HashMap<(u64, u64), usize>,
}

impl PlanarIndex {
    fn new() -> Self {
        Self {
            points: Vec::new(),
            seen: HashMap::new(),
        }
    }

    fn insert(&mut self, p: Point3) -> usize {
        let key = (p.x.to_bits(), p.y.to_bits());
        if let Some(&idx) = self.seen.get(&key) {
            return idx;
        }
        let idx = self.points.len();
        self.seen.insert(key, idx);
        self.points.push(p);
        idx
    }
}

impl Tin {
    /// Unconstrained Delaunay triangulation of a point cloud projected to the
    /// XY plane, z carried as elevation.
    pub fn from_points(points: Vec<Point3>) -> Self {
        let mut index = PlanarIndex::new();
        for p in points {
            index.insert(p);
        }
        let vertices = index.points;
        let sites: Vec<delaunator::Point> = vertices
            .iter()
            .map(|p| delaunator::Point { x: p.x, y: p.y })
            .collect();
        let triangulation = delaunator::triangulate(&sites);
        let faces = triangulation
            .triangles
            .chunks(3)
            .map(|t| [t[0], t[1], t[2]])
            .collect();
        Self { vertices, faces }
    }

    /// Constrained Delaunay triangulation. `constraints` are polylines forced
    /// into the mesh as edges; faces whose centroid falls outside `inclusion`
    /// are dropped afterwards. Vertices survive the face filter, so a mesh
    /// with zero faces but all input points is a valid result.
    pub fn from_points_constrained(
        points: Vec<Point3>,
        constraints: &[ConstraintSequence],
        inclusion: &Polygon<f64>,
    ) -> TerrainResult<Self> {
        let mut index = PlanarIndex::new();
        for p in points {
            index.insert(p);
        }
        let mut edges: Vec<(usize, usize)> = Vec::new();
        for sequence in constraints {
            let ids: Vec<usize> = sequence.iter().map(|&p| index.insert(p)).collect();
            for pair in ids.windows(2) {
                if pair[0] == pair[1] {
                    continue;
                }
                edges.push((pair[0].min(pair[1]), pair[0].max(pair[1])));
            }
        }
        edges.sort_unstable();
        edges.dedup();

        let vertices = index.points;
        let sites: Vec<(f64, f64)> = vertices.iter().map(|p| (p.x, p.y)).collect();
        let triangles = if edges.is_empty() {
            cdt::triangulate_points(&sites)
        } else {
            cdt::triangulate_with_edges(&sites, &edges)
        }
        .map_err(|e| TerrainError::Triangulation(format!("{e:?}")))?;
        log::debug!(
            "triangulated {} sites with {} constraint edges into {} faces",
            vertices.len(),
            edges.len(),
            triangles.len()
        );

        let faces = triangles
            .into_iter()
            .map(|(a, b, c)| [a, b, c])
            .filter(|&[a, b, c]| {
                let centroid = triangle_centroid(vertices[a], vertices[b], vertices[c]);
                inclusion.contains(&Coord {
                    x: centroid.x,
                    y: centroid.y,
                })
            })
            .collect();
        Ok(Self { vertices, faces })
    }
}

/// Triangulates every node of `tile` and simplifies the result.
pub fn tin_from_raster<S, C, P>(tile: &RasterTile, stop: &S, cost: &C, placement: &P) -> Tin
where
    S: StopCondition,
    C: CollapseCost,
    P: VertexPlacement,
{
    let tin = Tin::from_points(tile.raster_points());
    simplify(&tin, stop, cost, placement)
}

/// Boundary-constrained variant of [`tin_from_raster`] for a single tile.
pub fn tin_from_raster_with_boundary<S, C, P>(
    tile: &RasterTile,
    boundary: &Polygon<f64>,
    stop: &S,
    cost: &C,
    placement: &P,
) -> TerrainResult<Tin>
where
    S: StopCondition,
    C: CollapseCost,
    P: VertexPlacement,
{
    tin_from_rasters_with_boundary(std::slice::from_ref(tile), boundary, stop, cost, placement)
}

/// Assembles one TIN from several raster tiles clipped to `boundary`.
///
/// Every tile contributes its grid nodes and its resampled boundary
/// constraints; nodes shared by overlapping tile edges merge before a single
/// constrained triangulation runs over the union.
pub fn tin_from_rasters_with_boundary<S, C, P>(
    tiles: &[RasterTile],
    boundary: &Polygon<f64>,
    stop: &S,
    cost: &C,
    placement: &P,
) -> TerrainResult<Tin>
where
    S: StopCondition,
    C: CollapseCost,
    P: VertexPlacement,
{
    let mut points = Vec::new();
    let mut constraints = Vec::new();
    for tile in tiles {
        points.extend(tile.raster_points());
        constraints.extend(resample_boundary(tile, boundary));
    }
    let tin = Tin::from_points_constrained(points, &constraints, boundary)?;
    Ok(simplify(&tin, stop, cost, placement))
}
