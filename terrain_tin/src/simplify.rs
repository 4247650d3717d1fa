//! Edge-collapse mesh simplification with pluggable policies.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use nalgebra::Vector3;

use crate::dtm::Tin;
use crate::geometry::Point3;

/// Accumulated squared plane distances for one vertex, stored as the upper
/// triangle of the symmetric 4x4 quadric matrix.
#[derive(Debug, Clone, Copy, Default)]
pub struct Quadric {
    q: [f64; 10],
}

impl Quadric {
    /// Quadric of a single plane `ax + by + cz + d = 0` with unit normal.
    pub fn from_plane(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            q: [
                a * a,
                a * b,
                a * c,
                a * d,
                b * b,
                b * c,
                b * d,
                c * c,
                c * d,
                d * d,
            ],
        }
    }

    /// Adds another quadric into this one.
    pub fn add(&mut self, other: &Quadric) {
        for (lhs, rhs) in self.q.iter_mut().zip(other.q.iter()) {
            *lhs += rhs;
        }
    }

    /// Squared distance of `(x, y, z)` to the accumulated planes.
    pub fn evaluate(&self, x: f64, y: f64, z: f64) -> f64 {
        let q = &self.q;
        q[0] * x * x
            + 2.0 * q[1] * x * y
            + 2.0 * q[2] * x * z
            + 2.0 * q[3] * x
            + q[4] * y * y
            + 2.0 * q[5] * y * z
            + 2.0 * q[6] * y
            + q[7] * z * z
            + 2.0 * q[8] * z
            + q[9]
    }

    /// Position minimizing the quadric error, or `None` when the system is
    /// near-singular.
    pub fn optimal_point(&self) -> Option<[f64; 3]> {
        let q = &self.q;
        let det = q[0] * (q[4] * q[7] - q[5] * q[5]) - q[1] * (q[1] * q[7] - q[5] * q[2])
            + q[2] * (q[1] * q[5] - q[4] * q[2]);
        if det.abs() < 1e-10 {
            return None;
        }
        let bx = -q[3];
        let by = -q[6];
        let bz = -q[8];
        let x = (bx * (q[4] * q[7] - q[5] * q[5]) - q[1] * (by * q[7] - q[5] * bz)
            + q[2] * (by * q[5] - q[4] * bz))
            / det;
        let y = (q[0] * (by * q[7] - q[5] * bz) - bx * (q[1] * q[7] - q[5] * q[2])
            + q[2] * (q[1] * bz - by * q[2]))
            / det;
        let z = (q[0] * (q[4] * bz - by * q[5]) - q[1] * (q[1] * bz - by * q[2])
            + bx * (q[1] * q[5] - q[4] * q[2]))
            / det;
        Some([x, y, z])
    }
}

/// Decides when the collapse loop is done. Checked before every collapse, so
/// a condition that is satisfied immediately leaves the mesh untouched.
pub trait StopCondition {
    fn finished(&self, live_edges: usize, initial_edges: usize) -> bool;
}

/// Stops once the live edge count drops below a fixed number.
#[derive(Debug, Clone, Copy)]
pub struct EdgeCountStop {
    pub edges: usize,
}

impl StopCondition for EdgeCountStop {
    fn finished(&self, live_edges: usize, _initial_edges: usize) -> bool {
        live_edges < self.edges
    }
}

/// Stops once the live edge count drops below a fraction of the initial
/// count.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRatioStop {
    pub ratio: f64,
}

impl StopCondition for EdgeRatioStop {
    fn finished(&self, live_edges: usize, initial_edges: usize) -> bool {
        (live_edges as f64) < self.ratio * initial_edges as f64
    }
}

/// Scores a candidate collapse; cheaper edges collapse first.
pub trait CollapseCost {
    fn cost(&self, p1: Point3, p2: Point3, placed: Point3, quadric: &Quadric) -> f64;
}

/// Quadric error of the merged vertex position.
#[derive(Debug, Clone, Copy)]
pub struct QuadricCost;

impl CollapseCost for QuadricCost {
    fn cost(&self, _p1: Point3, _p2: Point3, placed: Point3, quadric: &Quadric) -> f64 {
        quadric.evaluate(placed.x, placed.y, placed.z)
    }
}

/// Squared edge length; short edges collapse first.
#[derive(Debug, Clone, Copy)]
pub struct EdgeLengthCost;

impl CollapseCost for EdgeLengthCost {
    fn cost(&self, p1: Point3, p2: Point3, _placed: Point3, _quadric: &Quadric) -> f64 {
        (p2.x - p1.x).powi(2) + (p2.y - p1.y).powi(2) + (p2.z - p1.z).powi(2)
    }
}

/// Chooses the position of the merged vertex.
pub trait VertexPlacement {
    fn place(&self, p1: Point3, p2: Point3, quadric: &Quadric) -> Point3;
}

/// Places the merged vertex at the edge midpoint.
#[derive(Debug, Clone, Copy)]
pub struct MidpointPlacement;

impl VertexPlacement for MidpointPlacement {
    fn place(&self, p1: Point3, p2: Point3, _quadric: &Quadric) -> Point3 {
        Point3::new(
            (p1.x + p2.x) / 2.0,
            (p1.y + p2.y) / 2.0,
            (p1.z + p2.z) / 2.0,
        )
    }
}

/// Places the merged vertex at the quadric-optimal position, falling back to
/// the midpoint when the quadric is singular.
#[derive(Debug, Clone, Copy)]
pub struct QuadricPlacement;

impl VertexPlacement for QuadricPlacement {
    fn place(&self, p1: Point3, p2: Point3, quadric: &Quadric) -> Point3 {
        match quadric.optimal_point() {
            Some([x, y, z]) => Point3::new(x, y, z),
            None => MidpointPlacement.place(p1, p2, quadric),
        }
    }
}

/// An edge collapse candidate in the priority queue.
#[derive(Debug, Clone)]
struct EdgeCollapse {
    v1: usize,
    v2: usize,
    v1_version: u32,
    v2_version: u32,
    cost: f64,
    placed: Point3,
}

impl PartialEq for EdgeCollapse {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for EdgeCollapse {}

impl PartialOrd for EdgeCollapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCollapse {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the binary heap pops the cheapest collapse first.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
    }
}

/// Simplifies `tin` by iterative edge collapse until `stop` is satisfied or
/// no further collapse is possible.
///
/// Collapses that would break the link condition of the edge or flip a
/// surviving face are rejected. Surviving vertices are reindexed densely in
/// their original order; vertices without any face survive untouched.
pub fn simplify<S, C, P>(tin: &Tin, stop: &S, cost: &C, placement: &P) -> Tin
where
    S: StopCondition,
    C: CollapseCost,
    P: VertexPlacement,
{
    let mut positions: Vec<Option<Point3>> = tin.vertices.iter().copied().map(Some).collect();
    let mut faces: Vec<Option<[usize; 3]>> = tin.faces.iter().copied().map(Some).collect();

    let mut neighbors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); positions.len()];
    let mut incident: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); positions.len()];
    for (face_idx, face) in tin.faces.iter().enumerate() {
        for corner in 0..3 {
            let a = face[corner];
            let b = face[(corner + 1) % 3];
            neighbors[a].insert(b);
            neighbors[b].insert(a);
            incident[a].insert(face_idx);
        }
    }

    let mut quadrics = vertex_quadrics(tin);
    let mut versions: Vec<u32> = vec![0; positions.len()];

    let initial_edges = neighbors.iter().map(|n| n.len()).sum::<usize>() / 2;
    let mut live_edges = initial_edges;

    let mut heap = BinaryHeap::new();
    for (v1, adjacent) in neighbors.iter().enumerate() {
        for &v2 in adjacent.iter().filter(|&&v2| v1 < v2) {
            push_candidate(
                v1, v2, &positions, &quadrics, &versions, cost, placement, &mut heap,
            );
        }
    }

    let mut collapsed = 0usize;
    while !stop.finished(live_edges, initial_edges) {
        let Some(candidate) = heap.pop() else {
            break;
        };
        let (v1, v2) = (candidate.v1, candidate.v2);
        // Collapses since the push invalidate the entry through the version
        // counters.
        if versions[v1] != candidate.v1_version || versions[v2] != candidate.v2_version {
            continue;
        }

        let shared: Vec<usize> = neighbors[v1].intersection(&neighbors[v2]).copied().collect();
        if shared.len() > 2 {
            continue;
        }
        if flips_a_face(&positions, &faces, &incident, v1, v2, candidate.placed) {
            continue;
        }

        // Merge v2 into v1.
        positions[v1] = Some(candidate.placed);
        positions[v2] = None;
        let q2 = quadrics[v2];
        quadrics[v1].add(&q2);

        let v2_faces: Vec<usize> = incident[v2].iter().copied().collect();
        for face_idx in v2_faces {
            let Some(mut face) = faces[face_idx] else {
                continue;
            };
            if face.contains(&v1) {
                // Both endpoints in one face: degenerate after the merge.
                faces[face_idx] = None;
                for vertex in face {
                    incident[vertex].remove(&face_idx);
                }
            } else {
                for vertex in face.iter_mut() {
                    if *vertex == v2 {
                        *vertex = v1;
                    }
                }
                faces[face_idx] = Some(face);
                incident[v1].insert(face_idx);
                incident[v2].remove(&face_idx);
            }
        }

        let v2_neighbors: Vec<usize> = neighbors[v2].iter().copied().collect();
        for neighbor in v2_neighbors {
            neighbors[neighbor].remove(&v2);
            if neighbor != v1 {
                neighbors[neighbor].insert(v1);
                neighbors[v1].insert(neighbor);
            }
        }
        neighbors[v1].remove(&v2);
        neighbors[v2].clear();
        live_edges -= 1 + shared.len();

        versions[v1] += 1;
        versions[v2] += 1;
        collapsed += 1;

        let v1_neighbors: Vec<usize> = neighbors[v1].iter().copied().collect();
        for neighbor in v1_neighbors {
            push_candidate(
                v1.min(neighbor),
                v1.max(neighbor),
                &positions,
                &quadrics,
                &versions,
                cost,
                placement,
                &mut heap,
            );
        }
    }

    log::debug!("collapsed {collapsed} edges, {live_edges} of {initial_edges} left");

    rebuild(&positions, &faces)
}

fn vertex_quadrics(tin: &Tin) -> Vec<Quadric> {
    let mut quadrics = vec![Quadric::default(); tin.vertices.len()];
    for face in &tin.faces {
        let p0 = tin.vertices[face[0]];
        let p1 = tin.vertices[face[1]];
        let p2 = tin.vertices[face[2]];
        let e1 = Vector3::new(p1.x - p0.x, p1.y - p0.y, p1.z - p0.z);
        let e2 = Vector3::new(p2.x - p0.x, p2.y - p0.y, p2.z - p0.z);
        let normal = e1.cross(&e2);
        let len = normal.norm();
        if len < 1e-10 {
            continue;
        }
        let a = normal.x / len;
        let b = normal.y / len;
        let c = normal.z / len;
        let d = -(a * p0.x + b * p0.y + c * p0.z);
        let plane = Quadric::from_plane(a, b, c, d);
        for &vertex in face {
            quadrics[vertex].add(&plane);
        }
    }
    quadrics
}

#[allow(clippy::too_many_arguments)]
fn push_candidate<C, P>(
    v1: usize,
    v2: usize,
    positions: &[Option<Point3>],
    quadrics: &[Quadric],
    versions: &[u32],
    cost: &C,
    placement: &P,
    heap: &mut BinaryHeap<EdgeCollapse>,
) where
    C: CollapseCost,
    P: VertexPlacement,
{
    let (Some(p1), Some(p2)) = (positions[v1], positions[v2]) else {
        return;
    };
    let mut combined = quadrics[v1];
    combined.add(&quadrics[v2]);
    let placed = placement.place(p1, p2, &combined);
    let edge_cost = cost.cost(p1, p2, placed, &combined);
    heap.push(EdgeCollapse {
        v1,
        v2,
        v1_version: versions[v1],
        v2_version: versions[v2],
        cost: edge_cost,
        placed,
    });
}

/// Returns `true` when moving `v1`/`v2` to `placed` would invert a face
/// that survives the collapse.
fn flips_a_face(
    positions: &[Option<Point3>],
    faces: &[Option<[usize; 3]>],
    incident: &[BTreeSet<usize>],
    v1: usize,
    v2: usize,
    placed: Point3,
) -> bool {
    for &face_idx in incident[v1].iter().chain(incident[v2].iter()) {
        let Some(face) = faces[face_idx] else {
            continue;
        };
        if face.contains(&v1) && face.contains(&v2) {
            continue;
        }
        let before = triangle_normal(positions, face, None);
        let after = triangle_normal(positions, face, Some((v1, v2, placed)));
        if let (Some(before), Some(after)) = (before, after) {
            if before.dot(&after) <= 0.0 {
                return true;
            }
        }
    }
    false
}

fn triangle_normal(
    positions: &[Option<Point3>],
    face: [usize; 3],
    moved: Option<(usize, usize, Point3)>,
) -> Option<Vector3<f64>> {
    let mut corners = [Point3::new(0.0, 0.0, 0.0); 3];
    for (corner, &vertex) in corners.iter_mut().zip(face.iter()) {
        *corner = match moved {
            Some((v1, v2, placed)) if vertex == v1 || vertex == v2 => placed,
            _ => positions[vertex]?,
        };
    }
    let e1 = Vector3::new(
        corners[1].x - corners[0].x,
        corners[1].y - corners[0].y,
        corners[1].z - corners[0].z,
    );
    let e2 = Vector3::new(
        corners[2].x - corners[0].x,
        corners[2].y - corners[0].y,
        corners[2].z - corners[0].z,
    );
    let normal = e1.cross(&e2);
    if normal.norm() < 1e-10 {
        None
    } else {
        Some(normal)
    }
}

fn rebuild(positions: &[Option<Point3>], faces: &[Option<[usize; 3]>]) -> Tin {
    let mut remap = vec![0usize; positions.len()];
    let mut vertices = Vec::new();
    for (old_idx, position) in positions.iter().enumerate() {
        if let Some(p) = position {
            remap[old_idx] = vertices.len();
            vertices.push(*p);
        }
    }
    let faces = faces
        .iter()
        .flatten()
        .map(|f| [remap[f[0]], remap[f[1]], remap[f[2]]])
        .collect();
    Tin { vertices, faces }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::distance3;

    fn grid_tin(size: usize) -> Tin {
        let mut points = Vec::new();
        for row in 0..size {
            for col in 0..size {
                points.push(Point3::new(col as f64, row as f64, 0.0));
            }
        }
        Tin::from_points(points)
    }

    fn edge_count(tin: &Tin) -> usize {
        let mut edges = BTreeSet::new();
        for face in &tin.faces {
            for corner in 0..3 {
                let a = face[corner].min(face[(corner + 1) % 3]);
                let b = face[corner].max(face[(corner + 1) % 3]);
                edges.insert((a, b));
            }
        }
        edges.len()
    }

    #[test]
    fn immediate_stop_keeps_the_mesh() {
        let tin = grid_tin(4);
        let simplified = simplify(
            &tin,
            &EdgeCountStop { edges: usize::MAX },
            &QuadricCost,
            &MidpointPlacement,
        );
        assert_eq!(simplified.vertices.len(), tin.vertices.len());
        assert_eq!(simplified.faces.len(), tin.faces.len());
    }

    #[test]
    fn collapses_down_to_edge_target() {
        let _ = env_logger::builder().is_test(true).try_init();
        let tin = grid_tin(5);
        let before = edge_count(&tin);
        let simplified = simplify(
            &tin,
            &EdgeCountStop { edges: 40 },
            &QuadricCost,
            &MidpointPlacement,
        );
        assert!(edge_count(&simplified) < 40);
        assert!(edge_count(&simplified) < before);
        assert!(simplified.vertices.len() < tin.vertices.len());
        for face in &simplified.faces {
            for &vertex in face {
                assert!(vertex < simplified.vertices.len());
            }
            assert!(face[0] != face[1] && face[1] != face[2] && face[0] != face[2]);
        }
    }

    #[test]
    fn edge_length_cost_collapses_shortest_first() {
        // One short edge among long ones; the first collapse merges its
        // endpoints at the midpoint and drops the degenerated face.
        let tin = Tin {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(10.0, 0.0, 0.0),
                Point3::new(10.5, 0.0, 1.0),
                Point3::new(5.0, 5.0, 0.0),
            ],
            faces: vec![[0, 1, 3], [1, 2, 3]],
        };
        let simplified = simplify(
            &tin,
            &EdgeCountStop { edges: 5 },
            &EdgeLengthCost,
            &MidpointPlacement,
        );
        assert_eq!(simplified.faces.len(), 1);
        let expected = Point3::new(10.25, 0.0, 0.5);
        assert!(simplified
            .vertices
            .iter()
            .any(|&v| distance3(v, expected) < 1e-9));
    }

    #[test]
    fn ratio_stop_thresholds() {
        let full = EdgeRatioStop { ratio: 1.1 };
        assert!(full.finished(56, 56));
        let half = EdgeRatioStop { ratio: 0.5 };
        assert!(!half.finished(56, 56));
        assert!(half.finished(27, 56));
    }

    #[test]
    fn unreferenced_vertices_survive() {
        let tin = Tin {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(9.0, 9.0, 9.0),
            ],
            faces: vec![[0, 1, 2]],
        };
        let simplified = simplify(
            &tin,
            &EdgeCountStop { edges: usize::MAX },
            &QuadricCost,
            &MidpointPlacement,
        );
        assert_eq!(simplified.vertices.len(), 4);
        assert_eq!(simplified.vertices[3], Point3::new(9.0, 9.0, 9.0));
        assert_eq!(simplified.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn quadric_optimal_point_at_plane_intersection() {
        let mut quadric = Quadric::from_plane(1.0, 0.0, 0.0, -1.0);
        quadric.add(&Quadric::from_plane(0.0, 1.0, 0.0, -2.0));
        quadric.add(&Quadric::from_plane(0.0, 0.0, 1.0, -3.0));
        let optimal = quadric.optimal_point().unwrap();
        assert!((optimal[0] - 1.0).abs() < 1e-9);
        assert!((optimal[1] - 2.0).abs() < 1e-9);
        assert!((optimal[2] - 3.0).abs() < 1e-9);
        assert!(quadric.evaluate(1.0, 2.0, 3.0).abs() < 1e-9);
    }

    #[test]
    fn singular_quadric_falls_back_to_midpoint() {
        let quadric = Quadric::from_plane(0.0, 0.0, 1.0, 0.0);
        assert!(quadric.optimal_point().is_none());
        let placed = QuadricPlacement.place(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 4.0, 0.0),
            &quadric,
        );
        assert!((placed.x - 1.0).abs() < 1e-12);
        assert!((placed.y - 2.0).abs() < 1e-12);
    }
}
