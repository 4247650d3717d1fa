//! Axis-aligned bounding box tree over mesh faces for ray queries.

use nalgebra::Vector3;

use crate::dtm::Tin;
use crate::geometry::Point3;

const RAY_EPSILON: f64 = 1e-12;

fn vec3(p: Point3) -> Vector3<f64> {
    Vector3::new(p.x, p.y, p.z)
}

#[derive(Debug, Clone, Copy)]
struct Aabb {
    min: Vector3<f64>,
    max: Vector3<f64>,
}

impl Aabb {
    fn of_triangle(corners: &[Point3; 3]) -> Self {
        let mut min = vec3(corners[0]);
        let mut max = min;
        for &p in &corners[1..] {
            let v = vec3(p);
            min = min.inf(&v);
            max = max.sup(&v);
        }
        Self { min, max }
    }

    fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Slab test. Returns the entry distance when the ray reaches the box
    /// within `[0, limit]`. The NaN-dropping `f64::min`/`f64::max` keep the
    /// test correct for axis-parallel rays starting on a slab plane.
    fn ray_enters(&self, origin: Vector3<f64>, inv_dir: Vector3<f64>, limit: f64) -> Option<f64> {
        let mut t_near = 0.0_f64;
        let mut t_far = limit;
        for axis in 0..3 {
            let t1 = (self.min[axis] - origin[axis]) * inv_dir[axis];
            let t2 = (self.max[axis] - origin[axis]) * inv_dir[axis];
            t_near = t_near.max(t1.min(t2));
            t_far = t_far.min(t1.max(t2));
        }
        if t_near <= t_far {
            Some(t_near)
        } else {
            None
        }
    }
}

enum BvhNode {
    Leaf {
        aabb: Aabb,
        face: usize,
    },
    Internal {
        aabb: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    fn aabb(&self) -> &Aabb {
        match self {
            BvhNode::Leaf { aabb, .. } | BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

fn build_node(items: &mut [(usize, Aabb)]) -> Box<BvhNode> {
    if items.len() == 1 {
        let (face, aabb) = items[0];
        return Box::new(BvhNode::Leaf { aabb, face });
    }
    let mut bounds = items[0].1;
    for (_, aabb) in items[1..].iter() {
        bounds = bounds.merge(aabb);
    }
    let extent = bounds.max - bounds.min;
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
        0
    } else if extent.y >= extent.z {
        1
    } else {
        2
    };
    items.sort_unstable_by(|a, b| {
        let ka = a.1.min[axis] + a.1.max[axis];
        let kb = b.1.min[axis] + b.1.max[axis];
        ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
    });
    let mid = items.len() / 2;
    let (left_items, right_items) = items.split_at_mut(mid);
    let left = build_node(left_items);
    let right = build_node(right_items);
    let aabb = left.aabb().merge(right.aabb());
    Box::new(BvhNode::Internal { aabb, left, right })
}

/// Watertight enough for terrain ray queries: Moeller-Trumbore with a small
/// epsilon on both the determinant and the hit distance, so rays never
/// report their own support plane at `t = 0`.
fn ray_triangle(
    origin: Vector3<f64>,
    direction: Vector3<f64>,
    corners: &[Point3; 3],
) -> Option<f64> {
    let v0 = vec3(corners[0]);
    let e1 = vec3(corners[1]) - v0;
    let e2 = vec3(corners[2]) - v0;
    let pvec = direction.cross(&e2);
    let det = e1.dot(&pvec);
    if det.abs() < RAY_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = origin - v0;
    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(&e1);
    let v = direction.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(&qvec) * inv_det;
    if t > RAY_EPSILON {
        Some(t)
    } else {
        None
    }
}

/// Static AABB tree over the faces of a TIN, built once and queried many
/// times.
pub struct FaceTree {
    root: Option<Box<BvhNode>>,
    corners: Vec<[Point3; 3]>,
}

impl FaceTree {
    /// Builds the tree by recursive median split on the longest box axis.
    pub fn build(tin: &Tin) -> Self {
        let corners: Vec<[Point3; 3]> = tin
            .faces
            .iter()
            .map(|f| [tin.vertices[f[0]], tin.vertices[f[1]], tin.vertices[f[2]]])
            .collect();
        let mut items: Vec<(usize, Aabb)> = corners
            .iter()
            .enumerate()
            .map(|(face, c)| (face, Aabb::of_triangle(c)))
            .collect();
        let root = if items.is_empty() {
            None
        } else {
            Some(build_node(&mut items))
        };
        Self { root, corners }
    }

    /// Nearest intersection of the ray `origin + t * direction` (`t > 0`)
    /// with any face other than `exclude_face`. Returns the face index and
    /// the parametric hit distance.
    pub fn first_intersection(
        &self,
        origin: Vector3<f64>,
        direction: Vector3<f64>,
        exclude_face: Option<usize>,
    ) -> Option<(usize, f64)> {
        let root = self.root.as_deref()?;
        let inv_dir = Vector3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);
        let mut best: Option<(usize, f64)> = None;
        self.descend(root, origin, direction, inv_dir, exclude_face, &mut best);
        best
    }

    fn descend(
        &self,
        node: &BvhNode,
        origin: Vector3<f64>,
        direction: Vector3<f64>,
        inv_dir: Vector3<f64>,
        exclude_face: Option<usize>,
        best: &mut Option<(usize, f64)>,
    ) {
        let limit = best.map_or(f64::INFINITY, |(_, t)| t);
        if node.aabb().ray_enters(origin, inv_dir, limit).is_none() {
            return;
        }
        match node {
            BvhNode::Leaf { face, .. } => {
                if exclude_face == Some(*face) {
                    return;
                }
                if let Some(t) = ray_triangle(origin, direction, &self.corners[*face]) {
                    if best.map_or(true, |(_, bt)| t < bt) {
                        *best = Some((*face, t));
                    }
                }
            }
            BvhNode::Internal { left, right, .. } => {
                // Probe the child entered sooner first so the second can be
                // pruned by the tightened best distance.
                let near = left.aabb().ray_enters(origin, inv_dir, limit);
                let far = right.aabb().ray_enters(origin, inv_dir, limit);
                let (first, second) = match (near, far) {
                    (Some(a), Some(b)) if b < a => (right, left),
                    _ => (left, right),
                };
                self.descend(first, origin, direction, inv_dir, exclude_face, best);
                self.descend(second, origin, direction, inv_dir, exclude_face, best);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stacked_tin() -> Tin {
        Tin {
            vertices: vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(0.0, 1.0, 1.0),
                Point3::new(0.0, 0.0, 2.0),
                Point3::new(1.0, 0.0, 2.0),
                Point3::new(0.0, 1.0, 2.0),
            ],
            faces: vec![[0, 1, 2], [3, 4, 5]],
        }
    }

    #[test]
    fn nearest_face_wins() {
        let tree = FaceTree::build(&stacked_tin());
        let hit = tree.first_intersection(
            Vector3::new(0.25, 0.25, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            None,
        );
        let (face, t) = hit.unwrap();
        assert_eq!(face, 0);
        assert!((t - 1.0).abs() < 1e-12);
    }

    #[test]
    fn excluded_face_is_skipped() {
        let tree = FaceTree::build(&stacked_tin());
        let hit = tree.first_intersection(
            Vector3::new(0.25, 0.25, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Some(0),
        );
        let (face, t) = hit.unwrap();
        assert_eq!(face, 1);
        assert!((t - 2.0).abs() < 1e-12);
    }

    #[test]
    fn ray_away_from_the_mesh_misses() {
        let tree = FaceTree::build(&stacked_tin());
        let hit = tree.first_intersection(
            Vector3::new(0.25, 0.25, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            None,
        );
        assert!(hit.is_none());
    }

    #[test]
    fn empty_mesh_yields_no_hits() {
        let tree = FaceTree::build(&Tin {
            vertices: vec![],
            faces: vec![],
        });
        assert!(tree
            .first_intersection(Vector3::zeros(), Vector3::new(0.0, 0.0, 1.0), None)
            .is_none());
    }
}
