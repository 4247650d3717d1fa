//! Shadow classification of TIN faces for given sun directions.

use nalgebra::Vector3;

use crate::bvh::FaceTree;
use crate::dtm::Tin;
use crate::geometry::triangle_centroid;
use crate::metrics;

/// A tagged sun direction. The vector is the direction sunlight travels,
/// from the sun toward the terrain, so a sun directly overhead is
/// `(0, 0, -1)`. The tag rides along unchanged for callers that batch per
/// timestamp.
pub type SunDirection = (i64, Vector3<f64>);

/// Face indices in shadow for a single sun direction. Builds the spatial
/// index internally; use [`shadow_faces_batch`] to amortize one build over
/// many directions.
pub fn shadow_faces(tin: &Tin, sun: Vector3<f64>) -> Vec<usize> {
    let tree = FaceTree::build(tin);
    collect_shadowed(tin, &tree, sun, true)
}

/// Shadowed face lists for many sun directions against one spatial index,
/// in input order.
pub fn shadow_faces_batch(tin: &Tin, suns: &[SunDirection]) -> Vec<Vec<usize>> {
    let tree = FaceTree::build(tin);
    log::debug!(
        "shadow testing {} faces against {} sun directions",
        tin.faces.len(),
        suns.len()
    );
    suns.iter()
        .map(|&(_, sun)| collect_shadowed(tin, &tree, sun, false))
        .collect()
}

/// A face is shadowed when it is back-facing to the sun or when the ray from
/// its centroid toward the sun hits other terrain. `strict` selects the
/// back-face comparison (`> 0` versus `>= 0`), so a face exactly edge-on to
/// the sun is lit by the single-direction entry point and shadowed by the
/// batch one.
fn collect_shadowed(tin: &Tin, tree: &FaceTree, sun: Vector3<f64>, strict: bool) -> Vec<usize> {
    let mut shadowed = Vec::new();
    for (face_idx, face) in tin.faces.iter().enumerate() {
        let p0 = tin.vertices[face[0]];
        let p1 = tin.vertices[face[1]];
        let p2 = tin.vertices[face[2]];
        let facing = metrics::normal(p0, p1, p2).dot(&sun);
        let back_facing = if strict { facing > 0.0 } else { facing >= 0.0 };
        if back_facing {
            shadowed.push(face_idx);
            continue;
        }
        let c = triangle_centroid(p0, p1, p2);
        let origin = Vector3::new(c.x, c.y, c.z);
        if tree
            .first_intersection(origin, -sun, Some(face_idx))
            .is_some()
        {
            shadowed.push(face_idx);
        }
    }
    shadowed
}
