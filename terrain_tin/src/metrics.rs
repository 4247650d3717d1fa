//! Per-face normals, slope and aspect angles, and winding canonicalization.

use nalgebra::Vector3;

use crate::dtm::Tin;
use crate::geometry::Point3;

fn edge_cross(p0: Point3, p1: Point3, p2: Point3) -> Vector3<f64> {
    let e1 = Vector3::new(p1.x - p0.x, p1.y - p0.y, p1.z - p0.z);
    let e2 = Vector3::new(p2.x - p0.x, p2.y - p0.y, p2.z - p0.z);
    e1.cross(&e2)
}

/// Upward unit normal of the triangle `(p0, p1, p2)`, independent of input
/// winding.
pub fn normal(p0: Point3, p1: Point3, p2: Point3) -> Vector3<f64> {
    let mut n = edge_cross(p0, p1, p2).normalize();
    if n.z < 0.0 {
        n = -n;
    }
    n
}

/// Reverses every face whose raw cross product points downward, making the
/// winding CCW seen from above, and returns one normalized upward normal per
/// face in face order.
pub fn orient(tin: &mut Tin) -> Vec<Vector3<f64>> {
    let mut normals = Vec::with_capacity(tin.faces.len());
    for face in tin.faces.iter_mut() {
        let raw = edge_cross(
            tin.vertices[face[0]],
            tin.vertices[face[1]],
            tin.vertices[face[2]],
        );
        if raw.z < 0.0 {
            face.reverse();
            normals.push(-raw.normalize());
        } else {
            normals.push(raw.normalize());
        }
    }
    normals
}

/// Slope angle of a surface with the given upward normal, in `[0, pi/2]`.
pub fn slope(normal: Vector3<f64>) -> f64 {
    (normal.x * normal.x + normal.y * normal.y)
        .sqrt()
        .atan2(normal.z)
}

/// Downslope compass direction in `(-pi, pi]`, measured from the +y axis
/// toward +x.
pub fn aspect(normal: Vector3<f64>) -> f64 {
    normal.x.atan2(normal.y)
}

/// The upward unit normal of every face, in face order.
pub fn face_normals(tin: &Tin) -> Vec<Vector3<f64>> {
    tin.faces
        .iter()
        .map(|f| normal(tin.vertices[f[0]], tin.vertices[f[1]], tin.vertices[f[2]]))
        .collect()
}

pub fn slopes(normals: &[Vector3<f64>]) -> Vec<f64> {
    normals.iter().map(|&n| slope(n)).collect()
}

pub fn aspects(normals: &[Vector3<f64>]) -> Vec<f64> {
    normals.iter().map(|&n| aspect(n)).collect()
}

/// Per-vertex normals: unweighted sum of the incident upward face normals,
/// renormalized. Faces with a cross product shorter than `1e-16` contribute
/// nothing, and vertices whose accumulated sum stays that short are left at
/// zero instead of being divided by a near-zero norm.
pub fn point_normals(tin: &Tin) -> Vec<Vector3<f64>> {
    let mut sums = vec![Vector3::zeros(); tin.vertices.len()];
    for face in &tin.faces {
        let raw = edge_cross(
            tin.vertices[face[0]],
            tin.vertices[face[1]],
            tin.vertices[face[2]],
        );
        let len = raw.norm();
        if len <= 1e-16 {
            continue;
        }
        let mut unit = raw / len;
        if unit.z < 0.0 {
            unit = -unit;
        }
        for &vertex in face {
            sums[vertex] += unit;
        }
    }
    for sum in sums.iter_mut() {
        let len = sum.norm();
        if len > 1e-16 {
            *sum /= len;
        } else {
            *sum = Vector3::zeros();
        }
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn normal_points_up_for_either_winding() {
        let a = Point3::new(0.0, 0.0, 0.0);
        let b = Point3::new(1.0, 0.0, 0.0);
        let c = Point3::new(0.0, 1.0, 0.0);
        assert_eq!(normal(a, b, c), Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(normal(a, c, b), Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn orient_reverses_downward_faces() {
        let mut tin = Tin {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            faces: vec![[0, 2, 1]],
        };
        let normals = orient(&mut tin);
        assert_eq!(tin.faces[0], [1, 2, 0]);
        assert_eq!(normals[0], Vector3::new(0.0, 0.0, 1.0));
        for n in &normals {
            assert!(n.z >= 0.0);
        }
    }

    #[test]
    fn slope_and_aspect_of_an_east_rising_plane() {
        // The plane z = x rises toward +x, so water runs off toward -x.
        let n = normal(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert!((slope(n) - FRAC_PI_4).abs() < 1e-12);
        assert!((aspect(n) + FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn slope_and_aspect_stay_in_range() {
        let samples = [
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(-0.5, -0.5, 0.7).normalize(),
            Vector3::new(0.0, -1.0, 0.1).normalize(),
        ];
        for n in samples {
            let s = slope(n);
            let a = aspect(n);
            assert!((0.0..=FRAC_PI_2).contains(&s));
            assert!(-PI < a && a <= PI);
        }
    }

    #[test]
    fn point_normals_average_incident_faces() {
        // Two faces forming a symmetric ridge along the y axis.
        let tin = Tin {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 1.0),
                Point3::new(-1.0, 0.0, 1.0),
            ],
            faces: vec![[0, 1, 2], [0, 1, 3]],
        };
        let normals = point_normals(&tin);
        assert!((normals[0] - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
        assert!((normals[2].x + 1.0 / 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn point_normals_skip_degenerate_faces() {
        let tin = Tin {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            faces: vec![[0, 1, 2], [0, 1, 3]],
        };
        let normals = point_normals(&tin);
        assert_eq!(normals[0], Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(normals[3], Vector3::new(0.0, 0.0, 0.0));
    }
}
