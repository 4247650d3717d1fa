//! Terrain feature classification over TIN faces.

use crate::dtm::Tin;
use crate::geometry::Point3;
use crate::metrics::{aspect, normal, slope};

/// Slopes below this many radians are treated as standing water.
const LAKE_SLOPE: f64 = 1e-2;

/// Splits the face list by a per-triangle predicate over its three vertex
/// positions, preserving relative order within both partitions.
pub fn partition<F>(tin: &Tin, predicate: F) -> (Vec<[usize; 3]>, Vec<[usize; 3]>)
where
    F: Fn(Point3, Point3, Point3) -> bool,
{
    let mut matching = Vec::new();
    let mut rest = Vec::new();
    for face in &tin.faces {
        let accepted = predicate(
            tin.vertices[face[0]],
            tin.vertices[face[1]],
            tin.vertices[face[2]],
        );
        if accepted {
            matching.push(*face);
        } else {
            rest.push(*face);
        }
    }
    (matching, rest)
}

/// Near-flat faces, the candidates for standing water.
pub fn extract_lakes(tin: &Tin) -> (Vec<[usize; 3]>, Vec<[usize; 3]>) {
    partition(tin, |p0, p1, p2| slope(normal(p0, p1, p2)) < LAKE_SLOPE)
}

/// Faces prone to avalanche release: steeper than 30 degrees, reaching into
/// one of the `height_intervals` (inclusive bounds, met by either the lowest
/// or the highest corner), and facing one of the `exposed_intervals` of
/// aspect. An aspect interval `(lo, hi)` with `lo < hi` is a strict range
/// test; with `lo > hi` it wraps through the +-pi boundary. A collapsed
/// interval (`lo == hi`) matches nothing.
pub fn extract_avalanche_expositions(
    tin: &Tin,
    exposed_intervals: &[(f64, f64)],
    height_intervals: &[(f64, f64)],
) -> (Vec<[usize; 3]>, Vec<[usize; 3]>) {
    let min_slope = 30.0_f64.to_radians();
    partition(tin, |p0, p1, p2| {
        let z_min = p0.z.min(p1.z).min(p2.z);
        let z_max = p0.z.max(p1.z).max(p2.z);
        let in_height_band = height_intervals
            .iter()
            .any(|&(lo, hi)| (lo <= z_max && z_max <= hi) || (lo <= z_min && z_min <= hi));
        if !in_height_band {
            return false;
        }
        let n = normal(p0, p1, p2);
        if slope(n) < min_slope {
            return false;
        }
        let a = aspect(n);
        exposed_intervals.iter().any(|&(lo, hi)| {
            if lo < hi {
                lo < a && a < hi
            } else if lo > hi {
                a > lo || a < hi
            } else {
                false
            }
        })
    })
}
