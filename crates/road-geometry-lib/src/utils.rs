//! Utility functions for planar/3D distances, discrete curvature and rounding

use crate::Vertex;
use geo::Coord;

/// Denominators below this value are treated as degenerate (collinear or coincident points)
pub const DEGENERATE_DENOMINATOR: f64 = 1e-12;

/// Sentinel radius reported for straight geometry (curvature ≈ 0)
pub const STRAIGHT_RADIUS: f64 = 1e9;

/// Curvatures with a magnitude below this are considered straight
const STRAIGHT_CURVATURE: f64 = 1.0 / STRAIGHT_RADIUS;

/// 3D Euclidean distance between two vertices
#[inline(always)]
pub fn distance_3d(a: &Vertex, b: &Vertex) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let dz = b.z - a.z;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Planar (XY) distance between two coordinates
#[inline(always)]
pub fn distance_2d(a: Coord<f64>, b: Coord<f64>) -> f64 {
    let d = b - a;
    d.x.hypot(d.y)
}

/// Length of a planar vector
#[inline(always)]
pub fn norm(v: Coord<f64>) -> f64 {
    v.x.hypot(v.y)
}

/// Z component of the cross product of two planar vectors
#[inline(always)]
pub fn cross(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Linear interpolation between two vertices using the same parameter for X, Y and Z
#[inline(always)]
pub fn lerp_vertex(a: &Vertex, b: &Vertex, t: f64) -> Vertex {
    Vertex::new(
        a.x + (b.x - a.x) * t,
        a.y + (b.y - a.y) * t,
        a.z + (b.z - a.z) * t,
    )
}

/// Signed Menger curvature of three consecutive planar points
///
/// # Arguments
/// * `p0`, `p1`, `p2` - Consecutive points; positive curvature turns left (counter-clockwise)
///
/// # Returns
/// `2·cross(v1, v2) / (|v1|·|v2|·|v3|)`, or 0.0 when the denominator is degenerate
#[inline]
pub fn menger_curvature(p0: Coord<f64>, p1: Coord<f64>, p2: Coord<f64>) -> f64 {
    let v1 = p1 - p0;
    let v2 = p2 - p1;
    let v3 = p2 - p0;
    let denominator = norm(v1) * norm(v2) * norm(v3);
    if denominator < DEGENERATE_DENOMINATOR {
        return 0.0;
    }
    2.0 * cross(v1, v2) / denominator
}

/// Radius implied by a curvature value, capped at [`STRAIGHT_RADIUS`]
#[inline]
pub fn radius_from_curvature(curvature: f64) -> f64 {
    let k = curvature.abs();
    if k < STRAIGHT_CURVATURE {
        STRAIGHT_RADIUS
    } else {
        (1.0 / k).min(STRAIGHT_RADIUS)
    }
}

/// Smallest absolute difference between two angles, in [0, π]
#[inline]
pub fn angle_difference(a: f64, b: f64) -> f64 {
    let tau = std::f64::consts::TAU;
    let d = (a - b).rem_euclid(tau);
    if d > std::f64::consts::PI { tau - d } else { d }
}

/// Round to millimetre precision (3 decimals)
#[inline(always)]
pub fn round_mm(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Round every coordinate of a vertex to millimetre precision
#[inline]
pub fn round_vertex_mm(v: &Vertex) -> Vertex {
    Vertex::new(round_mm(v.x), round_mm(v.y), round_mm(v.z))
}
