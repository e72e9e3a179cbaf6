//! Planar least-squares fitting used by the idealizer
//!
//! - [`fit_line`]: orthogonal (total least squares) line through the centroid, with the
//!   direction from the principal axis of the 2×2 covariance.
//! - [`fit_circle`]: algebraic (Kåsa) circle fit from centred second and third moments.
//!
//! Both report the RMS of the orthogonal residuals so callers can gate on fit quality.

use crate::utils;
use geo::Coord;

/// Determinant ratio below which the circle system is considered singular (collinear input)
const SINGULAR_RATIO: f64 = 1e-10;

/// A fitted straight line
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineFit {
    /// Point on the line (centroid of the input)
    pub centroid: Coord<f64>,
    /// Unit direction of the line
    pub direction: Coord<f64>,
    /// Root mean square of the perpendicular distances
    pub rmse: f64,
}

impl LineFit {
    /// Orthogonal projection of a point onto the line
    #[inline]
    pub fn project(&self, p: Coord<f64>) -> Coord<f64> {
        let d = p - self.centroid;
        let along = d.x * self.direction.x + d.y * self.direction.y;
        self.centroid + self.direction * along
    }

    /// Perpendicular distance of a point from the line
    #[inline]
    pub fn distance(&self, p: Coord<f64>) -> f64 {
        utils::cross(self.direction, p - self.centroid).abs()
    }
}

/// A fitted circle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircleFit {
    pub center: Coord<f64>,
    pub radius: f64,
    /// Root mean square of the radial residuals
    pub rmse: f64,
}

impl CircleFit {
    /// Radial projection of a point onto the circle; the centre maps to itself
    #[inline]
    pub fn project(&self, p: Coord<f64>) -> Coord<f64> {
        let d = p - self.center;
        let r = utils::norm(d);
        if r < utils::DEGENERATE_DENOMINATOR {
            return p;
        }
        self.center + d * (self.radius / r)
    }
}

fn centroid(points: &[Coord<f64>]) -> Coord<f64> {
    let n = points.len() as f64;
    let sum = points
        .iter()
        .fold(Coord { x: 0.0, y: 0.0 }, |acc, p| acc + *p);
    sum / n
}

/// Fit a straight line by principal component analysis
///
/// The direction angle is θ = ½·atan2(2·Sxy, Sxx − Syy) of the centred covariance sums.
///
/// Returns `None` with fewer than 2 points.
pub fn fit_line(points: &[Coord<f64>]) -> Option<LineFit> {
    if points.len() < 2 {
        return None;
    }
    let c = centroid(points);

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for p in points {
        let d = *p - c;
        sxx += d.x * d.x;
        syy += d.y * d.y;
        sxy += d.x * d.y;
    }

    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let direction = Coord {
        x: theta.cos(),
        y: theta.sin(),
    };

    let mut fit = LineFit {
        centroid: c,
        direction,
        rmse: 0.0,
    };
    let sum_sq: f64 = points.iter().map(|p| fit.distance(*p).powi(2)).sum();
    fit.rmse = (sum_sq / points.len() as f64).sqrt();
    Some(fit)
}

/// Fit a circle with the algebraic Kåsa method
///
/// Solves the 2×2 normal equations built from centred moments for the centre offset,
/// then derives the radius from the mean squared distance.
///
/// Returns `None` with fewer than 3 points or when the system is near-singular
/// (collinear or coincident points).
pub fn fit_circle(points: &[Coord<f64>]) -> Option<CircleFit> {
    if points.len() < 3 {
        return None;
    }
    let n = points.len() as f64;
    let c = centroid(points);

    let (mut suu, mut svv, mut suv) = (0.0, 0.0, 0.0);
    let (mut suuu, mut svvv, mut suvv, mut svuu) = (0.0, 0.0, 0.0, 0.0);
    for p in points {
        let u = p.x - c.x;
        let v = p.y - c.y;
        suu += u * u;
        svv += v * v;
        suv += u * v;
        suuu += u * u * u;
        svvv += v * v * v;
        suvv += u * v * v;
        svuu += v * u * u;
    }

    let det = suu * svv - suv * suv;
    let scale = suu * svv;
    if scale <= 0.0 || !scale.is_finite() || det.abs() <= SINGULAR_RATIO * scale {
        return None;
    }

    let b1 = 0.5 * (suuu + suvv);
    let b2 = 0.5 * (svvv + svuu);
    let uc = (b1 * svv - b2 * suv) / det;
    let vc = (suu * b2 - suv * b1) / det;

    let radius = (uc * uc + vc * vc + (suu + svv) / n).sqrt();
    let center = Coord {
        x: uc + c.x,
        y: vc + c.y,
    };
    if !radius.is_finite() || !center.x.is_finite() || !center.y.is_finite() {
        return None;
    }

    let sum_sq: f64 = points
        .iter()
        .map(|p| (utils::distance_2d(*p, center) - radius).powi(2))
        .sum();
    Some(CircleFit {
        center,
        radius,
        rmse: (sum_sq / n).sqrt(),
    })
}
