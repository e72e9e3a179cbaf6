//! Alignment storage and polyline geometry
//!
//! This module provides the immutable [`Alignment`] type: an ordered sequence of 3D
//! vertices plus provenance metadata, with stationing, interpolation, discrete curvature,
//! bearings and curvature-based segmentation. Every transforming operation returns a new
//! alignment; the receiver is never mutated.

use crate::utils::{self, DEGENERATE_DENOMINATOR};
use crate::{GeometryError, Result};
use geo::Coord;
use geo::kernels::{Kernel, Orientation, RobustKernel};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Metadata key set on idealized alignments
pub const META_IDEALIZED: &str = "idealized";
/// Metadata key set on resampled alignments (value: the station step)
pub const META_RESAMPLE_STEP: &str = "resample_step";
/// Source entity handle supplied by the CAD reader
pub const META_HANDLE: &str = "handle";
/// Source layer supplied by the CAD reader
pub const META_LAYER: &str = "layer";
/// Source entity type supplied by the CAD reader
pub const META_TYPE: &str = "type";

/// Minimum loop length; a line must be at least twice this long to count as a loop
pub const MIN_LOOP_LENGTH: f64 = 10.0;

/// Heading reversal (radians, ~143°) between first and last bearing that marks a loop
const LOOP_HEADING_REVERSAL: f64 = 2.5;

/// Half-width of the finite difference used by [`Alignment::bearing_at_station`]
pub(crate) const BEARING_HALF_SPAN: f64 = 0.1;

/// Tolerance used to decide whether the first and last segments share a vertex
const CLOSURE_TOLERANCE: f64 = 1e-9;

/// A single 3D vertex in drawing units (metres)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vertex {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Horizontal (XY) projection of this vertex
    #[inline]
    pub fn xy(&self) -> Coord<f64> {
        Coord {
            x: self.x,
            y: self.y,
        }
    }

    /// Same XY position with a different elevation
    #[inline]
    pub fn with_xy(&self, xy: Coord<f64>) -> Self {
        Self::new(xy.x, xy.y, self.z)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Vertex {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<(f64, f64, f64)> for Vertex {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Self::new(x, y, z)
    }
}

/// A scalar metadata value (provenance, processing flags)
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum MetaValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl MetaValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            MetaValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetaValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        MetaValue::Flag(value)
    }
}

impl From<f64> for MetaValue {
    fn from(value: f64) -> Self {
        MetaValue::Number(value)
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        MetaValue::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        MetaValue::Text(value)
    }
}

/// String-keyed metadata attached to an alignment
pub type Meta = BTreeMap<String, MetaValue>;

/// Classification of a curvature run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RunKind {
    /// |curvature| below the threshold
    Tangent,
    /// |curvature| at or above the threshold
    Curve,
}

/// A contiguous run of vertex indices sharing the same [`RunKind`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CurvatureRun {
    pub kind: RunKind,
    /// First vertex index (inclusive)
    pub start: usize,
    /// Last vertex index (inclusive)
    pub end: usize,
}

impl CurvatureRun {
    /// Number of vertices in the run
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Runs always hold at least one vertex
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn indices(&self) -> RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// An immutable road alignment: ordered 3D vertices plus metadata
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Alignment {
    vertices: Vec<Vertex>,
    meta: Meta,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Alignment {
    /// Create a new alignment
    ///
    /// # Arguments
    /// * `vertices` - Ordered vertices, at least one
    /// * `meta` - Provenance metadata (handle, layer, type, ...)
    ///
    /// # Returns
    /// The alignment, or an error if there are no vertices or a coordinate is not finite
    pub fn new(vertices: Vec<Vertex>, meta: Meta) -> Result<Self> {
        if vertices.is_empty() {
            return Err(GeometryError::EmptyAlignment);
        }
        if let Some(index) = vertices.iter().position(|v| !v.is_finite()) {
            return Err(GeometryError::InvalidGeometry(format!(
                "non-finite coordinate at vertex {index}"
            )));
        }
        Ok(Self { vertices, meta })
    }

    /// Create an alignment without metadata from anything convertible to vertices
    pub fn from_points<I, P>(points: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<Vertex>,
    {
        Self::new(points.into_iter().map(Into::into).collect(), Meta::new())
    }

    /// Build a sibling alignment sharing this one's metadata.
    /// `vertices` must be non-empty and finite.
    pub(crate) fn derive(&self, vertices: Vec<Vertex>) -> Self {
        debug_assert!(!vertices.is_empty());
        Self {
            vertices,
            meta: self.meta.clone(),
        }
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    #[inline]
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    #[inline]
    pub fn meta_value(&self, key: &str) -> Option<&MetaValue> {
        self.meta.get(key)
    }

    /// Return a copy of this alignment with one metadata entry set
    pub fn with_meta(mut self, key: &str, value: impl Into<MetaValue>) -> Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    /// Whether this alignment was produced by the idealizer
    pub fn is_idealized(&self) -> bool {
        self.meta_value(META_IDEALIZED)
            .and_then(MetaValue::as_flag)
            .unwrap_or(false)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub fn first(&self) -> &Vertex {
        &self.vertices[0]
    }

    #[inline]
    pub fn last(&self) -> &Vertex {
        &self.vertices[self.vertices.len() - 1]
    }

    fn require(&self, required: usize) -> Result<()> {
        if self.vertices.len() < required {
            return Err(GeometryError::TooFewVertices {
                required,
                actual: self.vertices.len(),
            });
        }
        Ok(())
    }

    /// Total 3D length of the polyline
    pub fn length(&self) -> f64 {
        self.vertices
            .windows(2)
            .map(|w| utils::distance_3d(&w[0], &w[1]))
            .sum()
    }

    /// 3D length of every segment
    pub fn segment_lengths(&self) -> Vec<f64> {
        self.vertices
            .windows(2)
            .map(|w| utils::distance_3d(&w[0], &w[1]))
            .collect()
    }

    /// Total horizontal (XY) length of the polyline
    pub fn horizontal_length(&self) -> f64 {
        self.vertices
            .windows(2)
            .map(|w| utils::distance_2d(w[0].xy(), w[1].xy()))
            .sum()
    }

    /// Cumulative horizontal arc length at every vertex
    ///
    /// Starts at 0, is non-decreasing and has one entry per vertex.
    /// Fails with fewer than two vertices.
    pub fn stations(&self) -> Result<Vec<f64>> {
        self.require(2)?;
        let mut stations = Vec::with_capacity(self.vertices.len());
        let mut total = 0.0;
        stations.push(total);
        for w in self.vertices.windows(2) {
            total += utils::distance_2d(w[0].xy(), w[1].xy());
            stations.push(total);
        }
        Ok(stations)
    }

    /// Interpolated vertex at the given station
    ///
    /// Stations at or before 0 return the first vertex, stations at or past the end
    /// return the last vertex. Z is interpolated with the same segment parameter as XY.
    pub fn sample_at(&self, station: f64) -> Result<Vertex> {
        if station.is_nan() {
            return Err(GeometryError::InvalidParameter {
                name: "station",
                value: station,
            });
        }
        let stations = self.stations()?;
        Ok(self.sample_with(&stations, station))
    }

    /// Interpolate using precomputed stations (same length as `vertices`, at least 2)
    pub(crate) fn sample_with(&self, stations: &[f64], station: f64) -> Vertex {
        let n = self.vertices.len();
        let end = stations[n - 1];
        if station <= 0.0 {
            return *self.first();
        }
        if station >= end {
            return *self.last();
        }

        // First station strictly greater than the query, bracketing segment is (idx-1, idx)
        let idx = stations.partition_point(|&s| s <= station).clamp(1, n - 1);
        let s0 = stations[idx - 1];
        let span = stations[idx] - s0;
        let t = if span > DEGENERATE_DENOMINATOR {
            ((station - s0) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        utils::lerp_vertex(&self.vertices[idx - 1], &self.vertices[idx], t)
    }

    /// Resample at a uniform station step
    ///
    /// Produces ⌊L/step⌋+1 vertices at stations 0, step, 2·step, ... and replaces the last
    /// sample with the exact terminal vertex, so the end point survives even when the
    /// length is not a multiple of `step`.
    pub fn resample_by_station(&self, step: f64) -> Result<Alignment> {
        if !(step.is_finite() && step > 0.0) {
            return Err(GeometryError::InvalidParameter {
                name: "step",
                value: step,
            });
        }
        let stations = self.stations()?;
        let total = stations[stations.len() - 1];
        let count = (total / step).floor() as usize + 1;

        let mut vertices: Vec<Vertex> = (0..count)
            .map(|k| self.sample_with(&stations, k as f64 * step))
            .collect();
        if let Some(last) = vertices.last_mut() {
            *last = *self.last();
        }

        Ok(self.derive(vertices).with_meta(META_RESAMPLE_STEP, step))
    }

    /// Signed discrete (Menger) curvature at a vertex
    ///
    /// Returns 0.0 at both endpoints, for out-of-range indices and for degenerate triples.
    pub fn curvature_at(&self, index: usize) -> f64 {
        if index == 0 || index + 1 >= self.vertices.len() {
            return 0.0;
        }
        utils::menger_curvature(
            self.vertices[index - 1].xy(),
            self.vertices[index].xy(),
            self.vertices[index + 1].xy(),
        )
    }

    /// Curvature at every vertex
    pub fn curvatures(&self) -> Vec<f64> {
        (0..self.vertices.len())
            .map(|i| self.curvature_at(i))
            .collect()
    }

    /// Horizontal bearing (radians) of segment `index → index + 1`
    ///
    /// The last vertex reports the bearing of the final segment. Single-vertex
    /// alignments have a bearing of 0.
    pub fn bearing_at(&self, index: usize) -> f64 {
        let n = self.vertices.len();
        if n < 2 {
            return 0.0;
        }
        let i = index.min(n - 2);
        let d = self.vertices[i + 1].xy() - self.vertices[i].xy();
        d.y.atan2(d.x)
    }

    /// Horizontal bearing at a station from a symmetric ±0.1 finite difference
    pub fn bearing_at_station(&self, station: f64) -> Result<f64> {
        let stations = self.stations()?;
        Ok(self.bearing_with(&stations, station, BEARING_HALF_SPAN))
    }

    pub(crate) fn bearing_with(&self, stations: &[f64], station: f64, half_span: f64) -> f64 {
        let end = stations[stations.len() - 1];
        let a = self.sample_with(stations, (station - half_span).clamp(0.0, end));
        let b = self.sample_with(stations, (station + half_span).clamp(0.0, end));
        (b.y - a.y).atan2(b.x - a.x)
    }

    /// Partition the vertex indices into tangent and curve runs
    ///
    /// The runs are contiguous, non-overlapping and cover `0..=len-1`.
    pub fn segment_by_curvature(&self, curvature_threshold: f64) -> Vec<CurvatureRun> {
        let mut runs: Vec<CurvatureRun> = Vec::new();
        for index in 0..self.vertices.len() {
            let kind = if self.curvature_at(index).abs() < curvature_threshold {
                RunKind::Tangent
            } else {
                RunKind::Curve
            };
            match runs.last_mut() {
                Some(run) if run.kind == kind => run.end = index,
                _ => runs.push(CurvatureRun {
                    kind,
                    start: index,
                    end: index,
                }),
            }
        }
        runs
    }

    /// Insert evenly spaced points into every segment longer than `max_len`
    ///
    /// All original vertices are kept in their original order.
    pub fn split_by_max_length(&self, max_len: f64) -> Result<Alignment> {
        if !(max_len.is_finite() && max_len > 0.0) {
            return Err(GeometryError::InvalidParameter {
                name: "max_len",
                value: max_len,
            });
        }
        let mut vertices = Vec::with_capacity(self.vertices.len());
        vertices.push(*self.first());
        for w in self.vertices.windows(2) {
            let d = utils::distance_3d(&w[0], &w[1]);
            if d > max_len {
                let pieces = (d / max_len).ceil() as usize;
                for k in 1..pieces {
                    let t = k as f64 / pieces as f64;
                    vertices.push(utils::lerp_vertex(&w[0], &w[1], t));
                }
            }
            vertices.push(w[1]);
        }
        Ok(self.derive(vertices))
    }

    /// Whether the first and last vertices coincide within `tolerance`
    pub fn is_closed(&self, tolerance: f64) -> bool {
        self.vertices.len() >= 2 && utils::distance_3d(self.first(), self.last()) <= tolerance
    }

    /// Whether any two non-adjacent segments intersect in plan
    pub fn has_self_intersection(&self) -> bool {
        let segments = self.vertices.len().saturating_sub(1);
        if segments < 3 {
            return false;
        }
        let closed = self.is_closed(CLOSURE_TOLERANCE);

        for i in 0..segments {
            for j in (i + 2)..segments {
                // First and last segments of a closed ring share the closing vertex
                if closed && i == 0 && j == segments - 1 {
                    continue;
                }
                if segments_intersect(
                    self.vertices[i].xy(),
                    self.vertices[i + 1].xy(),
                    self.vertices[j].xy(),
                    self.vertices[j + 1].xy(),
                ) {
                    return true;
                }
            }
        }
        false
    }

    /// Heuristic loop detection: the heading reverses by more than ~143° between the
    /// first and last segment over a line at least twice [`MIN_LOOP_LENGTH`] long
    pub fn has_loop(&self) -> bool {
        let n = self.vertices.len();
        if n < 3 || self.horizontal_length() < 2.0 * MIN_LOOP_LENGTH {
            return false;
        }
        let reversal = utils::angle_difference(self.bearing_at(n - 2), self.bearing_at(0));
        reversal > LOOP_HEADING_REVERSAL
    }

    /// Steepest absolute grade (rise over horizontal run) of any segment
    ///
    /// Segments without horizontal extent are ignored.
    pub fn max_grade(&self) -> f64 {
        self.vertices
            .windows(2)
            .filter_map(|w| {
                let run = utils::distance_2d(w[0].xy(), w[1].xy());
                (run > DEGENERATE_DENOMINATOR).then(|| (w[1].z - w[0].z).abs() / run)
            })
            .fold(0.0, f64::max)
    }
}

/// Whether on-line point `q` lies within the bounding box of `p`–`r`
fn within_box(p: Coord<f64>, q: Coord<f64>, r: Coord<f64>) -> bool {
    q.x <= p.x.max(r.x) && q.x >= p.x.min(r.x) && q.y <= p.y.max(r.y) && q.y >= p.y.min(r.y)
}

/// Segment intersection via orientation tests (touching counts as intersecting)
fn segments_intersect(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>, d: Coord<f64>) -> bool {
    let o1 = RobustKernel::orient2d(a, b, c);
    let o2 = RobustKernel::orient2d(a, b, d);
    let o3 = RobustKernel::orient2d(c, d, a);
    let o4 = RobustKernel::orient2d(c, d, b);

    if o1 != o2 && o3 != o4 {
        return true;
    }

    (o1 == Orientation::Collinear && within_box(a, c, b))
        || (o2 == Orientation::Collinear && within_box(a, d, b))
        || (o3 == Orientation::Collinear && within_box(c, a, d))
        || (o4 == Orientation::Collinear && within_box(c, b, d))
}
