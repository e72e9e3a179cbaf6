//! Idealizer - synthesizes a corrected alignment from raw as-built geometry
//!
//! The pipeline is a pure function `Alignment -> Alignment`:
//!
//! 1. Near-duplicate removal (first and last vertex always kept)
//! 2. Curvature segmentation into tangent and curve runs
//! 3. Per-run correction with run endpoints pinned:
//!    - tangents are nudged toward a principal-direction line fit
//!    - curves are nudged radially toward an algebraic circle fit
//! 4. Elevation smoothing of small Z noise (XY untouched)
//!
//! Every correction is gated on fit quality. A rejected fit leaves the run as it was and
//! is not an error, so sharp features that fit poorly survive idealization.

use crate::alignment::{Alignment, CurvatureRun, META_IDEALIZED, RunKind, Vertex};
use crate::fitting::{fit_circle, fit_line};
use crate::utils;
use crate::{DesignConstraints, GeometryError, Result};
use geo::Coord;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Metadata key recording the correction mode
const META_IDEALIZER_MODE: &str = "idealizer_mode";

/// Summed turning below this magnitude has no meaningful direction
const TURNING_EPSILON: f64 = 1e-12;

/// How hard the idealizer pushes geometry toward its fits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum IdealizerMode {
    #[default]
    Conservative,
    Aggressive,
}

impl FromStr for IdealizerMode {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(IdealizerMode::Conservative),
            "aggressive" => Ok(IdealizerMode::Aggressive),
            other => Err(GeometryError::InvalidConfig(format!(
                "unknown idealizer mode '{other}' (expected conservative or aggressive)"
            ))),
        }
    }
}

impl fmt::Display for IdealizerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdealizerMode::Conservative => f.write_str("conservative"),
            IdealizerMode::Aggressive => f.write_str("aggressive"),
        }
    }
}

/// Configuration for the idealizer
///
/// Use [`IdealizerConfig::conservative`] or [`IdealizerConfig::aggressive`] for the
/// tuned presets and adjust individual fields from there.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdealizerConfig {
    pub mode: IdealizerMode,
    /// Consecutive vertices closer than this (3D, metres) are collapsed
    pub min_vertex_distance: f64,
    /// |curvature| at or above this marks a curve run (1/m)
    pub curvature_threshold: f64,
    /// Fraction of the displacement toward a fit that is applied
    pub correction_gain: f64,
    /// Upper bound on the horizontal shift of any single vertex (m)
    pub max_vertex_shift: f64,
    /// Fits with a larger RMS residual are rejected (m)
    pub max_fit_rmse: f64,
    /// Z deviations from the neighbour average below this are treated as noise (m)
    pub elevation_noise_threshold: f64,
    /// Circle fits below this fraction of the design minimum radius are left alone
    pub curve_radius_gate: f64,
}

impl IdealizerConfig {
    /// Small corrections, 5 mm duplicate distance
    pub fn conservative() -> Self {
        Self {
            mode: IdealizerMode::Conservative,
            min_vertex_distance: 0.005,
            curvature_threshold: 8e-4,
            correction_gain: 0.35,
            max_vertex_shift: 0.05,
            max_fit_rmse: 0.05,
            elevation_noise_threshold: 0.01,
            curve_radius_gate: 0.8,
        }
    }

    /// Stronger corrections, 10 mm duplicate distance
    pub fn aggressive() -> Self {
        Self {
            mode: IdealizerMode::Aggressive,
            min_vertex_distance: 0.010,
            correction_gain: 0.6,
            max_vertex_shift: 0.15,
            max_fit_rmse: 0.10,
            ..Self::conservative()
        }
    }

    pub fn for_mode(mode: IdealizerMode) -> Self {
        match mode {
            IdealizerMode::Conservative => Self::conservative(),
            IdealizerMode::Aggressive => Self::aggressive(),
        }
    }
}

impl Default for IdealizerConfig {
    fn default() -> Self {
        Self::conservative()
    }
}

/// Counters describing what a single idealization did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdealizeStats {
    pub input_vertices: usize,
    pub output_vertices: usize,
    pub duplicates_removed: usize,
    /// Runs with fewer than 3 vertices, passed through untouched
    pub runs_skipped: usize,
    pub tangent_runs_corrected: usize,
    /// Tangent runs too wiggly to treat as straight
    pub tangent_runs_rejected: usize,
    pub curve_runs_corrected: usize,
    pub curve_rejected_singular: usize,
    pub curve_rejected_rmse: usize,
    pub curve_rejected_radius: usize,
    pub curve_rejected_direction: usize,
    pub vertices_smoothed: usize,
}

impl IdealizeStats {
    pub fn curve_runs_rejected(&self) -> usize {
        self.curve_rejected_singular
            + self.curve_rejected_rmse
            + self.curve_rejected_radius
            + self.curve_rejected_direction
    }

    fn record_curve_rejection(&mut self, reason: Rejection) {
        match reason {
            Rejection::Singular => self.curve_rejected_singular += 1,
            Rejection::Rmse => self.curve_rejected_rmse += 1,
            Rejection::BelowDesignRadius => self.curve_rejected_radius += 1,
            Rejection::DirectionFlip => self.curve_rejected_direction += 1,
        }
    }
}

/// Result of [`Idealizer::idealize_detailed`]
#[derive(Debug, Clone)]
pub struct Idealization {
    pub alignment: Alignment,
    pub stats: IdealizeStats,
}

/// Why a run correction was not applied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rejection {
    /// Collinear points, no circle through them
    Singular,
    Rmse,
    /// Tight fit below the design minimum radius; assumed deliberate
    BelowDesignRadius,
    /// Correction would flip the turning direction
    DirectionFlip,
}

type FitOutcome = std::result::Result<(), Rejection>;

/// Produces idealized alignments under a fixed set of constraints
#[derive(Debug, Clone)]
pub struct Idealizer {
    constraints: DesignConstraints,
    config: IdealizerConfig,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Idealizer {
    pub fn new(constraints: DesignConstraints, config: IdealizerConfig) -> Self {
        Self {
            constraints,
            config,
        }
    }

    #[inline]
    pub fn constraints(&self) -> &DesignConstraints {
        &self.constraints
    }

    #[inline]
    pub fn config(&self) -> &IdealizerConfig {
        &self.config
    }

    /// Idealize an alignment; the input is never modified
    pub fn idealize(&self, alignment: &Alignment) -> Alignment {
        self.idealize_detailed(alignment).alignment
    }

    /// Idealize an alignment and report what each stage did
    pub fn idealize_detailed(&self, alignment: &Alignment) -> Idealization {
        #[cfg(feature = "profiling")]
        profiling::scope!("idealizer::idealize");

        let mut stats = IdealizeStats {
            input_vertices: alignment.len(),
            ..IdealizeStats::default()
        };

        if alignment.len() < 3 {
            return self.finish(alignment, alignment.vertices().to_vec(), stats);
        }

        // 1. Near-duplicate removal
        let cleaned = remove_near_duplicates(alignment.vertices(), self.config.min_vertex_distance);
        stats.duplicates_removed = alignment.len() - cleaned.len();
        if cleaned.len() < 3 {
            return self.finish(alignment, cleaned, stats);
        }

        // 2. Curvature segmentation
        let working = alignment.derive(cleaned);
        let runs = working.segment_by_curvature(self.config.curvature_threshold);
        let mut vertices = working.vertices().to_vec();

        // 3. Per-run correction
        let min_radius = self.constraints.min_radius_for_design();
        for run in &runs {
            if run.len() < 3 {
                stats.runs_skipped += 1;
                continue;
            }
            let points = &mut vertices[run.indices()];
            match run.kind {
                RunKind::Tangent => match self.correct_tangent(points) {
                    Ok(()) => stats.tangent_runs_corrected += 1,
                    Err(reason) => {
                        log_rejection(run, reason);
                        stats.tangent_runs_rejected += 1;
                    }
                },
                RunKind::Curve => match self.correct_curve(points, min_radius) {
                    Ok(()) => stats.curve_runs_corrected += 1,
                    Err(reason) => {
                        log_rejection(run, reason);
                        stats.record_curve_rejection(reason);
                    }
                },
            }
        }

        // 4. Elevation smoothing
        let (vertices, smoothed) = smooth_elevation(
            &vertices,
            self.constraints.smoothing_factor,
            self.config.elevation_noise_threshold,
        );
        stats.vertices_smoothed = smoothed;

        self.finish(alignment, vertices, stats)
    }

    fn finish(
        &self,
        source: &Alignment,
        vertices: Vec<Vertex>,
        mut stats: IdealizeStats,
    ) -> Idealization {
        stats.output_vertices = vertices.len();
        tracing::debug!(
            input = stats.input_vertices,
            output = stats.output_vertices,
            duplicates = stats.duplicates_removed,
            tangents = stats.tangent_runs_corrected,
            curves = stats.curve_runs_corrected,
            rejected = stats.tangent_runs_rejected + stats.curve_runs_rejected(),
            smoothed = stats.vertices_smoothed,
            "Idealized alignment"
        );
        let alignment = source
            .derive(vertices)
            .with_meta(META_IDEALIZED, true)
            .with_meta(META_IDEALIZER_MODE, self.config.mode.to_string());
        Idealization { alignment, stats }
    }

    /// Pull interior points toward the best-fit line
    fn correct_tangent(&self, points: &mut [Vertex]) -> FitOutcome {
        let xy: Vec<Coord<f64>> = points.iter().map(Vertex::xy).collect();
        let fit = fit_line(&xy).ok_or(Rejection::Singular)?;
        if fit.rmse > self.config.max_fit_rmse {
            return Err(Rejection::Rmse);
        }

        let last = points.len() - 1;
        for point in &mut points[1..last] {
            let current = point.xy();
            *point = point.with_xy(self.nudge(current, fit.project(current)));
        }
        Ok(())
    }

    /// Pull interior points radially toward the best-fit circle
    fn correct_curve(&self, points: &mut [Vertex], min_radius: f64) -> FitOutcome {
        let xy: Vec<Coord<f64>> = points.iter().map(Vertex::xy).collect();
        let fit = fit_circle(&xy).ok_or(Rejection::Singular)?;
        if fit.rmse > self.config.max_fit_rmse {
            return Err(Rejection::Rmse);
        }
        if fit.radius < self.config.curve_radius_gate * min_radius {
            return Err(Rejection::BelowDesignRadius);
        }

        let last = xy.len() - 1;
        let mut corrected = xy.clone();
        for p in &mut corrected[1..last] {
            *p = self.nudge(*p, fit.project(*p));
        }
        if !turning_preserved(&xy, &corrected) {
            return Err(Rejection::DirectionFlip);
        }

        for (point, p) in points.iter_mut().zip(corrected) {
            *point = point.with_xy(p);
        }
        Ok(())
    }

    /// Move `current` a gain-scaled, capped step toward `target`
    fn nudge(&self, current: Coord<f64>, target: Coord<f64>) -> Coord<f64> {
        let mut step = (target - current) * self.config.correction_gain;
        let length = utils::norm(step);
        if length > self.config.max_vertex_shift && length > 0.0 {
            step = step * (self.config.max_vertex_shift / length);
        }
        current + step
    }
}

fn log_rejection(run: &CurvatureRun, reason: Rejection) {
    tracing::debug!(
        kind = ?run.kind,
        start = run.start,
        end = run.end,
        ?reason,
        "Run left untouched"
    );
}

/// Collapse consecutive vertices closer than `min_distance`, always keeping both ends
fn remove_near_duplicates(vertices: &[Vertex], min_distance: f64) -> Vec<Vertex> {
    let n = vertices.len();
    let mut kept = Vec::with_capacity(n);
    kept.push(vertices[0]);
    if n == 1 {
        return kept;
    }

    for v in &vertices[1..n - 1] {
        if let Some(prev) = kept.last() {
            if utils::distance_3d(prev, v) >= min_distance {
                kept.push(*v);
            }
        }
    }

    let last = vertices[n - 1];
    if kept.len() > 1 {
        if let Some(prev) = kept.last() {
            if utils::distance_3d(prev, &last) < min_distance {
                kept.pop();
            }
        }
    }
    kept.push(last);
    kept
}

/// Sum of consecutive edge cross products (positive = net left turn)
fn signed_turning(points: &[Coord<f64>]) -> f64 {
    points
        .windows(3)
        .map(|w| utils::cross(w[1] - w[0], w[2] - w[1]))
        .sum()
}

/// Whether the net turning direction survives a correction
fn turning_preserved(before: &[Coord<f64>], after: &[Coord<f64>]) -> bool {
    let b = signed_turning(before);
    let a = signed_turning(after);
    if b.abs() < TURNING_EPSILON {
        return true;
    }
    a.abs() >= TURNING_EPSILON && a.signum() == b.signum()
}

/// Blend interior Z noise toward the neighbour average; larger steps are kept as grade changes
///
/// Works from the input elevations only, so results do not cascade along the line.
fn smooth_elevation(
    vertices: &[Vertex],
    factor: f64,
    noise_threshold: f64,
) -> (Vec<Vertex>, usize) {
    let mut out = vertices.to_vec();
    let mut smoothed = 0;
    for i in 1..vertices.len().saturating_sub(1) {
        let average = 0.5 * (vertices[i - 1].z + vertices[i + 1].z);
        let deviation = average - vertices[i].z;
        if deviation != 0.0 && deviation.abs() < noise_threshold {
            out[i].z = vertices[i].z + factor * deviation;
            smoothed += 1;
        }
    }
    (out, smoothed)
}
