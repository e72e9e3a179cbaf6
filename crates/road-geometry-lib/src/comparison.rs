//! Station-based comparison of an original alignment against its idealized counterpart
//!
//! Vertices are never matched by index: idealization may add or remove vertices, so both
//! lines are resampled to a common station step and compared over their overlap.

use crate::alignment::{Alignment, BEARING_HALF_SPAN, Vertex};
use crate::utils;
use crate::DesignConstraints;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Smallest station step the engine will use (m)
pub const MIN_STATION_STEP: f64 = 0.5;

/// Slack so the final station survives floating point accumulation
const STATION_SLACK: f64 = 1e-9;

/// Comparison tuning
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ComparisonConfig {
    /// Distance between compared stations; clamped to [`MIN_STATION_STEP`]
    pub station_step: f64,
    /// Horizontal errors at or below this are snapped to zero
    pub horizontal_deadband: f64,
    /// Elevation errors at or below this are snapped to zero
    pub elevation_deadband: f64,
    /// Rows below this horizontal error with no elevation error are omitted
    pub min_report_horizontal: f64,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            station_step: 1.0,
            horizontal_deadband: 0.012,
            elevation_deadband: 0.015,
            min_report_horizontal: 0.015,
        }
    }
}

impl ComparisonConfig {
    /// The station step actually used
    pub fn effective_step(&self) -> f64 {
        if self.station_step.is_finite() {
            self.station_step.max(MIN_STATION_STEP)
        } else {
            Self::default().station_step
        }
    }
}

/// Deviation between the original and ideal line at one station
///
/// All numeric fields except `bearing_dev` are rounded to millimetre precision.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Deviation {
    /// Ordinal of the station (station / step)
    pub vertex_index: usize,
    pub station: f64,
    pub original: Vertex,
    pub ideal: Vertex,
    /// Planar distance between the two samples
    pub horizontal_error: f64,
    /// Absolute elevation difference
    pub elevation_error: f64,
    /// Absolute curvature difference (1/m)
    pub curvature_dev: f64,
    /// Smallest bearing difference in radians, [0, π]
    pub bearing_dev: f64,
    /// Radius of the ideal line at this station, 1e9 on straights
    pub design_radius: f64,
    /// Whether `design_radius` meets the design minimum
    pub design_ok: bool,
}

/// Compares alignments station by station
#[derive(Debug, Clone)]
pub struct ComparisonEngine {
    min_radius: f64,
    config: ComparisonConfig,
}

/// A line prepared for station sampling
struct StationedLine {
    line: Alignment,
    stations: Vec<f64>,
}

impl StationedLine {
    /// Resample to the step; lines shorter than one step are sampled as they are
    fn prepare(alignment: &Alignment, step: f64) -> Option<Self> {
        let line = match alignment.resample_by_station(step) {
            Ok(resampled) if resampled.len() >= 2 => resampled,
            _ => alignment.clone(),
        };
        let stations = line.stations().ok()?;
        Some(Self { line, stations })
    }

    fn end(&self) -> f64 {
        self.stations[self.stations.len() - 1]
    }

    fn sample(&self, station: f64) -> Vertex {
        self.line.sample_with(&self.stations, station)
    }

    /// Menger curvature from samples one step either side, clamped to the line
    fn curvature(&self, station: f64, step: f64) -> f64 {
        let end = self.end();
        let before = self.sample((station - step).clamp(0.0, end));
        let here = self.sample(station);
        let after = self.sample((station + step).clamp(0.0, end));
        utils::menger_curvature(before.xy(), here.xy(), after.xy())
    }

    fn bearing(&self, station: f64) -> f64 {
        self.line
            .bearing_with(&self.stations, station, BEARING_HALF_SPAN)
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ComparisonEngine {
    pub fn new(constraints: &DesignConstraints, config: ComparisonConfig) -> Self {
        Self {
            min_radius: constraints.min_radius_for_design(),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    /// Design minimum radius the engine checks against
    #[inline]
    pub fn min_radius(&self) -> f64 {
        self.min_radius
    }

    /// Compare `original` against `ideal` over their common stationing
    ///
    /// # Returns
    /// One [`Deviation`] per retained station, by increasing station. Empty when either
    /// line has fewer than 2 vertices or there is no overlap.
    pub fn compare(&self, original: &Alignment, ideal: &Alignment) -> Vec<Deviation> {
        #[cfg(feature = "profiling")]
        profiling::scope!("comparison::compare");

        if original.len() < 2 || ideal.len() < 2 {
            return Vec::new();
        }
        let step = self.config.effective_step();
        let (Some(orig), Some(idl)) = (
            StationedLine::prepare(original, step),
            StationedLine::prepare(ideal, step),
        ) else {
            return Vec::new();
        };

        let overlap = orig.end().min(idl.end());
        if overlap <= 0.0 {
            return Vec::new();
        }

        let count = (overlap / step + STATION_SLACK).floor() as usize + 1;
        let mut deviations = Vec::with_capacity(count);
        for k in 0..count {
            let station = (k as f64 * step).min(overlap);
            let p_orig = orig.sample(station);
            let p_ideal = idl.sample(station);

            let mut horizontal = utils::distance_2d(p_orig.xy(), p_ideal.xy());
            if horizontal <= self.config.horizontal_deadband {
                horizontal = 0.0;
            }
            let mut elevation = (p_orig.z - p_ideal.z).abs();
            if elevation <= self.config.elevation_deadband {
                elevation = 0.0;
            }
            if horizontal < self.config.min_report_horizontal && elevation == 0.0 {
                continue;
            }

            let k_orig = orig.curvature(station, step);
            let k_ideal = idl.curvature(station, step);
            let design_radius = utils::radius_from_curvature(k_ideal);

            deviations.push(Deviation {
                vertex_index: k,
                station: utils::round_mm(station),
                original: utils::round_vertex_mm(&p_orig),
                ideal: utils::round_vertex_mm(&p_ideal),
                horizontal_error: utils::round_mm(horizontal),
                elevation_error: utils::round_mm(elevation),
                curvature_dev: utils::round_mm((k_orig - k_ideal).abs()),
                bearing_dev: utils::angle_difference(orig.bearing(station), idl.bearing(station)),
                design_radius: utils::round_mm(design_radius),
                design_ok: design_radius >= self.min_radius,
            });
        }

        tracing::debug!(
            stations = count,
            retained = deviations.len(),
            overlap,
            "Compared alignments"
        );
        deviations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoadClass;

    fn line(points: &[(f64, f64, f64)]) -> Alignment {
        Alignment::from_points(points.iter().copied()).unwrap()
    }

    fn arc(radius: f64, sweep_deg: f64, count: usize) -> Alignment {
        Alignment::from_points((0..count).map(|i| {
            let a = (sweep_deg * i as f64 / (count - 1) as f64).to_radians();
            (radius * a.cos(), radius * a.sin(), 0.0)
        }))
        .unwrap()
    }

    fn engine() -> ComparisonEngine {
        ComparisonEngine::new(&DesignConstraints::default(), ComparisonConfig::default())
    }

    #[test]
    fn test_identical_lines_report_nothing() {
        let a = line(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.01), (20.0, 0.0, -0.01), (30.0, 0.0, 0.0)]);
        assert!(engine().compare(&a, &a).is_empty());

        let curve = arc(100.0, 45.0, 30);
        assert!(engine().compare(&curve, &curve).is_empty());
    }

    #[test]
    fn test_constant_offset() {
        let original = line(&[(0.0, 0.0, 0.0), (100.0, 0.0, 0.0)]);
        let ideal = line(&[(0.0, 0.02, 0.0), (100.0, 0.02, 0.0)]);
        let deviations = engine().compare(&original, &ideal);

        assert_eq!(deviations.len(), 101);
        for d in &deviations {
            assert_eq!(d.horizontal_error, 0.02);
            assert_eq!(d.elevation_error, 0.0);
            assert_eq!(d.design_radius, utils::STRAIGHT_RADIUS);
            assert!(d.design_ok);
            assert!(d.bearing_dev.abs() < 1e-9);
        }
        assert_eq!(deviations[100].station, 100.0);
        assert_eq!(deviations[100].vertex_index, 100);
    }

    #[test]
    fn test_deadbands_and_row_filter() {
        let original = line(&[(0.0, 0.0, 0.0), (50.0, 0.0, 0.0)]);

        // Below the horizontal deadband: nothing reported
        let ideal = line(&[(0.0, 0.01, 0.0), (50.0, 0.01, 0.0)]);
        assert!(engine().compare(&original, &ideal).is_empty());

        // Between the deadband and the minimum report value: filtered
        let ideal = line(&[(0.0, 0.014, 0.0), (50.0, 0.014, 0.0)]);
        assert!(engine().compare(&original, &ideal).is_empty());

        // Elevation alone keeps the row
        let ideal = line(&[(0.0, 0.0, 0.02), (50.0, 0.0, 0.02)]);
        let deviations = engine().compare(&original, &ideal);
        assert_eq!(deviations.len(), 51);
        assert!(deviations.iter().all(|d| d.horizontal_error == 0.0));
        assert!(deviations.iter().all(|d| d.elevation_error == 0.02));

        // Elevation inside its deadband is dropped
        let ideal = line(&[(0.0, 0.0, 0.015), (50.0, 0.0, 0.015)]);
        assert!(engine().compare(&original, &ideal).is_empty());
    }

    #[test]
    fn test_stations_ordered_and_rounded() {
        let original = line(&[(0.0, 0.0, 0.0), (12.3456, 0.0, 0.0), (25.0, 3.0, 0.0)]);
        let ideal = line(&[(0.0, 0.05, 0.0), (12.3456, 0.05, 0.0), (25.0, 3.05, 0.0)]);
        let deviations = engine().compare(&original, &ideal);

        assert!(!deviations.is_empty());
        assert!(deviations.windows(2).all(|w| w[0].station <= w[1].station));
        for d in &deviations {
            assert_eq!(d.horizontal_error, utils::round_mm(d.horizontal_error));
            assert_eq!(d.original.x, utils::round_mm(d.original.x));
            assert_eq!(d.ideal.y, utils::round_mm(d.ideal.y));
            assert_eq!(d.design_radius, utils::round_mm(d.design_radius));
        }
    }

    #[test]
    fn test_overlap_only() {
        let original = line(&[(0.0, 0.0, 0.0), (40.0, 0.0, 0.0)]);
        let ideal = line(&[(0.0, 0.1, 0.0), (20.0, 0.1, 0.0)]);
        let deviations = engine().compare(&original, &ideal);
        assert_eq!(deviations.len(), 21);
        assert!(deviations.iter().all(|d| d.station <= 20.0));
    }

    #[test]
    fn test_degenerate_inputs_are_empty() {
        let single = line(&[(0.0, 0.0, 0.0)]);
        let normal = line(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0)]);
        assert!(engine().compare(&single, &normal).is_empty());
        assert!(engine().compare(&normal, &single).is_empty());

        // Zero horizontal length
        let vertical = line(&[(0.0, 0.0, 0.0), (0.0, 0.0, 5.0)]);
        assert!(engine().compare(&vertical, &normal).is_empty());
    }

    #[test]
    fn test_short_line_below_one_step() {
        let original = line(&[(0.0, 0.0, 0.0), (0.4, 0.0, 0.0)]);
        let ideal = line(&[(0.0, 0.03, 0.0), (0.4, 0.03, 0.0)]);
        let deviations = engine().compare(&original, &ideal);
        assert_eq!(deviations.len(), 1);
        assert_eq!(deviations[0].station, 0.0);
        assert_eq!(deviations[0].horizontal_error, 0.03);
    }

    #[test]
    fn test_station_step_is_clamped() {
        let config = ComparisonConfig {
            station_step: 0.1,
            ..ComparisonConfig::default()
        };
        assert_eq!(config.effective_step(), MIN_STATION_STEP);

        let original = line(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0)]);
        let ideal = line(&[(0.0, 0.02, 0.0), (10.0, 0.02, 0.0)]);
        let engine = ComparisonEngine::new(&DesignConstraints::default(), config);
        assert_eq!(engine.compare(&original, &ideal).len(), 21);
    }

    #[test]
    fn test_design_radius_on_arc() {
        let original = arc(100.02, 60.0, 1201);
        let ideal = arc(100.0, 60.0, 1201);

        let local = DesignConstraints::for_class(RoadClass::Local, 20.0);
        let deviations = ComparisonEngine::new(&local, ComparisonConfig::default())
            .compare(&original, &ideal);
        let interior: Vec<&Deviation> = deviations
            .iter()
            .filter(|d| d.station >= 2.0 && d.station <= 100.0)
            .collect();
        assert!(!interior.is_empty());
        for d in &interior {
            assert!((d.design_radius - 100.0).abs() < 5.0, "radius {}", d.design_radius);
            assert!(d.design_ok);
            assert!(d.horizontal_error >= 0.015);
        }

        // Same geometry against a 60 km/h arterial (180 m minimum)
        let deviations = engine().compare(&original, &ideal);
        assert!(
            deviations
                .iter()
                .filter(|d| d.station >= 2.0 && d.station <= 100.0)
                .all(|d| !d.design_ok)
        );
    }

    #[test]
    fn test_bearing_deviation_is_wrapped() {
        let original = line(&[(0.0, 0.0, 0.0), (20.0, 0.0, 0.0)]);
        let ideal = line(&[(0.0, 0.0, 0.0), (20.0, 2.0, 0.0)]);
        let deviations = engine().compare(&original, &ideal);
        let expected = (2.0f64).atan2(20.0);
        assert!(!deviations.is_empty());
        for d in &deviations {
            assert!(d.bearing_dev >= 0.0 && d.bearing_dev <= std::f64::consts::PI);
            assert!((d.bearing_dev - expected).abs() < 1e-6);
        }
    }
}
