//! Validation report: severity model, summary statistics and tabular export

use crate::alignment::Alignment;
use crate::comparison::Deviation;
use crate::{DesignConstraints, Result};
use std::fmt;
use std::io::Write;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Column order of [`ValidationReport::write_table`]
pub const TABLE_COLUMNS: [&str; 14] = [
    "index",
    "station",
    "orig_x",
    "orig_y",
    "orig_z",
    "ideal_x",
    "ideal_y",
    "ideal_z",
    "horizontal_error",
    "elevation_error",
    "curvature_dev",
    "bearing_dev",
    "design_radius",
    "design_ok",
];

/// Severity of a single deviation
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => f.write_str("low"),
            Severity::Medium => f.write_str("medium"),
            Severity::High => f.write_str("high"),
        }
    }
}

/// Number of deviations per severity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeverityTally {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityTally {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.high + self.medium + self.low
    }

    /// Add another tally into this one
    pub fn merge(&mut self, other: &SeverityTally) {
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
    }
}

/// Max, mean and sample standard deviation of one error column
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ErrorStats {
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (n − 1); 0 with fewer than two values
    pub stdev: f64,
}

impl ErrorStats {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / n;
        let stdev = if values.len() < 2 {
            0.0
        } else {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        };
        Self { max, mean, stdev }
    }
}

/// Aggregate view of a report
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Summary {
    pub count: usize,
    pub horizontal: ErrorStats,
    pub elevation: ErrorStats,
    pub curvature: ErrorStats,
    pub bearing_max: f64,
    pub bearing_mean: f64,
    pub severity: SeverityTally,
    /// Steepest grade of the original alignment
    pub max_grade: f64,
    /// Whether `max_grade` is within the configured limit
    pub grade_ok: bool,
}

/// Deviations between an original alignment and its ideal, with the constraints used
#[derive(Debug, Clone)]
pub struct ValidationReport {
    original: Arc<Alignment>,
    ideal: Arc<Alignment>,
    deviations: Vec<Deviation>,
    constraints: DesignConstraints,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ValidationReport {
    pub fn new(
        original: Arc<Alignment>,
        ideal: Arc<Alignment>,
        deviations: Vec<Deviation>,
        constraints: DesignConstraints,
    ) -> Self {
        Self {
            original,
            ideal,
            deviations,
            constraints,
        }
    }

    #[inline]
    pub fn original(&self) -> &Alignment {
        &self.original
    }

    #[inline]
    pub fn ideal(&self) -> &Alignment {
        &self.ideal
    }

    #[inline]
    pub fn deviations(&self) -> &[Deviation] {
        &self.deviations
    }

    #[inline]
    pub fn constraints(&self) -> &DesignConstraints {
        &self.constraints
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.deviations.is_empty()
    }

    /// Classify one deviation against the horizontal tolerance and design radius
    pub fn severity(&self, deviation: &Deviation) -> Severity {
        let tolerance = self.constraints.tolerance_horizontal_deviation;
        if deviation.horizontal_error > 2.0 * tolerance || !deviation.design_ok {
            Severity::High
        } else if deviation.horizontal_error > tolerance {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Highest severity in the report, `None` when there are no deviations
    pub fn worst_severity(&self) -> Option<Severity> {
        self.deviations.iter().map(|d| self.severity(d)).max()
    }

    pub fn summary(&self) -> Summary {
        let column =
            |f: fn(&Deviation) -> f64| -> Vec<f64> { self.deviations.iter().map(f).collect() };
        let bearings = column(|d| d.bearing_dev);
        let bearing = ErrorStats::from_values(&bearings);

        let mut severity = SeverityTally::default();
        for d in &self.deviations {
            severity.record(self.severity(d));
        }

        let max_grade = self.original.max_grade();
        Summary {
            count: self.deviations.len(),
            horizontal: ErrorStats::from_values(&column(|d| d.horizontal_error)),
            elevation: ErrorStats::from_values(&column(|d| d.elevation_error)),
            curvature: ErrorStats::from_values(&column(|d| d.curvature_dev)),
            bearing_max: bearing.max,
            bearing_mean: bearing.mean,
            severity,
            max_grade,
            grade_ok: max_grade <= self.constraints.max_grade,
        }
    }

    /// Write the deviations as comma separated rows under a [`TABLE_COLUMNS`] header
    ///
    /// Lengths use 3 decimals; `bearing_dev` keeps full precision.
    pub fn write_table<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", TABLE_COLUMNS.join(","))?;
        for d in &self.deviations {
            writeln!(
                writer,
                "{},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{:.3},{},{:.3},{}",
                d.vertex_index,
                d.station,
                d.original.x,
                d.original.y,
                d.original.z,
                d.ideal.x,
                d.ideal.y,
                d.ideal.z,
                d.horizontal_error,
                d.elevation_error,
                d.curvature_dev,
                d.bearing_dev,
                d.design_radius,
                u8::from(d.design_ok),
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Vertex;

    fn deviation(station: f64, horizontal: f64, design_ok: bool) -> Deviation {
        Deviation {
            vertex_index: station as usize,
            station,
            original: Vertex::new(station, 0.0, 0.0),
            ideal: Vertex::new(station, horizontal, 0.0),
            horizontal_error: horizontal,
            elevation_error: 0.0,
            curvature_dev: 0.0,
            bearing_dev: 0.0,
            design_radius: crate::utils::STRAIGHT_RADIUS,
            design_ok,
        }
    }

    fn report(deviations: Vec<Deviation>) -> ValidationReport {
        let original =
            Alignment::from_points([(0.0, 0.0, 0.0), (10.0, 0.0, 0.5), (20.0, 0.0, 0.6)]).unwrap();
        let ideal = Arc::new(original.clone());
        ValidationReport::new(
            Arc::new(original),
            ideal,
            deviations,
            DesignConstraints::default(),
        )
    }

    #[test]
    fn test_severity_boundaries() {
        let r = report(Vec::new());
        assert_eq!(r.severity(&deviation(0.0, 0.0, true)), Severity::Low);
        assert_eq!(r.severity(&deviation(0.0, 0.02, true)), Severity::Low);
        assert_eq!(r.severity(&deviation(0.0, 0.05, true)), Severity::Low);
        assert_eq!(r.severity(&deviation(0.0, 0.051, true)), Severity::Medium);
        assert_eq!(r.severity(&deviation(0.0, 0.1, true)), Severity::Medium);
        assert_eq!(r.severity(&deviation(0.0, 0.101, true)), Severity::High);
        // A radius below the design minimum is always high
        assert_eq!(r.severity(&deviation(0.0, 0.0, false)), Severity::High);
    }

    #[test]
    fn test_summary_statistics() {
        let r = report(vec![
            deviation(0.0, 0.02, true),
            deviation(1.0, 0.04, true),
            deviation(2.0, 0.06, true),
            deviation(3.0, 0.2, false),
        ]);
        let s = r.summary();
        assert_eq!(s.count, 4);
        assert!((s.horizontal.max - 0.2).abs() < 1e-12);
        assert!((s.horizontal.mean - 0.08).abs() < 1e-12);
        // Sample standard deviation of [0.02, 0.04, 0.06, 0.2]
        let expected = ((0.0036 + 0.0016 + 0.0004 + 0.0144) / 3.0f64).sqrt();
        assert!((s.horizontal.stdev - expected).abs() < 1e-12);
        assert_eq!(
            s.severity,
            SeverityTally {
                high: 1,
                medium: 1,
                low: 2
            }
        );
        assert_eq!(s.severity.total(), 4);
        assert_eq!(r.worst_severity(), Some(Severity::High));
    }

    #[test]
    fn test_summary_of_empty_report() {
        let r = report(Vec::new());
        let s = r.summary();
        assert_eq!(s.count, 0);
        assert_eq!(s.horizontal, ErrorStats::default());
        assert_eq!(s.bearing_max, 0.0);
        assert_eq!(r.worst_severity(), None);
    }

    #[test]
    fn test_single_row_stdev_is_zero() {
        let s = report(vec![deviation(0.0, 0.03, true)]).summary();
        assert_eq!(s.horizontal.stdev, 0.0);
        assert_eq!(s.horizontal.mean, 0.03);
    }

    #[test]
    fn test_grade_flag() {
        // Original climbs 0.5 m over 10 m: 5% grade, within the 8% default
        let s = report(Vec::new()).summary();
        assert!((s.max_grade - 0.05).abs() < 1e-12);
        assert!(s.grade_ok);

        let steep = Alignment::from_points([(0.0, 0.0, 0.0), (10.0, 0.0, 1.0)]).unwrap();
        let shared = Arc::new(steep);
        let r = ValidationReport::new(
            shared.clone(),
            shared,
            Vec::new(),
            DesignConstraints::default(),
        );
        assert!(!r.summary().grade_ok);
    }

    #[test]
    fn test_write_table() {
        let mut d = deviation(12.0, 0.0204, true);
        d.bearing_dev = 0.123456789;
        d.ideal.y = 0.0204;
        let r = report(vec![d, deviation(13.0, 0.3, false)]);

        let mut out = Vec::new();
        r.write_table(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], TABLE_COLUMNS.join(","));
        assert_eq!(
            lines[1],
            "12,12.000,12.000,0.000,0.000,12.000,0.020,0.000,0.020,0.000,0.000,0.123456789,1000000000.000,1"
        );
        assert!(lines[2].ends_with(",0"));
        assert_eq!(lines[2].split(',').count(), TABLE_COLUMNS.len());
    }
}
