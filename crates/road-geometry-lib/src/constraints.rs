//! Design constraints: tolerances, road classification and minimum-radius policy
//!
//! The default radius table holds conservative placeholder values by road class and
//! design speed. It is plain data so callers can plug in their local standard.

use crate::{GeometryError, Result};
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Smallest radius ever returned for an unclassified road (m)
const UNCLASSIFIED_RADIUS_FLOOR: f64 = 30.0;

/// Functional road classification
///
/// Names match case-insensitively, both on the command line and in JSON.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(from = "String", into = "String")
)]
pub enum RoadClass {
    Highway,
    Arterial,
    Collector,
    Local,
    /// Any class without an entry in the radius table
    Other(String),
}

impl From<&str> for RoadClass {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "highway" => RoadClass::Highway,
            "arterial" => RoadClass::Arterial,
            "collector" => RoadClass::Collector,
            "local" => RoadClass::Local,
            _ => RoadClass::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for RoadClass {
    fn from(s: String) -> Self {
        RoadClass::from(s.as_str())
    }
}

impl From<RoadClass> for String {
    fn from(class: RoadClass) -> Self {
        class.to_string()
    }
}

impl FromStr for RoadClass {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(RoadClass::from(s))
    }
}

impl fmt::Display for RoadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoadClass::Highway => f.write_str("highway"),
            RoadClass::Arterial => f.write_str("arterial"),
            RoadClass::Collector => f.write_str("collector"),
            RoadClass::Local => f.write_str("local"),
            RoadClass::Other(name) => f.write_str(name),
        }
    }
}

/// Surrounding land-use context
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum RoadContext {
    #[default]
    Urban,
    Rural,
}

impl FromStr for RoadContext {
    type Err = GeometryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "urban" => Ok(RoadContext::Urban),
            "rural" => Ok(RoadContext::Rural),
            other => Err(GeometryError::InvalidConfig(format!(
                "unknown road context '{other}' (expected urban or rural)"
            ))),
        }
    }
}

impl fmt::Display for RoadContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoadContext::Urban => f.write_str("urban"),
            RoadContext::Rural => f.write_str("rural"),
        }
    }
}

/// One design-speed band: speed (km/h) and its minimum horizontal radius (m)
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpeedBand {
    pub speed_kph: f64,
    pub min_radius: f64,
}

/// Minimum-radius lookup table keyed by road class
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RadiusTable {
    /// Bands per class, sorted by ascending speed
    pub classes: Vec<(RoadClass, Vec<SpeedBand>)>,
}

impl RadiusTable {
    /// Bands for a class, if the table knows it
    pub fn bands(&self, class: &RoadClass) -> Option<&[SpeedBand]> {
        self.classes
            .iter()
            .find(|(c, _)| c == class)
            .map(|(_, bands)| bands.as_slice())
            .filter(|bands| !bands.is_empty())
    }

    /// Radius of the band nearest to `speed_kph`; ties resolve to the lower speed
    pub fn lookup(&self, class: &RoadClass, speed_kph: f64) -> Option<f64> {
        let bands = self.bands(class)?;
        let mut best = bands[0];
        for band in &bands[1..] {
            if (band.speed_kph - speed_kph).abs() < (best.speed_kph - speed_kph).abs() {
                best = *band;
            }
        }
        Some(best.min_radius)
    }
}

impl Default for RadiusTable {
    fn default() -> Self {
        let bands = |pairs: &[(f64, f64)]| {
            pairs
                .iter()
                .map(|&(speed_kph, min_radius)| SpeedBand {
                    speed_kph,
                    min_radius,
                })
                .collect::<Vec<_>>()
        };
        Self {
            classes: vec![
                (
                    RoadClass::Highway,
                    bands(&[
                        (50.0, 120.0),
                        (60.0, 180.0),
                        (80.0, 360.0),
                        (100.0, 600.0),
                        (120.0, 900.0),
                    ]),
                ),
                (
                    RoadClass::Arterial,
                    bands(&[(40.0, 80.0), (50.0, 120.0), (60.0, 180.0), (80.0, 300.0)]),
                ),
                (
                    RoadClass::Collector,
                    bands(&[(30.0, 50.0), (40.0, 80.0), (50.0, 120.0), (60.0, 160.0)]),
                ),
                (
                    RoadClass::Local,
                    bands(&[(20.0, 20.0), (30.0, 40.0), (40.0, 70.0)]),
                ),
            ],
        }
    }
}

/// Tolerances and classification shared by the idealizer and the comparison engine
///
/// Immutable for the duration of a run; shared read-only across parallel workers.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct DesignConstraints {
    /// Horizontal deviation tolerance (m); severity thresholds derive from it
    pub tolerance_horizontal_deviation: f64,
    /// Elevation deviation tolerance (m)
    pub tolerance_elevation_deviation: f64,
    /// Elevation smoothing blend factor, 0–1
    pub smoothing_factor: f64,
    pub road_class: RoadClass,
    pub context: RoadContext,
    pub design_speed_kph: f64,
    /// Flagging only, no superelevation design is performed
    pub max_superelevation: f64,
    /// Maximum longitudinal grade (rise/run) before a report flags it
    pub max_grade: f64,
    /// Fallback minimum radius for classes missing from the table (m)
    pub min_horizontal_radius: f64,
    pub radius_table: RadiusTable,
}

impl Default for DesignConstraints {
    fn default() -> Self {
        Self {
            tolerance_horizontal_deviation: 0.05,
            tolerance_elevation_deviation: 0.03,
            smoothing_factor: 0.3,
            road_class: RoadClass::Arterial,
            context: RoadContext::Urban,
            design_speed_kph: 60.0,
            max_superelevation: 0.08,
            max_grade: 0.08,
            min_horizontal_radius: 30.0,
            radius_table: RadiusTable::default(),
        }
    }
}

impl DesignConstraints {
    /// Constraints for a class and design speed, other fields at their defaults
    pub fn for_class(road_class: RoadClass, design_speed_kph: f64) -> Self {
        Self {
            road_class,
            design_speed_kph,
            ..Self::default()
        }
    }

    /// Minimum horizontal radius for the configured class and design speed
    ///
    /// Uses the nearest speed band of the class; unknown classes fall back to
    /// `max(min_horizontal_radius, 30)`.
    pub fn min_radius_for_design(&self) -> f64 {
        self.radius_table
            .lookup(&self.road_class, self.design_speed_kph)
            .unwrap_or_else(|| self.min_horizontal_radius.max(UNCLASSIFIED_RADIUS_FLOOR))
    }

    /// Reject tolerances that would make the pipeline meaningless
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            (
                "tolerance_horizontal_deviation",
                self.tolerance_horizontal_deviation,
            ),
            (
                "tolerance_elevation_deviation",
                self.tolerance_elevation_deviation,
            ),
            ("design_speed_kph", self.design_speed_kph),
            ("max_superelevation", self.max_superelevation),
            ("max_grade", self.max_grade),
            ("min_horizontal_radius", self.min_horizontal_radius),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(GeometryError::InvalidParameter { name, value });
            }
        }
        if !(0.0..=1.0).contains(&self.smoothing_factor) {
            return Err(GeometryError::InvalidParameter {
                name: "smoothing_factor",
                value: self.smoothing_factor,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints() {
        let c = DesignConstraints::default();
        assert_eq!(c.road_class, RoadClass::Arterial);
        assert_eq!(c.context, RoadContext::Urban);
        assert!((c.min_radius_for_design() - 180.0).abs() < f64::EPSILON);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_local_20_kph() {
        let c = DesignConstraints::for_class(RoadClass::Local, 20.0);
        assert_eq!(c.min_radius_for_design(), 20.0);
    }

    #[test]
    fn test_nearest_speed_band() {
        let c = DesignConstraints::for_class(RoadClass::Highway, 90.0);
        // 80 and 100 are equally near; the lower band wins
        assert_eq!(c.min_radius_for_design(), 360.0);

        let c = DesignConstraints::for_class(RoadClass::Collector, 200.0);
        assert_eq!(c.min_radius_for_design(), 160.0);

        let c = DesignConstraints::for_class(RoadClass::Arterial, 0.0);
        assert_eq!(c.min_radius_for_design(), 80.0);
    }

    #[test]
    fn test_unknown_class_falls_back() {
        let mut c = DesignConstraints::for_class("driveway".parse().unwrap(), 20.0);
        c.min_horizontal_radius = 12.0;
        assert_eq!(c.min_radius_for_design(), 30.0);

        c.min_horizontal_radius = 45.0;
        assert_eq!(c.min_radius_for_design(), 45.0);
    }

    #[test]
    fn test_pluggable_table() {
        let mut c = DesignConstraints::for_class(RoadClass::Local, 25.0);
        c.radius_table = RadiusTable {
            classes: vec![(RoadClass::Local, vec![SpeedBand {
                speed_kph: 25.0,
                min_radius: 15.0,
            }])],
        };
        assert_eq!(c.min_radius_for_design(), 15.0);

        // A class missing from a custom table falls back too
        c.road_class = RoadClass::Highway;
        assert_eq!(c.min_radius_for_design(), 30.0);
    }

    #[test]
    fn test_parse_class_and_context() {
        assert_eq!("Highway".parse::<RoadClass>().unwrap(), RoadClass::Highway);
        assert_eq!(" local ".parse::<RoadClass>().unwrap(), RoadClass::Local);
        assert_eq!(
            "ramp".parse::<RoadClass>().unwrap(),
            RoadClass::Other("ramp".to_string())
        );
        assert_eq!("RURAL".parse::<RoadContext>().unwrap(), RoadContext::Rural);
        assert!("suburban".parse::<RoadContext>().is_err());
        assert_eq!(RoadClass::Collector.to_string(), "collector");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let c = DesignConstraints {
            smoothing_factor: 1.5,
            ..DesignConstraints::default()
        };
        assert!(c.validate().is_err());

        let c = DesignConstraints {
            tolerance_horizontal_deviation: -0.01,
            ..DesignConstraints::default()
        };
        assert!(matches!(
            c.validate(),
            Err(GeometryError::InvalidParameter {
                name: "tolerance_horizontal_deviation",
                ..
            })
        ));
    }
}
