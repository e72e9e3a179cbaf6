//! Road Geometry Library - Alignment Idealization and Deviation Reporting
//!
//! This library validates road alignment geometry extracted from CAD drawings. Given a raw,
//! possibly noisy as-built polyline it synthesizes a standards-compliant "ideal" alignment
//! and reports station-synchronized deviations with severity and design-speed compatibility.
//!
//! # Architecture
//!
//! - **[`Alignment`]**: Immutable ordered 3D vertices with stationing, curvature and segmentation
//! - **[`DesignConstraints`]**: Tolerances, classification and minimum-radius policy
//! - **[`Idealizer`]**: Curvature-driven tangent/circle fitting with bounded correction
//! - **[`ComparisonEngine`]**: Station-based sampling of original vs. ideal alignments
//! - **[`ValidationReport`]**: Summary statistics, severity classification and tabular export
//! - **[`Validator`]**: The full pipeline, with parallel batch processing
//!
//! # Data Flow
//!
//! reader → [`Alignment`] → [`Idealizer::idealize`] → [`ComparisonEngine::compare`] →
//! [`Deviation`]s → [`ValidationReport`]
//!
//! # Performance Characteristics
//!
//! - **Idealize**: O(N) per alignment
//! - **Compare**: O(L/step · log N)
//! - **Self-intersection test**: O(N²)

mod alignment;
mod comparison;
mod constraints;
mod fitting;
mod idealizer;
mod report;
pub mod utils;
mod validator;

// Public API exports
pub use alignment::{
    Alignment, CurvatureRun, META_HANDLE, META_IDEALIZED, META_LAYER, META_RESAMPLE_STEP,
    META_TYPE, MIN_LOOP_LENGTH, Meta, MetaValue, RunKind, Vertex,
};
pub use comparison::{ComparisonConfig, ComparisonEngine, Deviation, MIN_STATION_STEP};
pub use constraints::{DesignConstraints, RadiusTable, RoadClass, RoadContext, SpeedBand};
pub use fitting::{CircleFit, LineFit, fit_circle, fit_line};
pub use idealizer::{IdealizeStats, Idealization, Idealizer, IdealizerConfig, IdealizerMode};
pub use report::{ErrorStats, Severity, SeverityTally, Summary, TABLE_COLUMNS, ValidationReport};
pub use validator::{Validator, ValidatorConfig};

/// Error types for the geometry engine
///
/// Fit rejections inside the idealizer are not errors; these cover precondition
/// violations and I/O while exporting.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("Empty alignment")]
    EmptyAlignment,

    #[error("Too few vertices: {required} required, {actual} given")]
    TooFewVertices { required: usize, actual: usize },

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GeometryError>;
