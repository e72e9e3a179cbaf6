//! Validation pipeline: idealize → compare → report, for one alignment or a batch

use crate::alignment::Alignment;
use crate::comparison::{ComparisonConfig, ComparisonEngine};
use crate::idealizer::{Idealizer, IdealizerConfig};
use crate::report::ValidationReport;
use crate::{DesignConstraints, GeometryError, Result};
use rayon::prelude::*;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Everything the pipeline needs, fixed for a run
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct ValidatorConfig {
    pub constraints: DesignConstraints,
    pub idealizer: IdealizerConfig,
    pub comparison: ComparisonConfig,
}

/// Runs the full pipeline with shared, read-only configuration
#[derive(Debug, Clone)]
pub struct Validator {
    idealizer: Idealizer,
    engine: ComparisonEngine,
    constraints: DesignConstraints,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        let engine = ComparisonEngine::new(&config.constraints, config.comparison);
        let idealizer = Idealizer::new(config.constraints.clone(), config.idealizer);
        Self {
            idealizer,
            engine,
            constraints: config.constraints,
        }
    }

    #[inline]
    pub fn constraints(&self) -> &DesignConstraints {
        &self.constraints
    }

    #[inline]
    pub fn idealizer(&self) -> &Idealizer {
        &self.idealizer
    }

    #[inline]
    pub fn engine(&self) -> &ComparisonEngine {
        &self.engine
    }

    /// Validate a single alignment
    ///
    /// # Returns
    /// The report, or an error for invalid constraints or fewer than two vertices
    pub fn validate(&self, alignment: Alignment) -> Result<ValidationReport> {
        #[cfg(feature = "profiling")]
        profiling::scope!("validator::validate");

        self.constraints.validate()?;
        if alignment.len() < 2 {
            return Err(GeometryError::TooFewVertices {
                required: 2,
                actual: alignment.len(),
            });
        }
        if alignment.has_self_intersection() {
            tracing::warn!(vertices = alignment.len(), "Alignment intersects itself");
        } else if alignment.has_loop() {
            tracing::warn!(vertices = alignment.len(), "Alignment looks like a loop");
        }

        let original = Arc::new(alignment);
        let ideal = Arc::new(self.idealizer.idealize(&original));
        let deviations = self.engine.compare(&original, &ideal);

        let report = ValidationReport::new(original, ideal, deviations, self.constraints.clone());
        if let Some(worst) = report.worst_severity() {
            tracing::info!(
                deviations = report.deviations().len(),
                %worst,
                "Validated alignment"
            );
        } else {
            tracing::info!("Validated alignment, no deviations");
        }
        Ok(report)
    }

    /// Validate many alignments in parallel
    ///
    /// Results keep the input order; a failing alignment yields its own error and
    /// does not affect the others.
    pub fn validate_all(&self, alignments: Vec<Alignment>) -> Vec<Result<ValidationReport>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("validator::validate_all");

        let results: Vec<Result<ValidationReport>> = alignments
            .into_par_iter()
            .enumerate()
            .map(|(index, alignment)| {
                self.validate(alignment).inspect_err(|err| {
                    tracing::warn!(index, error = %err, "Alignment failed validation");
                })
            })
            .collect();

        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(
            total = results.len(),
            failed,
            "Batch validation finished"
        );
        results
    }
}
