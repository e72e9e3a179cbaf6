//! Road Geometry Validator
//!
//! Reads alignments from JSON, idealizes and compares each one in parallel and writes a
//! deviation table per alignment plus a run summary.

mod input;
mod logging;
mod reporting;
mod settings;

use input::InputAlignment;
use reporting::{ReportContext, RunSummary};
use road_geometry_lib::{GeometryError, Validator};
use settings::Settings;
use std::process::ExitCode;

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let settings = Settings::from_cli();
    logging::setup_logging(settings.verbose);

    match run(&settings) {
        Ok(summary) => summary.exit_code(),
        Err(err) => {
            tracing::error!(error = %err, "Validation run failed");
            ExitCode::from(1)
        }
    }
}

fn run(settings: &Settings) -> Result<RunSummary, CliError> {
    profiling::scope!("run");

    let config = settings.validator_config()?;
    tracing::info!(
        mode = %config.idealizer.mode,
        road_class = %config.constraints.road_class,
        design_speed = config.constraints.design_speed_kph,
        min_radius = config.constraints.min_radius_for_design(),
        "Starting validation"
    );

    let entries = input::load_all(&settings.input)?;
    let mut context = ReportContext::open(&settings.output_dir)?;

    // Construction failures are recorded as they are; the rest run as one batch
    let mut labels = Vec::with_capacity(entries.len());
    let mut alignments = Vec::with_capacity(entries.len());
    for InputAlignment { label, alignment } in entries {
        match alignment {
            Ok(alignment) => {
                labels.push(label);
                alignments.push(alignment);
            }
            Err(err) => context.record_failure(&label, &err),
        }
    }

    let validator = Validator::new(config);
    let results = validator.validate_all(alignments);
    for (label, result) in labels.iter().zip(results) {
        match result {
            Ok(report) => context.record(label, &report)?,
            Err(err) => context.record_failure(label, &err),
        }
    }

    context.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    #[test]
    fn test_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("site.json");
        fs::write(
            &input,
            r#"{"alignments": [
                {"vertices": [[0, 0, 0], [50, 0.06, 0], [100, -0.06, 0], [150, 0.06, 0],
                              [200, -0.06, 0], [250, 0.06, 0], [300, 0, 0]],
                 "meta": {"handle": "A1"}},
                {"vertices": [[0, 0, 0], [10, 0, 0], [20, 0, 0]]},
                {"vertices": [[1, 1, 1]]},
                {"vertices": []}
            ]}"#,
        )
        .unwrap();
        let out = dir.path().join("out");

        let settings = Settings::try_parse_from([
            "road-geometry-validator",
            "--input",
            input.to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
            "--mode",
            "aggressive",
        ])
        .unwrap();
        let summary = run(&settings).unwrap();

        assert_eq!(summary.alignments, 4);
        assert_eq!(summary.validated, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.status(), 1);
        assert!(out.join("A1_deviations.csv").exists());
        assert!(out.join("site_1_deviations.csv").exists());
        assert!(out.join(reporting::SUMMARY_FILE).exists());
    }

    #[test]
    fn test_run_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::try_parse_from([
            "road-geometry-validator",
            "--input",
            dir.path().join("missing.json").to_str().unwrap(),
            "--output-dir",
            dir.path().join("out").to_str().unwrap(),
        ])
        .unwrap();
        assert!(matches!(run(&settings), Err(CliError::Io(_))));
    }
}
