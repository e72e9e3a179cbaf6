//! Report output for a validation run
//!
//! A [`ReportContext`] is opened on an output directory, receives every alignment result
//! and is closed once, writing the run-level `summary.json`.

use crate::CliError;
use road_geometry_lib::{GeometryError, SeverityTally, Summary, ValidationReport};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub const SUMMARY_FILE: &str = "summary.json";
const TABLE_SUFFIX: &str = "_deviations.csv";

/// Outcome of one alignment in the run summary
#[derive(Debug, Clone, Serialize)]
pub struct AlignmentEntry {
    pub label: String,
    /// Deviation table file name, relative to the output directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_vertices: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ideal_vertices: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

/// Contents of `summary.json`
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub alignments: usize,
    pub validated: usize,
    pub failed: usize,
    /// Severity counts over all validated alignments
    pub severity: SeverityTally,
    pub entries: Vec<AlignmentEntry>,
}

impl RunSummary {
    /// 1 when an alignment could not be validated, 2 when any deviation is high, else 0
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.status())
    }

    pub fn status(&self) -> u8 {
        if self.failed > 0 {
            1
        } else if self.severity.high > 0 {
            2
        } else {
            0
        }
    }
}

/// Collects results of a run into an output directory
#[derive(Debug)]
pub struct ReportContext {
    dir: PathBuf,
    used_names: HashSet<String>,
    summary: RunSummary,
}

impl ReportContext {
    /// Create the output directory if needed
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CliError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "Opened report directory");
        Ok(Self {
            dir,
            used_names: HashSet::new(),
            summary: RunSummary::default(),
        })
    }

    /// Write the deviation table of a validated alignment
    pub fn record(&mut self, label: &str, report: &ValidationReport) -> Result<(), CliError> {
        let table = format!("{}{TABLE_SUFFIX}", self.unique_name(label));
        let writer = BufWriter::new(File::create(self.dir.join(&table))?);
        report.write_table(writer)?;

        let summary = report.summary();
        tracing::info!(
            label,
            deviations = summary.count,
            high = summary.severity.high,
            medium = summary.severity.medium,
            "Wrote {table}"
        );
        self.summary.severity.merge(&summary.severity);
        self.summary.validated += 1;
        self.push(AlignmentEntry {
            label: label.to_string(),
            table: Some(table),
            error: None,
            original_vertices: Some(report.original().len()),
            ideal_vertices: Some(report.ideal().len()),
            summary: Some(summary),
        });
        Ok(())
    }

    /// Note an alignment that could not be validated
    pub fn record_failure(&mut self, label: &str, error: &GeometryError) {
        tracing::warn!(label, %error, "Alignment skipped");
        self.summary.failed += 1;
        self.push(AlignmentEntry {
            label: label.to_string(),
            table: None,
            error: Some(error.to_string()),
            original_vertices: None,
            ideal_vertices: None,
            summary: None,
        });
    }

    /// Write `summary.json` and hand back the run summary
    pub fn close(self) -> Result<RunSummary, CliError> {
        let path = self.dir.join(SUMMARY_FILE);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, &self.summary)?;
        tracing::info!(
            alignments = self.summary.alignments,
            failed = self.summary.failed,
            high = self.summary.severity.high,
            "Wrote {}",
            path.display()
        );
        Ok(self.summary)
    }

    fn push(&mut self, entry: AlignmentEntry) {
        self.summary.alignments += 1;
        self.summary.entries.push(entry);
    }

    /// File-system safe, unique base name for a label
    fn unique_name(&mut self, label: &str) -> String {
        let base = sanitize(label);
        let mut name = base.clone();
        let mut n = 1;
        while !self.used_names.insert(name.clone()) {
            n += 1;
            name = format!("{base}_{n}");
        }
        name
    }
}

fn sanitize(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "alignment".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use road_geometry_lib::{Alignment, TABLE_COLUMNS, Validator, ValidatorConfig};

    fn report(offset: f64) -> ValidationReport {
        // A 6 cm wobble corrected in aggressive mode produces deviation rows
        let alignment = Alignment::from_points((0..=10).map(|i| {
            let y = if i % 2 == 0 { 0.06 } else { -0.06 };
            (i as f64 * 50.0, y + offset, 0.0)
        }))
        .unwrap();
        let config = ValidatorConfig {
            idealizer: road_geometry_lib::IdealizerConfig::aggressive(),
            ..ValidatorConfig::default()
        };
        Validator::new(config).validate(alignment).unwrap()
    }

    #[test]
    fn test_report_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("reports");

        let mut context = ReportContext::open(&out).unwrap();
        context.record("2A", &report(0.0)).unwrap();
        context.record("2A", &report(100.0)).unwrap();
        context.record_failure("bad/one", &GeometryError::EmptyAlignment);
        let summary = context.close().unwrap();

        assert_eq!(summary.alignments, 3);
        assert_eq!(summary.validated, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.status(), 1);

        let table = fs::read_to_string(out.join("2A_deviations.csv")).unwrap();
        assert_eq!(table.lines().next(), Some(TABLE_COLUMNS.join(",").as_str()));
        assert!(table.lines().count() > 1);
        assert!(out.join("2A_2_deviations.csv").exists());

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(SUMMARY_FILE)).unwrap()).unwrap();
        assert_eq!(json["alignments"], 3);
        assert_eq!(json["entries"][0]["table"], "2A_deviations.csv");
        assert_eq!(json["entries"][2]["error"], "Empty alignment");
        assert!(json["entries"][0]["summary"]["horizontal"]["max"].is_number());
    }

    #[test]
    fn test_exit_status() {
        let mut summary = RunSummary::default();
        assert_eq!(summary.status(), 0);
        summary.severity.high = 3;
        assert_eq!(summary.status(), 2);
        summary.failed = 1;
        assert_eq!(summary.status(), 1);
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("ROAD CL/1"), "ROAD_CL_1");
        assert_eq!(sanitize("a-b_c"), "a-b_c");
        assert_eq!(sanitize(""), "alignment");
    }
}
