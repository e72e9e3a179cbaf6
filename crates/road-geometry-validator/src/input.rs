//! JSON alignment input
//!
//! ```json
//! {"alignments": [{"vertices": [[x, y, z], ...], "meta": {"handle": "1F", "layer": "ROAD_CL"}}]}
//! ```

use crate::CliError;
use road_geometry_lib::{Alignment, GeometryError, META_HANDLE, Meta, MetaValue, Vertex};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDocument {
    alignments: Vec<AlignmentRecord>,
}

#[derive(Debug, Deserialize)]
struct AlignmentRecord {
    vertices: Vec<[f64; 3]>,
    #[serde(default)]
    meta: Meta,
}

/// One alignment read from input; construction errors stay with their entry
#[derive(Debug)]
pub struct InputAlignment {
    pub label: String,
    pub alignment: Result<Alignment, GeometryError>,
}

/// Parse an input document; `source` names the fallback labels
pub fn parse_alignments<R: Read>(reader: R, source: &str) -> Result<Vec<InputAlignment>, CliError> {
    let document: InputDocument = serde_json::from_reader(reader)?;
    let entries = document
        .alignments
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let label = label_for(&record.meta, source, index);
            let vertices = record.vertices.into_iter().map(Vertex::from).collect();
            InputAlignment {
                label,
                alignment: Alignment::new(vertices, record.meta),
            }
        })
        .collect();
    Ok(entries)
}

/// Read one input file
pub fn load_file(path: &Path) -> Result<Vec<InputAlignment>, CliError> {
    let source = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("alignment");
    let reader = BufReader::new(File::open(path)?);
    let entries = parse_alignments(reader, source)?;
    tracing::info!(path = %path.display(), alignments = entries.len(), "Loaded input");
    Ok(entries)
}

/// Read every input file in order
pub fn load_all(paths: &[PathBuf]) -> Result<Vec<InputAlignment>, CliError> {
    let mut all = Vec::new();
    for path in paths {
        all.extend(load_file(path)?);
    }
    Ok(all)
}

/// Entity handle when present, otherwise `<source>_<index>`
fn label_for(meta: &Meta, source: &str, index: usize) -> String {
    match meta.get(META_HANDLE) {
        Some(MetaValue::Text(handle)) if !handle.trim().is_empty() => handle.trim().to_string(),
        Some(MetaValue::Number(handle)) => format!("{handle}"),
        _ => format!("{source}_{index}"),
    }
}
