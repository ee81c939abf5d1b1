//! Input normalization: turn an uploaded CSV or JSON schema into column descriptors.
//!
//! - [`tabular`] — CSV header row + data rows; types are inferred from the cells.
//! - [`json`] — `[{name, type, sample_values}]` or `{"columns": [...]}`.

pub mod json;
pub mod tabular;

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::error::ClassifyError;
use crate::models::{ColumnDescriptor, Table};

/// The normalized view of one input, ready for classification and export.
#[derive(Debug, Clone)]
pub struct NormalizedInput {
    pub source_name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub table: Table,
}

/// Load an input file, dispatching on its extension (`.json` → schema, else CSV).
pub fn load_input(path: &Path) -> Result<NormalizedInput, ClassifyError> {
    let source_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input")
        .to_string();

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let input = if is_json {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ClassifyError::input(format!("cannot read {}: {}", path.display(), e))
        })?;
        json::from_json_str(&text, &source_name)?
    } else {
        tabular::from_csv_path(path)?
    };

    info!(
        source = %input.source_name,
        columns = input.columns.len(),
        rows = input.table.rows.len(),
        "input normalized"
    );
    Ok(input)
}

/// Reject empty column sets and duplicate names; both break positional alignment.
pub(crate) fn validate_columns(columns: &[ColumnDescriptor]) -> Result<(), ClassifyError> {
    if columns.is_empty() {
        return Err(ClassifyError::input("no columns found"));
    }
    let mut seen = HashSet::new();
    for col in columns {
        if col.name.trim().is_empty() {
            return Err(ClassifyError::input("column with an empty name"));
        }
        if !seen.insert(col.name.as_str()) {
            return Err(ClassifyError::input(format!(
                "duplicate column name \"{}\"",
                col.name
            )));
        }
    }
    Ok(())
}
