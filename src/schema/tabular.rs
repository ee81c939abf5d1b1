use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, Trim};
use serde_json::{Number, Value};

use super::{validate_columns, NormalizedInput};
use crate::error::ClassifyError;
use crate::models::{ColumnDescriptor, DataType, Table, MAX_SAMPLE_VALUES};

/// Parse a CSV file with a header row.
pub fn from_csv_path(path: &Path) -> Result<NormalizedInput, ClassifyError> {
    let file = std::fs::File::open(path)
        .map_err(|e| ClassifyError::input(format!("cannot read {}: {}", path.display(), e)))?;
    let source_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("input.csv");
    from_csv_reader(file, source_name)
}

/// Parse CSV content. Rows may be ragged; missing cells count as empty.
pub fn from_csv_reader<R: Read>(reader: R, source_name: &str) -> Result<NormalizedInput, ClassifyError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ClassifyError::input(format!("failed to read CSV header: {}", e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            ClassifyError::input(format!("failed to parse CSV row {}: {}", index + 1, e))
        })?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    let table = Table { headers, rows };
    let columns = describe_columns(&table);
    validate_columns(&columns)?;

    Ok(NormalizedInput {
        source_name: source_name.to_string(),
        columns,
        table,
    })
}

/// Build one descriptor per header from the table's cells.
pub fn describe_columns(table: &Table) -> Vec<ColumnDescriptor> {
    table
        .headers
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let cells: Vec<&str> = (0..table.rows.len())
                .map(|row| table.cell(row, col))
                .filter(|c| !c.is_empty())
                .collect();
            let data_type = infer_type(&cells);

            let mut samples: Vec<&str> = Vec::new();
            for cell in &cells {
                if samples.len() == MAX_SAMPLE_VALUES {
                    break;
                }
                if !samples.contains(cell) {
                    samples.push(cell);
                }
            }
            let sample_values = samples.iter().map(|c| typed_value(c, data_type)).collect();

            ColumnDescriptor::new(name.clone(), data_type, sample_values)
        })
        .collect()
}

/// Narrowest type every non-empty cell satisfies.
pub fn infer_type(cells: &[&str]) -> DataType {
    if cells.is_empty() {
        return DataType::Unknown;
    }
    if cells.iter().all(|c| parse_bool(c).is_some()) {
        DataType::Bool
    } else if cells.iter().all(|c| c.parse::<i64>().is_ok()) {
        DataType::Int
    } else if cells.iter().all(|c| c.parse::<f64>().map(f64::is_finite).unwrap_or(false)) {
        DataType::Float
    } else if cells.iter().all(|c| is_date(c)) {
        DataType::Date
    } else {
        DataType::String
    }
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn is_date(cell: &str) -> bool {
    NaiveDate::parse_from_str(cell, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(cell, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S").is_ok()
        || DateTime::parse_from_rfc3339(cell).is_ok()
}

/// Convert a cell into a JSON scalar matching the column type.
fn typed_value(cell: &str, data_type: DataType) -> Value {
    match data_type {
        DataType::Bool => parse_bool(cell).map(Value::Bool),
        DataType::Int => cell.parse::<i64>().ok().map(Value::from),
        DataType::Float => cell
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        _ => None,
    }
    .unwrap_or_else(|| Value::String(cell.to_string()))
}
