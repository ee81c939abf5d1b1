use serde::Deserialize;
use serde_json::Value;

use super::{validate_columns, NormalizedInput};
use crate::error::ClassifyError;
use crate::models::{ColumnDescriptor, DataType, Table};

/// One entry of a user-supplied schema.
#[derive(Debug, Deserialize)]
struct SchemaColumn {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    data_type: Option<String>,
    #[serde(default)]
    sample_values: Vec<Value>,
}

/// Accepted document shapes: a bare array, or an object with a `columns` array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SchemaDocument {
    List(Vec<SchemaColumn>),
    Wrapped { columns: Vec<SchemaColumn> },
}

/// Parse a JSON schema document into descriptors plus a synthesized table.
///
/// The table has one column per entry filled with its sample values, padded
/// with empty cells, so schema input can be exported like CSV input.
pub fn from_json_str(text: &str, source_name: &str) -> Result<NormalizedInput, ClassifyError> {
    let doc: SchemaDocument = serde_json::from_str(text).map_err(|e| {
        ClassifyError::input(format!(
            "unrecognized JSON schema (expected a list of columns or {{\"columns\": [...]}}): {}",
            e
        ))
    })?;

    let entries = match doc {
        SchemaDocument::List(entries) => entries,
        SchemaDocument::Wrapped { columns } => columns,
    };

    let mut columns = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let name = entry
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                ClassifyError::input(format!("schema entry {} has no name", index + 1))
            })?;
        let data_type = entry
            .data_type
            .as_deref()
            .map(map_type_name)
            .unwrap_or(DataType::Unknown);
        let samples: Vec<Value> = entry.sample_values.into_iter().filter(is_scalar).collect();
        columns.push(ColumnDescriptor::new(name, data_type, samples));
    }
    validate_columns(&columns)?;

    let table = synthesize_table(&columns);
    Ok(NormalizedInput {
        source_name: source_name.to_string(),
        columns,
        table,
    })
}

/// Map the type names users (and pandas dtypes) produce onto [`DataType`].
pub fn map_type_name(raw: &str) -> DataType {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "string" | "str" | "object" | "text" | "varchar" => DataType::String,
        "int" | "integer" | "int64" | "int32" | "long" | "bigint" => DataType::Int,
        "float" | "double" | "number" | "float64" | "float32" | "decimal" | "numeric" => {
            DataType::Float
        }
        "bool" | "boolean" => DataType::Bool,
        "date" | "datetime" | "timestamp" => DataType::Date,
        other if other.starts_with("datetime64") => DataType::Date,
        _ => DataType::Unknown,
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn synthesize_table(columns: &[ColumnDescriptor]) -> Table {
    let height = columns
        .iter()
        .map(|c| c.sample_values.len())
        .max()
        .unwrap_or(0);

    let rows = (0..height)
        .map(|row| {
            columns
                .iter()
                .map(|c| c.sample_values.get(row).map(scalar_text).unwrap_or_default())
                .collect()
        })
        .collect();

    Table {
        headers: columns.iter().map(|c| c.name.clone()).collect(),
        rows,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
