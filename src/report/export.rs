use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    confidence_distribution, percent, ClassificationResult, ColumnDescriptor, SensitivityLevel,
    Table, MAX_CONFIDENCE, MIN_CONFIDENCE,
};

/// Run-level facts stamped on every export. The timestamp is an input so
/// identical inputs always produce identical bytes.
#[derive(Debug, Clone)]
pub struct ExportMeta {
    pub source_name: String,
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
    Markdown,
}

/// Original table plus `sensitivity_level`, `confidence` and `reasoning` columns.
///
/// Row *i* carries the classification of column *i*; rows are appended when
/// the table has more columns than rows.
pub fn to_annotated_table(table: &Table, results: &[ClassificationResult]) -> Result<Vec<u8>> {
    let width = table.headers.len();
    let height = table.rows.len().max(results.len());

    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header: Vec<&str> = table.headers.iter().map(String::as_str).collect();
    header.extend(["sensitivity_level", "confidence", "reasoning"]);
    writer.write_record(&header)?;

    for row in 0..height {
        let mut record: Vec<String> = (0..width).map(|col| table.cell(row, col).to_string()).collect();
        match results.get(row) {
            Some(r) => {
                record.push(r.sensitivity_level.label().to_string());
                record.push(r.confidence.to_string());
                record.push(r.reasoning.clone());
            }
            None => record.extend([String::new(), String::new(), String::new()]),
        }
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV: {}", e.error()))
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    source: &'a str,
    model: &'a str,
    column_metadata_sent: &'a [ColumnDescriptor],
    classification_results: &'a [ClassificationResult],
    summary: ReportSummary,
}

#[derive(Serialize)]
struct ReportSummary {
    total_columns: usize,
    sensitive_columns_count: usize,
    public_columns_count: usize,
    internal_columns_count: usize,
    unclassified_columns_count: usize,
    flagged_columns_count: usize,
}

/// Structured JSON report of one run.
pub fn to_report(
    meta: &ExportMeta,
    columns: &[ColumnDescriptor],
    results: &[ClassificationResult],
) -> Result<Vec<u8>> {
    let count = |level: SensitivityLevel| {
        results
            .iter()
            .filter(|r| r.sensitivity_level == level)
            .count()
    };

    let report = JsonReport {
        generated_at: meta.generated_at.to_rfc3339(),
        source: &meta.source_name,
        model: &meta.model,
        column_metadata_sent: columns,
        classification_results: results,
        summary: ReportSummary {
            total_columns: results.len(),
            sensitive_columns_count: results
                .iter()
                .filter(|r| r.sensitivity_level.is_sensitive())
                .count(),
            public_columns_count: count(SensitivityLevel::Public),
            internal_columns_count: count(SensitivityLevel::Internal),
            unclassified_columns_count: count(SensitivityLevel::Unclassified),
            flagged_columns_count: results.iter().filter(|r| r.is_flagged()).count(),
        },
    };

    let mut bytes = serde_json::to_vec_pretty(&report)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Human-readable Markdown summary: counts per level, flagged columns, details.
pub fn to_summary(meta: &ExportMeta, results: &[ClassificationResult]) -> String {
    let mut counts: HashMap<SensitivityLevel, usize> = HashMap::new();
    for r in results {
        *counts.entry(r.sensitivity_level).or_insert(0) += 1;
    }

    let mut md = String::from("# Data Sensitivity Classification Report\n\n");
    md.push_str(&format!(
        "**Generated On:** {}\n",
        meta.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!("**Source:** `{}`\n", meta.source_name));
    md.push_str(&format!("**Model:** `{}`\n\n", meta.model));

    md.push_str("## Classification Summary\n\n");
    md.push_str("| Sensitivity Level | Count |\n");
    md.push_str("|-------------------|-------|\n");
    for level in SensitivityLevel::REPORT_ORDER {
        md.push_str(&format!(
            "| {} | {} |\n",
            level,
            counts.get(&level).copied().unwrap_or(0)
        ));
    }
    md.push('\n');

    md.push_str("## Confidence Distribution\n\n");
    md.push_str("| Confidence | Count | Share |\n");
    md.push_str("|------------|-------|-------|\n");
    let distribution = confidence_distribution(results);
    for score in (MIN_CONFIDENCE..=MAX_CONFIDENCE).rev() {
        let n = distribution[usize::from(score - MIN_CONFIDENCE)];
        md.push_str(&format!(
            "| {}/5 | {} | {}% |\n",
            score,
            n,
            percent(n, results.len())
        ));
    }
    md.push('\n');

    md.push_str("## Flagged Columns\n\n");
    let flagged: Vec<&ClassificationResult> = results.iter().filter(|r| r.is_flagged()).collect();
    if flagged.is_empty() {
        md.push_str("None.\n\n");
    } else {
        for r in flagged {
            let mut notes: Vec<String> = r.flags.iter().map(ToString::to_string).collect();
            if notes.is_empty() {
                notes.push("unclassified".to_string());
            }
            md.push_str(&format!(
                "- `{}` ({}): {}\n",
                r.column_name,
                r.sensitivity_level,
                notes.join("; ")
            ));
        }
        md.push('\n');
    }

    md.push_str("## Column Details\n\n");
    for r in results {
        let reasoning = if r.reasoning.is_empty() {
            "No reasoning provided."
        } else {
            r.reasoning.as_str()
        };
        md.push_str(&format!("### Column: `{}`\n", r.column_name));
        md.push_str(&format!("- **Sensitivity Level:** `{}`\n", r.sensitivity_level));
        md.push_str(&format!("- **Confidence:** `{}/5`\n", r.confidence));
        md.push_str(&format!("- **Reasoning:** {}\n\n", reasoning));
    }

    md
}

/// Write the selected formats under `dir`, returning the paths written.
pub fn write_exports(
    dir: &Path,
    formats: &[ExportFormat],
    meta: &ExportMeta,
    table: &Table,
    columns: &[ColumnDescriptor],
    results: &[ClassificationResult],
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let stem = Path::new(&meta.source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input");

    let mut written = Vec::new();
    for format in formats {
        let (path, bytes) = match format {
            ExportFormat::Csv => (
                dir.join(format!("classified_{}.csv", stem)),
                to_annotated_table(table, results)?,
            ),
            ExportFormat::Json => (
                dir.join(format!("{}_report.json", stem)),
                to_report(meta, columns, results)?,
            ),
            ExportFormat::Markdown => (
                dir.join(format!("{}_summary.md", stem)),
                to_summary(meta, results).into_bytes(),
            ),
        };
        std::fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    use crate::models::{DataType, ValidationFlag};

    fn meta() -> ExportMeta {
        ExportMeta {
            source_name: "customers.csv".to_string(),
            model: "gemini-1.5-flash".to_string(),
            generated_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        }
    }

    fn table() -> Table {
        Table {
            headers: vec!["user_email".into(), "revenue_q1".into(), "notes".into()],
            rows: vec![
                vec!["john@example.com".into(), "12000.5".into(), "vip".into()],
                vec!["jane@corp.com".into(), "15000.75".into(), "".into()],
            ],
        }
    }

    fn columns() -> Vec<ColumnDescriptor> {
        vec![
            ColumnDescriptor::new("user_email", DataType::String, vec![json!("john@example.com")]),
            ColumnDescriptor::new("revenue_q1", DataType::Float, vec![json!(12000.5)]),
            ColumnDescriptor::new("notes", DataType::String, vec![json!("vip")]),
        ]
    }

    fn results() -> Vec<ClassificationResult> {
        vec![
            ClassificationResult {
                column_name: "user_email".into(),
                sensitivity_level: SensitivityLevel::Pii,
                confidence: 5,
                reasoning: "Email, addresses.".into(),
                flags: vec![],
            },
            ClassificationResult {
                column_name: "revenue_q1".into(),
                sensitivity_level: SensitivityLevel::FinanceCritical,
                confidence: 5,
                reasoning: "Revenue.".into(),
                flags: vec![ValidationFlag::ConfidenceClamped { raw: "7".into() }],
            },
            ClassificationResult {
                column_name: "notes".into(),
                sensitivity_level: SensitivityLevel::Unclassified,
                confidence: 3,
                reasoning: String::new(),
                flags: vec![ValidationFlag::UnknownLevel { raw: "Sensitive".into() }],
            },
        ]
    }

    #[test]
    fn test_annotated_table_appends_three_columns() {
        let bytes = to_annotated_table(&table(), &results()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "user_email,revenue_q1,notes,sensitivity_level,confidence,reasoning"
        );
        assert_eq!(lines[1], "john@example.com,12000.5,vip,PII,5,\"Email, addresses.\"");
        assert_eq!(lines[2], "jane@corp.com,15000.75,,Finance-critical,5,Revenue.");
        // more columns than rows: padded row carries the third classification
        assert_eq!(lines[3], ",,,Unclassified,3,");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_report_contains_results_and_summary() {
        let bytes = to_report(&meta(), &columns(), &results()).unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["generated_at"], "2024-03-01T12:30:00+00:00");
        assert_eq!(v["source"], "customers.csv");
        assert_eq!(v["classification_results"][1]["sensitivity_level"], "Finance-critical");
        assert_eq!(v["column_metadata_sent"][0]["type"], "string");
        assert_eq!(v["summary"]["total_columns"], 3);
        assert_eq!(v["summary"]["sensitive_columns_count"], 2);
        assert_eq!(v["summary"]["unclassified_columns_count"], 1);
        assert_eq!(v["summary"]["flagged_columns_count"], 2);
    }

    #[test]
    fn test_summary_counts_and_flags() {
        let md = to_summary(&meta(), &results());
        assert!(md.contains("**Generated On:** 2024-03-01 12:30:00 UTC"));
        assert!(md.contains("| PII | 1 |"));
        assert!(md.contains("| Finance-critical | 1 |"));
        assert!(md.contains("| Public | 0 |"));
        assert!(md.contains("| Unclassified | 1 |"));
        assert!(md.contains("- `notes` (Unclassified): unknown level \"Sensitive\""));
        assert!(md.contains("- `revenue_q1` (Finance-critical): confidence \"7\" adjusted into 1-5"));
        assert!(!md.contains("- `user_email` ("));
        assert!(md.contains("- **Reasoning:** No reasoning provided."));
    }

    #[test]
    fn test_summary_confidence_distribution() {
        let md = to_summary(&meta(), &results());
        let section = md
            .split("## Confidence Distribution")
            .nth(1)
            .unwrap()
            .split("## Flagged Columns")
            .next()
            .unwrap();
        assert!(section.contains("| 5/5 | 2 | 67% |"));
        assert!(section.contains("| 3/5 | 1 | 33% |"));
        assert!(section.contains("| 1/5 | 0 | 0% |"));
        assert!(section.find("| 5/5").unwrap() < section.find("| 1/5").unwrap());

        let empty = to_summary(&meta(), &[]);
        assert!(empty.contains("| 4/5 | 0 | 0% |"));
    }

    #[test]
    fn test_exports_are_deterministic() {
        assert_eq!(
            to_report(&meta(), &columns(), &results()).unwrap(),
            to_report(&meta(), &columns(), &results()).unwrap()
        );
        assert_eq!(to_summary(&meta(), &results()), to_summary(&meta(), &results()));
        assert_eq!(
            to_annotated_table(&table(), &results()).unwrap(),
            to_annotated_table(&table(), &results()).unwrap()
        );
    }

    #[test]
    fn test_write_exports_names_files_after_source() {
        let dir = TempDir::new().unwrap();
        let written = write_exports(
            dir.path(),
            &[ExportFormat::Csv, ExportFormat::Json, ExportFormat::Markdown],
            &meta(),
            &table(),
            &columns(),
            &results(),
        )
        .unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec!["classified_customers.csv", "customers_report.json", "customers_summary.md"]
        );
        assert!(written.iter().all(|p| p.exists()));
    }
}
