use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of sample values sent to the model per column.
pub const MAX_SAMPLE_VALUES: usize = 2;

/// Lowest and highest confidence score a result may carry.
pub const MIN_CONFIDENCE: u8 = 1;
pub const MAX_CONFIDENCE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Int,
    Float,
    Bool,
    Date,
    Unknown,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::String => write!(f, "string"),
            DataType::Int => write!(f, "int"),
            DataType::Float => write!(f, "float"),
            DataType::Bool => write!(f, "bool"),
            DataType::Date => write!(f, "date"),
            DataType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Normalized metadata for one input column.
///
/// Only the name, the inferred type and at most [`MAX_SAMPLE_VALUES`]
/// scalar samples ever leave the machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub sample_values: Vec<Value>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: DataType, mut sample_values: Vec<Value>) -> Self {
        sample_values.truncate(MAX_SAMPLE_VALUES);
        Self {
            name: name.into(),
            data_type,
            sample_values,
        }
    }
}

/// The tabular input a batch was derived from, kept for the annotated export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Cell at `(row, col)`, empty for ragged rows.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Sampling parameters forwarded to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.95
}

fn default_top_k() -> u32 {
    40
}

fn default_max_output_tokens() -> u32 {
    1024
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

/// One batch submission: the columns, the rendered prompt and the sampling setup.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub columns: Vec<ColumnDescriptor>,
    pub generation_params: GenerationParams,
    pub prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensitivityLevel {
    Public,
    Internal,
    Confidential,
    #[serde(rename = "PII")]
    Pii,
    #[serde(rename = "Finance-critical")]
    FinanceCritical,
    Unclassified,
}

impl SensitivityLevel {
    /// The labels the model may choose from, least to most sensitive.
    pub const ASSIGNABLE: [SensitivityLevel; 5] = [
        SensitivityLevel::Public,
        SensitivityLevel::Internal,
        SensitivityLevel::Confidential,
        SensitivityLevel::Pii,
        SensitivityLevel::FinanceCritical,
    ];

    /// Order used by summaries: most sensitive first, fallback last.
    pub const REPORT_ORDER: [SensitivityLevel; 6] = [
        SensitivityLevel::Pii,
        SensitivityLevel::FinanceCritical,
        SensitivityLevel::Confidential,
        SensitivityLevel::Internal,
        SensitivityLevel::Public,
        SensitivityLevel::Unclassified,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SensitivityLevel::Public => "Public",
            SensitivityLevel::Internal => "Internal",
            SensitivityLevel::Confidential => "Confidential",
            SensitivityLevel::Pii => "PII",
            SensitivityLevel::FinanceCritical => "Finance-critical",
            SensitivityLevel::Unclassified => "Unclassified",
        }
    }

    /// Case-insensitive match against the assignable labels only.
    pub fn parse_label(raw: &str) -> Option<SensitivityLevel> {
        let trimmed = raw.trim();
        Self::ASSIGNABLE
            .into_iter()
            .find(|level| level.label().eq_ignore_ascii_case(trimmed))
    }

    pub fn is_sensitive(&self) -> bool {
        matches!(
            self,
            SensitivityLevel::Pii | SensitivityLevel::FinanceCritical | SensitivityLevel::Confidential
        )
    }
}

impl std::fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A per-column validation issue that was recovered locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationFlag {
    UnknownLevel { raw: String },
    MissingLevel,
    ConfidenceClamped { raw: String },
    ConfidenceMissing,
    ColumnNameMismatch { reported: String },
    UnparsableEntry { raw: String },
}

impl std::fmt::Display for ValidationFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationFlag::UnknownLevel { raw } => write!(f, "unknown level \"{}\"", raw),
            ValidationFlag::MissingLevel => write!(f, "missing level"),
            ValidationFlag::ConfidenceClamped { raw } => {
                write!(f, "confidence \"{}\" adjusted into 1-5", raw)
            }
            ValidationFlag::ConfidenceMissing => write!(f, "missing confidence"),
            ValidationFlag::ColumnNameMismatch { reported } => {
                write!(f, "model reported column \"{}\"", reported)
            }
            ValidationFlag::UnparsableEntry { raw } => write!(f, "unparsable entry: {}", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub column_name: String,
    pub sensitivity_level: SensitivityLevel,
    pub confidence: u8,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<ValidationFlag>,
}

impl ClassificationResult {
    pub fn is_flagged(&self) -> bool {
        !self.flags.is_empty() || self.sensitivity_level == SensitivityLevel::Unclassified
    }
}

/// Number of results at each confidence score; index 0 holds score 1.
pub fn confidence_distribution(results: &[ClassificationResult]) -> [usize; 5] {
    let mut counts = [0; 5];
    for r in results {
        let score = r.confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
        counts[usize::from(score - MIN_CONFIDENCE)] += 1;
    }
    counts
}

/// Whole-number percentage, rounded to nearest; 0 for an empty total.
pub fn percent(part: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        (part * 100 + total / 2) / total
    }
}

/// Successful outcome of one batch. Individual results may still carry flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationBatch {
    pub model: String,
    pub results: Vec<ClassificationResult>,
}

impl ClassificationBatch {
    pub fn has_warnings(&self) -> bool {
        self.results.iter().any(ClassificationResult::is_flagged)
    }

    pub fn count(&self, level: SensitivityLevel) -> usize {
        self.results
            .iter()
            .filter(|r| r.sensitivity_level == level)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_truncates_samples() {
        let col = ColumnDescriptor::new(
            "email",
            DataType::String,
            vec![json!("a@b.com"), json!("c@d.com"), json!("e@f.com")],
        );
        assert_eq!(col.sample_values.len(), 2);
        assert_eq!(col.sample_values[1], json!("c@d.com"));
    }

    #[test]
    fn test_parse_label_case_insensitive() {
        assert_eq!(SensitivityLevel::parse_label("pii"), Some(SensitivityLevel::Pii));
        assert_eq!(
            SensitivityLevel::parse_label(" finance-CRITICAL "),
            Some(SensitivityLevel::FinanceCritical)
        );
        assert_eq!(SensitivityLevel::parse_label("Sensitive"), None);
        assert_eq!(SensitivityLevel::parse_label("Unclassified"), None);
    }

    #[test]
    fn test_level_serializes_with_display_labels() {
        let s = serde_json::to_string(&SensitivityLevel::FinanceCritical).unwrap();
        assert_eq!(s, "\"Finance-critical\"");
        let s = serde_json::to_string(&SensitivityLevel::Pii).unwrap();
        assert_eq!(s, "\"PII\"");
    }

    #[test]
    fn test_descriptor_serializes_type_field() {
        let col = ColumnDescriptor::new("age", DataType::Int, vec![json!(30)]);
        let v = serde_json::to_value(&col).unwrap();
        assert_eq!(v, json!({"name": "age", "type": "int", "sample_values": [30]}));
    }

    #[test]
    fn test_confidence_distribution_buckets_scores() {
        let result = |confidence| ClassificationResult {
            column_name: "c".into(),
            sensitivity_level: SensitivityLevel::Public,
            confidence,
            reasoning: String::new(),
            flags: vec![],
        };
        let results = vec![result(5), result(5), result(3), result(1)];
        assert_eq!(confidence_distribution(&results), [1, 0, 1, 0, 2]);
        assert_eq!(confidence_distribution(&[]), [0; 5]);
    }

    #[test]
    fn test_percent_rounds_and_handles_empty() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(0, 0), 0);
    }
}
