use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PromptConfig;
use crate::error::ClassifyError;
use crate::labels::render_guidance;
use crate::models::{
    ClassificationRequest, ColumnDescriptor, GenerationParams, MAX_SAMPLE_VALUES,
};

/// Borrowed projection of a descriptor: exactly the fields the model sees.
#[derive(Serialize)]
struct PromptColumn<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    data_type: String,
    sample_values: &'a [Value],
}

/// Build the request for one batch.
///
/// The payload scales with the number of columns only: each column
/// contributes its name, type and at most two samples, serialized as compact
/// JSON.
pub fn build_request(
    columns: &[ColumnDescriptor],
    generation_params: &GenerationParams,
    config: &PromptConfig,
) -> Result<ClassificationRequest, ClassifyError> {
    if columns.is_empty() {
        return Err(ClassifyError::input("cannot classify an empty column set"));
    }

    let projected: Vec<PromptColumn<'_>> = columns
        .iter()
        .map(|c| PromptColumn {
            name: &c.name,
            data_type: c.data_type.to_string(),
            sample_values: &c.sample_values[..c.sample_values.len().min(MAX_SAMPLE_VALUES)],
        })
        .collect();
    let metadata = serde_json::to_string(&projected)
        .map_err(|e| ClassifyError::input(format!("column metadata is not serializable: {}", e)))?;

    let prompt = render_prompt(
        &render_guidance(config.max_examples_per_level),
        &metadata,
        columns.len(),
    );

    let estimated_tokens = estimate_tokens(&prompt);
    if estimated_tokens > config.token_warning_threshold {
        warn!(
            estimated_tokens,
            threshold = config.token_warning_threshold,
            "prompt is large; consider classifying fewer columns per batch"
        );
    }
    debug!(
        columns = columns.len(),
        chars = prompt.len(),
        estimated_tokens,
        "prompt built"
    );

    Ok(ClassificationRequest {
        columns: columns.to_vec(),
        generation_params: generation_params.clone(),
        prompt,
    })
}

/// Rough token count: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

fn render_prompt(guidance: &str, metadata: &str, count: usize) -> String {
    format!(
        "Classify the sensitivity of each data column from its name, type and sample values.\n\
         Levels:\n\
         {guidance}\
         Reply with ONLY a JSON array of exactly {count} objects, one per column, in input order:\n\
         [{{\"column_name\":string,\"sensitivity_level\":one of the levels above,\"confidence\":integer 1-5,\"reasoning\":string (1-2 sentences)}}]\n\
         Columns:\n\
         {metadata}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::models::{DataType, SensitivityLevel};

    fn columns(n: usize) -> Vec<ColumnDescriptor> {
        (0..n)
            .map(|i| {
                ColumnDescriptor::new(
                    format!("col_{}", i),
                    DataType::String,
                    vec![json!("x"), json!("y")],
                )
            })
            .collect()
    }

    fn build(cols: &[ColumnDescriptor]) -> ClassificationRequest {
        build_request(cols, &GenerationParams::default(), &PromptConfig::default()).unwrap()
    }

    #[test]
    fn test_prompt_enumerates_labels_and_fields() {
        let req = build(&columns(1));
        for level in SensitivityLevel::ASSIGNABLE {
            assert!(req.prompt.contains(level.label()), "missing {}", level);
        }
        assert!(!req.prompt.contains("Unclassified"));
        for field in ["column_name", "sensitivity_level", "confidence", "reasoning"] {
            assert!(req.prompt.contains(field));
        }
        assert!(req.prompt.contains("exactly 1 objects"));
    }

    #[test]
    fn test_prompt_embeds_compact_metadata() {
        let cols = vec![ColumnDescriptor::new(
            "user_email",
            DataType::String,
            vec![json!("john@example.com"), json!("jane@corp.com")],
        )];
        let req = build(&cols);
        assert!(req.prompt.contains(
            r#"[{"name":"user_email","type":"string","sample_values":["john@example.com","jane@corp.com"]}]"#
        ));
        assert_eq!(req.columns, cols);
        assert_eq!(req.generation_params.temperature, 0.1);
    }

    #[test]
    fn test_size_grows_with_columns_not_rows() {
        use crate::schema::tabular::from_csv_reader;

        let mut small = String::from("email,amount\n");
        let mut large = String::from("email,amount\n");
        for i in 0..2 {
            small.push_str(&format!("u{}@x.com,{}\n", i, i));
        }
        for i in 0..500 {
            large.push_str(&format!("u{}@x.com,{}\n", i, i));
        }
        let small = from_csv_reader(small.as_bytes(), "s.csv").unwrap();
        let large = from_csv_reader(large.as_bytes(), "l.csv").unwrap();
        assert_eq!(build(&small.columns).prompt.len(), build(&large.columns).prompt.len());

        let p1 = build(&columns(1)).prompt.len();
        let p5 = build(&columns(5)).prompt.len();
        let p10 = build(&columns(10)).prompt.len();
        assert!(p1 < p5 && p5 < p10);
    }

    #[test]
    fn test_empty_columns_rejected() {
        let err = build_request(&[], &GenerationParams::default(), &PromptConfig::default())
            .unwrap_err();
        assert!(matches!(err, ClassifyError::Input(_)));
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
