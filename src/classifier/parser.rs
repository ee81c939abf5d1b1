use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ClassifyError;
use crate::models::{
    ClassificationResult, ColumnDescriptor, SensitivityLevel, ValidationFlag, MAX_CONFIDENCE,
    MIN_CONFIDENCE,
};

/// Longest raw snippet kept in an `UnparsableEntry` flag.
const RAW_SNIPPET_LEN: usize = 80;

/// One element pulled out of the model's reply, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEntry {
    Parsed {
        column_name: Option<String>,
        level: Option<String>,
        confidence: Option<Value>,
        reasoning: Option<String>,
    },
    Unparsable {
        raw: String,
    },
}

/// Turn a raw reply into exactly one result per requested column, in order.
///
/// Entries are aligned by position. A count mismatch aborts the batch;
/// per-field problems are defaulted and flagged on the result.
pub fn parse_response(
    raw: &str,
    columns: &[ColumnDescriptor],
) -> Result<Vec<ClassificationResult>, ClassifyError> {
    let entries = extract_entries(raw)?;

    if entries.len() != columns.len() {
        return Err(ClassifyError::structural(format!(
            "expected {} entries, model returned {}",
            columns.len(),
            entries.len()
        )));
    }

    let results: Vec<ClassificationResult> = columns
        .iter()
        .zip(entries)
        .map(|(column, entry)| normalize_entry(column, entry))
        .collect();

    for r in results.iter().filter(|r| !r.flags.is_empty()) {
        let flags: Vec<String> = r.flags.iter().map(ToString::to_string).collect();
        warn!(column = %r.column_name, flags = %flags.join("; "), "recovered invalid fields");
    }

    Ok(results)
}

/// Keys the model may use for the sensitivity label.
const LEVEL_KEYS: [&str; 3] = ["sensitivity_level", "level", "sensitivity"];

/// Locate the entries in a reply that may be wrapped in prose or code fences.
///
/// A JSON candidate whose objects carry a level wins over one that does not,
/// so an echo of the request metadata is never mistaken for the answer.
pub fn extract_entries(raw: &str) -> Result<Vec<RawEntry>, ClassifyError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ClassifyError::structural("empty response"));
    }

    let mut levelless: Option<Vec<Value>> = None;
    for candidate in json_candidates(text) {
        let Some(items) = entry_values(candidate) else {
            continue;
        };
        if items.iter().any(carries_level) {
            debug!(entries = items.len(), "extracted JSON entries");
            return Ok(items.into_iter().map(entry_from_value).collect());
        }
        if levelless.is_none() {
            levelless = Some(items);
        }
    }

    if let Some(entries) = free_text_entries(text) {
        debug!(entries = entries.len(), "extracted free-text entries");
        return Ok(entries);
    }

    if let Some(items) = levelless {
        debug!(entries = items.len(), "extracted JSON entries without levels");
        return Ok(items.into_iter().map(entry_from_value).collect());
    }

    Err(ClassifyError::structural(format!(
        "no classification entries found in response: {}",
        snippet(text)
    )))
}

/// Every JSON value the reply may contain, in order: fenced blocks, the whole
/// text, then the value starting at each `[` or `{`.
fn json_candidates(text: &str) -> Vec<Value> {
    let mut candidates = Vec::new();

    if let Ok(fence) = Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)```") {
        for caps in fence.captures_iter(text) {
            if let Some(body) = caps.get(1) {
                if let Ok(value) = serde_json::from_str::<Value>(body.as_str().trim()) {
                    candidates.push(value);
                }
            }
        }
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        candidates.push(value);
    }

    // Streaming parse stops at the end of the first value, ignoring trailing prose.
    for (start, _) in text.match_indices(['[', '{']) {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            candidates.push(value);
        }
    }

    candidates
}

/// The list of per-column elements held by a candidate, if it has that shape.
fn entry_values(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) if !items.is_empty() => Some(items),
        Value::Object(obj) => {
            let wrapped = ["classifications", "results", "columns"]
                .iter()
                .find_map(|key| match obj.get(*key) {
                    Some(Value::Array(items)) if !items.is_empty() => Some(items.clone()),
                    _ => None,
                });
            match wrapped {
                Some(items) => Some(items),
                None if obj.contains_key("sensitivity_level") => Some(vec![Value::Object(obj)]),
                None => None,
            }
        }
        _ => None,
    }
}

fn carries_level(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| LEVEL_KEYS.iter().any(|k| obj.contains_key(*k)))
        .unwrap_or(false)
}

fn entry_from_value(value: Value) -> RawEntry {
    match value {
        Value::Object(obj) => RawEntry::Parsed {
            column_name: first_string(&obj, &["column_name", "column", "name"]),
            level: first_string(&obj, &LEVEL_KEYS),
            confidence: obj.get("confidence").filter(|v| !v.is_null()).cloned(),
            reasoning: first_string(&obj, &["reasoning", "reason", "explanation"]),
        },
        other => RawEntry::Unparsable {
            raw: snippet(&other.to_string()),
        },
    }
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    })
}

/// Line-oriented fallback, one column per line:
///
/// ```text
/// - user_email: PII (confidence 5) - Contains email addresses.
/// | user_email | PII | 5 | Contains email addresses. |
/// ```
fn free_text_entries(text: &str) -> Option<Vec<RawEntry>> {
    let re = Regex::new(concat!(
        r"(?i)^\s*\|?\s*(?:[-*]|\d+[.)])?\s*`?(?P<name>[^:|`]+?)`?\s*[:|]\s*",
        r"\**(?P<level>[A-Za-z][A-Za-z_ -]*?)\**\s*(?:[|,(]\s*)?",
        r"(?:confidence\s*[:=]?\s*)?(?P<conf>-?\d+(?:\.\d+)?)(?:\s*/\s*5)?\s*\)?\s*",
        r"(?:[|:,-]+\s*(?P<reason>.*?))?\s*\|?\s*$",
    ))
    .ok()?;

    let entries: Vec<RawEntry> = text
        .lines()
        .filter_map(|line| re.captures(line))
        .map(|caps| RawEntry::Parsed {
            column_name: caps.name("name").map(|m| m.as_str().trim().to_string()),
            level: caps
                .name("level")
                .map(|m| m.as_str().trim_end_matches([' ', '-']).trim().to_string()),
            confidence: caps.name("conf").map(|m| Value::String(m.as_str().to_string())),
            reasoning: caps
                .name("reason")
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty()),
        })
        .collect();

    (!entries.is_empty()).then_some(entries)
}

/// Validate one entry against the column it is aligned with.
fn normalize_entry(column: &ColumnDescriptor, entry: RawEntry) -> ClassificationResult {
    let mut flags = Vec::new();

    let (column_name, level, confidence, reasoning) = match entry {
        RawEntry::Parsed {
            column_name,
            level,
            confidence,
            reasoning,
        } => (column_name, level, confidence, reasoning),
        RawEntry::Unparsable { raw } => {
            return ClassificationResult {
                column_name: column.name.clone(),
                sensitivity_level: SensitivityLevel::Unclassified,
                confidence: MIN_CONFIDENCE,
                reasoning: String::new(),
                flags: vec![ValidationFlag::UnparsableEntry { raw }],
            };
        }
    };

    if let Some(reported) = column_name {
        if reported.trim() != column.name {
            flags.push(ValidationFlag::ColumnNameMismatch { reported });
        }
    }

    let sensitivity_level = match level.as_deref().map(str::trim) {
        None | Some("") => {
            flags.push(ValidationFlag::MissingLevel);
            SensitivityLevel::Unclassified
        }
        Some(raw) => SensitivityLevel::parse_label(raw).unwrap_or_else(|| {
            flags.push(ValidationFlag::UnknownLevel {
                raw: raw.to_string(),
            });
            SensitivityLevel::Unclassified
        }),
    };

    let (confidence, flag) = normalize_confidence(confidence.as_ref());
    flags.extend(flag);

    ClassificationResult {
        column_name: column.name.clone(),
        sensitivity_level,
        confidence,
        reasoning: reasoning.unwrap_or_default().trim().to_string(),
        flags,
    }
}

/// Coerce a confidence into 1..=5, flagging anything that had to change.
fn normalize_confidence(value: Option<&Value>) -> (u8, Option<ValidationFlag>) {
    let Some(value) = value else {
        return (MIN_CONFIDENCE, Some(ValidationFlag::ConfidenceMissing));
    };

    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches("/5").trim().parse::<f64>().ok(),
        _ => None,
    };

    let min = f64::from(MIN_CONFIDENCE);
    let max = f64::from(MAX_CONFIDENCE);
    match number {
        Some(n) if n.fract() == 0.0 && (min..=max).contains(&n) => (n as u8, None),
        Some(n) if n.is_finite() => (
            n.round().clamp(min, max) as u8,
            Some(ValidationFlag::ConfidenceClamped { raw }),
        ),
        _ => (MIN_CONFIDENCE, Some(ValidationFlag::ConfidenceClamped { raw })),
    }
}

fn snippet(text: &str) -> String {
    if text.chars().count() <= RAW_SNIPPET_LEN {
        text.to_string()
    } else {
        let cut: String = text.chars().take(RAW_SNIPPET_LEN).collect();
        format!("{}…", cut)
    }
}
