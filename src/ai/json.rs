//! JSON extraction for classifier replies.
//!
//! Models wrap their answer in markdown fences or add a sentence of prose
//! around it. Anything that still is not a JSON object after stripping
//! those is a parse error, which the traversal engine treats as a
//! retryable contract violation.

use serde_json::Value;
use tracing::debug;

use crate::types::{ErrorCategory, LlmError, Result};

/// Extract the single JSON object a classifier was asked to produce.
pub fn extract_json_object(raw: &str, provider: &str) -> Result<Value> {
    let cleaned = preprocess(raw);

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(value);
    }

    if let Some(embedded) = outermost_object(&cleaned)
        && let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(embedded)
    {
        debug!("JSON object extracted from mixed content");
        return Ok(value);
    }

    Err(LlmError::with_provider(
        ErrorCategory::ParseError,
        format!(
            "response is not a JSON object. Content preview: {}...",
            cleaned.chars().take(200).collect::<String>()
        ),
        provider,
    )
    .into())
}

fn preprocess(raw: &str) -> String {
    let s = raw.trim().trim_start_matches('\u{feff}').trim();
    strip_code_fences(s).trim().to_string()
}

fn strip_code_fences(s: &str) -> &str {
    let mut result = s;
    if result.starts_with("```") {
        result = match result.find('\n') {
            Some(newline) => &result[newline + 1..],
            None => result.trim_start_matches('`'),
        };
    }
    if let Some(stripped) = result.trim_end().strip_suffix("```") {
        result = stripped;
    }
    result
}

/// Slice from the first `{` to the last `}`.
fn outermost_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LcaError;
    use serde_json::json;

    #[test]
    fn test_plain_object() {
        let value = extract_json_object(r#"{"Matched Category": "Concrete"}"#, "test").unwrap();
        assert_eq!(value, json!({"Matched Category": "Concrete"}));
    }

    #[test]
    fn test_fenced_object() {
        let raw = "```json\n{\"Matched Materials\": [\"Brick\", \"Clinker\"]}\n```";
        let value = extract_json_object(raw, "test").unwrap();
        assert_eq!(value["Matched Materials"][1], "Clinker");
    }

    #[test]
    fn test_object_inside_prose() {
        let raw = "Sure, here is my answer: {\"Matched Category\": \"Wood\"} Hope this helps.";
        let value = extract_json_object(raw, "test").unwrap();
        assert_eq!(value["Matched Category"], "Wood");
    }

    #[test]
    fn test_bom_is_ignored() {
        let value = extract_json_object("\u{feff}{\"a\": 1}", "test").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_non_object_is_parse_error() {
        for raw in ["I cannot decide.", "[\"Concrete\"]", ""] {
            match extract_json_object(raw, "openai") {
                Err(LcaError::Llm(err)) => {
                    assert_eq!(err.category, ErrorCategory::ParseError);
                    assert!(err.is_retryable());
                }
                other => panic!("expected parse error for {:?}, got {:?}", raw, other),
            }
        }
    }
}
