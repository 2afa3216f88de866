//! Schema instructions shared by the providers.

use serde_json::Value;

const ROLE: &str = "You classify building elements against a life-cycle-assessment material database.";

fn schema_block(schema: &Value) -> String {
    serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
}

/// System message for chat-style APIs (OpenAI, Anthropic).
pub fn system_prompt(schema: &Value) -> String {
    if schema.is_null() {
        return format!("{} Always respond with a single JSON object.", ROLE);
    }
    format!(
        "{} Always respond with a single JSON object matching this schema:\n\n```json\n{}\n```\n\nRespond ONLY with JSON, no explanation.",
        ROLE,
        schema_block(schema)
    )
}

/// Single prompt with the schema appended, for completion-style APIs (Ollama).
pub fn build_schema_prompt(user_prompt: &str, schema: &Value) -> String {
    if schema.is_null() {
        return user_prompt.to_string();
    }
    format!(
        "{}\n\n---\n\nRespond with valid JSON matching this schema:\n```json\n{}\n```\n\nRespond ONLY with valid JSON, no explanation.",
        user_prompt,
        schema_block(schema)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_schema_prompt_null_schema() {
        let prompt = "Pick a category";
        assert_eq!(build_schema_prompt(prompt, &Value::Null), prompt);
    }

    #[test]
    fn test_prompts_embed_schema() {
        let schema = json!({"type": "object", "properties": {"Matched Category": {"type": "string"}}});
        assert!(build_schema_prompt("Pick", &schema).contains("Matched Category"));
        assert!(system_prompt(&schema).contains("Matched Category"));
        assert!(!system_prompt(&Value::Null).contains("schema"));
    }
}
