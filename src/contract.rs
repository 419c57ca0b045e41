//! Output contract
//!
//! Structured mode is strictly opt-in: only a non-empty caller schema makes
//! the backend call request JSON output, and only then is the reply parsed.
//! A reply that fails to parse degrades to a text-only result.

use crate::models::{GenerationResult, OutputSchema};
use crate::{Error, Result};
use serde_json::{json, Map, Value};

/// Instruction passed to the provider asking for schema-typed JSON output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputShape {
    pub mime_type: &'static str,
    pub json_schema: Value,
}

/// Pre-call half: derive the output instruction, if any, from the caller schema.
pub fn shape_output(schema: Option<&OutputSchema>) -> Option<OutputShape> {
    let schema = schema.filter(|s| !s.is_empty())?;
    Some(OutputShape {
        mime_type: "application/json",
        json_schema: to_json_schema(schema.fields()),
    })
}

/// Post-call half: attach the parsed payload when structured mode was requested.
pub fn reconcile(raw_text: String, shape: Option<&OutputShape>) -> GenerationResult {
    if shape.is_none() {
        return GenerationResult::text_only(raw_text);
    }

    match parse_structured(&raw_text) {
        Ok(structured) => GenerationResult {
            text: raw_text,
            structured: Some(structured),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Structured output degraded to text");
            GenerationResult::text_only(raw_text)
        }
    }
}

fn parse_structured(raw_text: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw_text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::StructuredParseFailed(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(Error::StructuredParseFailed(e.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Expands a field → type-hint map into a JSON Schema object.
///
/// A map that already is an object schema is forwarded as-is.
fn to_json_schema(fields: &Map<String, Value>) -> Value {
    if is_object_schema(fields) {
        return Value::Object(fields.clone());
    }

    let properties: Map<String, Value> = fields
        .iter()
        .map(|(name, descriptor)| (name.clone(), describe(descriptor)))
        .collect();
    let mut required: Vec<&String> = fields.keys().collect();
    required.sort();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn is_object_schema(fields: &Map<String, Value>) -> bool {
    fields.get("type").and_then(Value::as_str) == Some("object")
        && fields.get("properties").is_some_and(Value::is_object)
}

fn describe(descriptor: &Value) -> Value {
    match descriptor {
        Value::String(hint) => describe_hint(hint),
        Value::Array(items) if items.len() == 1 => json!({
            "type": "array",
            "items": describe(&items[0]),
        }),
        other => other.clone(),
    }
}

fn describe_hint(hint: &str) -> Value {
    let trimmed = hint.trim();
    let lowered = trimmed.to_ascii_lowercase();

    if let Some(inner) = lowered.strip_suffix("[]") {
        return json!({ "type": "array", "items": describe_hint(inner) });
    }
    for prefix in ["array<", "list<"] {
        if let Some(inner) = lowered
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix('>'))
        {
            return json!({ "type": "array", "items": describe_hint(inner) });
        }
    }

    let json_type = match lowered.as_str() {
        "string" | "str" | "text" => "string",
        "integer" | "int" => "integer",
        "number" | "float" | "double" => "number",
        "boolean" | "bool" => "boolean",
        "object" | "map" => "object",
        "array" | "list" => "array",
        // The backend decides what to make of anything else.
        _ => return json!({ "type": trimmed }),
    };
    json!({ "type": json_type })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema(value: Value) -> OutputSchema {
        OutputSchema(value.as_object().cloned().unwrap())
    }

    #[test]
    fn test_no_schema_means_no_shape() {
        assert_eq!(shape_output(None), None);
        assert_eq!(shape_output(Some(&OutputSchema::default())), None);
    }

    #[test]
    fn test_type_hints_expand_to_object_schema() {
        let shape = shape_output(Some(&schema(json!({
            "name": "string",
            "age": "int",
            "tags": "string[]",
        }))))
        .unwrap();

        assert_eq!(shape.mime_type, "application/json");
        assert_eq!(
            shape.json_schema,
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "age": { "type": "integer" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                },
                "required": ["age", "name", "tags"],
            })
        );
    }

    #[test]
    fn test_full_json_schema_is_forwarded_unchanged() {
        let raw = json!({
            "type": "object",
            "properties": { "city": { "type": "string" } },
        });
        let shape = shape_output(Some(&schema(raw.clone()))).unwrap();
        assert_eq!(shape.json_schema, raw);
    }

    #[test]
    fn test_unknown_hint_is_passed_through() {
        assert_eq!(describe_hint("Timestamp"), json!({ "type": "Timestamp" }));
        assert_eq!(
            describe_hint("list<bool>"),
            json!({ "type": "array", "items": { "type": "boolean" } })
        );
    }

    #[test]
    fn test_reconcile_parses_json_in_structured_mode() {
        let shape = shape_output(Some(&schema(json!({ "name": "string" }))));
        let result = reconcile(r#"{"name":"Alice"}"#.to_string(), shape.as_ref());

        assert_eq!(result.text, r#"{"name":"Alice"}"#);
        assert_eq!(
            result.structured,
            json!({ "name": "Alice" }).as_object().cloned()
        );
    }

    #[test]
    fn test_reconcile_degrades_on_invalid_json() {
        let shape = shape_output(Some(&schema(json!({ "name": "string" }))));
        let result = reconcile("I cannot comply.".to_string(), shape.as_ref());

        assert_eq!(result, GenerationResult::text_only("I cannot comply."));
    }

    #[test]
    fn test_reconcile_rejects_non_object_json() {
        let shape = shape_output(Some(&schema(json!({ "name": "string" }))));
        let result = reconcile("[1, 2, 3]".to_string(), shape.as_ref());
        assert_eq!(result.structured, None);

        let err = parse_structured("42").unwrap_err();
        assert!(err.to_string().contains("a number"));
    }

    #[test]
    fn test_reconcile_never_parses_without_schema() {
        let result = reconcile(r#"{"looks":"like json"}"#.to_string(), None);
        assert_eq!(result.structured, None);
        assert_eq!(result.text, r#"{"looks":"like json"}"#);
    }
}
