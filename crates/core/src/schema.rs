use serde_json::{Map, Value, json};

use crate::{
    error::{AnalysisError, Result},
    types::AnalysisResult,
};

pub const REQUIRED_FIELDS: [&str; 5] = [
    "title",
    "predictedViews",
    "ctr",
    "insights",
    "recommendations",
];

/// Output schema sent with every request. Type names are upper-case as the
/// Gemini `responseSchema` expects; see [`to_json_schema`] for the standard form.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "predictedViews": { "type": "STRING" },
            "ctr": { "type": "STRING" },
            "insights": { "type": "ARRAY", "items": { "type": "STRING" } },
            "recommendations": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": REQUIRED_FIELDS,
    })
}

/// Rewrite a Gemini-style schema into standard JSON Schema: lower-case type
/// names and closed objects, as strict OpenAI-compatible endpoints require.
pub fn to_json_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out: Map<String, Value> = map
                .iter()
                .map(|(key, value)| match (key.as_str(), value) {
                    ("type", Value::String(name)) => (key.clone(), json!(name.to_lowercase())),
                    _ => (key.clone(), to_json_schema(value)),
                })
                .collect();
            if out.get("type").and_then(Value::as_str) == Some("object") {
                out.insert("additionalProperties".to_string(), json!(false));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(to_json_schema).collect()),
        other => other.clone(),
    }
}

/// Parse and validate a raw endpoint payload.
///
/// Blank payloads are `EmptyResponse`, unparseable ones `MalformedJson`, and any
/// missing or mistyped field is a `SchemaViolation`. Nothing is coerced.
pub fn parse_analysis(payload: Option<&str>) -> Result<AnalysisResult> {
    let payload = match payload {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Err(AnalysisError::EmptyResponse),
    };

    let value: Value =
        serde_json::from_str(payload).map_err(|e| AnalysisError::MalformedJson {
            reason: e.to_string(),
        })?;

    validate(&value)
}

pub fn validate(value: &Value) -> Result<AnalysisResult> {
    let object = value.as_object().ok_or_else(|| {
        AnalysisError::schema("$", format!("expected object, got {}", type_name(value)))
    })?;

    Ok(AnalysisResult {
        title: string_field(object, "title")?,
        predicted_views: string_field(object, "predictedViews")?,
        ctr: string_field(object, "ctr")?,
        insights: string_array_field(object, "insights")?,
        recommendations: string_array_field(object, "recommendations")?,
    })
}

fn required<'a>(object: &'a Map<String, Value>, field: &str) -> Result<&'a Value> {
    object
        .get(field)
        .ok_or_else(|| AnalysisError::schema(field, "missing required field"))
}

fn string_field(object: &Map<String, Value>, field: &str) -> Result<String> {
    match required(object, field)? {
        Value::String(s) => Ok(s.clone()),
        other => Err(AnalysisError::schema(
            field,
            format!("expected string, got {}", type_name(other)),
        )),
    }
}

fn string_array_field(object: &Map<String, Value>, field: &str) -> Result<Vec<String>> {
    let items = match required(object, field)? {
        Value::Array(items) => items,
        other => {
            return Err(AnalysisError::schema(
                field,
                format!("expected array of strings, got {}", type_name(other)),
            ));
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(AnalysisError::schema(
                format!("{field}[{i}]"),
                format!("expected string, got {}", type_name(other)),
            )),
        })
        .collect()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
