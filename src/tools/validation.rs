//! Check tool arguments against the tool's parameter schema before dispatch.
//!
//! Only the shallow subset the parameter builder emits is checked: the
//! top-level `object` type, the `required` list, primitive property types and
//! string `enum` membership.

use serde_json::Value;

use crate::error::{ChatError, Result};

/// Validate `args` against `schema`, reporting the first violation.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<()> {
    let expects_object = schema.get("type").and_then(Value::as_str) == Some("object");
    let Some(obj) = args.as_object() else {
        if expects_object {
            return Err(invalid(format!(
                "expected object arguments, got {}",
                json_type_name(args)
            )));
        }
        return Ok(());
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    for name in required {
        if !obj.contains_key(name) {
            return Err(invalid(format!("missing required field '{name}'")));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, value) in obj {
        let Some(prop) = properties.get(key) else {
            continue;
        };
        if let Some(expected) = prop.get("type").and_then(Value::as_str) {
            if !matches_type(value, expected) {
                return Err(invalid(format!(
                    "field '{key}' expected type '{expected}', got {}",
                    json_type_name(value)
                )));
            }
        }
        if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                return Err(invalid(format!(
                    "field '{key}' must be one of {}",
                    Value::Array(allowed.clone())
                )));
            }
        }
    }

    Ok(())
}

fn invalid(message: String) -> ChatError {
    ChatError::InvalidArgument(message)
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
