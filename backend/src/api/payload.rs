//! Decoding write payloads into entity fields.
//!
//! Deserialization failures are reported as [`FieldErrors`] keyed by the
//! offending field, the same shape validation failures use.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{FieldErrors, NON_FIELD_ERRORS, REQUIRED};

/// Parse a request body as JSON.
pub fn parse_body(body: &[u8]) -> Result<Value, FieldErrors> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(|err| {
        FieldErrors::single(
            NON_FIELD_ERRORS,
            format!("JSON parse error - {}", strip_position(&err.to_string())),
        )
    })
}

/// Deserialize a JSON object into a fields payload.
pub fn decode_fields<F: DeserializeOwned>(value: Value) -> Result<F, FieldErrors> {
    if !value.is_object() {
        return Err(FieldErrors::single(
            NON_FIELD_ERRORS,
            format!(
                "Invalid data. Expected a dictionary, but got {}.",
                json_kind(&value)
            ),
        ));
    }

    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        let message = strip_position(&err.inner().to_string());

        if let Some(field) = missing_field(&message) {
            return FieldErrors::single(field, REQUIRED);
        }
        let message = if message.starts_with("invalid type: null") {
            "This field may not be null.".to_string()
        } else {
            message
        };
        FieldErrors::single(top_level_field(&path), message)
    })
}

/// Apply a partial update: the stored fields with the keys in `patch`
/// replaced, decoded as a complete payload.
pub fn merge_patch<F>(current: &F, patch: Value) -> Result<F, FieldErrors>
where
    F: Serialize + DeserializeOwned,
{
    let Value::Object(changes) = patch else {
        return decode_fields(patch);
    };
    let mut merged = match serde_json::to_value(current) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => Map::new(),
    };
    merged.extend(changes);
    decode_fields(Value::Object(merged))
}

fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next()
}

fn top_level_field(path: &str) -> &str {
    if path == "." || path.is_empty() {
        return NON_FIELD_ERRORS;
    }
    let end = path.find(['.', '[']).unwrap_or(path.len());
    if end == 0 {
        NON_FIELD_ERRORS
    } else {
        &path[..end]
    }
}

/// serde_json appends " at line L column C" to parse errors.
fn strip_position(message: &str) -> String {
    match message.rfind(" at line ") {
        Some(pos) => message[..pos].to_string(),
        None => message.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InstrumentFields, InstrumentState, OpticalElementFields, SiteFields};
    use serde_json::json;

    #[test]
    fn test_missing_field_is_required() {
        let errors = decode_fields::<SiteFields>(json!({"code": "abc", "elevation": 10}))
            .unwrap_err();
        assert_eq!(errors.get("timezone").unwrap(), [REQUIRED.to_string()]);
    }

    #[test]
    fn test_wrong_type_names_field() {
        let errors = decode_fields::<OpticalElementFields>(
            json!({"name": "V", "code": "v", "schedulable": "maybe"}),
        )
        .unwrap_err();
        assert!(errors.contains("schedulable"));
    }

    #[test]
    fn test_null_required_field() {
        let errors =
            decode_fields::<OpticalElementFields>(json!({"name": null, "code": "v"})).unwrap_err();
        assert_eq!(
            errors.get("name").unwrap(),
            ["This field may not be null.".to_string()]
        );
    }

    #[test]
    fn test_non_object_payload() {
        let errors = decode_fields::<OpticalElementFields>(json!([1, 2])).unwrap_err();
        assert!(errors.contains(NON_FIELD_ERRORS));
    }

    #[test]
    fn test_parse_body_strips_position() {
        let errors = parse_body(b"{\"code\": ").unwrap_err();
        let message = &errors.get(NON_FIELD_ERRORS).unwrap()[0];
        assert!(message.starts_with("JSON parse error - "));
        assert!(!message.contains("at line"));
        assert_eq!(parse_body(b"  ").unwrap(), json!({}));
    }

    #[test]
    fn test_merge_patch_replaces_only_given_keys() {
        let current: InstrumentFields = serde_json::from_value(
            json!({"code": "kb01", "telescope": 1, "autoguider_camera": 2, "science_cameras": [2]}),
        )
        .unwrap();
        let merged = merge_patch(&current, json!({"state": 30})).unwrap();
        assert_eq!(merged.state, InstrumentState::Schedulable);
        assert_eq!(merged.code, "kb01");
        assert_eq!(merged.science_cameras, current.science_cameras);
    }

    #[test]
    fn test_merge_patch_reports_bad_values() {
        let current: InstrumentFields =
            serde_json::from_value(json!({"telescope": 1, "autoguider_camera": 2})).unwrap();
        let errors = merge_patch(&current, json!({"state": 15})).unwrap_err();
        assert!(errors.contains("state"));
    }
}
