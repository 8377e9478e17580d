//! Field-level validation for write payloads.
//!
//! Every write payload implements [`Validate`]. Errors are collected per field
//! so a single rejected write reports every offending field at once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Message for a required field that was not supplied.
pub const REQUIRED: &str = "This field is required.";

/// Validation errors keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field error.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when nothing was recorded, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Require a non-blank string.
    pub fn require(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "This field may not be blank.");
        }
    }

    /// Enforce a maximum length in characters.
    pub fn max_length(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(
                field,
                format!("Ensure this field has no more than {} characters.", max),
            );
        }
    }

    /// Reject NaN and infinities, which the relational store cannot hold.
    pub fn finite(&mut self, field: &str, value: f64) {
        if !value.is_finite() {
            self.add(field, "A valid number is required.");
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Message for a relation that names a row which does not exist.
pub fn missing_pk(id: impl fmt::Display) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}

/// Message for a duplicate value in a unique column.
pub fn already_exists(entity: &str, field: &str) -> String {
    format!("{} with this {} already exists.", entity, field)
}

/// Message for a duplicate combination of columns that must be unique together.
pub fn unique_together(fields: &[&str]) -> String {
    format!("The fields {} must make a unique set.", fields.join(", "))
}

/// Field-level validation of a write payload.
///
/// Relational rules (uniqueness, foreign-key existence) are checked by the
/// repository inside the write transaction, not here.
pub trait Validate {
    fn validate(&self) -> Result<(), FieldErrors>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_accumulate_per_field() {
        let mut errors = FieldErrors::new();
        errors.require("code", "  ");
        errors.max_length("code", "abcd", 3);
        errors.max_length("name", "ok", 200);

        assert!(errors.contains("code"));
        assert!(!errors.contains("name"));
        assert_eq!(errors.get("code").unwrap().len(), 1);
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_max_length_counts_characters() {
        let mut errors = FieldErrors::new();
        errors.max_length("code", "ñño", 3);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_serializes_as_plain_map() {
        let errors = FieldErrors::single("code", REQUIRED);
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json, serde_json::json!({"code": ["This field is required."]}));
    }

    #[test]
    fn test_merge_and_display() {
        let mut errors = FieldErrors::single("code", "bad");
        errors.merge(FieldErrors::single("site", "missing"));
        let text = errors.to_string();
        assert!(text.contains("code: bad"));
        assert!(text.contains("site: missing"));
        assert_eq!(errors.fields().count(), 2);
    }

    #[test]
    fn test_relation_messages() {
        assert_eq!(missing_pk(9), "Invalid pk \"9\" - object does not exist.");
        assert_eq!(
            already_exists("optical element", "code"),
            "optical element with this code already exists."
        );
        assert_eq!(
            unique_together(&["instrument_type", "type"]),
            "The fields instrument_type, type must make a unique set."
        );
    }

    #[test]
    fn test_finite_rejects_nan() {
        let mut errors = FieldErrors::new();
        errors.finite("lat", f64::NAN);
        errors.finite("long", 12.5);
        assert!(errors.contains("lat"));
        assert!(!errors.contains("long"));
    }
}
