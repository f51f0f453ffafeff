//! Task descriptor validation
//!
//! Runs once per task, before any image I/O, against the fixed task schema.

use crate::{error::CardError, services::ImageIOService, types::Task, Result};
use serde_json::Value;

/// Fields every task descriptor must carry, non-empty
pub const REQUIRED_FIELDS: &[&str] = &[
    "task_id",
    "product_data",
    "original_image",
    "template",
    "icon",
    "output_filename",
];

/// Utility for validating raw task descriptors
pub struct TaskValidator;

impl TaskValidator {
    /// Validate a raw JSON descriptor and convert it into a [`Task`]
    ///
    /// # Errors
    /// `CardError::Validation` naming the first offending field
    ///
    /// # Examples
    /// ```rust
    /// use tirecard::utils::TaskValidator;
    /// use serde_json::json;
    ///
    /// let raw = json!({"task_id": "t1", "original_image": "a.png"});
    /// assert!(TaskValidator::validate(&raw).is_err());
    /// ```
    pub fn validate(raw: &Value) -> Result<Task> {
        let object = raw
            .as_object()
            .ok_or_else(|| CardError::validation("task descriptor must be a JSON object"))?;

        for field in REQUIRED_FIELDS {
            match object.get(*field) {
                None | Some(Value::Null) => {
                    return Err(CardError::validation(format!(
                        "'{}' is a required property",
                        field
                    )));
                },
                Some(value) => Self::validate_field(field, value)?,
            }
        }

        if let Some(Value::String(output)) = object.get("output_filename") {
            Self::validate_output_filename(output)?;
        }

        if let Some(params) = object.get("params") {
            if !params.is_object() && !params.is_null() {
                return Err(CardError::validation("'params' must be an object"));
            }
        }

        let mut normalized = raw.clone();
        if let Some(map) = normalized.as_object_mut() {
            if map.get("params").is_some_and(Value::is_null) {
                map.remove("params");
            }
        }

        serde_json::from_value(normalized)
            .map_err(|e| CardError::validation(format!("task descriptor is malformed: {}", e)))
    }

    fn validate_field(field: &str, value: &Value) -> Result<()> {
        if field == "product_data" {
            return match value {
                Value::Object(map) if !map.is_empty() => Ok(()),
                Value::Object(_) => Err(CardError::validation("'product_data' must not be empty")),
                _ => Err(CardError::validation("'product_data' must be an object")),
            };
        }

        match value {
            Value::String(s) if !s.trim().is_empty() => Ok(()),
            Value::String(_) => Err(CardError::validation(format!("'{}' must not be empty", field))),
            _ => Err(CardError::validation(format!("'{}' must be a string", field))),
        }
    }

    /// The output must name a file with an extension the renderer can write
    fn validate_output_filename(output: &str) -> Result<()> {
        let name = Task::file_name_of(output);
        if !ImageIOService::is_supported_format(&name) {
            return Err(CardError::validation(format!(
                "'output_filename' has an unsupported extension: {}",
                output
            )));
        }
        Ok(())
    }

    /// Task id to use for the result record even when validation fails
    #[must_use]
    pub fn best_effort_task_id(raw: &Value, fallback: &str) -> String {
        raw.get("task_id")
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map_or_else(|| fallback.to_string(), str::to_string)
    }
}
