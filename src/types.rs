//! Core data types: task descriptors, params overlay and result records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Product attributes printed on the card. All values are free-form strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductData {
    #[serde(deserialize_with = "lenient_string")]
    pub brand: String,
    #[serde(deserialize_with = "lenient_string")]
    pub model: String,
    /// Section width, e.g. "205"
    #[serde(deserialize_with = "lenient_string")]
    pub width: String,
    /// Profile height, e.g. "55"
    #[serde(deserialize_with = "lenient_string")]
    pub height: String,
    /// Rim label, e.g. "R16"
    #[serde(deserialize_with = "lenient_string")]
    pub diameter: String,
    #[serde(deserialize_with = "lenient_string")]
    pub load_index: String,
    #[serde(deserialize_with = "lenient_string")]
    pub speed_index: String,
    /// Season keyword; anything unrecognised renders the generic caption
    #[serde(deserialize_with = "lenient_string")]
    pub season: String,
}

/// Accept strings, numbers and null where a display string is expected
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

impl ProductData {
    /// The "width/height" line shown in the spec box
    #[must_use]
    pub fn spec_line(&self) -> String {
        format!("{}/{}", self.width, self.height)
    }
}

/// Per-task configuration overlay.
///
/// Values arrive from loosely typed producers, so numbers may be encoded as
/// strings and booleans as `0/1`. Empty values are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskParams(Map<String, Value>);

impl TaskParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw value (mainly for tests and programmatic producers)
    #[must_use]
    pub fn with<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Non-empty string value
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Unsigned integer given either as a JSON number or a numeric string
    #[must_use]
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        match self.0.get(key)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u32),
            _ => None,
        }
    }

    /// Boolean given as `true/false`, `1/0` or their string forms
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A validated task descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub product_data: ProductData,
    pub original_image: String,
    pub template: String,
    pub icon: String,
    pub output_filename: String,
    #[serde(default)]
    pub params: TaskParams,
}

impl Task {
    /// File name component of a task reference; producers sometimes send
    /// paths relative to their own upload directory, with either separator.
    #[must_use]
    pub fn file_name_of(reference: &str) -> PathBuf {
        let last = reference.rsplit(['/', '\\']).next().unwrap_or(reference);
        Path::new(last)
            .file_name()
            .map_or_else(|| PathBuf::from(last), PathBuf::from)
    }
}

/// Terminal status of a task run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Success,
    Error,
}

/// Persisted outcome of one task run. Written exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub task_id: String,
    pub status: TaskStatus,
    /// Output path relative to the processed directory's parent; success only
    pub output_image: Option<String>,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Error text with its source chain; failure only
    pub error: Option<String>,
}

impl ResultRecord {
    #[must_use]
    pub fn success(task_id: &str, output_image: String, started_at: DateTime<Utc>) -> Self {
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::Success,
            output_image: Some(output_image),
            message: "OK".to_string(),
            started_at,
            finished_at: Utc::now(),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(task_id: &str, error: &crate::error::CardError, started_at: DateTime<Utc>) -> Self {
        let mut detail = format!("{}: {}", error.kind(), error);
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            detail.push_str(&format!("\n  caused by: {}", cause));
            source = cause.source();
        }
        Self {
            task_id: task_id.to_string(),
            status: TaskStatus::Error,
            output_image: None,
            message: error.to_string(),
            started_at,
            finished_at: Utc::now(),
            error: Some(detail),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}
