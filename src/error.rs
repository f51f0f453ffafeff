//! Error types for product card rendering

use std::path::Path;
use thiserror::Error;

/// Result type alias for card rendering operations
pub type Result<T> = std::result::Result<T, CardError>;

/// Error taxonomy for a single task run.
///
/// Every stage returns one of these; the task runner is the only place where
/// they are turned into a persisted result record.
#[derive(Error, Debug)]
pub enum CardError {
    /// Malformed or incomplete task descriptor (task never starts)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Image, template or font file not found
    #[error("Missing resource: {0}")]
    MissingResource(String),

    /// Object-removal backend unavailable, misconfigured or failed
    #[error("Strategy error: {0}")]
    Strategy(String),

    /// No erase region could be computed
    #[error("Empty mask: {0}")]
    EmptyMask(String),

    /// Unexpected failure while rendering the card
    #[error("Compositing error: {0}")]
    Compositing(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input/output errors (permission denied, disk full, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding/encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Task or result (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CardError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new strategy error tagged with the strategy name
    pub fn strategy<S: Into<String>>(strategy: &str, msg: S) -> Self {
        Self::Strategy(format!("[{}] {}", strategy, msg.into()))
    }

    /// Create a new empty mask error
    pub fn empty_mask<S: Into<String>>(msg: S) -> Self {
        Self::EmptyMask(msg.into())
    }

    /// Create a new compositing error
    pub fn compositing<S: Into<String>>(msg: S) -> Self {
        Self::Compositing(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a missing resource error naming what was expected and where
    pub fn missing_resource<P: AsRef<Path>>(label: &str, path: P) -> Self {
        Self::MissingResource(format!("{} not found: {}", label, path.as_ref().display()))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create image loading error with format context
    pub fn image_load_error<P: AsRef<Path>>(path: P, error: &image::ImageError) -> Self {
        let path_display = path.as_ref().display();
        let extension = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");

        Self::Image(image::ImageError::IoError(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "Failed to load image '{}' (format: {}): {}",
                path_display, extension, error
            ),
        )))
    }

    /// Create a strategy error from a transport failure
    pub fn network_error(strategy: &str, operation: &str, error: &reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            "timed out"
        } else if error.is_connect() {
            "connection failed"
        } else {
            "request failed"
        };
        Self::strategy(strategy, format!("{} {}: {}", operation, kind, error))
    }

    /// Stage label used in result records and logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::MissingResource(_) => "MissingResourceError",
            Self::Strategy(_) => "StrategyError",
            Self::EmptyMask(_) => "EmptyMaskError",
            Self::Compositing(_) | Self::Image(_) => "CompositingError",
            Self::InvalidConfig(_) => "ConfigError",
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CardError::validation("missing task_id");
        assert!(matches!(err, CardError::Validation(_)));

        let err = CardError::empty_mask("nothing to erase");
        assert!(matches!(err, CardError::EmptyMask(_)));
        assert_eq!(err.kind(), "EmptyMaskError");
    }

    #[test]
    fn test_error_display() {
        let err = CardError::strategy("lama", "HTTP 500: boom");
        assert_eq!(err.to_string(), "Strategy error: [lama] HTTP 500: boom");

        let err = CardError::missing_resource("template", Path::new("/tpl/card.png"));
        assert_eq!(
            err.to_string(),
            "Missing resource: template not found: /tpl/card.png"
        );
    }

    #[test]
    fn test_file_io_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = CardError::file_io_error("write result", Path::new("/results/t1.json"), &io_error);
        let error_string = err.to_string();
        assert!(error_string.contains("write result"));
        assert!(error_string.contains("/results/t1.json"));
        assert_eq!(err.kind(), "IoError");
    }
}
