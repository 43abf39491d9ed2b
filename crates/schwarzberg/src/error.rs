//! Error types for Schwarzberg.
//!
//! All fallible operations return [`Result`]. The taxonomy mirrors the
//! decision contract: policy refusals are *not* errors (they are the
//! `Skipped` arm of a successful run), while everything in this module is an
//! operational fault that warrants alerting.
//!
//! System errors must always bubble up unchanged: `SchwarzbergError::Io`
//! wraps `std::io::Error` via `#[from]` and is never swallowed or rewrapped.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`SchwarzbergError`].
pub type Result<T> = std::result::Result<T, SchwarzbergError>;

/// Main error type for all Schwarzberg operations.
///
/// Backend unavailability is deliberately absent here: a missing OCR engine
/// is an expected condition absorbed by the selector's fallback chain, not a
/// fault. See [`crate::ocr::BackendOutcome`].
#[derive(Debug, Error)]
pub enum SchwarzbergError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF parsing error: {message}")]
    Pdf {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("OCR error: {message}")]
    Ocr {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Render error: {message}")]
    Render {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The renderer reported success but the artifact is not on disk, or the
    /// artifact failed post-redaction verification. Operational fault, never
    /// a policy refusal.
    #[error("artifact missing or unverifiable after render: {0}")]
    ArtifactMissing(PathBuf),

    #[error("{0}")]
    Other(String),
}

impl SchwarzbergError {
    /// Create a PDF parsing error with a message.
    pub fn pdf(message: impl Into<String>) -> Self {
        Self::Pdf {
            message: message.into(),
            source: None,
        }
    }

    /// Create an OCR error with a message.
    pub fn ocr(message: impl Into<String>) -> Self {
        Self::Ocr {
            message: message.into(),
            source: None,
        }
    }

    /// Create a render error with a message.
    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error with a message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for SchwarzbergError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<lopdf::Error> for SchwarzbergError {
    fn from(err: lopdf::Error) -> Self {
        Self::Pdf {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_message() {
        let err = SchwarzbergError::validation("unknown pack: global.bogus.v9");
        assert!(err.to_string().contains("unknown pack"));
    }

    #[test]
    fn test_io_error_bubbles_unchanged() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SchwarzbergError = io.into();
        assert!(matches!(err, SchwarzbergError::Io(_)));
    }

    #[test]
    fn test_artifact_missing_carries_path() {
        let err = SchwarzbergError::ArtifactMissing(PathBuf::from("/out/a_redacted.pdf"));
        assert!(err.to_string().contains("a_redacted.pdf"));
    }
}
