//! OCR Types
//!
//! Shared types for the page extraction pipeline: per-call options, the
//! per-page output record and the error taxonomy.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Threshold applied when the caller passes zero or a negative value.
pub const DEFAULT_TEXT_THRESHOLD: i64 = 150;

/// Text recognized (or extracted) for a single page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page: usize,
    /// Page text
    pub content: String,
}

/// Per-call extraction options
///
/// Passed by value into every pipeline invocation so concurrent documents
/// never observe each other's settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOptions {
    /// Recognition engine language hint (e.g. `eng+deu`)
    pub language: Option<String>,
    /// Minimum non-whitespace character count to accept embedded text
    pub text_threshold: i64,
    /// Skip direct text retrieval and always run recognition
    pub force_recognition: bool,
    /// Strip watermarks before classification
    pub remove_watermark: bool,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            language: None,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            force_recognition: false,
            remove_watermark: true,
        }
    }
}

impl ExtractionOptions {
    /// Apply defaults to unset or out-of-range values
    pub fn normalized(mut self) -> Self {
        if self.text_threshold <= 0 {
            self.text_threshold = DEFAULT_TEXT_THRESHOLD;
        }
        if matches!(self.language.as_deref(), Some(lang) if lang.trim().is_empty()) {
            self.language = None;
        }
        self
    }

    /// Whether the watermark preprocessor runs for each page.
    ///
    /// Runs when explicitly requested, and whenever direct text retrieval
    /// will be attempted.
    pub fn should_remove_watermark(&self) -> bool {
        self.remove_watermark || (!self.force_recognition && self.text_threshold > 0)
    }
}

/// A single-page artifact inside a scratch area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFile {
    /// Page number in the source document (1-indexed)
    pub index: usize,
    /// Location of the single-page PDF
    pub path: PathBuf,
}

/// OCR error types
#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("Failed to split document: {0}")]
    Split(String),

    #[error("Recognition failed on page {page}: {message}")]
    Recognition { page: usize, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Recognition binary not available ({binary}): {reason}")]
    BinaryNotFound { binary: String, reason: String },

    #[error("Text extraction failed: {0}")]
    TextExtraction(String),

    #[error("Sidecar unreadable: {0}")]
    Sidecar(String),

    #[error("Watermark removal failed: {0}")]
    Watermark(String),

    #[error("Failed to persist upload: {0}")]
    Upload(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcrError {
    pub fn recognition(page: usize, message: impl Into<String>) -> Self {
        Self::Recognition {
            page,
            message: message.into(),
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Split(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Recognition { .. } => StatusCode::BAD_GATEWAY,
            Self::BinaryNotFound { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Split(_) => "split_error",
            Self::Recognition { .. } => "ocr_error",
            Self::InvalidInput(_) => "invalid_input",
            Self::BinaryNotFound { .. } => "ocr_unavailable",
            Self::TextExtraction(_) => "text_extraction_error",
            Self::Sidecar(_) => "sidecar_error",
            Self::Watermark(_) => "watermark_error",
            Self::Upload(_) => "upload_error",
            Self::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_defaults_when_non_positive() {
        for threshold in [0, -1, -500] {
            let opts = ExtractionOptions {
                text_threshold: threshold,
                ..Default::default()
            }
            .normalized();
            assert_eq!(opts.text_threshold, DEFAULT_TEXT_THRESHOLD);
        }

        let opts = ExtractionOptions {
            text_threshold: 10,
            ..Default::default()
        }
        .normalized();
        assert_eq!(opts.text_threshold, 10);
    }

    #[test]
    fn test_blank_language_is_dropped() {
        let opts = ExtractionOptions {
            language: Some("  ".to_string()),
            ..Default::default()
        }
        .normalized();
        assert_eq!(opts.language, None);
    }

    #[test]
    fn test_watermark_policy() {
        let defaults = ExtractionOptions::default().normalized();
        assert!(defaults.should_remove_watermark());

        // Direct text will be attempted, so the preprocessor still runs
        let disabled = ExtractionOptions {
            remove_watermark: false,
            ..Default::default()
        }
        .normalized();
        assert!(disabled.should_remove_watermark());

        let forced = ExtractionOptions {
            remove_watermark: false,
            force_recognition: true,
            ..Default::default()
        }
        .normalized();
        assert!(!forced.should_remove_watermark());

        let forced_with_watermark = ExtractionOptions {
            force_recognition: true,
            ..Default::default()
        }
        .normalized();
        assert!(forced_with_watermark.should_remove_watermark());
    }

    #[test]
    fn test_status_codes() {
        use axum::http::StatusCode;
        assert_eq!(
            OcrError::recognition(2, "boom").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            OcrError::Split("corrupt".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            OcrError::InvalidInput("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_recognition_error_names_page() {
        let err = OcrError::recognition(7, "tesseract crashed");
        assert_eq!(
            err.to_string(),
            "Recognition failed on page 7: tesseract crashed"
        );
    }
}
