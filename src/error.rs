//! Error types for the OCR server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ocr::OcrError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid multipart payload: {0}")]
    InvalidMultipart(String),

    #[error("Missing file")]
    MissingFile,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Ocr(#[from] OcrError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing or invalid x-api-key header".to_string(),
            ),
            AppError::InvalidMultipart(msg) => {
                tracing::debug!("Invalid multipart payload: {}", msg);
                (
                    StatusCode::BAD_REQUEST,
                    "invalid_multipart",
                    "invalid multipart payload".to_string(),
                )
            }
            AppError::MissingFile => (
                StatusCode::BAD_REQUEST,
                "missing_file",
                "missing file".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            AppError::Ocr(e) => {
                // Engine diagnostics stay in the logs
                tracing::error!("ocr error: {}", e);
                let message = match e {
                    OcrError::InvalidInput(msg) => msg.clone(),
                    OcrError::Split(_) => "could not read PDF pages".to_string(),
                    OcrError::Recognition { page, .. } => format!("ocr failed on page {}", page),
                    _ => "ocr error".to_string(),
                };
                (e.status_code(), e.code(), message)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            details: if cfg!(debug_assertions) {
                Some(self.to_string())
            } else {
                None
            },
        });

        (status, body).into_response()
    }
}
