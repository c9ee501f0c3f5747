//! OCR Routes
//!
//! Endpoints:
//! - POST /api/v1/ocr/pdf - Extract page text from an uploaded PDF
//!
//! Multipart fields:
//! - `file` (required) - the PDF
//! - `lang` - OCRmyPDF language, e.g. `eng+deu` (server default when absent)
//! - `threshold` - minimum non-whitespace characters to keep embedded text
//! - `force_ocr` - recognize every page, ignoring embedded text
//! - `remove_watermark` - strip watermarks before classification

use axum::{
    extract::{DefaultBodyLimit, Multipart, Request, State},
    middleware::{self, Next},
    response::Response,
    routing::post,
    Json, Router,
};
use axum::extract::multipart::Field;
use tower_http::timeout::TimeoutLayer;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::ocr::{OcrRequest, PageContent};
use crate::state::AppState;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Create the OCR router
pub fn router(state: AppState) -> Router<AppState> {
    let limit = state.config().server.max_upload_bytes;
    let deadline = state.config().server.request_timeout;

    // A timed-out handler is dropped, which removes its upload and scratch files
    Router::new()
        .route("/pdf", post(ocr_pdf))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TimeoutLayer::new(deadline))
        .route_layer(middleware::from_fn_with_state(state, require_api_key))
}

/// Reject requests without the configured API key. Open when no key is set.
async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    if let Some(expected) = state.config().server.api_key.as_deref() {
        let provided = request
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok());

        if provided != Some(expected) {
            tracing::warn!(path = %request.uri().path(), "Rejected request with bad API key");
            return Err(AppError::Unauthorized);
        }
    }

    Ok(next.run(request).await)
}

/// POST /api/v1/ocr/pdf
#[tracing::instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn ocr_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<PageContent>>> {
    let mut upload = None;
    let mut request = OcrRequest::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidMultipart(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                tracing::debug!(filename = ?field.file_name(), "Receiving upload");
                upload = Some(state.ocr().save_upload(field).await?);
            }
            "lang" => request.language = Some(field_text(field).await?),
            "threshold" => {
                let raw = field_text(field).await?;
                let threshold = raw.trim().parse::<i64>().map_err(|_| {
                    AppError::BadRequest(format!("threshold must be an integer, got {:?}", raw))
                })?;
                request.text_threshold = Some(threshold);
            }
            "force_ocr" => request.force_ocr = parse_flag(&name, &field_text(field).await?)?,
            "remove_watermark" => {
                request.remove_watermark = Some(parse_flag(&name, &field_text(field).await?)?)
            }
            _ => tracing::debug!(field = %name, "Ignoring unknown multipart field"),
        }
    }

    let upload = upload.ok_or(AppError::MissingFile)?;
    let pages = state.ocr().process(upload, &request).await?;

    tracing::info!(pages = pages.len(), "OCR request complete");
    Ok(Json(pages))
}

async fn field_text(field: Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::InvalidMultipart(e.to_string()))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::BadRequest(format!(
            "{} must be a boolean, got {:?}",
            name, raw
        ))),
    }
}
