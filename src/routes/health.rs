//! Health check endpoints

use axum::{extract::State, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub ocr_available: bool,
}

/// Liveness probe
pub async fn healthz() -> &'static str {
    "ok"
}

/// Detailed health, including whether the recognition binary answers
/// (cached, see [`crate::ocr::AVAILABILITY_TTL`])
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let ocr_available = state.ocr().is_available().await;
    Json(HealthResponse {
        status: if ocr_available { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        service: "pdf-ocr-server",
        ocr_available,
    })
}
