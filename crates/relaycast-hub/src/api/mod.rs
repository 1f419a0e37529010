//! Operational HTTP endpoints.
//!
//! - `/healthz`          : liveness
//! - `/api/stats`        : connection + router + store snapshot
//! - `/api/message/:id`  : delivery status lookup

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use relaycast_core::RelayError;

use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.stats().await)
}

pub async fn message_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store().get_status(&id).await {
        Ok(status) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message_id": id,
                "status": status.as_str(),
                "timestamp": Utc::now().timestamp_millis(),
            })),
        ),
        Err(RelayError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "message not found", "message_id": id })),
        ),
        Err(e) => {
            tracing::error!(%id, error = %e, "status lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "status lookup failed" })),
            )
        }
    }
}
