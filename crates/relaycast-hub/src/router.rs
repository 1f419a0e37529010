//! Axum router wiring (HTTP -> WS upgrade + control surface).
//!
//! The WebSocket path comes from configuration; the control endpoints are
//! fixed.

use axum::{routing::get, Router};

use crate::{api, app_state::AppState, transport};

pub fn build_router(state: AppState) -> Router {
    let ws_path = state.core().config.server.path.clone();
    Router::new()
        .route(&ws_path, get(transport::ws::ws_upgrade))
        .route("/api/stats", get(api::stats))
        .route("/api/message/:id", get(api::message_status))
        .route("/healthz", get(api::healthz))
        .with_state(state)
}
