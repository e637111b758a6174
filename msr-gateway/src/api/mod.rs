//! HTTP surface
//!
//! Handlers translate transport payloads into core contracts and back; all
//! errors render as `{kind, message, hint?, trace_id}` via `ApiError`.

pub mod auth;
pub mod model;
pub mod orchestrator;
pub mod quota;
pub mod rag;
pub mod senses;
pub mod sync_http;

use axum::extract::State;
use axum::response::Json;
use serde_json::json;

use crate::AppState;

/// Liveness endpoint (no auth)
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "msr-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "devices": state.devices.ids().await.len(),
    }))
}
