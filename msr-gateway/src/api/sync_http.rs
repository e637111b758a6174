//! HTTP side of the sync service

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::AppState;

/// `GET /sync/manifest`
///
/// Honours `If-None-Match`: a matching etag answers 304 without a body. The
/// `ETag` response header is always set on a 200.
pub async fn manifest(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let manifest = state.sync.manifest().await?;

    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_matches('"'));

    if if_none_match == Some(manifest.etag.as_str()) {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let etag = manifest.etag.clone();
    let mut response = Json(manifest).into_response();
    if let Ok(value) = etag.parse() {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct FileParams {
    path: String,
}

/// `GET /sync/file?path=…`
pub async fn file(
    State(state): State<AppState>,
    Query(params): Query<FileParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let file = state.sync.read_file(&params.path).await?;
    Ok(Json(json!({
        "path": file.path,
        "content": file.content,
        "sha256": file.sha256,
    })))
}

/// `GET /sync/allowed-paths`
pub async fn allowed_paths(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "allowed": state.sync.allowed_paths() }))
}

/// `GET /sync/feature-flags`
pub async fn feature_flags(State(_state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "sync_manifest": true,
        "lite_mode": true,
        "multi_sensory_broadcast": true,
        "platforms": {
            "mobile": ["flutter", "react_native", "ios", "android"],
            "desktop": ["macos", "windows", "linux"],
            "watch": ["apple_watch", "wear_os"],
        },
    }))
}
