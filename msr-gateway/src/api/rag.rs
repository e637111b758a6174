//! Retrieval store endpoints

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;

use msr_common::Error;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    q: String,
    top_k: Option<usize>,
}

/// `GET /rag/query?q=…&top_k=…`
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<serde_json::Value>> {
    if params.q.trim().is_empty() {
        return Err(Error::InvalidArgument("q must not be empty".into()).into());
    }

    let results = state
        .memory
        .query_docs(&params.q, params.top_k.unwrap_or(5))
        .await?;
    let count = results.len();

    Ok(Json(json!({
        "query": params.q,
        "results": results,
        "count": count,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
    text: String,
    doc_id: Option<String>,
    meta: Option<serde_json::Value>,
}

/// `POST /rag/upsert`
pub async fn upsert(
    State(state): State<AppState>,
    Json(body): Json<UpsertBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if body.text.trim().is_empty() {
        return Err(Error::InvalidArgument("text must not be empty".into()).into());
    }

    let doc = state
        .memory
        .upsert_doc(&body.text, body.doc_id, body.meta)
        .await?;

    Ok(Json(json!({ "success": true, "document": doc })))
}

/// `GET /rag/list`
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let documents = state.memory.list_docs().await?;
    Ok(Json(json!({
        "count": documents.len(),
        "documents": documents,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    doc_id: String,
}

/// `DELETE /rag/delete?doc_id=…`
pub async fn delete(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.memory.delete_doc(&params.doc_id).await? {
        return Err(Error::NotFound(format!("document '{}'", params.doc_id)).into());
    }
    Ok(Json(json!({ "success": true, "deleted": params.doc_id })))
}
