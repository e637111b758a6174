//! API-key authentication middleware
//!
//! Every protected route requires `X-API-Key: <key>` or an
//! `Authorization: Bearer <token>` header whose value is in the configured
//! key set. An empty key set disables authentication (development and test
//! convenience). The authenticated subject is stashed in request extensions
//! for quota accounting.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use msr_common::Error;

use crate::error::ApiError;
use crate::AppState;

/// Authenticated caller identity, as seen by quota enforcement
#[derive(Debug, Clone)]
pub struct Subject(pub String);

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let subject = if state.api_keys.enabled() {
        let presented = request
            .headers()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| bearer_token(&request));

        match presented {
            Some(key) if state.api_keys.contains(&key) => key,
            Some(_) => {
                return Err(Error::Unauthorized("unknown API key".into()).into());
            }
            None => {
                return Err(Error::Unauthorized("missing API key".into()).into());
            }
        }
    } else {
        "anonymous".to_string()
    };

    // Burst limiting applies per subject before any handler runs
    state.quota.check_rate(&subject)?;

    request.extensions_mut().insert(Subject(subject));
    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
