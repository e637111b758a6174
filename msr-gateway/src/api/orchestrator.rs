//! Orchestrator lifecycle and text tooling endpoints

use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use msr_common::model::{EmotionLabel, EmotionReading, EmotionSource, SegmentStrategy};
use msr_common::time::now_unix;
use msr_common::Error;
use msr_core::emotion::score_text;
use msr_core::mapping;
use msr_core::orchestrator::PlayRequest;
use msr_core::segmenter::Segmenter;

use crate::api::auth::Subject;
use crate::api::quota::QuotaRoute;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PlayBody {
    text: String,
    user_id: Option<String>,
    strategy: Option<String>,
}

/// `POST /orchestrator/play`
pub async fn play(
    State(state): State<AppState>,
    Extension(Subject(subject)): Extension<Subject>,
    Json(body): Json<PlayBody>,
) -> ApiResult<Json<serde_json::Value>> {
    state.quota.consume_daily(&subject, QuotaRoute::Play)?;

    let response = state
        .orchestrator
        .play(PlayRequest {
            text: body.text,
            user_id: body.user_id,
            strategy: body.strategy.as_deref().map(SegmentStrategy::parse_lossy),
        })
        .await?;

    let plan = response.plan;
    let total_segments = plan.segments.len();
    Ok(Json(json!({
        "session_id": response.session_id,
        "playback_url": response.playback_url,
        "metadata": {
            "total_segments": total_segments,
            "current_segment": 0,
            "segments": plan.segments,
            "emotion": response.emotion,
            "prosody": plan.prosody,
            "haptic_events": plan.haptic_events,
            "scent_events": plan.scent_events,
            "ar_events": plan.ar_events,
            "total_duration": plan.duration_total,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct PauseBody {
    session_id: String,
}

/// `POST /orchestrator/pause`
pub async fn pause(
    State(state): State<AppState>,
    Json(body): Json<PauseBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let session_id = parse_session_id(&body.session_id)?;
    let response = state.orchestrator.pause(session_id).await?;
    Ok(Json(json!({
        "status": response.status,
        "current_index": response.current_index,
        "playing": response.playing,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SeekBody {
    session_id: String,
    segment_index: i64,
}

/// `POST /orchestrator/seek`
///
/// Invalid indices answer with `{error: "invalid_segment", ...}` and leave
/// the session untouched.
pub async fn seek(
    State(state): State<AppState>,
    Json(body): Json<SeekBody>,
) -> Result<Json<serde_json::Value>, Response> {
    let session_id = parse_session_id(&body.session_id).map_err(IntoResponse::into_response)?;

    if body.segment_index < 0 {
        return Err(invalid_segment_response("segment_index must be >= 0"));
    }

    match state
        .orchestrator
        .seek(session_id, body.segment_index as usize)
        .await
    {
        Ok(response) => Ok(Json(json!({
            "status": response.status,
            "current_index": response.current_index,
            "segment_text": response.segment_text,
            "segment_duration": response.segment_duration,
        }))),
        Err(e) if e.to_string().contains("invalid_segment") => {
            Err(invalid_segment_response(&e.to_string()))
        }
        Err(e) => Err(ApiError(e).into_response()),
    }
}

fn invalid_segment_response(message: &str) -> Response {
    let body = Error::InvalidArgument(message.to_string()).to_body();
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "invalid_segment",
            "kind": body.kind,
            "message": body.message,
            "trace_id": body.trace_id,
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    session_id: String,
}

/// `GET /orchestrator/summary?session_id=…`
pub async fn summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let session_id = parse_session_id(&params.session_id)?;
    let report = state.orchestrator.summary(session_id).await?;
    Ok(Json(json!({
        "summary": report.summary,
        "total_segments": report.total_segments,
        "total_highlights": report.total_highlights,
        "current_position": report.current_position,
        "playing": report.playing,
        "emotion": report.emotion,
    })))
}

fn parse_session_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError(Error::InvalidArgument(format!("malformed session_id '{}'", raw))))
}

#[derive(Debug, Deserialize)]
pub struct SegmentTextBody {
    text: String,
    strategy: Option<String>,
    max_chunk_chars: Option<usize>,
}

/// `POST /segment_text`
pub async fn segment_text(
    State(_state): State<AppState>,
    Json(body): Json<SegmentTextBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let strategy = body
        .strategy
        .as_deref()
        .map(SegmentStrategy::parse_lossy)
        .unwrap_or_default();
    let max_chunk = body
        .max_chunk_chars
        .unwrap_or(msr_core::segmenter::DEFAULT_MAX_CHUNK_CHARS);

    let segmenter = Segmenter::new(strategy, max_chunk, msr_core::segmenter::DEFAULT_READING_WPM);
    let strategy_used = segmenter.effective_strategy(&body.text);
    let segments = segmenter.segment(&body.text);

    let total_chars: usize = body.text.chars().count();
    let total_segments = segments.len();
    let average_len = if segments.is_empty() {
        0.0
    } else {
        segments
            .iter()
            .map(|s| s.text.chars().count())
            .sum::<usize>() as f64
            / segments.len() as f64
    };

    Ok(Json(json!({
        "segments": segments,
        "total_segments": total_segments,
        "total_length": total_chars,
        "strategy_used": strategy_used,
        "metadata": {
            "max_chunk_chars": max_chunk,
            "average_segment_length": average_len,
        },
    })))
}

#[derive(Debug, Deserialize)]
pub struct GenerateHapticsBody {
    text: Option<String>,
    emotion: Option<String>,
    intensity: Option<f64>,
    pattern_name: Option<String>,
}

/// `POST /generate_haptics`
///
/// Resolution order: explicit pattern name, then emotion label (with alias
/// collapse), then lexicon scoring of the text.
pub async fn generate_haptics(
    State(_state): State<AppState>,
    Json(body): Json<GenerateHapticsBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let (label, base_intensity) = if let Some(name) = &body.pattern_name {
        let (label, _) = mapping::haptic_by_name(name)
            .ok_or_else(|| Error::NotFound(format!("haptic pattern '{}'", name)))?;
        (label, body.intensity.unwrap_or(0.7))
    } else if let Some(raw) = &body.emotion {
        (
            EmotionLabel::parse_lossy(raw),
            body.intensity.unwrap_or(0.7),
        )
    } else if let Some(text) = &body.text {
        let reading = score_text(text);
        (reading.primary, body.intensity.unwrap_or(reading.intensity))
    } else {
        return Err(Error::InvalidArgument(
            "one of text, emotion, or pattern_name is required".into(),
        )
        .into());
    };

    let reading = EmotionReading::new(
        label,
        base_intensity,
        vec![],
        "generate_haptics",
        EmotionSource::Text,
        1.0,
        now_unix(),
    );
    let pattern = mapping::scaled_haptic(&reading);

    Ok(Json(json!({
        "emotion": label,
        "intensity": pattern.intensity,
        "pattern": pattern,
        "events": [{
            "at_seconds": 0.0,
            "pattern": mapping::scaled_haptic(&reading),
        }],
    })))
}

/// `GET /haptic_patterns`
pub async fn haptic_patterns(State(_state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "patterns": mapping::haptic_pattern_names(),
        "table_version": mapping::TABLE_VERSION,
    }))
}
