//! Emotion detection, voice, and device endpoints

use std::sync::Arc;

use axum::extract::{Extension, State};
use axum::response::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use msr_common::model::{
    Capability, DeviceClass, DeviceDescriptor, DeviceStatus, EmotionLabel, EmotionReading,
    EmotionSource,
};
use msr_common::time::now_unix;
use msr_common::Error;
use msr_core::device::{BroadcastContent, LoopbackAdapter};
use msr_core::emotion::EmotionPayload;
use msr_core::voice::TtsRequest;

use crate::api::auth::Subject;
use crate::api::quota::QuotaRoute;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DetectEmotionBody {
    image_base64: String,
}

/// `POST /api/detect-emotion`
pub async fn detect_emotion(
    State(state): State<AppState>,
    Extension(Subject(subject)): Extension<Subject>,
    Json(body): Json<DetectEmotionBody>,
) -> ApiResult<Json<EmotionReading>> {
    state.quota.consume_daily(&subject, QuotaRoute::Image)?;

    let bytes = BASE64
        .decode(body.image_base64.as_bytes())
        .map_err(|e| Error::InvalidArgument(format!("image_base64 is not valid base64: {}", e)))?;

    let reading = state.emotion.predict(&EmotionPayload::Image(bytes)).await;
    Ok(Json(reading))
}

#[derive(Debug, Deserialize)]
pub struct TtsBody {
    text: String,
    voice: Option<String>,
    emotion: Option<String>,
    speed: Option<f64>,
}

/// `POST /api/tts`
pub async fn tts(
    State(state): State<AppState>,
    Extension(Subject(subject)): Extension<Subject>,
    Json(body): Json<TtsBody>,
) -> ApiResult<Json<serde_json::Value>> {
    state.quota.consume_daily(&subject, QuotaRoute::Tts)?;

    if body.text.trim().is_empty() {
        return Err(Error::InvalidArgument("text must not be empty".into()).into());
    }

    let audio = state
        .tts
        .synthesize(&TtsRequest {
            text: body.text,
            voice: body.voice,
            emotion: body.emotion.as_deref().map(EmotionLabel::parse_lossy),
            speed: body.speed.unwrap_or(1.0),
        })
        .await?;

    Ok(Json(json!({
        "audio_url": audio.audio_url,
        "audio_base64": audio.audio_base64,
        "duration": audio.duration_seconds,
        "format": audio.format,
        "provider": audio.provider,
        "voice": audio.voice,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SttBody {
    audio_base64: String,
    language: Option<String>,
}

/// `POST /api/stt`
pub async fn stt(
    State(state): State<AppState>,
    Json(body): Json<SttBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let bytes = BASE64
        .decode(body.audio_base64.as_bytes())
        .map_err(|e| Error::InvalidArgument(format!("audio_base64 is not valid base64: {}", e)))?;

    let result = state
        .stt
        .transcribe(&bytes, body.language.as_deref())
        .await?;

    Ok(Json(json!({
        "text": result.text,
        "confidence": result.confidence,
        "language": result.language,
        "duration": result.duration_seconds,
        "provider": result.provider,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BroadcastBody {
    emotion: String,
    intensity: f64,
    devices: Vec<String>,
    #[serde(default)]
    content: serde_json::Value,
}

/// `POST /api/broadcast-to-devices`
pub async fn broadcast_to_devices(
    State(state): State<AppState>,
    Json(body): Json<BroadcastBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let label = EmotionLabel::parse_lossy(&body.emotion);
    let reading = EmotionReading::new(
        label,
        body.intensity,
        vec![],
        "broadcast",
        EmotionSource::Text,
        1.0,
        now_unix(),
    );

    let content = BroadcastContent {
        text: body
            .content
            .get("text")
            .and_then(|t| t.as_str())
            .map(str::to_string),
    };

    let results = state
        .agents
        .device
        .broadcast(&reading, &content, Some(&body.devices), None)
        .await;

    Ok(Json(json!({
        "devices": results,
        "emotion": label,
        "intensity": reading.intensity,
        "timestamp": now_unix(),
    })))
}

/// `GET /api/devices/connected`
pub async fn devices_connected(State(state): State<AppState>) -> Json<serde_json::Value> {
    let devices = state.devices.snapshot().await;
    let count = devices.len();
    Json(json!({
        "devices": devices,
        "count": count,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ConnectBody {
    id: Option<String>,
    class: DeviceClass,
    capabilities: Option<Vec<Capability>>,
    addr: Option<String>,
}

/// `POST /api/devices/connect`
///
/// Registers a loopback-backed device; real hardware registers through the
/// same shape with a vendor adapter.
pub async fn devices_connect(
    State(state): State<AppState>,
    Json(body): Json<ConnectBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = body
        .id
        .unwrap_or_else(|| format!("{}-{}", json_name(&body.class), &uuid::Uuid::new_v4().to_string()[..8]));

    let capabilities = match body.capabilities {
        Some(caps) if !caps.is_empty() => caps.into_iter().collect(),
        _ => body.class.default_capabilities(),
    };

    let descriptor = DeviceDescriptor {
        id: id.clone(),
        class: body.class,
        capabilities,
        addr: body.addr.unwrap_or_else(|| format!("loopback:{}", id)),
        status: DeviceStatus::Online,
        last_seen: Utc::now(),
    };

    state
        .devices
        .register(descriptor.clone(), Arc::new(LoopbackAdapter::new()))
        .await;

    Ok(Json(json!({ "device": descriptor, "connected": true })))
}

fn json_name(class: &DeviceClass) -> String {
    serde_json::to_value(class)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "device".to_string())
}

#[derive(Debug, Deserialize)]
pub struct DeviceIdBody {
    id: String,
}

/// `POST /api/devices/disconnect`
pub async fn devices_disconnect(
    State(state): State<AppState>,
    Json(body): Json<DeviceIdBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.devices.unregister(&body.id).await {
        return Err(Error::NotFound(format!("device '{}'", body.id)).into());
    }
    Ok(Json(json!({ "disconnected": body.id })))
}

/// `POST /api/devices/heartbeat`
pub async fn devices_heartbeat(
    State(state): State<AppState>,
    Json(body): Json<DeviceIdBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if !state.devices.heartbeat(&body.id).await {
        return Err(Error::NotFound(format!("device '{}'", body.id)).into());
    }
    Ok(Json(json!({ "id": body.id, "status": "online" })))
}
