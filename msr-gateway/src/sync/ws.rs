//! Sync push channel over WebSocket
//!
//! Frames are JSON objects with a `type` field: `welcome` on connect,
//! `update` on etag changes, `pong` for client pings, `lag` when a slow
//! subscriber dropped updates, `error` for orchestration errors (the socket
//! stays open).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use msr_common::model::SyncFrame;

use crate::AppState;

use super::SyncService;

/// `GET /ws/sync`
pub async fn ws_sync(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    let sync = state.sync.clone();
    upgrade.on_upgrade(move |socket| handle_socket(socket, sync))
}

async fn handle_socket(mut socket: WebSocket, sync: Arc<SyncService>) {
    info!(subscribers = sync.subscriber_count() + 1, "sync subscriber connected");
    let mut rx = sync.subscribe();

    // Initial state: latest etag summary, or an error frame (never a close)
    let welcome = match sync.manifest().await {
        Ok(manifest) => SyncFrame::Welcome {
            etag: manifest.etag,
            file_count: manifest.file_count,
        },
        Err(e) => SyncFrame::Error {
            kind: e.kind().to_string(),
            message: e.to_string(),
        },
    };
    if !send_frame(&mut socket, &welcome).await {
        return;
    }

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let outgoing = match frame {
                    Ok(frame) => frame,
                    // Bounded outbox overflowed: oldest updates were dropped
                    Err(RecvError::Lagged(skipped)) => SyncFrame::Lag { skipped },
                    Err(RecvError::Closed) => break,
                };
                if !send_frame(&mut socket, &outgoing).await {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if is_ping(&text) && !send_frame(&mut socket, &SyncFrame::Pong).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    // Control frames are handled by axum
                    _ => {}
                }
            }
        }
    }

    debug!("sync subscriber disconnected");
}

/// A client ping is either the literal text "ping" or `{"type":"ping"}`.
fn is_ping(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("ping") {
        return true;
    }
    serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(|t| t == "ping"))
        .unwrap_or(false)
}

async fn send_frame(socket: &mut WebSocket, frame: &SyncFrame) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(_) => false,
    }
}
