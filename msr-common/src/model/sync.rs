//! Sync manifest and WebSocket frame types

use serde::{Deserialize, Serialize};

/// One whitelisted file's summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Relative POSIX path inside the whitelist
    pub path: String,
    pub sha256: String,
    pub mtime_unix: i64,
    pub size_bytes: u64,
    pub category: String,
}

/// Snapshot of the syncable content set
///
/// The etag is derived only from the sorted `(path, sha256)` pairs; mtime,
/// size, and in-memory ordering never influence it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub etag: String,
    pub file_count: usize,
    pub files: Vec<ManifestEntry>,
}

/// Frames exchanged on the sync push channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SyncFrame {
    /// Sent once on connect
    Welcome { etag: String, file_count: usize },
    /// Sent to all subscribers when the etag changes
    Update { etag: String, changed: bool, ts: i64 },
    /// Reply to a client ping
    Pong,
    /// Subscriber fell behind; `skipped` updates were dropped (oldest first)
    Lag { skipped: u64 },
    /// Orchestration error; the channel stays open
    Error { kind: String, message: String },
}
