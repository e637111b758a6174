//! Sync service: content manifest, incremental file fetch, push channel
//!
//! Clients mirror a whitelisted content set by content hash, not timestamp.
//! The manifest is cached for at most five seconds behind a recompute mutex
//! that coalesces concurrent misses; a watcher task rescans periodically and
//! pushes `update` frames when the etag moves. File events are treated as
//! unreliable, so reads always re-validate cache age.

mod manifest;
pub mod ws;

pub use manifest::{build_manifest, compute_etag, safe_relative};

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use msr_common::events::{EventBus, ReaderEvent};
use msr_common::model::{Manifest, SyncFrame};
use msr_common::time::now_unix;
use msr_common::{Error, Result};

/// Manifest cache lifetime
pub const MANIFEST_CACHE_TTL: Duration = Duration::from_secs(5);

/// Watcher rescan interval
pub const WATCH_INTERVAL: Duration = Duration::from_secs(3);

/// Deadline for a single file read
const FILE_READ_DEADLINE: Duration = Duration::from_secs(5);

/// Body of `GET /sync/file`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFile {
    pub path: String,
    pub content: String,
    pub sha256: String,
}

/// The sync service
pub struct SyncService {
    base_dir: PathBuf,
    whitelist: Vec<String>,
    cache: Mutex<Option<(Instant, Manifest)>>,
    /// Coalesces concurrent recomputes
    recompute: Mutex<()>,
    tx: broadcast::Sender<SyncFrame>,
    bus: EventBus,
}

impl SyncService {
    pub fn new(base_dir: PathBuf, whitelist: Vec<String>, bus: EventBus) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            base_dir,
            whitelist,
            cache: Mutex::new(None),
            recompute: Mutex::new(()),
            tx,
            bus,
        }
    }

    pub fn allowed_paths(&self) -> &[String] {
        &self.whitelist
    }

    /// Subscribe to push frames (bounded; slow readers observe lag).
    pub fn subscribe(&self) -> broadcast::Receiver<SyncFrame> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Current manifest, recomputing when the cache is older than 5 s.
    pub async fn manifest(&self) -> Result<Manifest> {
        if let Some((at, manifest)) = self.cache.lock().await.as_ref() {
            if at.elapsed() < MANIFEST_CACHE_TTL {
                return Ok(manifest.clone());
            }
        }
        self.rebuild(false).await
    }

    /// Force a rescan regardless of cache age (used by the watcher and by
    /// file-change signals).
    pub async fn refresh(&self) -> Result<Manifest> {
        self.rebuild(true).await
    }

    /// Recompute the manifest, update the cache, and notify subscribers when
    /// the etag changed. Concurrent callers coalesce on the recompute mutex;
    /// non-forced callers accept a manifest rebuilt while they waited.
    async fn rebuild(&self, force: bool) -> Result<Manifest> {
        let _guard = self.recompute.lock().await;

        if !force {
            if let Some((at, manifest)) = self.cache.lock().await.as_ref() {
                if at.elapsed() < MANIFEST_CACHE_TTL {
                    return Ok(manifest.clone());
                }
            }
        }

        let fresh = build_manifest(&self.base_dir, &self.whitelist).await?;

        let previous_etag = {
            let mut cache = self.cache.lock().await;
            let previous = cache.as_ref().map(|(_, m)| m.etag.clone());
            *cache = Some((Instant::now(), fresh.clone()));
            previous
        };

        if previous_etag.as_deref() != Some(fresh.etag.as_str()) {
            if previous_etag.is_some() {
                debug!(etag = %fresh.etag, "manifest etag changed, notifying subscribers");
                let _ = self.tx.send(SyncFrame::Update {
                    etag: fresh.etag.clone(),
                    changed: true,
                    ts: now_unix(),
                });
            }
            self.bus.emit_lossy(ReaderEvent::ManifestChanged {
                etag: fresh.etag.clone(),
                file_count: fresh.file_count,
                timestamp: Utc::now(),
            });
        }

        Ok(fresh)
    }

    /// Read one whitelisted file. Non-whitelisted paths are `not_found` so
    /// existence never leaks.
    pub async fn read_file(&self, rel_path: &str) -> Result<SyncFile> {
        if !safe_relative(rel_path) || !self.whitelist.iter().any(|p| p == rel_path) {
            return Err(Error::NotFound(format!("path '{}'", rel_path)));
        }

        let abs = self.base_dir.join(rel_path);
        let bytes = tokio::time::timeout(FILE_READ_DEADLINE, tokio::fs::read(&abs))
            .await
            .map_err(|_| Error::Timeout(format!("reading '{}'", rel_path)))?
            .map_err(|_| Error::NotFound(format!("path '{}'", rel_path)))?;

        let sha256 = format!("{:x}", <sha2::Sha256 as sha2::Digest>::digest(&bytes));
        let content = String::from_utf8_lossy(&bytes).into_owned();

        Ok(SyncFile {
            path: rel_path.to_string(),
            content,
            sha256,
        })
    }

    /// Periodic rescan loop; runs until the process exits.
    pub async fn watch_loop(self: std::sync::Arc<Self>) {
        info!(interval_s = WATCH_INTERVAL.as_secs(), "sync watcher started");
        let mut ticker = tokio::time::interval(WATCH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.refresh().await {
                warn!(error = %e, "manifest rescan failed");
            }
        }
    }
}
