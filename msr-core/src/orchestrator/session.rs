//! Session store
//!
//! Sessions are soft state: one lock object per session id linearizes
//! play/pause/seek, an inactivity TTL reclaims abandoned sessions, and a
//! shared atomic generation counter lets a new plan invalidate the previous
//! plan's in-flight dispatches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use msr_common::events::{EventBus, ReaderEvent};
use msr_common::model::{EmotionReading, Segment};

/// Default inactivity TTL before a session is discarded
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// In-memory state of one play-through
pub struct Session {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub segments: Vec<Segment>,
    pub current_index: usize,
    pub playing: bool,
    pub last_emotion: Option<EmotionReading>,
    pub playback_url: Option<String>,
    /// Generation of the currently-active plan
    pub plan_generation: u64,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Shared counter backing plan generations; stamps compare against it
    generation_counter: Arc<AtomicU64>,
}

impl Session {
    fn new(id: Uuid, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            segments: Vec::new(),
            current_index: 0,
            playing: false,
            last_emotion: None,
            playback_url: None,
            plan_generation: 0,
            started_at: now,
            updated_at: now,
            generation_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance to a new plan generation, invalidating older stamps.
    pub fn next_generation(&mut self) -> u64 {
        let generation = self.generation_counter.fetch_add(1, Ordering::AcqRel) + 1;
        self.plan_generation = generation;
        generation
    }

    /// Handle to the shared generation counter for stamping dispatches.
    pub fn generation_counter(&self) -> Arc<AtomicU64> {
        self.generation_counter.clone()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Store of live sessions with per-session locks
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
    by_user: RwLock<HashMap<String, Uuid>>,
    ttl: Duration,
    bus: EventBus,
}

impl SessionStore {
    pub fn new(bus: EventBus) -> Self {
        Self::with_ttl(bus, DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(bus: EventBus, ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            by_user: RwLock::new(HashMap::new()),
            ttl,
            bus,
        }
    }

    /// Create a session, or return the live session already bound to this
    /// user (anonymous plays always get a fresh session).
    pub async fn create_or_refresh(&self, user_id: Option<&str>) -> Arc<Mutex<Session>> {
        if let Some(user) = user_id {
            if let Some(existing_id) = self.by_user.read().await.get(user).copied() {
                if let Some(session) = self.sessions.read().await.get(&existing_id) {
                    return session.clone();
                }
            }
        }

        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(Session::new(id, user_id.map(str::to_string))));
        self.sessions.write().await.insert(id, session.clone());
        if let Some(user) = user_id {
            self.by_user.write().await.insert(user.to_string(), id);
        }
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Discard sessions idle past the TTL; returns the reclaimed ids.
    pub async fn sweep_expired(&self) -> Vec<Uuid> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::minutes(30));

        let mut expired = Vec::new();
        {
            let sessions = self.sessions.read().await;
            for (id, session) in sessions.iter() {
                let session = session.lock().await;
                if session.updated_at < cutoff {
                    expired.push((*id, session.user_id.clone()));
                }
            }
        }

        if expired.is_empty() {
            return Vec::new();
        }

        let mut sessions = self.sessions.write().await;
        let mut by_user = self.by_user.write().await;
        let mut reclaimed = Vec::with_capacity(expired.len());
        for (id, user) in expired {
            sessions.remove(&id);
            if let Some(user) = user {
                // Only unbind if the user still points at this session
                if by_user.get(&user) == Some(&id) {
                    by_user.remove(&user);
                }
            }
            self.bus.emit_lossy(ReaderEvent::SessionExpired {
                session_id: id,
                timestamp: Utc::now(),
            });
            reclaimed.push(id);
        }
        reclaimed
    }
}
