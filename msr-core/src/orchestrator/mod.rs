//! Session orchestrator
//!
//! Coordinates the reader, emotion, device, and memory agents through the
//! play/pause/seek/summary lifecycle. Per-session locks make operations on
//! the same session linearizable; a new play supersedes the previous plan
//! and its in-flight dispatches.

mod plan;
mod session;

pub use plan::{build_plan, PlaybackPlan, TimedAr, TimedHaptic, TimedScent};
pub use session::{Session, SessionStore, DEFAULT_SESSION_TTL};

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use msr_common::events::{EventBus, ReaderEvent};
use msr_common::model::{EmotionLabel, EmotionReading, HighlightKind, SegmentStrategy};
use msr_common::{Error, Result};

use crate::device::{BroadcastContent, PlanStamp};
use crate::emotion::EmotionPayload;
use crate::memory::default_preferences;
use crate::runtime::{AgentRegistry, Scheduler};
use crate::voice::{TtsPort, TtsRequest};

/// Play request, already translated from transport shape
#[derive(Debug, Clone, Deserialize)]
pub struct PlayRequest {
    pub text: String,
    pub user_id: Option<String>,
    pub strategy: Option<SegmentStrategy>,
}

/// Play response: the plan plus the opaque playback URL
#[derive(Debug, Clone, Serialize)]
pub struct PlayResponse {
    pub session_id: Uuid,
    pub playback_url: Option<String>,
    pub emotion: EmotionReading,
    pub plan: PlaybackPlan,
}

/// Pause response
#[derive(Debug, Clone, Serialize)]
pub struct PauseResponse {
    pub status: String,
    pub current_index: usize,
    pub playing: bool,
}

/// Seek response
#[derive(Debug, Clone, Serialize)]
pub struct SeekResponse {
    pub status: String,
    pub current_index: usize,
    pub segment_text: String,
    pub segment_duration: f64,
}

/// Deadline for the orchestrator's own outbound calls
const ORCHESTRATOR_DEADLINE: std::time::Duration = std::time::Duration::from_secs(10);

/// Session summary
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub summary: String,
    pub total_segments: usize,
    pub total_highlights: usize,
    pub current_position: usize,
    pub playing: bool,
    pub emotion: EmotionLabel,
}

/// The orchestrator
pub struct Orchestrator {
    agents: Arc<AgentRegistry>,
    sessions: Arc<SessionStore>,
    scheduler: Arc<Scheduler>,
    tts: Arc<dyn TtsPort>,
    bus: EventBus,
}

impl Orchestrator {
    pub fn new(
        agents: Arc<AgentRegistry>,
        sessions: Arc<SessionStore>,
        scheduler: Arc<Scheduler>,
        tts: Arc<dyn TtsPort>,
        bus: EventBus,
    ) -> Self {
        Self {
            agents,
            sessions,
            scheduler,
            tts,
            bus,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Start (or restart) playback of a text.
    pub async fn play(&self, request: PlayRequest) -> Result<PlayResponse> {
        if request.text.trim().is_empty() {
            return Err(Error::InvalidArgument("text must not be empty".into()));
        }

        // Preferences drive reading speed and event toggles
        let prefs = match &request.user_id {
            Some(user) => self.agents.memory.preferences(user).await?,
            None => default_preferences(),
        };
        let wpm = crate::memory::reading_wpm(&prefs, crate::segmenter::DEFAULT_READING_WPM);

        let strategy = request.strategy.unwrap_or_default();
        let segments = self.agents.reader.segment(&request.text, strategy, wpm);
        if segments.is_empty() {
            return Err(Error::InvalidArgument(
                "text produced no readable segments".into(),
            ));
        }

        // Emotion prediction never fails; upstream trouble degrades it
        let reading = self
            .agents
            .emotion
            .predict(&EmotionPayload::Text(request.text.clone()))
            .await;

        let session = self
            .sessions
            .create_or_refresh(request.user_id.as_deref())
            .await;

        let (session_id, generation, counter, plan, first_text) = {
            let mut guard = session.lock().await;
            let old_generation = guard.plan_generation;
            let generation = guard.next_generation();
            if old_generation > 0 {
                self.bus.emit_lossy(ReaderEvent::PlanSuperseded {
                    session_id: guard.id,
                    old_generation,
                    new_generation: generation,
                    timestamp: Utc::now(),
                });
            }

            let plan = build_plan(guard.id, generation, segments, &reading, &prefs);

            guard.segments = plan.segments.clone();
            guard.current_index = 0;
            guard.playing = true;
            guard.last_emotion = Some(reading.clone());
            guard.touch();

            let first_text = guard.segments.first().map(|s| s.text.clone());
            (
                guard.id,
                generation,
                guard.generation_counter(),
                plan,
                first_text,
            )
        };

        // Opaque playback URL from the TTS seam; degrade on upstream failure
        let voice = prefs
            .get("preferred_voice")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        let speed = prefs
            .get("voice_speed")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(1.0);

        let tts_request = TtsRequest {
            text: request.text.clone(),
            voice,
            emotion: Some(reading.primary),
            speed,
        };
        let synthesis = self.tts.synthesize(&tts_request);
        let playback_url = match tokio::time::timeout(ORCHESTRATOR_DEADLINE, synthesis).await {
            Ok(Ok(audio)) => audio.audio_url,
            Ok(Err(e)) => {
                warn!(error = %e, "TTS unavailable; returning degraded plan");
                None
            }
            Err(_) => {
                warn!(
                    deadline_s = ORCHESTRATOR_DEADLINE.as_secs(),
                    "TTS deadline elapsed; returning degraded plan"
                );
                None
            }
        };

        {
            let mut guard = session.lock().await;
            guard.playback_url = playback_url.clone();
        }

        // Kick the first segment's events to every compatible device; stale
        // generations abandon themselves
        let stamp = PlanStamp::new(counter, generation);
        let device = self.agents.device.clone();
        let dispatch_reading = reading.clone();
        let content = BroadcastContent { text: first_text };
        self.scheduler.spawn(session_id, async move {
            device
                .broadcast(&dispatch_reading, &content, None, Some(stamp))
                .await;
        });

        info!(session_id = %session_id, generation, segments = plan.segments.len(), "play started");
        self.bus.emit_lossy(ReaderEvent::SessionStarted {
            session_id,
            user_id: request.user_id.clone(),
            segment_count: plan.segments.len(),
            emotion: reading.primary,
            timestamp: Utc::now(),
        });

        Ok(PlayResponse {
            session_id,
            playback_url,
            emotion: reading,
            plan,
        })
    }

    /// Pause playback. Idempotent.
    pub async fn pause(&self, session_id: Uuid) -> Result<PauseResponse> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;

        let mut guard = session.lock().await;
        if guard.playing {
            guard.playing = false;
            self.bus.emit_lossy(ReaderEvent::SessionPaused {
                session_id,
                current_index: guard.current_index,
                timestamp: Utc::now(),
            });
        }
        guard.touch();

        Ok(PauseResponse {
            status: "paused".to_string(),
            current_index: guard.current_index,
            playing: false,
        })
    }

    /// Seek to a segment. Invalid indices leave the session untouched.
    pub async fn seek(&self, session_id: Uuid, segment_index: usize) -> Result<SeekResponse> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;

        let mut guard = session.lock().await;
        if segment_index >= guard.segments.len() {
            return Err(Error::InvalidArgument(format!(
                "invalid_segment: index {} out of range (0..{})",
                segment_index,
                guard.segments.len()
            )));
        }

        guard.current_index = segment_index;
        guard.touch();

        let segment = &guard.segments[segment_index];
        let response = SeekResponse {
            status: "seeked".to_string(),
            current_index: segment_index,
            segment_text: segment.text.clone(),
            segment_duration: segment.est_duration_seconds,
        };

        // Re-emit downstream events from this offset
        if let Some(reading) = guard.last_emotion.clone() {
            let stamp = PlanStamp::new(guard.generation_counter(), guard.plan_generation);
            let content = BroadcastContent {
                text: Some(segment.text.clone()),
            };
            let device = self.agents.device.clone();
            self.scheduler.spawn(session_id, async move {
                device.broadcast(&reading, &content, None, Some(stamp)).await;
            });
        }

        self.bus.emit_lossy(ReaderEvent::SessionSeeked {
            session_id,
            segment_index,
            timestamp: Utc::now(),
        });

        Ok(response)
    }

    /// Summarize the session: totals plus a short text built from the
    /// highest-weight highlights.
    pub async fn summary(&self, session_id: Uuid) -> Result<SummaryReport> {
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| Error::NotFound(format!("session {}", session_id)))?;

        let guard = session.lock().await;

        let total_highlights: usize = guard.segments.iter().map(|s| s.highlights.len()).sum();
        let summary = compose_summary(&guard.segments);

        Ok(SummaryReport {
            summary,
            total_segments: guard.segments.len(),
            total_highlights,
            current_position: guard.current_index,
            playing: guard.playing,
            emotion: guard
                .last_emotion
                .as_ref()
                .map(|r| r.primary)
                .unwrap_or(EmotionLabel::Neutral),
        })
    }

    /// Reclaim idle sessions and their scheduler pools.
    pub async fn sweep_expired(&self) {
        for id in self.sessions.sweep_expired().await {
            self.scheduler.forget_session(id);
        }
    }
}

/// Short textual summary from the highest-weight highlights across all
/// segments; falls back to the opening of the text when nothing is
/// highlighted.
fn compose_summary(segments: &[msr_common::model::Segment]) -> String {
    let mut weighted: Vec<(f64, String)> = Vec::new();
    for segment in segments {
        let chars: Vec<char> = segment.text.chars().collect();
        for h in &segment.highlights {
            if h.kind == HighlightKind::Quote || h.kind == HighlightKind::Emphasis {
                let snippet: String = chars
                    .get(h.start_char..h.end_char)
                    .map(|cs| cs.iter().collect())
                    .unwrap_or_default();
                if !snippet.is_empty() {
                    weighted.push((h.weight, snippet));
                }
            } else if let Some(first) = chars.get(..h.start_char.min(chars.len())) {
                // Punctuation highlights summarize as the clause before them
                let clause: String = first
                    .iter()
                    .rev()
                    .take(40)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                let clause = clause.trim().to_string();
                if !clause.is_empty() {
                    weighted.push((h.weight, clause));
                }
            }
        }
    }

    weighted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    weighted.dedup_by(|a, b| a.1 == b.1);

    if weighted.is_empty() {
        return segments
            .first()
            .map(|s| s.text.chars().take(80).collect())
            .unwrap_or_else(|| "No content available.".to_string());
    }

    weighted
        .into_iter()
        .take(3)
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join(" … ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{builtin_devices, DeviceRegistry, FanOut};
    use crate::emotion::EmotionEngine;
    use crate::memory::MemoryStore;
    use crate::runtime::{ConnectorSet, DeviceAgent, EmotionAgent, MemoryAgent, ReaderAgent};
    use crate::voice::StubTts;
    use msr_common::db::init_memory_database;

    async fn orchestrator() -> Orchestrator {
        let bus = EventBus::new(64);
        let registry = Arc::new(DeviceRegistry::new(bus.clone()));
        for (descriptor, port) in builtin_devices() {
            registry.register(descriptor, port).await;
        }
        let fanout = FanOut::new(registry, bus.clone());
        let db = init_memory_database().await.unwrap();
        let store = MemoryStore::new(db.clone());

        let mut connectors = ConnectorSet::new();
        connectors.insert(Arc::new(crate::runtime::SqlConnector::new("sql", db)));

        let agents = Arc::new(
            AgentRegistry::wire(
                ReaderAgent::new(),
                EmotionAgent::new(Arc::new(EmotionEngine::new())),
                DeviceAgent::new(fanout),
                MemoryAgent::new(store),
                &connectors,
            )
            .unwrap(),
        );

        Orchestrator::new(
            agents,
            Arc::new(SessionStore::new(bus.clone())),
            Arc::new(Scheduler::default()),
            Arc::new(StubTts::default()),
            bus,
        )
    }

    #[tokio::test]
    async fn test_play_happy_chinese_text() {
        let orch = orchestrator().await;
        let response = orch
            .play(PlayRequest {
                text: "今天天氣真好！我很開心。".into(),
                user_id: Some("u1".into()),
                strategy: None,
            })
            .await
            .unwrap();

        assert_eq!(response.plan.segments.len(), 2);
        assert_eq!(response.emotion.primary, EmotionLabel::Happy);
        assert!(response.playback_url.is_some());
        assert!(response
            .plan
            .haptic_events
            .iter()
            .any(|e| e.pattern.name == "gentle_pulse"));

        // total duration ~= words / (200/60)
        let words: usize = response.plan.segments.iter().map(|s| s.word_count).sum();
        let expected = words as f64 / (200.0 / 60.0);
        assert!((response.plan.duration_total - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let orch = orchestrator().await;
        let result = orch
            .play(PlayRequest {
                text: "   ".into(),
                user_id: None,
                strategy: None,
            })
            .await;
        match result {
            Err(Error::InvalidArgument(_)) => {}
            other => panic!("expected invalid_argument, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_pause_is_idempotent() {
        let orch = orchestrator().await;
        let play = orch
            .play(PlayRequest {
                text: "One. Two. Three.".into(),
                user_id: None,
                strategy: None,
            })
            .await
            .unwrap();

        let first = orch.pause(play.session_id).await.unwrap();
        let second = orch.pause(play.session_id).await.unwrap();
        assert!(!first.playing);
        assert_eq!(first.current_index, second.current_index);
        assert_eq!(second.status, "paused");
    }

    #[tokio::test]
    async fn test_seek_bounds_and_state() {
        let orch = orchestrator().await;
        let play = orch
            .play(PlayRequest {
                text: "One. Two. Three.".into(),
                user_id: None,
                strategy: None,
            })
            .await
            .unwrap();
        let n = play.plan.segments.len();

        // seek(N) is invalid and leaves state untouched
        let err = orch.seek(play.session_id, n).await.unwrap_err();
        assert!(err.to_string().contains("invalid_segment"));
        let summary = orch.summary(play.session_id).await.unwrap();
        assert_eq!(summary.current_position, 0);

        // a valid seek moves the cursor
        let seek = orch.seek(play.session_id, 1).await.unwrap();
        assert_eq!(seek.status, "seeked");
        assert_eq!(seek.current_index, 1);
        assert_eq!(seek.segment_text, "Two.");

        let summary = orch.summary(play.session_id).await.unwrap();
        assert_eq!(summary.current_position, 1);
        assert_eq!(summary.total_segments, n);
    }

    #[tokio::test]
    async fn test_summary_keeps_playing_flag() {
        let orch = orchestrator().await;
        let play = orch
            .play(PlayRequest {
                text: "\"Run!\" she shouted. Then SILENCE fell.".into(),
                user_id: None,
                strategy: None,
            })
            .await
            .unwrap();

        let summary = orch.summary(play.session_id).await.unwrap();
        assert!(summary.playing);
        assert!(summary.total_highlights > 0);
        assert!(!summary.summary.is_empty());

        orch.pause(play.session_id).await.unwrap();
        let summary = orch.summary(play.session_id).await.unwrap();
        assert!(!summary.playing);
    }

    #[tokio::test]
    async fn test_replay_same_user_bumps_generation() {
        let orch = orchestrator().await;
        let first = orch
            .play(PlayRequest {
                text: "Alpha beta. Gamma delta.".into(),
                user_id: Some("u1".into()),
                strategy: None,
            })
            .await
            .unwrap();
        let second = orch
            .play(PlayRequest {
                text: "Different text now. More of it.".into(),
                user_id: Some("u1".into()),
                strategy: None,
            })
            .await
            .unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert!(second.plan.plan_generation > first.plan.plan_generation);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let orch = orchestrator().await;
        let err = orch.pause(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        let err = orch.summary(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }
}
