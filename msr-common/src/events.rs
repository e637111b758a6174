//! Event types for the MSR event system
//!
//! Provides the shared event enum and EventBus used by the orchestrator,
//! device fan-out, and sync service. Events are broadcast in-process and can
//! be serialized for diagnostic streams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::{DeviceStatus, EmotionLabel};

/// MSR event types
///
/// Events are broadcast via EventBus; all services use this central enum for
/// exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReaderEvent {
    /// A play request created or refreshed a session
    SessionStarted {
        session_id: Uuid,
        user_id: Option<String>,
        segment_count: usize,
        emotion: EmotionLabel,
        timestamp: DateTime<Utc>,
    },

    /// Playback paused (idempotent; emitted only on an actual flip)
    SessionPaused {
        session_id: Uuid,
        current_index: usize,
        timestamp: DateTime<Utc>,
    },

    /// Seek accepted
    SessionSeeked {
        session_id: Uuid,
        segment_index: usize,
        timestamp: DateTime<Utc>,
    },

    /// Session discarded after the inactivity TTL
    SessionExpired {
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A new play superseded the previous plan; stale dispatches abandoned
    PlanSuperseded {
        session_id: Uuid,
        old_generation: u64,
        new_generation: u64,
        timestamp: DateTime<Utc>,
    },

    /// A device fan-out completed (all per-device results resolved)
    BroadcastCompleted {
        targets: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        timestamp: DateTime<Utc>,
    },

    /// Device registered or re-registered
    DeviceRegistered {
        device_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Device liveness transition
    DeviceStatusChanged {
        device_id: String,
        old_status: DeviceStatus,
        new_status: DeviceStatus,
        timestamp: DateTime<Utc>,
    },

    /// Sync manifest etag changed
    ManifestChanged {
        etag: String,
        file_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A request was denied by quota enforcement
    QuotaDenied {
        subject: String,
        route: String,
        timestamp: DateTime<Utc>,
    },
}

impl ReaderEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            ReaderEvent::SessionStarted { .. } => "SessionStarted",
            ReaderEvent::SessionPaused { .. } => "SessionPaused",
            ReaderEvent::SessionSeeked { .. } => "SessionSeeked",
            ReaderEvent::SessionExpired { .. } => "SessionExpired",
            ReaderEvent::PlanSuperseded { .. } => "PlanSuperseded",
            ReaderEvent::BroadcastCompleted { .. } => "BroadcastCompleted",
            ReaderEvent::DeviceRegistered { .. } => "DeviceRegistered",
            ReaderEvent::DeviceStatusChanged { .. } => "DeviceStatusChanged",
            ReaderEvent::ManifestChanged { .. } => "ManifestChanged",
            ReaderEvent::QuotaDenied { .. } => "QuotaDenied",
        }
    }
}

/// Central event distribution bus
///
/// Built on tokio::broadcast: non-blocking publish, multiple concurrent
/// subscribers, automatic cleanup when subscribers drop, lag detection for
/// slow subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReaderEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: ReaderEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_delivery() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit_lossy(ReaderEvent::SessionStarted {
            session_id: Uuid::new_v4(),
            user_id: Some("u1".into()),
            segment_count: 2,
            emotion: EmotionLabel::Happy,
            timestamp: Utc::now(),
        });

        let received = rx.try_recv().expect("should receive event");
        assert_eq!(received.event_type(), "SessionStarted");
    }

    #[test]
    fn test_emit_lossy_without_subscribers() {
        let bus = EventBus::new(4);
        // No subscribers; must not panic
        bus.emit_lossy(ReaderEvent::ManifestChanged {
            etag: "e".into(),
            file_count: 0,
            timestamp: Utc::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = ReaderEvent::QuotaDenied {
            subject: "key-1".into(),
            route: "play".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "QuotaDenied");
        assert_eq!(json["route"], "play");
    }

    #[test]
    fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emit_lossy(ReaderEvent::SessionExpired {
            session_id: Uuid::new_v4(),
            timestamp: Utc::now(),
        });

        assert_eq!(rx1.try_recv().unwrap().event_type(), "SessionExpired");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "SessionExpired");
    }
}
