//! The four agents and the capability registry that wires them
//!
//! Each agent is a thin typed façade over a domain engine plus a capability
//! declaration. The registry validates at startup that every declared
//! connector requirement is satisfied, then hands the orchestrator handles
//! looked up by capability name.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use msr_common::model::{DispatchResult, EmotionReading, Segment, SegmentStrategy};
use msr_common::{Error, Result};

use crate::device::{BroadcastContent, FanOut, PlanStamp};
use crate::emotion::{EmotionEngine, EmotionPayload};
use crate::memory::{MemoryStore, ScoredDoc};
use crate::segmenter::Segmenter;

use super::capability::CapabilityDescriptor;
use super::connectors::ConnectorSet;

/// Reader capability: text in, segments out
pub struct ReaderAgent {
    descriptor: CapabilityDescriptor,
}

impl Default for ReaderAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderAgent {
    pub fn new() -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                "reader",
                &["text", "strategy"],
                &["segments"],
                &[],
            ),
        }
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub fn segment(
        &self,
        text: &str,
        strategy: SegmentStrategy,
        reading_wpm: u32,
    ) -> Vec<Segment> {
        Segmenter::with_strategy(strategy)
            .with_reading_wpm(reading_wpm)
            .segment(text)
    }
}

/// Emotion capability: payload in, reading out
pub struct EmotionAgent {
    descriptor: CapabilityDescriptor,
    engine: Arc<EmotionEngine>,
}

impl EmotionAgent {
    pub fn new(engine: Arc<EmotionEngine>) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                "emotion",
                &["text", "image_bytes", "audio_bytes"],
                &["emotion_reading"],
                &[],
            ),
            engine,
        }
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub async fn predict(&self, payload: &EmotionPayload) -> EmotionReading {
        self.engine.predict(payload).await
    }
}

/// Device capability: reading + content in, per-device results out
pub struct DeviceAgent {
    descriptor: CapabilityDescriptor,
    fanout: FanOut,
}

impl DeviceAgent {
    pub fn new(fanout: FanOut) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                "device",
                &["emotion_reading", "content_refs", "target_ids"],
                &["dispatch_results"],
                &[],
            ),
            fanout,
        }
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub async fn broadcast(
        &self,
        reading: &EmotionReading,
        content: &BroadcastContent,
        targets: Option<&[String]>,
        stamp: Option<PlanStamp>,
    ) -> HashMap<String, DispatchResult> {
        self.fanout
            .broadcast_stamped(reading, content, targets, stamp)
            .await
    }
}

/// Memory capability: preferences and retrieval
pub struct MemoryAgent {
    descriptor: CapabilityDescriptor,
    store: MemoryStore,
}

impl MemoryAgent {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                "memory",
                &["user_id", "query"],
                &["preferences", "documents"],
                &["sql"],
            ),
            store,
        }
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub async fn preferences(&self, user_id: &str) -> Result<Map<String, Value>> {
        self.store.get_preferences(user_id).await
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredDoc>> {
        self.store.query_docs(query, top_k).await
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

/// Registry of the wired agents, validated against the connector set
pub struct AgentRegistry {
    pub reader: Arc<ReaderAgent>,
    pub emotion: Arc<EmotionAgent>,
    pub device: Arc<DeviceAgent>,
    pub memory: Arc<MemoryAgent>,
}

impl AgentRegistry {
    /// Wire the agents, failing fast when a declared connector is missing.
    pub fn wire(
        reader: ReaderAgent,
        emotion: EmotionAgent,
        device: DeviceAgent,
        memory: MemoryAgent,
        connectors: &ConnectorSet,
    ) -> Result<Self> {
        for descriptor in [
            reader.descriptor(),
            emotion.descriptor(),
            device.descriptor(),
            memory.descriptor(),
        ] {
            let missing = connectors.missing(&descriptor.connectors);
            if !missing.is_empty() {
                return Err(Error::Config(format!(
                    "agent '{}' requires missing connectors: {}",
                    descriptor.name,
                    missing.join(", ")
                )));
            }
        }

        Ok(Self {
            reader: Arc::new(reader),
            emotion: Arc::new(emotion),
            device: Arc::new(device),
            memory: Arc::new(memory),
        })
    }

    /// All capability descriptors, for diagnostics.
    pub fn capabilities(&self) -> Vec<CapabilityDescriptor> {
        vec![
            self.reader.descriptor().clone(),
            self.emotion.descriptor().clone(),
            self.device.descriptor().clone(),
            self.memory.descriptor().clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceRegistry;
    use msr_common::db::init_memory_database;
    use msr_common::events::EventBus;

    fn connectors(db: &sqlx::SqlitePool) -> ConnectorSet {
        let mut set = ConnectorSet::new();
        set.insert(Arc::new(crate::runtime::SqlConnector::new("sql", db.clone())));
        set
    }

    async fn registry() -> AgentRegistry {
        let bus = EventBus::new(8);
        let devices = Arc::new(DeviceRegistry::new(bus.clone()));
        let fanout = FanOut::new(devices, bus);
        let db = init_memory_database().await.unwrap();
        let store = MemoryStore::new(db.clone());

        AgentRegistry::wire(
            ReaderAgent::new(),
            EmotionAgent::new(Arc::new(EmotionEngine::new())),
            DeviceAgent::new(fanout),
            MemoryAgent::new(store),
            &connectors(&db),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_wiring_succeeds_with_connectors_satisfied() {
        let agents = registry().await;
        let caps = agents.capabilities();
        assert_eq!(caps.len(), 4);
        let names: Vec<&str> = caps.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["reader", "emotion", "device", "memory"]);
    }

    #[tokio::test]
    async fn test_missing_connector_fails_wiring() {
        let bus = EventBus::new(8);
        let devices = Arc::new(DeviceRegistry::new(bus.clone()));
        let fanout = FanOut::new(devices, bus);
        let store = MemoryStore::new(init_memory_database().await.unwrap());

        // Memory declares "sql" but the set is empty
        let result = AgentRegistry::wire(
            ReaderAgent::new(),
            EmotionAgent::new(Arc::new(EmotionEngine::new())),
            DeviceAgent::new(fanout),
            MemoryAgent::new(store),
            &ConnectorSet::new(),
        );
        match result {
            Err(Error::Config(msg)) => assert!(msg.contains("sql")),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_reader_agent_segments() {
        let agents = registry().await;
        let segments = agents
            .reader
            .segment("One. Two.", SegmentStrategy::Sentence, 200);
        assert_eq!(segments.len(), 2);
    }
}
