//! # MSR Core
//!
//! Domain engines for the multi-sensory reader:
//! - Segmenter: language-aware text segmentation with highlight extraction
//! - EmotionEngine: lexicon scoring with pluggable remote classifiers
//! - MappingTables: emotion to prosody/haptic/scent/AR mapping
//! - MemoryStore: preferences, bookmarks, and the RAG corpus
//! - DeviceRegistry and fan-out with per-device retry semantics
//! - Orchestrator: play/pause/seek/summary session lifecycle
//! - AgentRuntime: capability descriptors, connectors, bounded scheduler
//! - Voice ports: TTS/STT seams with stub providers

pub mod device;
pub mod emotion;
pub mod mapping;
pub mod memory;
pub mod orchestrator;
pub mod runtime;
pub mod segmenter;
pub mod voice;
