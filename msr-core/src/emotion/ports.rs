//! Classifier ports
//!
//! Remote emotion models live behind these seams. The engine treats every
//! port as optional and failing-prone; a missing or broken backend degrades
//! the reading instead of surfacing an error.

use async_trait::async_trait;
use msr_common::model::EmotionReading;
use msr_common::Result;

/// Remote text emotion classifier (same contract as the lexicon path)
#[async_trait]
pub trait TextClassifierPort: Send + Sync {
    async fn classify_text(&self, text: &str) -> Result<EmotionReading>;
}

/// Remote image emotion classifier
#[async_trait]
pub trait VisionClassifierPort: Send + Sync {
    async fn classify_image(&self, image: &[u8]) -> Result<EmotionReading>;
}

/// Remote audio emotion classifier
#[async_trait]
pub trait AudioClassifierPort: Send + Sync {
    async fn classify_audio(&self, audio: &[u8]) -> Result<EmotionReading>;
}
