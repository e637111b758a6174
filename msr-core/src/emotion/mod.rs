//! Emotion prediction engine
//!
//! Maps text, image, or audio payloads to an `EmotionReading`. The text path
//! scores against a keyword lexicon and accepts substitution by a remote
//! classifier with the same contract; image and audio delegate to injected
//! ports. The engine never returns an error: a missing or failing backend
//! yields a clearly-marked degraded reading with `confidence = 0`.

mod lexicon;
mod ports;

pub use lexicon::score_text;
pub use ports::{AudioClassifierPort, TextClassifierPort, VisionClassifierPort};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};
use tracing::debug;

use msr_common::model::{EmotionReading, EmotionSource};
use msr_common::time::now_unix;

/// Input to a prediction
#[derive(Debug, Clone)]
pub enum EmotionPayload {
    Text(String),
    Image(Vec<u8>),
    Audio(Vec<u8>),
}

impl EmotionPayload {
    fn source(&self) -> EmotionSource {
        match self {
            EmotionPayload::Text(_) => EmotionSource::Text,
            EmotionPayload::Image(_) => EmotionSource::Image,
            EmotionPayload::Audio(_) => EmotionSource::Audio,
        }
    }

    /// Memoization key: SHA-256 over a source tag plus the raw payload.
    fn memo_key(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        match self {
            EmotionPayload::Text(t) => {
                hasher.update(b"text:");
                hasher.update(t.as_bytes());
            }
            EmotionPayload::Image(b) => {
                hasher.update(b"image:");
                hasher.update(b);
            }
            EmotionPayload::Audio(b) => {
                hasher.update(b"audio:");
                hasher.update(b);
            }
        }
        hasher.finalize().into()
    }
}

/// Emotion prediction engine with optional remote backends
#[derive(Default)]
pub struct EmotionEngine {
    text_port: Option<Arc<dyn TextClassifierPort>>,
    vision_port: Option<Arc<dyn VisionClassifierPort>>,
    audio_port: Option<Arc<dyn AudioClassifierPort>>,
    memo: Mutex<HashMap<[u8; 32], EmotionReading>>,
}

impl EmotionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text_port(mut self, port: Arc<dyn TextClassifierPort>) -> Self {
        self.text_port = Some(port);
        self
    }

    pub fn with_vision_port(mut self, port: Arc<dyn VisionClassifierPort>) -> Self {
        self.vision_port = Some(port);
        self
    }

    pub fn with_audio_port(mut self, port: Arc<dyn AudioClassifierPort>) -> Self {
        self.audio_port = Some(port);
        self
    }

    /// Predict an emotion reading for a payload.
    ///
    /// Outputs are stable for identical inputs (memoized by payload hash).
    pub async fn predict(&self, payload: &EmotionPayload) -> EmotionReading {
        let key = payload.memo_key();
        if let Some(cached) = self.memo.lock().expect("memo lock").get(&key) {
            return cached.clone();
        }

        let reading = match payload {
            EmotionPayload::Text(text) => self.predict_text(text).await,
            EmotionPayload::Image(bytes) => self.predict_image(bytes).await,
            EmotionPayload::Audio(bytes) => self.predict_audio(bytes).await,
        };

        self.memo
            .lock()
            .expect("memo lock")
            .insert(key, reading.clone());
        reading
    }

    async fn predict_text(&self, text: &str) -> EmotionReading {
        if let Some(port) = &self.text_port {
            match port.classify_text(text).await {
                Ok(reading) => return reading,
                Err(e) => {
                    debug!(error = %e, "remote text classifier failed, using lexicon");
                    let mut fallback = score_text(text);
                    fallback.confidence = fallback.confidence.min(0.5);
                    return fallback;
                }
            }
        }
        score_text(text)
    }

    async fn predict_image(&self, bytes: &[u8]) -> EmotionReading {
        match &self.vision_port {
            Some(port) => match port.classify_image(bytes).await {
                Ok(reading) => reading,
                Err(e) => {
                    debug!(error = %e, "vision classifier failed");
                    EmotionReading::unavailable(EmotionSource::Image, now_unix())
                }
            },
            None => EmotionReading::unavailable(EmotionSource::Image, now_unix()),
        }
    }

    async fn predict_audio(&self, bytes: &[u8]) -> EmotionReading {
        match &self.audio_port {
            Some(port) => match port.classify_audio(bytes).await {
                Ok(reading) => reading,
                Err(e) => {
                    debug!(error = %e, "audio classifier failed");
                    EmotionReading::unavailable(EmotionSource::Audio, now_unix())
                }
            },
            None => EmotionReading::unavailable(EmotionSource::Audio, now_unix()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use msr_common::model::EmotionLabel;
    use msr_common::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingText;

    #[async_trait]
    impl TextClassifierPort for FailingText {
        async fn classify_text(&self, _text: &str) -> msr_common::Result<EmotionReading> {
            Err(Error::UpstreamUnavailable("model down".into()))
        }
    }

    struct CountingText(AtomicUsize);

    #[async_trait]
    impl TextClassifierPort for CountingText {
        async fn classify_text(&self, _text: &str) -> msr_common::Result<EmotionReading> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(EmotionReading::new(
                EmotionLabel::Surprise,
                0.8,
                vec![],
                "remote",
                EmotionSource::Text,
                0.95,
                0,
            ))
        }
    }

    #[tokio::test]
    async fn test_text_lexicon_path() {
        let engine = EmotionEngine::new();
        let r = engine
            .predict(&EmotionPayload::Text("so happy today".into()))
            .await;
        assert_eq!(r.primary, EmotionLabel::Happy);
        assert_eq!(r.source, EmotionSource::Text);
    }

    #[tokio::test]
    async fn test_remote_failure_degrades_confidence() {
        let engine = EmotionEngine::new().with_text_port(Arc::new(FailingText));
        let r = engine
            .predict(&EmotionPayload::Text("happy happy happy happy happy".into()))
            .await;
        assert_eq!(r.primary, EmotionLabel::Happy);
        assert!(r.confidence <= 0.5);
    }

    #[tokio::test]
    async fn test_missing_image_backend_is_degraded() {
        let engine = EmotionEngine::new();
        let r = engine.predict(&EmotionPayload::Image(vec![1, 2, 3])).await;
        assert_eq!(r.primary, EmotionLabel::Neutral);
        assert_eq!(r.intensity, 0.5);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.features, "unavailable");
        assert_eq!(r.source, EmotionSource::Image);
    }

    #[tokio::test]
    async fn test_missing_audio_backend_is_degraded() {
        let engine = EmotionEngine::new();
        let r = engine.predict(&EmotionPayload::Audio(vec![9])).await;
        assert_eq!(r.source, EmotionSource::Audio);
        assert_eq!(r.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_memoization_stable_and_single_call() {
        let port = Arc::new(CountingText(AtomicUsize::new(0)));
        let engine = EmotionEngine::new().with_text_port(port.clone());

        let payload = EmotionPayload::Text("anything".into());
        let first = engine.predict(&payload).await;
        let second = engine.predict(&payload).await;

        assert_eq!(first.primary, second.primary);
        assert_eq!(first.ts_unix, second.ts_unix);
        assert_eq!(port.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_payloads_distinct_keys() {
        let engine = EmotionEngine::new();
        let text = engine.predict(&EmotionPayload::Text("abc".into())).await;
        let image = engine.predict(&EmotionPayload::Image(b"abc".to_vec())).await;
        assert_eq!(text.source, EmotionSource::Text);
        assert_eq!(image.source, EmotionSource::Image);
    }
}
