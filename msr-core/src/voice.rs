//! Voice ports: text-to-speech and speech-to-text seams
//!
//! The concrete provider is a configuration choice; the bundled stubs keep
//! the whole pipeline runnable without any external service. The stub TTS
//! fabricates a deterministic opaque playback URL, the stub STT returns an
//! empty transcript with zero confidence (a degraded-but-valid result, same
//! contract as the emotion engine).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use msr_common::model::EmotionLabel;
use msr_common::Result;

use crate::mapping;
use crate::segmenter::word_count;

/// One synthesis request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionLabel>,
    pub speed: f64,
}

/// Synthesis output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsAudio {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    pub duration_seconds: f64,
    pub format: String,
    pub provider: String,
    pub voice: String,
}

/// Transcription output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttResult {
    pub text: String,
    pub confidence: f64,
    pub language: String,
    pub duration_seconds: f64,
    pub provider: String,
}

/// TTS seam
#[async_trait]
pub trait TtsPort: Send + Sync {
    async fn synthesize(&self, request: &TtsRequest) -> Result<TtsAudio>;
}

/// STT seam
#[async_trait]
pub trait SttPort: Send + Sync {
    async fn transcribe(&self, audio: &[u8], language: Option<&str>) -> Result<SttResult>;
}

/// Deterministic stub TTS provider
pub struct StubTts {
    base_url: String,
}

impl Default for StubTts {
    fn default() -> Self {
        Self {
            base_url: "https://tts.local/audio".to_string(),
        }
    }
}

impl StubTts {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn voice_for(&self, request: &TtsRequest) -> String {
        match (&request.voice, request.emotion) {
            (Some(v), _) => v.clone(),
            (None, Some(emotion)) => mapping::prosody_for(emotion).voice_id,
            (None, None) => "normal".to_string(),
        }
    }
}

#[async_trait]
impl TtsPort for StubTts {
    async fn synthesize(&self, request: &TtsRequest) -> Result<TtsAudio> {
        let voice = self.voice_for(request);

        let mut hasher = Sha256::new();
        hasher.update(request.text.as_bytes());
        hasher.update(voice.as_bytes());
        let digest = hasher.finalize();
        let key = format!("{:x}", digest);

        let speed = request.speed.clamp(0.25, 4.0);
        let words = word_count(&request.text);
        let duration_seconds = words as f64 / (200.0 * speed / 60.0);

        Ok(TtsAudio {
            audio_url: Some(format!("{}/{}.mp3", self.base_url, &key[..16])),
            audio_base64: None,
            duration_seconds,
            format: "mp3".to_string(),
            provider: "stub".to_string(),
            voice,
        })
    }
}

/// Stub STT provider: degraded-but-valid transcripts
#[derive(Default)]
pub struct StubStt;

#[async_trait]
impl SttPort for StubStt {
    async fn transcribe(&self, audio: &[u8], language: Option<&str>) -> Result<SttResult> {
        // Assume 16 kHz 16-bit mono for the duration estimate
        let duration_seconds = audio.len() as f64 / 32_000.0;
        Ok(SttResult {
            text: String::new(),
            confidence: 0.0,
            language: language.unwrap_or("zh-TW").to_string(),
            duration_seconds,
            provider: "stub".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_tts_is_deterministic() {
        let tts = StubTts::default();
        let request = TtsRequest {
            text: "hello world".into(),
            voice: None,
            emotion: Some(EmotionLabel::Happy),
            speed: 1.0,
        };
        let a = tts.synthesize(&request).await.unwrap();
        let b = tts.synthesize(&request).await.unwrap();
        assert_eq!(a.audio_url, b.audio_url);
        assert_eq!(a.voice, "cheerful");
        assert_eq!(a.provider, "stub");
    }

    #[tokio::test]
    async fn test_stub_tts_duration_scales_with_speed() {
        let tts = StubTts::default();
        let slow = tts
            .synthesize(&TtsRequest {
                text: "one two three four".into(),
                voice: None,
                emotion: None,
                speed: 0.5,
            })
            .await
            .unwrap();
        let fast = tts
            .synthesize(&TtsRequest {
                text: "one two three four".into(),
                voice: None,
                emotion: None,
                speed: 2.0,
            })
            .await
            .unwrap();
        assert!(slow.duration_seconds > fast.duration_seconds);
    }

    #[tokio::test]
    async fn test_explicit_voice_wins_over_emotion() {
        let tts = StubTts::default();
        let audio = tts
            .synthesize(&TtsRequest {
                text: "x".into(),
                voice: Some("alloy".into()),
                emotion: Some(EmotionLabel::Sad),
                speed: 1.0,
            })
            .await
            .unwrap();
        assert_eq!(audio.voice, "alloy");
    }

    #[tokio::test]
    async fn test_stub_stt_degraded_result() {
        let stt = StubStt;
        let result = stt.transcribe(&[0u8; 64_000], None).await.unwrap();
        assert_eq!(result.text, "");
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.language, "zh-TW");
        assert!((result.duration_seconds - 2.0).abs() < 1e-9);
        assert_eq!(result.provider, "stub");
    }
}
