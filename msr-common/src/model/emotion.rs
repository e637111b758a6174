//! Emotion labels and readings
//!
//! The seven-label set is closed and authoritative. Anything a classifier or
//! client hands us that is not one of the seven collapses to `Neutral`; a
//! small alias table absorbs the near-synonyms the upstream models emit
//! before the lossy collapse so e.g. `excited` lands in the happy family.

use serde::{Deserialize, Serialize};

/// Closed emotion label set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Angry,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

impl EmotionLabel {
    /// All labels, in table order
    pub const ALL: [EmotionLabel; 7] = [
        EmotionLabel::Happy,
        EmotionLabel::Sad,
        EmotionLabel::Angry,
        EmotionLabel::Fear,
        EmotionLabel::Surprise,
        EmotionLabel::Disgust,
        EmotionLabel::Neutral,
    ];

    /// Wire-format name
    pub fn as_str(&self) -> &'static str {
        match self {
            EmotionLabel::Happy => "happy",
            EmotionLabel::Sad => "sad",
            EmotionLabel::Angry => "angry",
            EmotionLabel::Fear => "fear",
            EmotionLabel::Surprise => "surprise",
            EmotionLabel::Disgust => "disgust",
            EmotionLabel::Neutral => "neutral",
        }
    }

    /// Parse a label, collapsing unknown input to `Neutral`.
    ///
    /// Aliases cover the names upstream emotion models and older clients
    /// emit; everything else is `Neutral` rather than an error.
    pub fn parse_lossy(s: &str) -> EmotionLabel {
        match s.trim().to_ascii_lowercase().as_str() {
            "happy" => EmotionLabel::Happy,
            "sad" => EmotionLabel::Sad,
            "angry" => EmotionLabel::Angry,
            "fear" => EmotionLabel::Fear,
            "surprise" => EmotionLabel::Surprise,
            "disgust" => EmotionLabel::Disgust,
            "neutral" => EmotionLabel::Neutral,
            // Alias table for upstream model vocabularies
            "excited" | "joyful" | "joy" | "delighted" => EmotionLabel::Happy,
            "depressed" | "sorrowful" | "melancholy" => EmotionLabel::Sad,
            "furious" | "mad" | "irritated" => EmotionLabel::Angry,
            "anxious" | "scared" | "afraid" => EmotionLabel::Fear,
            "surprised" | "astonished" => EmotionLabel::Surprise,
            "disgusted" => EmotionLabel::Disgust,
            "calm" | "relaxed" | "peaceful" => EmotionLabel::Neutral,
            _ => EmotionLabel::Neutral,
        }
    }
}

impl std::fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionSource {
    Text,
    Image,
    Audio,
}

/// One emotion prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionReading {
    pub primary: EmotionLabel,
    /// Intensity in [0,1], clamped on construction
    pub intensity: f64,
    /// Up to three secondary labels
    pub secondary: Vec<EmotionLabel>,
    /// Free-form feature description from the predictor
    pub features: String,
    pub source: EmotionSource,
    /// Confidence in [0,1], clamped on construction
    pub confidence: f64,
    pub ts_unix: i64,
}

impl EmotionReading {
    /// Build a reading with all `[0,1]` fields clamped on ingress.
    pub fn new(
        primary: EmotionLabel,
        intensity: f64,
        secondary: Vec<EmotionLabel>,
        features: impl Into<String>,
        source: EmotionSource,
        confidence: f64,
        ts_unix: i64,
    ) -> Self {
        let mut secondary = secondary;
        secondary.truncate(3);
        Self {
            primary,
            intensity: clamp01(intensity),
            secondary,
            features: features.into(),
            source,
            confidence: clamp01(confidence),
            ts_unix,
        }
    }

    /// Degraded reading emitted when a predictor backend is missing or down.
    pub fn unavailable(source: EmotionSource, ts_unix: i64) -> Self {
        Self::new(
            EmotionLabel::Neutral,
            0.5,
            vec![],
            "unavailable",
            source,
            0.0,
            ts_unix,
        )
    }
}

/// Clamp a value into `[0,1]`, mapping NaN to 0.
pub fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}
