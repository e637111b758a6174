//! Modality payload types: prosody, haptics, scent, AR, taste
//!
//! These are the records the mapping tables produce and the device fan-out
//! ships. Field ranges are documented where the mapping layer clamps them.

use serde::{Deserialize, Serialize};

/// TTS prosody parameters for one emotion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProsodyPreset {
    pub voice_id: String,
    /// Speaking rate in [0.5, 2.0]
    pub rate: f64,
    /// Pitch multiplier in [0.5, 1.5]
    pub pitch: f64,
    /// Volume in [0.0, 1.2]
    pub volume: f64,
}

/// Body regions a haptic pattern can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyRegion {
    Chest,
    Shoulders,
    Back,
    Arms,
    Spine,
    Stomach,
}

/// Repeat specification for a haptic pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HapticRepeat {
    Count { count: u32, period_ms: u64 },
    Infinite { period_ms: u64 },
}

impl HapticRepeat {
    /// Single shot
    pub fn once() -> Self {
        HapticRepeat::Count { count: 1, period_ms: 0 }
    }
}

/// One haptic pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HapticPattern {
    pub name: String,
    /// Intensity in [0,1]
    pub intensity: f64,
    pub frequency_hz: u32,
    pub duration_ms: u64,
    pub regions: Vec<BodyRegion>,
    pub repeat: HapticRepeat,
}

/// One scent recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScentRecipe {
    pub name: String,
    pub notes: Vec<String>,
    /// Intensity in [0,1]
    pub intensity: f64,
    pub duration_seconds: u64,
}

/// One taste recipe (taste-class printers consume this inside the scent
/// payload slot; the capability set itself stays closed)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasteRecipe {
    pub flavor: String,
    pub ingredients: Vec<String>,
    /// Intensity in [0,1]
    pub intensity: f64,
    pub temperature_c: i32,
}

/// One AR overlay description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArOverlay {
    pub kind: String,
    pub color_rgb: [u8; 3],
    /// Opacity in [0,1]
    pub opacity: f64,
    pub animation: String,
    pub particles: u32,
}
