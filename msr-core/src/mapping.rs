//! Emotion to modality mapping tables
//!
//! Static, versioned tables keyed by emotion label. The v1 values are the
//! baseline contract the rest of the system (and its tests) lock in; payload
//! intensities are scaled by the reading's intensity before dispatch.

use msr_common::model::{
    clamp01, ArOverlay, BodyRegion, EmotionLabel, EmotionReading, HapticPattern, HapticRepeat,
    ProsodyPreset, ScentRecipe, TasteRecipe,
};

/// Mapping table version
pub const TABLE_VERSION: u32 = 1;

/// Floor applied to reading intensity before scaling payloads
const INTENSITY_FLOOR: f64 = 0.2;

/// Look up the prosody preset for a label (v1 baseline).
pub fn prosody_for(label: EmotionLabel) -> ProsodyPreset {
    let (voice_id, rate, pitch, volume) = match label {
        EmotionLabel::Happy => ("cheerful", 1.10, 1.10, 1.00),
        EmotionLabel::Sad => ("melancholic", 0.90, 0.90, 0.80),
        EmotionLabel::Angry => ("intense", 1.20, 1.00, 1.10),
        EmotionLabel::Fear => ("tense", 1.05, 1.05, 1.00),
        EmotionLabel::Surprise => ("energetic", 1.15, 1.05, 1.00),
        EmotionLabel::Disgust => ("normal", 1.00, 0.95, 0.95),
        EmotionLabel::Neutral => ("normal", 1.00, 1.00, 1.00),
    };
    ProsodyPreset {
        voice_id: voice_id.to_string(),
        rate,
        pitch,
        volume,
    }
}

/// Look up the haptic pattern for a label (v1 baseline).
pub fn haptic_for(label: EmotionLabel) -> HapticPattern {
    use BodyRegion::*;
    let (name, intensity, frequency_hz, duration_ms, regions): (_, _, _, _, &[BodyRegion]) =
        match label {
            EmotionLabel::Happy => ("gentle_pulse", 0.70, 180, 1500, &[Chest, Shoulders]),
            EmotionLabel::Sad => ("slow_wave", 0.50, 60, 3000, &[Chest, Back]),
            EmotionLabel::Angry => ("sharp_burst", 0.90, 200, 500, &[Arms, Chest, Back]),
            EmotionLabel::Fear => ("tremor", 0.80, 150, 2000, &[Spine, Shoulders]),
            EmotionLabel::Surprise => ("sudden_spike", 1.00, 220, 800, &[Chest, Arms]),
            EmotionLabel::Disgust => ("recoil_wave", 0.60, 90, 1200, &[Stomach, Chest]),
            EmotionLabel::Neutral => ("subtle_tap", 0.30, 80, 2000, &[Chest]),
        };
    HapticPattern {
        name: name.to_string(),
        intensity,
        frequency_hz,
        duration_ms,
        regions: regions.to_vec(),
        repeat: HapticRepeat::once(),
    }
}

/// Look up the scent recipe for a label (v1 baseline).
pub fn scent_for(label: EmotionLabel) -> ScentRecipe {
    let (name, notes, intensity, duration_seconds): (_, &[&str], _, _) = match label {
        EmotionLabel::Happy => ("citrus_blend", &["orange", "lemon", "bergamot"], 0.80, 180),
        EmotionLabel::Sad => ("chamomile_vanilla", &["chamomile", "vanilla", "warm"], 0.60, 300),
        EmotionLabel::Angry => (
            "peppermint_eucalyptus",
            &["peppermint", "eucalyptus", "cooling"],
            0.50,
            120,
        ),
        EmotionLabel::Fear => (
            "lavender_sandalwood",
            &["lavender", "sandalwood", "grounding"],
            0.70,
            240,
        ),
        EmotionLabel::Surprise => ("jasmine_ginger", &["jasmine", "ginger", "energizing"], 0.90, 90),
        EmotionLabel::Disgust => ("mint_pine", &["mint", "pine", "fresh"], 0.40, 150),
        EmotionLabel::Neutral => ("subtle_woody", &["cedar", "light"], 0.30, 200),
    };
    ScentRecipe {
        name: name.to_string(),
        notes: notes.iter().map(|s| s.to_string()).collect(),
        intensity,
        duration_seconds,
    }
}

/// Look up the AR overlay for a label (v1 baseline).
pub fn ar_for(label: EmotionLabel) -> ArOverlay {
    let (kind, color_rgb, opacity, animation, particles) = match label {
        EmotionLabel::Happy => ("sparkles", [255, 220, 100], 0.70, "float_up", 50),
        EmotionLabel::Sad => ("rain", [100, 150, 200], 0.50, "fall_down", 30),
        EmotionLabel::Angry => ("flames", [255, 50, 50], 0.80, "flicker", 60),
        EmotionLabel::Fear => ("fog", [150, 100, 200], 0.60, "swirl", 40),
        EmotionLabel::Surprise => ("burst", [255, 200, 0], 0.90, "explode", 80),
        EmotionLabel::Disgust => ("ripple", [150, 200, 100], 0.40, "wave_out", 25),
        EmotionLabel::Neutral => ("ambient", [200, 200, 200], 0.30, "subtle_glow", 20),
    };
    ArOverlay {
        kind: kind.to_string(),
        color_rgb,
        opacity,
        animation: animation.to_string(),
        particles,
    }
}

/// Look up the taste recipe for a label (taste printers consume this inside
/// the scent payload slot).
pub fn taste_for(label: EmotionLabel) -> TasteRecipe {
    let (flavor, ingredients, intensity, temperature_c): (_, &[&str], _, _) = match label {
        EmotionLabel::Happy => ("sweet_fruity", &["strawberry", "honey", "vanilla"], 0.80, 25),
        EmotionLabel::Sad => ("comfort_sweet", &["chocolate", "caramel", "salt"], 0.70, 40),
        EmotionLabel::Angry => ("spicy_bitter", &["chili", "dark_chocolate", "coffee"], 0.90, 50),
        EmotionLabel::Fear => ("mild_earthy", &["chamomile", "honey", "oat"], 0.50, 37),
        EmotionLabel::Surprise => ("tangy_pop", &["lemon", "ginger", "mint"], 1.00, 15),
        EmotionLabel::Disgust => ("cleansing_fresh", &["cucumber", "mint", "lime"], 0.40, 10),
        EmotionLabel::Neutral => ("subtle_umami", &["vegetable_broth", "herbs"], 0.30, 37),
    };
    TasteRecipe {
        flavor: flavor.to_string(),
        ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
        intensity,
        temperature_c,
    }
}

/// Scaling factor derived from a reading: `max(0.2, intensity)`.
pub fn scale_factor(reading: &EmotionReading) -> f64 {
    reading.intensity.max(INTENSITY_FLOOR)
}

/// Haptic pattern scaled by a reading's intensity, clamped to [0,1].
pub fn scaled_haptic(reading: &EmotionReading) -> HapticPattern {
    let mut pattern = haptic_for(reading.primary);
    pattern.intensity = clamp01(pattern.intensity * scale_factor(reading));
    pattern
}

/// Scent recipe scaled by a reading's intensity, clamped to [0,1].
pub fn scaled_scent(reading: &EmotionReading) -> ScentRecipe {
    let mut recipe = scent_for(reading.primary);
    recipe.intensity = clamp01(recipe.intensity * scale_factor(reading));
    recipe
}

/// AR overlay with opacity scaled by a reading's intensity, clamped to [0,1].
pub fn scaled_ar(reading: &EmotionReading) -> ArOverlay {
    let mut overlay = ar_for(reading.primary);
    overlay.opacity = clamp01(overlay.opacity * scale_factor(reading));
    overlay
}

/// Taste recipe scaled by a reading's intensity, clamped to [0,1].
pub fn scaled_taste(reading: &EmotionReading) -> TasteRecipe {
    let mut recipe = taste_for(reading.primary);
    recipe.intensity = clamp01(recipe.intensity * scale_factor(reading));
    recipe
}

/// Names of all predefined haptic patterns, in table order.
pub fn haptic_pattern_names() -> Vec<String> {
    EmotionLabel::ALL
        .iter()
        .map(|l| haptic_for(*l).name)
        .collect()
}

/// Find the haptic pattern (and its emotion) by pattern name.
pub fn haptic_by_name(name: &str) -> Option<(EmotionLabel, HapticPattern)> {
    EmotionLabel::ALL.iter().find_map(|l| {
        let p = haptic_for(*l);
        (p.name == name).then_some((*l, p))
    })
}
