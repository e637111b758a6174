//! Playback plan construction
//!
//! Haptic events are anchored to segment start times, one scent event is
//! scheduled at emotion onset, and AR events mirror the scent schedule.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use msr_common::model::{
    ArOverlay, EmotionReading, HapticPattern, ProsodyPreset, ScentRecipe, Segment,
};

use crate::mapping;
use crate::segmenter::Segmenter;

/// A haptic pattern scheduled on the playback timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedHaptic {
    pub at_seconds: f64,
    pub segment_index: usize,
    pub pattern: HapticPattern,
}

/// A scent release scheduled on the playback timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedScent {
    pub at_seconds: f64,
    pub recipe: ScentRecipe,
}

/// An AR overlay scheduled on the playback timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedAr {
    pub at_seconds: f64,
    pub overlay: ArOverlay,
}

/// Everything a client needs to render one play-through
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackPlan {
    pub session_id: Uuid,
    pub plan_generation: u64,
    pub segments: Vec<Segment>,
    pub prosody: ProsodyPreset,
    pub haptic_events: Vec<TimedHaptic>,
    pub scent_events: Vec<TimedScent>,
    pub ar_events: Vec<TimedAr>,
    pub duration_total: f64,
}

/// Build a plan from segments, an emotion reading, and user preferences.
///
/// `haptics_enabled` / `scent_enabled` preferences filter the corresponding
/// event streams; AR mirrors the scent schedule regardless, since glasses
/// have their own on-device toggle.
pub fn build_plan(
    session_id: Uuid,
    plan_generation: u64,
    segments: Vec<Segment>,
    reading: &EmotionReading,
    prefs: &Map<String, Value>,
) -> PlaybackPlan {
    let haptics_enabled = prefs
        .get("haptics_enabled")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let scent_enabled = prefs
        .get("scent_enabled")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let prosody = mapping::prosody_for(reading.primary);

    let haptic_events = if haptics_enabled {
        segments
            .iter()
            .map(|segment| TimedHaptic {
                at_seconds: segment.start_seconds,
                segment_index: segment.index,
                pattern: mapping::scaled_haptic(reading),
            })
            .collect()
    } else {
        Vec::new()
    };

    // One scent event at emotion onset; AR mirrors the scent schedule
    let onset = segments.first().map(|s| s.start_seconds).unwrap_or(0.0);
    let scent_schedule = vec![onset];

    let ar_events = scent_schedule
        .iter()
        .map(|&at| TimedAr {
            at_seconds: at,
            overlay: mapping::scaled_ar(reading),
        })
        .collect();

    let scent_events = if scent_enabled {
        scent_schedule
            .iter()
            .map(|&at| TimedScent {
                at_seconds: at,
                recipe: mapping::scaled_scent(reading),
            })
            .collect()
    } else {
        Vec::new()
    };

    let duration_total = Segmenter::total_duration(&segments);

    PlaybackPlan {
        session_id,
        plan_generation,
        segments,
        prosody,
        haptic_events,
        scent_events,
        ar_events,
        duration_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::Segmenter;
    use msr_common::model::{EmotionLabel, EmotionSource, SegmentStrategy};
    use serde_json::json;

    fn reading() -> EmotionReading {
        EmotionReading::new(
            EmotionLabel::Happy,
            0.8,
            vec![],
            "t",
            EmotionSource::Text,
            0.9,
            0,
        )
    }

    fn segments() -> Vec<Segment> {
        Segmenter::with_strategy(SegmentStrategy::Sentence)
            .segment("one two three. four five six. seven eight nine.")
    }

    #[test]
    fn test_haptics_anchored_to_segment_starts() {
        let segs = segments();
        let plan = build_plan(
            Uuid::new_v4(),
            1,
            segs.clone(),
            &reading(),
            &crate::memory::default_preferences(),
        );

        assert_eq!(plan.haptic_events.len(), 3);
        for (event, segment) in plan.haptic_events.iter().zip(&segs) {
            assert!((event.at_seconds - segment.start_seconds).abs() < 1e-9);
            assert_eq!(event.pattern.name, "gentle_pulse");
        }
    }

    #[test]
    fn test_one_scent_event_mirrored_by_ar() {
        let plan = build_plan(
            Uuid::new_v4(),
            1,
            segments(),
            &reading(),
            &crate::memory::default_preferences(),
        );
        assert_eq!(plan.scent_events.len(), 1);
        assert_eq!(plan.ar_events.len(), 1);
        assert!((plan.scent_events[0].at_seconds - plan.ar_events[0].at_seconds).abs() < 1e-9);
        assert_eq!(plan.ar_events[0].overlay.kind, "sparkles");
    }

    #[test]
    fn test_preference_toggles_filter_events() {
        let mut prefs = crate::memory::default_preferences();
        prefs.insert("haptics_enabled".into(), json!(false));
        prefs.insert("scent_enabled".into(), json!(false));

        let plan = build_plan(Uuid::new_v4(), 1, segments(), &reading(), &prefs);
        assert!(plan.haptic_events.is_empty());
        assert!(plan.scent_events.is_empty());
        // AR keeps its schedule
        assert_eq!(plan.ar_events.len(), 1);
    }

    #[test]
    fn test_duration_total_matches_segments() {
        let segs = segments();
        let expected: f64 = segs.iter().map(|s| s.est_duration_seconds).sum();
        let plan = build_plan(
            Uuid::new_v4(),
            1,
            segs,
            &reading(),
            &crate::memory::default_preferences(),
        );
        assert!((plan.duration_total - expected).abs() < 1e-9);
    }
}
