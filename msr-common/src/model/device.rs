//! Device descriptors, capabilities, payloads, and dispatch results

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::modality::{ArOverlay, HapticPattern, ProsodyPreset, ScentRecipe, TasteRecipe};

/// Device class taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Watch,
    ArGlasses,
    FullBodyHaptic,
    HapticVest,
    Scent,
    Taste,
    GenericTts,
    GenericDisplay,
}

impl DeviceClass {
    /// Default capability set for a class.
    ///
    /// The capability set is closed; taste printers consume scent-slot
    /// payloads, so they declare `Scent`.
    pub fn default_capabilities(&self) -> BTreeSet<Capability> {
        let caps: &[Capability] = match self {
            DeviceClass::Watch => &[Capability::Haptic],
            DeviceClass::ArGlasses => &[Capability::Ar, Capability::Display],
            DeviceClass::FullBodyHaptic => &[Capability::Haptic],
            DeviceClass::HapticVest => &[Capability::Haptic],
            DeviceClass::Scent => &[Capability::Scent],
            DeviceClass::Taste => &[Capability::Scent],
            DeviceClass::GenericTts => &[Capability::Tts],
            DeviceClass::GenericDisplay => &[Capability::Display],
        };
        caps.iter().copied().collect()
    }
}

/// Capabilities a device may declare (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Haptic,
    Scent,
    Ar,
    Tts,
    Display,
}

/// Liveness status of a registered device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Degraded,
    Offline,
}

/// One registered output device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub class: DeviceClass,
    pub capabilities: BTreeSet<Capability>,
    /// Adapter-specific address (opaque to the registry)
    pub addr: String,
    pub status: DeviceStatus,
    pub last_seen: DateTime<Utc>,
}

/// Capability-shaped payload handed to a device adapter
///
/// A device only ever receives variants matching a capability it declared.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DevicePayload {
    /// Full haptic pattern (vests, suits)
    Haptic { pattern: HapticPattern },
    /// Scalar haptic nudge (watches)
    HapticNudge { intensity: f64, duration_ms: u64 },
    /// Scent recipe (diffusers)
    Scent {
        recipe: ScentRecipe,
        #[serde(skip_serializing_if = "Option::is_none")]
        taste: Option<TasteRecipe>,
    },
    /// AR overlay plus optional text refs (glasses)
    ArOverlay {
        overlay: ArOverlay,
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Prosody plus the text to speak (TTS speakers)
    Prosody {
        preset: ProsodyPreset,
        text: String,
    },
    /// Plain text for display surfaces
    Display { text: String },
}

impl DevicePayload {
    /// Capability this payload requires from the receiving device
    pub fn required_capability(&self) -> Capability {
        match self {
            DevicePayload::Haptic { .. } | DevicePayload::HapticNudge { .. } => Capability::Haptic,
            DevicePayload::Scent { .. } => Capability::Scent,
            DevicePayload::ArOverlay { .. } => Capability::Ar,
            DevicePayload::Prosody { .. } => Capability::Tts,
            DevicePayload::Display { .. } => Capability::Display,
        }
    }
}

/// Outcome of one per-device dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    Success,
    RetriedSuccess,
    Failed,
    SkippedIncompatible,
}

/// Per-device dispatch record; never silently dropped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub status: DispatchStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl DispatchResult {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: DispatchStatus::SkippedIncompatible,
            attempts: 0,
            error: Some(reason.into()),
            latency_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_capability_defaults() {
        assert!(DeviceClass::Watch
            .default_capabilities()
            .contains(&Capability::Haptic));
        assert!(DeviceClass::ArGlasses
            .default_capabilities()
            .contains(&Capability::Ar));
        assert!(DeviceClass::Taste
            .default_capabilities()
            .contains(&Capability::Scent));
        assert_eq!(DeviceClass::Scent.default_capabilities().len(), 1);
    }

    #[test]
    fn test_payload_required_capability() {
        let nudge = DevicePayload::HapticNudge {
            intensity: 0.5,
            duration_ms: 200,
        };
        assert_eq!(nudge.required_capability(), Capability::Haptic);

        let display = DevicePayload::Display {
            text: "hi".to_string(),
        };
        assert_eq!(display.required_capability(), Capability::Display);
    }

    #[test]
    fn test_dispatch_status_wire_names() {
        let json = serde_json::to_string(&DispatchStatus::SkippedIncompatible).unwrap();
        assert_eq!(json, "\"skipped_incompatible\"");
        let json = serde_json::to_string(&DispatchStatus::RetriedSuccess).unwrap();
        assert_eq!(json, "\"retried_success\"");
    }
}
