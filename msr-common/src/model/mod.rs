//! Core data model shared by all MSR services
//!
//! JSON appears only at the gateway and sync edges; internally these types
//! are the frozen contracts between agents.

mod device;
mod emotion;
mod modality;
mod segment;
mod sync;

pub use device::{
    Capability, DeviceClass, DeviceDescriptor, DevicePayload, DeviceStatus, DispatchResult,
    DispatchStatus,
};
pub use emotion::{clamp01, EmotionLabel, EmotionReading, EmotionSource};
pub use modality::{ArOverlay, BodyRegion, HapticPattern, HapticRepeat, ProsodyPreset, ScentRecipe, TasteRecipe};
pub use segment::{Highlight, HighlightKind, Segment, SegmentStrategy};
pub use sync::{Manifest, ManifestEntry, SyncFrame};
