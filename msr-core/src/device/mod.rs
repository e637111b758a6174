//! Device registry and fan-out
//!
//! Tracks connected output devices by capability, shapes per-class payloads
//! from an emotion reading, and dispatches concurrently with per-device
//! deadlines and retry. A broadcast never fails as a whole; the per-device
//! result map is authoritative.

mod adapters;
mod fanout;
mod port;
mod registry;

pub use adapters::{builtin_devices, LoopbackAdapter};
pub use fanout::{shape_payload, BroadcastContent, FanOut, FanOutConfig, PlanStamp};
pub use port::DevicePort;
pub use registry::{DeviceRegistry, RegisteredDevice, DEFAULT_HEARTBEAT_PERIOD};
