//! Agent runtime: capability descriptors, connectors, and the shared
//! bounded scheduler
//!
//! Agents declare what they consume, produce, and which connectors they
//! require; the orchestrator wires them by capability rather than concrete
//! type, and startup validation fails fast when a required connector is
//! missing from the set.

mod agents;
mod capability;
mod connectors;
mod scheduler;

pub use agents::{AgentRegistry, DeviceAgent, EmotionAgent, MemoryAgent, ReaderAgent};
pub use capability::CapabilityDescriptor;
pub use connectors::{Connector, ConnectorSet, ConnectorSettings, HttpConnector, SqlConnector};
pub use scheduler::{Scheduler, DEFAULT_SESSION_PERMITS};
