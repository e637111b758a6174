//! Capability descriptors

use serde::{Deserialize, Serialize};

/// What an agent consumes and produces, and the connectors it requires.
///
/// The orchestrator composes agents by matching these declarations; it never
/// reaches for a concrete type directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Capability name, e.g. "reader" or "emotion"
    pub name: String,
    /// Input shapes, by record name
    pub inputs: Vec<String>,
    /// Output shapes, by record name
    pub outputs: Vec<String>,
    /// Names of connectors this agent requires from the ConnectorSet
    pub connectors: Vec<String>,
}

impl CapabilityDescriptor {
    pub fn new(
        name: &str,
        inputs: &[&str],
        outputs: &[&str],
        connectors: &[&str],
    ) -> Self {
        Self {
            name: name.to_string(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            connectors: connectors.iter().map(|s| s.to_string()).collect(),
        }
    }
}
