//! Built-in device adapters
//!
//! The loopback adapter records payloads instead of talking to a vendor SDK.
//! It backs the six demo devices the gateway seeds at startup and doubles as
//! the scripted endpoint for tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use msr_common::model::{DeviceClass, DeviceDescriptor, DevicePayload, DeviceStatus};
use msr_common::Result;

use super::port::DevicePort;

/// Adapter that records every payload it receives
#[derive(Default)]
pub struct LoopbackAdapter {
    sent: Mutex<Vec<DevicePayload>>,
}

impl LoopbackAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads received so far, oldest first.
    pub fn sent(&self) -> Vec<DevicePayload> {
        self.sent.lock().expect("loopback lock").clone()
    }
}

#[async_trait]
impl DevicePort for LoopbackAdapter {
    async fn send(&self, payload: &DevicePayload) -> Result<()> {
        debug!(payload = ?payload, "loopback adapter received payload");
        self.sent.lock().expect("loopback lock").push(payload.clone());
        Ok(())
    }
}

/// The demo device set seeded at startup: one device per supported class of
/// hardware the reader integrates with.
pub fn builtin_devices() -> Vec<(DeviceDescriptor, Arc<LoopbackAdapter>)> {
    let classes = [
        ("apple_watch", DeviceClass::Watch),
        ("rayban_meta", DeviceClass::ArGlasses),
        ("tesla_suit", DeviceClass::FullBodyHaptic),
        ("bhaptics", DeviceClass::HapticVest),
        ("aromajoin", DeviceClass::Scent),
        ("foodini", DeviceClass::Taste),
    ];

    classes
        .into_iter()
        .map(|(id, class)| {
            (
                DeviceDescriptor {
                    id: id.to_string(),
                    class,
                    capabilities: class.default_capabilities(),
                    addr: format!("loopback:{}", id),
                    status: DeviceStatus::Online,
                    last_seen: Utc::now(),
                },
                Arc::new(LoopbackAdapter::new()),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_records_payloads() {
        let adapter = LoopbackAdapter::new();
        adapter
            .send(&DevicePayload::Display { text: "a".into() })
            .await
            .unwrap();
        adapter
            .send(&DevicePayload::Display { text: "b".into() })
            .await
            .unwrap();
        assert_eq!(adapter.sent().len(), 2);
    }

    #[test]
    fn test_builtin_device_set() {
        let devices = builtin_devices();
        assert_eq!(devices.len(), 6);
        let ids: Vec<&str> = devices.iter().map(|(d, _)| d.id.as_str()).collect();
        assert!(ids.contains(&"apple_watch"));
        assert!(ids.contains(&"aromajoin"));
        assert!(ids.contains(&"foodini"));
    }
}
