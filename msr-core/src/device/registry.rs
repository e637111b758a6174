//! Capability-typed device registry
//!
//! Read-mostly table of connected devices. Writes go through the registry's
//! methods; readers take cheap snapshots. A sweeper marks devices offline
//! after three missed heartbeat periods.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use msr_common::events::{EventBus, ReaderEvent};
use msr_common::model::{DeviceDescriptor, DeviceStatus};

use super::port::DevicePort;

/// Default heartbeat period; devices go offline after three misses.
pub const DEFAULT_HEARTBEAT_PERIOD: Duration = Duration::from_secs(10);

/// A descriptor paired with its adapter
#[derive(Clone)]
pub struct RegisteredDevice {
    pub descriptor: DeviceDescriptor,
    pub port: Arc<dyn DevicePort>,
}

/// Registry of connected devices
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, RegisteredDevice>>,
    heartbeat_period: Duration,
    bus: EventBus,
}

impl DeviceRegistry {
    pub fn new(bus: EventBus) -> Self {
        Self::with_heartbeat_period(bus, DEFAULT_HEARTBEAT_PERIOD)
    }

    pub fn with_heartbeat_period(bus: EventBus, heartbeat_period: Duration) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            heartbeat_period,
            bus,
        }
    }

    /// Register or re-register a device. Re-registration replaces the
    /// adapter and refreshes liveness.
    pub async fn register(&self, mut descriptor: DeviceDescriptor, port: Arc<dyn DevicePort>) {
        descriptor.status = DeviceStatus::Online;
        descriptor.last_seen = Utc::now();
        let id = descriptor.id.clone();

        self.devices
            .write()
            .await
            .insert(id.clone(), RegisteredDevice { descriptor, port });

        info!(device_id = %id, "device registered");
        self.bus.emit_lossy(ReaderEvent::DeviceRegistered {
            device_id: id,
            timestamp: Utc::now(),
        });
    }

    /// Remove a device; returns whether it was present.
    pub async fn unregister(&self, id: &str) -> bool {
        self.devices.write().await.remove(id).is_some()
    }

    /// Refresh a device's liveness; returns false for unknown ids.
    pub async fn heartbeat(&self, id: &str) -> bool {
        let mut devices = self.devices.write().await;
        match devices.get_mut(id) {
            Some(device) => {
                let old = device.descriptor.status;
                device.descriptor.last_seen = Utc::now();
                device.descriptor.status = DeviceStatus::Online;
                if old != DeviceStatus::Online {
                    self.bus.emit_lossy(ReaderEvent::DeviceStatusChanged {
                        device_id: id.to_string(),
                        old_status: old,
                        new_status: DeviceStatus::Online,
                        timestamp: Utc::now(),
                    });
                }
                true
            }
            None => false,
        }
    }

    /// Look up one device (descriptor clone + adapter handle).
    pub async fn get(&self, id: &str) -> Option<RegisteredDevice> {
        self.devices.read().await.get(id).cloned()
    }

    /// Snapshot of all descriptors.
    pub async fn snapshot(&self) -> Vec<DeviceDescriptor> {
        let mut all: Vec<DeviceDescriptor> = self
            .devices
            .read()
            .await
            .values()
            .map(|d| d.descriptor.clone())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Ids of all registered devices.
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.devices.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Mark devices offline when silent for three heartbeat periods.
    /// Called periodically by a background task.
    pub async fn sweep_stale(&self) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.heartbeat_period * 3)
                .unwrap_or_else(|_| chrono::Duration::seconds(30));

        let mut devices = self.devices.write().await;
        for (id, device) in devices.iter_mut() {
            if device.descriptor.status != DeviceStatus::Offline
                && device.descriptor.last_seen < cutoff
            {
                let old = device.descriptor.status;
                device.descriptor.status = DeviceStatus::Offline;
                self.bus.emit_lossy(ReaderEvent::DeviceStatusChanged {
                    device_id: id.clone(),
                    old_status: old,
                    new_status: DeviceStatus::Offline,
                    timestamp: Utc::now(),
                });
            }
        }
    }
}
