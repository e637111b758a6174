//! Concurrent device fan-out with retry and partial-failure semantics

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, warn};

use msr_common::events::{EventBus, ReaderEvent};
use msr_common::model::{
    DeviceClass, DevicePayload, DispatchResult, DispatchStatus, EmotionReading,
};
use msr_common::Error;

use crate::mapping;

use super::port::DevicePort;
use super::registry::DeviceRegistry;

/// Retry/deadline settings for per-device dispatch
#[derive(Debug, Clone)]
pub struct FanOutConfig {
    pub device_timeout: Duration,
    pub backoff_initial: Duration,
    pub backoff_factor: f64,
    /// Retries after the first attempt
    pub max_retries: u32,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            device_timeout: Duration::from_secs(2),
            backoff_initial: Duration::from_millis(200),
            backoff_factor: 2.0,
            max_retries: 2,
        }
    }
}

/// Optional content refs accompanying a broadcast
#[derive(Debug, Clone, Default)]
pub struct BroadcastContent {
    pub text: Option<String>,
}

/// Generation stamp for cancellation: dispatches whose generation no longer
/// matches the session's current plan are abandoned mid-flight.
#[derive(Clone)]
pub struct PlanStamp {
    current: Arc<AtomicU64>,
    generation: u64,
}

impl PlanStamp {
    pub fn new(current: Arc<AtomicU64>, generation: u64) -> Self {
        Self {
            current,
            generation,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.generation
    }
}

/// Device fan-out
#[derive(Clone)]
pub struct FanOut {
    registry: Arc<DeviceRegistry>,
    bus: EventBus,
    config: FanOutConfig,
}

impl FanOut {
    pub fn new(registry: Arc<DeviceRegistry>, bus: EventBus) -> Self {
        Self::with_config(registry, bus, FanOutConfig::default())
    }

    pub fn with_config(registry: Arc<DeviceRegistry>, bus: EventBus, config: FanOutConfig) -> Self {
        Self {
            registry,
            bus,
            config,
        }
    }

    /// Dispatch one emotion reading to the targeted devices (all registered
    /// devices when `targets` is `None`).
    ///
    /// Returns exactly one `DispatchResult` per targeted id. The call itself
    /// never fails; individual failures live inside the map.
    pub async fn broadcast(
        &self,
        reading: &EmotionReading,
        content: &BroadcastContent,
        targets: Option<&[String]>,
    ) -> HashMap<String, DispatchResult> {
        self.broadcast_stamped(reading, content, targets, None).await
    }

    /// `broadcast` with a plan-generation stamp; stale dispatches are
    /// abandoned and their results marked superseded so the orchestrator can
    /// discard them.
    pub async fn broadcast_stamped(
        &self,
        reading: &EmotionReading,
        content: &BroadcastContent,
        targets: Option<&[String]>,
        stamp: Option<PlanStamp>,
    ) -> HashMap<String, DispatchResult> {
        let target_ids: Vec<String> = match targets {
            Some(ids) => ids.to_vec(),
            None => self.registry.ids().await,
        };

        let mut tasks = Vec::with_capacity(target_ids.len());
        for id in target_ids {
            let registry = self.registry.clone();
            let config = self.config.clone();
            let reading = reading.clone();
            let content = content.clone();
            let stamp = stamp.clone();

            tasks.push(async move {
                let result = match registry.get(&id).await {
                    None => DispatchResult::skipped(format!("not_found: unknown device '{}'", id)),
                    Some(device) => {
                        match shape_payload(device.descriptor.class, &reading, &content) {
                            Some(payload)
                                if device
                                    .descriptor
                                    .capabilities
                                    .contains(&payload.required_capability()) =>
                            {
                                dispatch_one(device.port, &payload, &config, stamp.as_ref()).await
                            }
                            Some(payload) => DispatchResult::skipped(format!(
                                "device '{}' lacks capability {:?}",
                                id,
                                payload.required_capability()
                            )),
                            None => DispatchResult::skipped(format!(
                                "no payload for device class {:?}",
                                device.descriptor.class
                            )),
                        }
                    }
                };
                (id, result)
            });
        }

        let results: HashMap<String, DispatchResult> = join_all(tasks).await.into_iter().collect();

        let succeeded = results
            .values()
            .filter(|r| {
                matches!(
                    r.status,
                    DispatchStatus::Success | DispatchStatus::RetriedSuccess
                )
            })
            .count();
        let skipped = results
            .values()
            .filter(|r| r.status == DispatchStatus::SkippedIncompatible)
            .count();
        let failed = results.len() - succeeded - skipped;

        self.bus.emit_lossy(ReaderEvent::BroadcastCompleted {
            targets: results.len(),
            succeeded,
            failed,
            skipped,
            timestamp: Utc::now(),
        });

        results
    }
}

/// Build the payload subset a device class can consume.
pub fn shape_payload(
    class: DeviceClass,
    reading: &EmotionReading,
    content: &BroadcastContent,
) -> Option<DevicePayload> {
    match class {
        DeviceClass::Watch => {
            let pattern = mapping::scaled_haptic(reading);
            Some(DevicePayload::HapticNudge {
                intensity: pattern.intensity,
                duration_ms: pattern.duration_ms,
            })
        }
        DeviceClass::HapticVest | DeviceClass::FullBodyHaptic => Some(DevicePayload::Haptic {
            pattern: mapping::scaled_haptic(reading),
        }),
        DeviceClass::Scent => Some(DevicePayload::Scent {
            recipe: mapping::scaled_scent(reading),
            taste: None,
        }),
        DeviceClass::Taste => Some(DevicePayload::Scent {
            recipe: mapping::scaled_scent(reading),
            taste: Some(mapping::scaled_taste(reading)),
        }),
        DeviceClass::ArGlasses => Some(DevicePayload::ArOverlay {
            overlay: mapping::scaled_ar(reading),
            text: content.text.clone(),
        }),
        DeviceClass::GenericTts => Some(DevicePayload::Prosody {
            preset: mapping::prosody_for(reading.primary),
            text: content.text.clone().unwrap_or_default(),
        }),
        DeviceClass::GenericDisplay => Some(DevicePayload::Display {
            text: content.text.clone().unwrap_or_default(),
        }),
    }
}

/// One device's dispatch: deadline per attempt, exponential backoff, retry
/// only on transient errors.
async fn dispatch_one(
    port: Arc<dyn DevicePort>,
    payload: &DevicePayload,
    config: &FanOutConfig,
    stamp: Option<&PlanStamp>,
) -> DispatchResult {
    let started = Instant::now();
    let mut attempts: u32 = 0;
    let mut backoff = config.backoff_initial;

    loop {
        if stamp.map(PlanStamp::is_stale).unwrap_or(false) {
            return DispatchResult {
                status: DispatchStatus::Failed,
                attempts,
                error: Some("superseded by a newer plan".to_string()),
                latency_ms: started.elapsed().as_millis() as u64,
            };
        }

        attempts += 1;
        let outcome = tokio::time::timeout(config.device_timeout, port.send(payload)).await;

        let error = match outcome {
            Ok(Ok(())) => {
                let status = if attempts > 1 {
                    DispatchStatus::RetriedSuccess
                } else {
                    DispatchStatus::Success
                };
                return DispatchResult {
                    status,
                    attempts,
                    error: None,
                    latency_ms: started.elapsed().as_millis() as u64,
                };
            }
            Ok(Err(e)) => e,
            Err(_) => Error::Timeout(format!(
                "device send exceeded {}ms",
                config.device_timeout.as_millis()
            )),
        };

        let retries_left = attempts <= config.max_retries;
        if !error.is_transient() || !retries_left {
            if error.is_transient() {
                warn!(attempts, error = %error, "device dispatch exhausted retries");
            }
            return DispatchResult {
                status: DispatchStatus::Failed,
                attempts,
                error: Some(error.to_string()),
                latency_ms: started.elapsed().as_millis() as u64,
            };
        }

        debug!(attempts, backoff_ms = backoff.as_millis() as u64, "retrying device dispatch");
        tokio::time::sleep(backoff).await;
        backoff = Duration::from_millis((backoff.as_millis() as f64 * config.backoff_factor) as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::adapters::LoopbackAdapter;
    use async_trait::async_trait;
    use msr_common::model::{Capability, DeviceDescriptor, DeviceStatus, EmotionLabel, EmotionSource};
    use std::sync::atomic::AtomicUsize;

    fn reading(label: EmotionLabel, intensity: f64) -> EmotionReading {
        EmotionReading::new(label, intensity, vec![], "t", EmotionSource::Text, 0.9, 0)
    }

    fn descriptor(id: &str, class: DeviceClass) -> DeviceDescriptor {
        DeviceDescriptor {
            id: id.to_string(),
            class,
            capabilities: class.default_capabilities(),
            addr: format!("local:{}", id),
            status: DeviceStatus::Online,
            last_seen: Utc::now(),
        }
    }

    /// Fails the first `failures` sends with a transient error
    struct FlakyAdapter {
        failures: AtomicUsize,
    }

    #[async_trait]
    impl DevicePort for FlakyAdapter {
        async fn send(&self, _payload: &DevicePayload) -> msr_common::Result<()> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::UpstreamUnavailable("busy".into()));
            }
            Ok(())
        }
    }

    /// Always fails with a permanent error
    struct UnauthorizedAdapter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DevicePort for UnauthorizedAdapter {
        async fn send(&self, _payload: &DevicePayload) -> msr_common::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Unauthorized("bad pairing token".into()))
        }
    }

    fn fast_config() -> FanOutConfig {
        FanOutConfig {
            device_timeout: Duration::from_millis(200),
            backoff_initial: Duration::from_millis(1),
            backoff_factor: 2.0,
            max_retries: 2,
        }
    }

    async fn fanout_with(
        devices: Vec<(DeviceDescriptor, Arc<dyn DevicePort>)>,
    ) -> (FanOut, Arc<DeviceRegistry>) {
        let bus = EventBus::new(16);
        let registry = Arc::new(DeviceRegistry::new(bus.clone()));
        for (descriptor, port) in devices {
            registry.register(descriptor, port).await;
        }
        (
            FanOut::with_config(registry.clone(), bus, fast_config()),
            registry,
        )
    }

    #[tokio::test]
    async fn test_one_result_per_target() {
        let (fanout, _) = fanout_with(vec![
            (
                descriptor("watch", DeviceClass::Watch),
                Arc::new(LoopbackAdapter::new()) as Arc<dyn DevicePort>,
            ),
            (
                descriptor("vest", DeviceClass::HapticVest),
                Arc::new(LoopbackAdapter::new()) as Arc<dyn DevicePort>,
            ),
        ])
        .await;

        let targets = vec!["watch".to_string(), "vest".to_string(), "ghost".to_string()];
        let results = fanout
            .broadcast(&reading(EmotionLabel::Happy, 0.8), &BroadcastContent::default(), Some(&targets))
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results["watch"].status, DispatchStatus::Success);
        assert_eq!(results["vest"].status, DispatchStatus::Success);
        assert_eq!(results["ghost"].status, DispatchStatus::SkippedIncompatible);
    }

    #[tokio::test]
    async fn test_transient_failure_retries_then_succeeds() {
        let (fanout, _) = fanout_with(vec![(
            descriptor("vest", DeviceClass::HapticVest),
            Arc::new(FlakyAdapter {
                failures: AtomicUsize::new(2),
            }) as Arc<dyn DevicePort>,
        )])
        .await;

        let results = fanout
            .broadcast(&reading(EmotionLabel::Sad, 0.7), &BroadcastContent::default(), None)
            .await;

        let r = &results["vest"];
        assert_eq!(r.status, DispatchStatus::RetriedSuccess);
        assert_eq!(r.attempts, 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_never_retries() {
        let adapter = Arc::new(UnauthorizedAdapter {
            calls: AtomicUsize::new(0),
        });
        let (fanout, _) = fanout_with(vec![(
            descriptor("vest", DeviceClass::HapticVest),
            adapter.clone() as Arc<dyn DevicePort>,
        )])
        .await;

        let results = fanout
            .broadcast(&reading(EmotionLabel::Angry, 0.9), &BroadcastContent::default(), None)
            .await;

        assert_eq!(results["vest"].status, DispatchStatus::Failed);
        assert_eq!(results["vest"].attempts, 1);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_results() {
        let (fanout, _) = fanout_with(vec![
            (
                descriptor("watch", DeviceClass::Watch),
                Arc::new(LoopbackAdapter::new()) as Arc<dyn DevicePort>,
            ),
            (
                descriptor("vest", DeviceClass::HapticVest),
                Arc::new(UnauthorizedAdapter {
                    calls: AtomicUsize::new(0),
                }) as Arc<dyn DevicePort>,
            ),
        ])
        .await;

        let results = fanout
            .broadcast(&reading(EmotionLabel::Fear, 0.5), &BroadcastContent::default(), None)
            .await;

        assert_eq!(results["watch"].status, DispatchStatus::Success);
        assert_eq!(results["vest"].status, DispatchStatus::Failed);
    }

    #[tokio::test]
    async fn test_payload_shaping_per_class() {
        let r = reading(EmotionLabel::Happy, 1.0);
        let content = BroadcastContent {
            text: Some("hello".into()),
        };

        match shape_payload(DeviceClass::Watch, &r, &content).unwrap() {
            DevicePayload::HapticNudge { intensity, .. } => {
                assert!(intensity <= 1.0);
            }
            other => panic!("watch got {:?}", other),
        }

        match shape_payload(DeviceClass::Scent, &r, &content).unwrap() {
            DevicePayload::Scent { recipe, taste } => {
                assert_eq!(recipe.name, "citrus_blend");
                assert!(taste.is_none());
            }
            other => panic!("diffuser got {:?}", other),
        }

        match shape_payload(DeviceClass::Taste, &r, &content).unwrap() {
            DevicePayload::Scent { taste, .. } => assert!(taste.is_some()),
            other => panic!("taste got {:?}", other),
        }

        match shape_payload(DeviceClass::ArGlasses, &r, &content).unwrap() {
            DevicePayload::ArOverlay { overlay, text } => {
                assert_eq!(overlay.kind, "sparkles");
                assert_eq!(text.as_deref(), Some("hello"));
            }
            other => panic!("glasses got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_capability_mismatch_is_skipped() {
        // A watch whose capability set was stripped
        let mut desc = descriptor("bare", DeviceClass::Watch);
        desc.capabilities.clear();
        desc.capabilities.insert(Capability::Display);

        let (fanout, _) = fanout_with(vec![(
            desc,
            Arc::new(LoopbackAdapter::new()) as Arc<dyn DevicePort>,
        )])
        .await;

        let results = fanout
            .broadcast(&reading(EmotionLabel::Happy, 0.8), &BroadcastContent::default(), None)
            .await;
        assert_eq!(results["bare"].status, DispatchStatus::SkippedIncompatible);
    }

    #[tokio::test]
    async fn test_stale_stamp_abandons_dispatch() {
        let (fanout, _) = fanout_with(vec![(
            descriptor("watch", DeviceClass::Watch),
            Arc::new(LoopbackAdapter::new()) as Arc<dyn DevicePort>,
        )])
        .await;

        let current = Arc::new(AtomicU64::new(5));
        let stale = PlanStamp::new(current, 4);
        let results = fanout
            .broadcast_stamped(
                &reading(EmotionLabel::Happy, 0.8),
                &BroadcastContent::default(),
                None,
                Some(stale),
            )
            .await;

        assert_eq!(results["watch"].status, DispatchStatus::Failed);
        assert!(results["watch"].error.as_deref().unwrap().contains("superseded"));
    }
}
