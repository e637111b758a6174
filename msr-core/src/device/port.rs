//! Device adapter contract

use async_trait::async_trait;

use msr_common::model::DevicePayload;
use msr_common::Result;

/// Adapter seam between the fan-out and a vendor SDK.
///
/// Adapters translate the internal payload into the vendor format and report
/// failures through the common error taxonomy; the fan-out retries only
/// errors classified transient (`timeout`, `upstream_unavailable`).
#[async_trait]
pub trait DevicePort: Send + Sync {
    async fn send(&self, payload: &DevicePayload) -> Result<()>;
}
