//! Model selection endpoint
//!
//! Auto-downgrade logic for constrained clients: device class, available
//! memory, and battery saver push toward the lite model; an explicit quality
//! preference overrides when resources allow.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;

use crate::AppState;

const FULL_MODEL: &str = "reader-full";
const LITE_MODEL: &str = "reader-lite";

#[derive(Debug, Deserialize)]
pub struct ModelSelectParams {
    #[serde(default = "default_device")]
    device: String,
    #[serde(default = "default_memory_mb")]
    memory_mb: u64,
    #[serde(default)]
    battery_saver: bool,
    #[serde(default)]
    prefer_quality: bool,
}

fn default_device() -> String {
    "desktop".to_string()
}

fn default_memory_mb() -> u64 {
    4096
}

/// Pure selection logic, shared with tests.
pub fn choose_model(device: &str, memory_mb: u64, battery_saver: bool, prefer_quality: bool) -> (&'static str, Vec<&'static str>) {
    let mut use_lite = false;
    let mut reasons = Vec::new();

    if matches!(device, "mobile" | "watch") {
        use_lite = true;
        reasons.push("device-class");
    }
    if memory_mb < 2048 {
        use_lite = true;
        reasons.push("low-memory");
    }
    if battery_saver {
        use_lite = true;
        reasons.push("battery-saver");
    }
    if prefer_quality && !battery_saver && memory_mb >= 4096 {
        use_lite = false;
        reasons.push("quality-override");
    }

    (if use_lite { LITE_MODEL } else { FULL_MODEL }, reasons)
}

/// `GET /ai/model-select`
pub async fn model_select(
    State(_state): State<AppState>,
    Query(params): Query<ModelSelectParams>,
) -> Json<serde_json::Value> {
    let (chosen, reasons) = choose_model(
        &params.device,
        params.memory_mb,
        params.battery_saver,
        params.prefer_quality,
    );
    let fallback = if chosen == FULL_MODEL { LITE_MODEL } else { FULL_MODEL };

    Json(json!({
        "chosen": chosen,
        "fallback": fallback,
        "reasons": reasons,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_defaults_to_full() {
        let (chosen, reasons) = choose_model("desktop", 4096, false, false);
        assert_eq!(chosen, FULL_MODEL);
        assert!(reasons.is_empty());
    }

    #[test]
    fn test_watch_downgrades() {
        let (chosen, reasons) = choose_model("watch", 4096, false, false);
        assert_eq!(chosen, LITE_MODEL);
        assert_eq!(reasons, vec!["device-class"]);
    }

    #[test]
    fn test_low_memory_downgrades() {
        let (chosen, _) = choose_model("desktop", 1024, false, false);
        assert_eq!(chosen, LITE_MODEL);
    }

    #[test]
    fn test_quality_override_wins_with_resources() {
        let (chosen, reasons) = choose_model("mobile", 8192, false, true);
        assert_eq!(chosen, FULL_MODEL);
        assert!(reasons.contains(&"quality-override"));
    }

    #[test]
    fn test_battery_saver_blocks_quality_override() {
        let (chosen, _) = choose_model("desktop", 8192, true, true);
        assert_eq!(chosen, LITE_MODEL);
    }
}
