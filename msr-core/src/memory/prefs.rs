//! User preference storage
//!
//! Preferences are one JSON document per user. Known keys carry defaults;
//! unknown keys pass through untouched so newer clients can stash settings
//! the server has not learned about yet.

use serde_json::{json, Map, Value};
use sqlx::SqlitePool;

use msr_common::{Error, Result};

/// Known preference keys with their defaults
pub fn default_preferences() -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("voice_speed".into(), json!(1.0));
    m.insert("preferred_voice".into(), Value::Null);
    m.insert("reading_mode".into(), json!("immersive"));
    m.insert("language".into(), json!("zh-TW"));
    m.insert("haptics_enabled".into(), json!(true));
    m.insert("scent_enabled".into(), json!(true));
    m
}

async fn load_stored(db: &SqlitePool, user_id: &str) -> Result<Map<String, Value>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT prefs FROM preferences WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(db)
            .await?;

    match row {
        None => Ok(Map::new()),
        Some((raw,)) => {
            let value: Value = serde_json::from_str(&raw)
                .map_err(|e| Error::Internal(format!("corrupt preferences document: {}", e)))?;
            match value {
                Value::Object(map) => Ok(map),
                _ => Err(Error::Internal("preferences document is not an object".into())),
            }
        }
    }
}

/// Defaults overlaid with the stored document.
pub async fn get(db: &SqlitePool, user_id: &str) -> Result<Map<String, Value>> {
    let mut merged = default_preferences();
    for (k, v) in load_stored(db, user_id).await? {
        merged.insert(k, v);
    }
    Ok(merged)
}

/// Merge `patch` into the stored document (last-write-wins per key) and
/// return the effective preferences.
pub async fn set(
    db: &SqlitePool,
    user_id: &str,
    patch: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    let mut stored = load_stored(db, user_id).await?;
    for (k, v) in patch {
        stored.insert(k.clone(), v.clone());
    }

    let raw = serde_json::to_string(&Value::Object(stored))
        .map_err(|e| Error::Internal(format!("failed to serialize preferences: {}", e)))?;

    sqlx::query(
        "INSERT INTO preferences (user_id, prefs) VALUES (?, ?)
         ON CONFLICT(user_id) DO UPDATE SET prefs = excluded.prefs, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(user_id)
    .bind(raw)
    .execute(db)
    .await?;

    get(db, user_id).await
}

/// Reading speed helper: `voice_speed` scaled onto the base words-per-minute.
pub fn reading_wpm(prefs: &Map<String, Value>, base_wpm: u32) -> u32 {
    let speed = prefs
        .get("voice_speed")
        .and_then(Value::as_f64)
        .unwrap_or(1.0)
        .clamp(0.25, 4.0);
    ((f64::from(base_wpm) * speed).round() as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_wpm_scaling() {
        let mut prefs = default_preferences();
        assert_eq!(reading_wpm(&prefs, 200), 200);

        prefs.insert("voice_speed".into(), json!(1.5));
        assert_eq!(reading_wpm(&prefs, 200), 300);

        prefs.insert("voice_speed".into(), json!(0.0));
        // Clamped to the floor, never zero
        assert_eq!(reading_wpm(&prefs, 200), 50);
    }

    #[test]
    fn test_defaults_contain_all_known_keys() {
        let d = default_preferences();
        for key in [
            "voice_speed",
            "preferred_voice",
            "reading_mode",
            "language",
            "haptics_enabled",
            "scent_enabled",
        ] {
            assert!(d.contains_key(key), "missing default for {}", key);
        }
    }
}
