//! Configuration loading and root folder resolution

use std::collections::HashSet;
use std::path::PathBuf;

use crate::{Error, Result};

/// Default HTTP bind host/port for the gateway
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8010;

/// Environment variable holding comma-separated API keys
pub const API_KEYS_ENV: &str = "MSR_API_KEYS";

/// Environment variable holding comma-separated sync whitelist paths
pub const SYNC_PATHS_ENV: &str = "MSR_SYNC_PATHS";

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(root_folder));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_root_folder())
}

/// Get default configuration file path for the platform
fn find_config_file() -> Result<PathBuf> {
    let candidate = dirs::config_dir()
        .map(|d| d.join("msr").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if candidate.exists() {
        return Ok(candidate);
    }

    let system_config = PathBuf::from("/etc/msr/config.toml");
    if system_config.exists() {
        return Ok(system_config);
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("msr"))
        .unwrap_or_else(|| PathBuf::from("./msr_data"))
}

/// API key set loaded from the environment
///
/// Empty set disables authentication entirely (development convenience,
/// mirrored by the test suites).
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: HashSet<String>,
}

impl ApiKeys {
    /// Parse a comma-separated key list; blank entries are dropped.
    pub fn from_csv(raw: &str) -> Self {
        let keys = raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        Self { keys }
    }

    /// Load from the `MSR_API_KEYS` environment variable.
    pub fn from_env() -> Self {
        match std::env::var(API_KEYS_ENV) {
            Ok(raw) => Self::from_csv(&raw),
            Err(_) => Self::default(),
        }
    }

    /// Authentication is enforced only when at least one key is configured.
    pub fn enabled(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Sync whitelist: relative POSIX paths served by the sync service.
///
/// Loaded from `MSR_SYNC_PATHS` (comma-separated) or the compiled default.
pub fn sync_whitelist_from_env() -> Vec<String> {
    match std::env::var(SYNC_PATHS_ENV) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        _ => default_sync_whitelist(),
    }
}

/// Compiled default whitelist (text files under the root folder)
pub fn default_sync_whitelist() -> Vec<String> {
    vec![
        "content/welcome.md".to_string(),
        "content/feature_flags.json".to_string(),
        "content/reading_modes.json".to_string(),
        "clients/sync_client_config.json".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_arg_wins() {
        let path = resolve_root_folder(Some("/tmp/msr-test"), "MSR_TEST_UNSET_VAR").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/msr-test"));
    }

    #[test]
    fn test_fallback_is_nonempty() {
        let path = resolve_root_folder(None, "MSR_TEST_UNSET_VAR_2").unwrap();
        assert!(!path.as_os_str().is_empty());
    }

    #[test]
    fn test_api_keys_csv_parsing() {
        let keys = ApiKeys::from_csv("dev-key-123, example-key-abc ,,");
        assert!(keys.enabled());
        assert_eq!(keys.len(), 2);
        assert!(keys.contains("dev-key-123"));
        assert!(keys.contains("example-key-abc"));
        assert!(!keys.contains("other"));
    }

    #[test]
    fn test_empty_keys_disable_auth() {
        let keys = ApiKeys::from_csv("  ,, ");
        assert!(!keys.enabled());
        assert!(keys.is_empty());
    }

    #[test]
    fn test_default_whitelist_paths_are_relative() {
        for p in default_sync_whitelist() {
            assert!(!p.starts_with('/'));
            assert!(!p.contains(".."));
        }
    }
}
