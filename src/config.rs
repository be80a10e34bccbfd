//! Client configuration
//!
//! Loaded from a JSON preferences file next to the desktop app's other
//! settings. Every field has a default, so a missing file is not an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Directory name for the client's configuration
pub const CONFIG_DIR_NAME: &str = "copilot";

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "session-client.json";

/// Production backend used by packaged builds
pub const PRODUCTION_BASE_URL: &str = "https://api.copilot-session.app";

/// Local backend used by unpackaged (development) builds
pub const DEVELOPMENT_BASE_URL: &str = "http://localhost:8000";

/// Default model for screenshot analysis
pub const DEFAULT_SCREENSHOT_MODEL: &str = "gemini-2.5-flash";

/// Heartbeat interval bounds in seconds
pub const MIN_HEARTBEAT_INTERVAL: u64 = 5;
pub const MAX_HEARTBEAT_INTERVAL: u64 = 300;
pub const DEFAULT_HEARTBEAT_INTERVAL: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Base URL for packaged builds
    pub production_base_url: String,
    /// Base URL for development builds
    pub development_base_url: String,
    /// Per-request timeout in seconds. `None` keeps the transport default.
    pub request_timeout_secs: Option<u64>,
    /// Seconds between heartbeats (clamped, see [`ClientConfig::heartbeat_interval`])
    pub heartbeat_interval_secs: u64,
    /// Model used when `analyze_screenshot` is called without one
    pub screenshot_model: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            production_base_url: PRODUCTION_BASE_URL.to_string(),
            development_base_url: DEVELOPMENT_BASE_URL.to_string(),
            request_timeout_secs: None,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL,
            screenshot_model: DEFAULT_SCREENSHOT_MODEL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from disk
    ///
    /// Returns the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, String> {
        log::trace!("Loading session client config from {}", path.display());

        if !path.exists() {
            log::trace!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            log::error!("Failed to read config file: {e}");
            format!("Failed to read config file: {e}")
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            log::error!("Failed to parse config file: {e}");
            format!("Failed to parse config file: {e}")
        })
    }

    /// Heartbeat interval, clamped to the supported range
    pub fn heartbeat_interval(&self) -> Duration {
        let seconds = self.heartbeat_interval_secs;
        if !(MIN_HEARTBEAT_INTERVAL..=MAX_HEARTBEAT_INTERVAL).contains(&seconds) {
            log::warn!(
                "Heartbeat interval {seconds} out of range, clamping to {MIN_HEARTBEAT_INTERVAL}-{MAX_HEARTBEAT_INTERVAL}"
            );
        }
        Duration::from_secs(seconds.clamp(MIN_HEARTBEAT_INTERVAL, MAX_HEARTBEAT_INTERVAL))
    }

    /// Request timeout, if one is configured
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Get the default path of the configuration file
///
/// Returns: `~/Library/Application Support/copilot/session-client.json` (macOS)
///          `~/.config/copilot/session-client.json` (Linux)
///          `%APPDATA%/copilot/session-client.json` (Windows)
pub fn default_config_path() -> Result<PathBuf, String> {
    let config_dir = dirs::config_dir().ok_or("Could not determine config directory")?;
    Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("missing.json")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.screenshot_model, "gemini-2.5-flash");
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_load_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"developmentBaseUrl": "http://127.0.0.1:9000", "requestTimeoutSecs": 10}"#,
        )
        .unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.development_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.production_base_url, PRODUCTION_BASE_URL);
        assert_eq!(config.heartbeat_interval_secs, DEFAULT_HEARTBEAT_INTERVAL);
    }

    #[test]
    fn test_load_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let err = ClientConfig::load(&path).unwrap_err();
        assert!(err.contains("Failed to parse config file"));
    }

    #[test]
    fn test_heartbeat_interval_is_clamped() {
        let mut config = ClientConfig {
            heartbeat_interval_secs: 1,
            ..Default::default()
        };
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(MIN_HEARTBEAT_INTERVAL));

        config.heartbeat_interval_secs = 10_000;
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(MAX_HEARTBEAT_INTERVAL));

        config.heartbeat_interval_secs = 45;
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(45));
    }

    #[test]
    fn test_default_config_path() {
        if let Ok(path) = default_config_path() {
            assert!(path.to_string_lossy().contains(CONFIG_DIR_NAME));
            assert!(path.ends_with(CONFIG_FILE_NAME));
        }
    }
}
