//! Configuration management for the screener.
//!
//! The screener reads a single JSON file at `~/.tw-screener/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (TW_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `TW_LOG_LEVEL` → observability.log_level
//! - `TW_LOG_FORMAT` → observability.log_format
//! - `TW_PORT` → server.port
//! - `TW_SCAN_CONCURRENCY` → screener.concurrency
//! - `TW_SCAN_LIMIT` → screener.scan_limit

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".tw-screener"),
        |dirs| dirs.home_dir().join(".tw-screener"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// HTTP Server
// ============================================================================

/// HTTP server configuration for `tw-screener serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default "127.0.0.1" (local only)
    #[serde(default = "default_host")]
    pub host: String,

    /// Listening port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    4436
}

// ============================================================================
// Screener
// ============================================================================

/// Screener settings as written in the config file.
///
/// Every field is optional; the screener crate resolves missing values
/// to its own defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenerSection {
    /// Number of instruments fetched concurrently
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Per-instrument fetch timeout in seconds
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,

    /// Number of recent trading sessions to request
    #[serde(default)]
    pub history_sessions: Option<usize>,

    /// Size of the ranked list
    #[serde(default)]
    pub top_n: Option<usize>,

    /// Liquidity floor in lots (1 lot = 1000 shares)
    #[serde(default)]
    pub min_volume_lots: Option<f64>,

    /// How long the instrument universe stays cached, in seconds
    #[serde(default)]
    pub universe_ttl_secs: Option<u64>,

    /// Scan only the first N instruments of the universe
    #[serde(default)]
    pub scan_limit: Option<usize>,

    /// Upstream request budget (requests per minute); unlimited when unset
    #[serde(default)]
    pub requests_per_minute: Option<u32>,

    /// Override for the price history API base URL
    #[serde(default)]
    pub history_base_url: Option<String>,

    /// Override for the ISIN listing page base URL
    #[serde(default)]
    pub listing_base_url: Option<String>,
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Screener configuration
    #[serde(default)]
    pub screener: ScreenerSection,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    ///
    /// When `path` is given it must exist; otherwise the default location
    /// is used and a missing file falls back to defaults.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("TW_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("TW_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(port) = lookup("TW_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(w) = lookup("TW_SCAN_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.screener.concurrency = Some(w);
        }
        if let Some(limit) = lookup("TW_SCAN_LIMIT").and_then(|v| v.parse().ok()) {
            self.screener.scan_limit = Some(limit);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.observability.log_format, "pretty");
        assert_eq!(config.server.port, 4436);
        assert!(config.screener.concurrency.is_none());
    }

    #[test]
    fn test_parse_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"observability": {{"level": "debug"}}, "screener": {{"concurrency": 4, "scan_limit": 100}}}}"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "pretty");
        assert_eq!(config.screener.concurrency, Some(4));
        assert_eq!(config.screener.scan_limit, Some(100));
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }

    #[test]
    fn test_load_from_invalid_json_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = Config::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TW_LOG_LEVEL", "warn"),
            ("TW_PORT", "9000"),
            ("TW_SCAN_CONCURRENCY", "1"),
            ("TW_SCAN_LIMIT", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.observability.log_level, "warn");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.screener.concurrency, Some(1));
        // Unparseable values are ignored
        assert!(config.screener.scan_limit.is_none());
    }
}
