//! Screener configuration module.
//!
//! Resolves the optional `screener` section of the config file into the
//! concrete settings a scan runs with.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tw_common::config::{Config, ScreenerSection};
use tw_common::validation::{collect_errors, Validate, ValidationError, ValidationResult};

use super::predicate::{MomentumCriteria, MIN_BARS};
use super::ranker::DEFAULT_TOP_N;

/// Default worker pool size.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Resolved screener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerConfig {
    /// Number of instruments fetched concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-instrument fetch timeout in seconds
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Number of recent sessions requested per instrument
    #[serde(default = "default_history_sessions")]
    pub history_sessions: usize,

    /// Size of the ranked list
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Match criteria
    #[serde(default)]
    pub criteria: MomentumCriteria,

    /// Universe cache lifetime in seconds
    #[serde(default = "default_universe_ttl_secs")]
    pub universe_ttl_secs: u64,

    /// Scan only the first N instruments of the universe
    #[serde(default)]
    pub scan_limit: Option<usize>,

    /// Upstream request budget per minute; unlimited when unset
    #[serde(default)]
    pub requests_per_minute: Option<u32>,

    /// Price history API override
    #[serde(default)]
    pub history_base_url: Option<String>,

    /// ISIN listing host override
    #[serde(default)]
    pub listing_base_url: Option<String>,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            history_sessions: default_history_sessions(),
            top_n: default_top_n(),
            criteria: MomentumCriteria::default(),
            universe_ttl_secs: default_universe_ttl_secs(),
            scan_limit: None,
            requests_per_minute: None,
            history_base_url: None,
            listing_base_url: None,
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_fetch_timeout_secs() -> u64 {
    15
}

fn default_history_sessions() -> usize {
    5
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

fn default_universe_ttl_secs() -> u64 {
    3600 // listing pages change at most daily
}

impl ScreenerConfig {
    /// Fill unset fields of the file section with defaults.
    pub fn from_section(section: &ScreenerSection) -> Self {
        let defaults = Self::default();
        Self {
            concurrency: section.concurrency.unwrap_or(defaults.concurrency),
            fetch_timeout_secs: section
                .fetch_timeout_secs
                .unwrap_or(defaults.fetch_timeout_secs),
            history_sessions: section
                .history_sessions
                .unwrap_or(defaults.history_sessions),
            top_n: section.top_n.unwrap_or(defaults.top_n),
            criteria: MomentumCriteria {
                min_volume_lots: section
                    .min_volume_lots
                    .unwrap_or(defaults.criteria.min_volume_lots),
            },
            universe_ttl_secs: section
                .universe_ttl_secs
                .unwrap_or(defaults.universe_ttl_secs),
            scan_limit: section.scan_limit,
            requests_per_minute: section.requests_per_minute,
            history_base_url: section.history_base_url.clone(),
            listing_base_url: section.listing_base_url.clone(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::from_section(&config.screener)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn universe_ttl(&self) -> Duration {
        Duration::from_secs(self.universe_ttl_secs)
    }

    /// One-line description used in reports.
    pub fn summary(&self) -> String {
        format!(
            "成交量>{}張, 連續兩日收盤上漲, 前{}名",
            self.criteria.min_volume_lots, self.top_n
        )
    }
}

impl Validate for ScreenerConfig {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.concurrency == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "concurrency".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.fetch_timeout_secs == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "fetch_timeout_secs".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if self.history_sessions < MIN_BARS {
            errors.push(ValidationError::InvalidValue {
                field: "history_sessions".into(),
                reason: format!("must be at least {}", MIN_BARS),
            });
        }
        if self.top_n == 0 {
            errors.push(ValidationError::InvalidValue {
                field: "top_n".into(),
                reason: "must be at least 1".into(),
            });
        }
        if !self.criteria.min_volume_lots.is_finite() || self.criteria.min_volume_lots < 0.0 {
            errors.push(ValidationError::InvalidValue {
                field: "criteria.min_volume_lots".into(),
                reason: "must be a non-negative number".into(),
            });
        }

        collect_errors(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScreenerConfig::default();
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.top_n, 20);
        assert_eq!(config.history_sessions, 5);
        assert_eq!(config.criteria.min_volume_lots, 1000.0);
        assert_eq!(config.universe_ttl(), Duration::from_secs(3600));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_section_overrides() {
        let section = ScreenerSection {
            concurrency: Some(4),
            min_volume_lots: Some(500.0),
            scan_limit: Some(100),
            ..Default::default()
        };

        let config = ScreenerConfig::from_section(&section);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.criteria.min_volume_lots, 500.0);
        assert_eq!(config.scan_limit, Some(100));
        assert_eq!(config.fetch_timeout_secs, 15);
    }

    #[test]
    fn test_validation_collects_errors() {
        let config = ScreenerConfig {
            concurrency: 0,
            history_sessions: 2,
            ..Default::default()
        };

        match config.validate() {
            Err(ValidationError::Multiple(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected multiple errors, got {:?}", other),
        }
    }

    #[test]
    fn test_summary_mentions_floor() {
        assert!(ScreenerConfig::default().summary().contains("1000張"));
    }
}
