//! Configuration validation.
//!
//! Checks that configured values are present and within usable ranges
//! before a scan or the HTTP server starts.

use thiserror::Error;

use crate::config::{Config, ObservabilityConfig, ScreenerSection, ServerConfig};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid port {port} for {field}")]
    InvalidPort { port: u16, field: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

/// Collapse a list of errors into a single result.
pub fn collect_errors(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(ValidationError::Multiple(errors)),
    }
}

impl Validate for Config {
    fn validate(&self) -> ValidationResult<()> {
        let errors = [
            self.observability.validate(),
            self.server.validate(),
            self.screener.validate(),
        ]
        .into_iter()
        .filter_map(Result::err)
        .collect();

        collect_errors(errors)
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_level".into(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            });
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "observability.log_format".into(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }
}

impl Validate for ServerConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort {
                port: self.port,
                field: "server.port".into(),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "server.host".into(),
            });
        }
        Ok(())
    }
}

impl Validate for ScreenerSection {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if self.concurrency == Some(0) {
            errors.push(ValidationError::InvalidValue {
                field: "screener.concurrency".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.fetch_timeout_secs == Some(0) {
            errors.push(ValidationError::InvalidValue {
                field: "screener.fetch_timeout_secs".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        if matches!(self.history_sessions, Some(n) if n < 3) {
            errors.push(ValidationError::InvalidValue {
                field: "screener.history_sessions".into(),
                reason: "at least 3 sessions are needed to detect two rising closes".into(),
            });
        }
        if self.top_n == Some(0) {
            errors.push(ValidationError::InvalidValue {
                field: "screener.top_n".into(),
                reason: "must be at least 1".into(),
            });
        }
        if matches!(self.min_volume_lots, Some(v) if !v.is_finite() || v < 0.0) {
            errors.push(ValidationError::InvalidValue {
                field: "screener.min_volume_lots".into(),
                reason: "must be a non-negative number".into(),
            });
        }
        if self.requests_per_minute == Some(0) {
            errors.push(ValidationError::InvalidValue {
                field: "screener.requests_per_minute".into(),
                reason: "omit the field to disable throttling".into(),
            });
        }

        collect_errors(errors)
    }
}
