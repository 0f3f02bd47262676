//! TW Common - Shared configuration, errors and logging for the momentum screener.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - The service boundary error type
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{Config, ObservabilityConfig, ScreenerSection, ServerConfig};
pub use error::Error;
pub use validation::{Validate, ValidationError, ValidationResult};

