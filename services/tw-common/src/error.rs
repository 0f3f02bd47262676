//! Error types shared across the screener crates.

use thiserror::Error;

/// Error surfaced at the service boundary.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input or request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource busy (e.g. a scan is already running)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upstream data source failed
    #[error("External service error: {0}")]
    External(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Conflict(_) => 409,
            Self::External(_) => 502,
        }
    }
}
