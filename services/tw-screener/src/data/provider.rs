//! History provider abstraction.
//!
//! Defines the `HistoryProvider` trait that daily-data sources implement
//! and the per-instrument `DataUnavailable` failure.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use super::{InstrumentId, PriceBar};

// ============================================================================
// Per-instrument failure
// ============================================================================

/// Why history for one instrument could not be used.
///
/// Always recovered locally: the instrument is dropped from the scan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataUnavailable {
    /// Connection failed or the transport reported an error
    #[error("Network error: {0}")]
    Network(String),

    /// No answer within the fetch timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream answered with a non-success status
    #[error("HTTP {0}")]
    Http(u16),

    /// Response body could not be interpreted
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Fewer bars than the predicate needs
    #[error("Insufficient history: {bars} bars")]
    InsufficientHistory { bars: usize },
}

impl DataUnavailable {
    /// Short label used to aggregate failures in scan reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::Http(_) => "http",
            Self::Malformed(_) => "malformed",
            Self::InsufficientHistory { .. } => "insufficient_history",
        }
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Source of recent daily bars.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Provider name (e.g., "yahoo")
    fn name(&self) -> &'static str;

    /// Fetch up to `sessions` most recent daily bars, oldest first.
    ///
    /// One network call per invocation, no retry.
    async fn fetch_daily(
        &self,
        id: &InstrumentId,
        sessions: usize,
    ) -> Result<Vec<PriceBar>, DataUnavailable>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels() {
        assert_eq!(DataUnavailable::Network("x".into()).kind(), "network");
        assert_eq!(DataUnavailable::Http(404).kind(), "http");
        assert_eq!(
            DataUnavailable::InsufficientHistory { bars: 2 }.kind(),
            "insufficient_history"
        );
    }

    #[test]
    fn test_display() {
        let err = DataUnavailable::InsufficientHistory { bars: 2 };
        assert_eq!(err.to_string(), "Insufficient history: 2 bars");

        let err = DataUnavailable::Timeout(Duration::from_secs(3));
        assert!(err.to_string().contains("3s"));
    }
}
