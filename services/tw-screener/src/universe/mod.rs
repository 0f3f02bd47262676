//! Instrument universe providers.
//!
//! The screener never decides which instruments exist; it asks an injected
//! `UniverseProvider`. Implementations:
//! - `IsinListingUniverse`: TWSE ISIN listing pages (main + alternate board)
//! - `StaticUniverse`: a fixed list
//! - `CachedUniverse`: time-bounded cache around another provider

mod cache;
mod isin;

pub use cache::CachedUniverse;
pub use isin::{parse_listing, IsinListingUniverse, ISIN_BASE_URL};

use async_trait::async_trait;
use thiserror::Error;

use crate::data::{Board, InstrumentId};

/// Failure to obtain the instrument list. Fatal for a scan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UniverseUnavailable {
    #[error("Network error fetching {board} listing: {message}")]
    Network { board: Board, message: String },

    #[error("HTTP {status} fetching {board} listing")]
    Http { board: Board, status: u16 },

    #[error("Could not parse {board} listing: {message}")]
    Parse { board: Board, message: String },

    #[error("Universe provider failed: {0}")]
    Other(String),
}

/// Supplier of the ordered instrument list.
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn list_instruments(&self) -> Result<Vec<InstrumentId>, UniverseUnavailable>;
}

/// Fixed instrument list.
#[derive(Debug, Clone, Default)]
pub struct StaticUniverse {
    ids: Vec<InstrumentId>,
}

impl StaticUniverse {
    pub fn new(ids: Vec<InstrumentId>) -> Self {
        Self { ids }
    }

    pub fn from_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(symbols.into_iter().map(|s| InstrumentId::new(s)).collect())
    }
}

#[async_trait]
impl UniverseProvider for StaticUniverse {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn list_instruments(&self) -> Result<Vec<InstrumentId>, UniverseUnavailable> {
        Ok(self.ids.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_universe_keeps_order() {
        let universe = StaticUniverse::from_symbols(["2330.TW", "1101.TW", "6488.TWO"]);
        let ids = universe.list_instruments().await.unwrap();
        let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["2330.TW", "1101.TW", "6488.TWO"]);
    }

    #[test]
    fn test_error_display() {
        let err = UniverseUnavailable::Http {
            board: Board::Alternate,
            status: 503,
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("上櫃"));
    }
}
