//! Market data module for TWSE/TPEx equities.
//!
//! Provides the instrument and daily bar types plus the history provider
//! abstraction used by the screener.
//!
//! # Data Sources
//! - **Yahoo chart API** (default): recent daily OHLCV, no key required

mod provider;
mod rate_limiter;
mod yahoo;

pub use provider::{DataUnavailable, HistoryProvider};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};
pub use yahoo::YahooChartAdapter;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of shares in one trading lot (張).
pub const SHARES_PER_LOT: f64 = 1000.0;

// ============================================================================
// Board
// ============================================================================

/// Listing venue of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Board {
    /// Main board (上市), suffix `.TW`
    Main,
    /// Alternate / over-the-counter board (上櫃), suffix `.TWO`
    Alternate,
}

impl Board {
    /// All boards in universe order.
    pub const ALL: [Board; 2] = [Board::Main, Board::Alternate];

    /// Identifier suffix for this board.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Main => ".TW",
            Self::Alternate => ".TWO",
        }
    }

    /// Parse from a user-facing string (e.g. "main", "tw", "otc", "two").
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "main" | "tw" | "twse" | "listed" => Some(Self::Main),
            "alternate" | "alt" | "two" | "otc" | "tpex" => Some(Self::Alternate),
            _ => None,
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "上市"),
            Self::Alternate => write!(f, "上櫃"),
        }
    }
}

// ============================================================================
// Instrument Identifier
// ============================================================================

/// Exchange-suffixed instrument identifier (e.g. "2330.TW", "6488.TWO").
///
/// Not validated on construction; malformed identifiers fail at fetch time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an identifier from a bare code and its board.
    pub fn for_board(code: &str, board: Board) -> Self {
        Self(format!("{}{}", code, board.suffix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Code without the board suffix.
    pub fn code(&self) -> &str {
        self.0.split('.').next().unwrap_or(&self.0)
    }

    /// Board inferred from the suffix, if recognised.
    pub fn board(&self) -> Option<Board> {
        let (_, suffix) = self.0.rsplit_once('.')?;
        match suffix.to_uppercase().as_str() {
            "TW" => Some(Board::Main),
            "TWO" => Some(Board::Alternate),
            _ => None,
        }
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for InstrumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// Price Bars
// ============================================================================

/// One daily trading session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    /// Session date (exchange local)
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Traded volume in shares
    pub volume: u64,
}

impl PriceBar {
    /// Volume expressed in lots, full precision.
    pub fn volume_lots(&self) -> f64 {
        self.volume as f64 / SHARES_PER_LOT
    }
}

/// Daily history of one instrument, oldest bar first.
///
/// Dates are strictly increasing; construction sorts the bars and keeps
/// the last bar seen for a duplicated date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    id: InstrumentId,
    bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn from_bars(id: InstrumentId, mut bars: Vec<PriceBar>) -> Self {
        // Stable sort keeps arrival order within a date, so the later
        // duplicate survives the dedup below.
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }

        Self { id, bars: deduped }
    }

    pub fn id(&self) -> &InstrumentId {
        &self.id
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The `n`-th most recent bar (0 = latest).
    pub fn recent(&self, n: usize) -> Option<&PriceBar> {
        self.bars.len().checked_sub(n + 1).map(|i| &self.bars[i])
    }

    /// Keep only the most recent `n` bars.
    pub fn truncate_to_recent(&mut self, n: usize) {
        if self.bars.len() > n {
            self.bars.drain(..self.bars.len() - n);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
