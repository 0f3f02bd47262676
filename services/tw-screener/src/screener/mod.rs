//! Momentum screener module.
//!
//! Scans a universe of TWSE/TPEx instruments for two consecutive rising
//! closes on heavy volume and ranks the matches by latest change%.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ids   ┌───────────────────────────────┐  matches  ┌────────┐
//! │   Universe   │────────▶│       ScanOrchestrator        │──────────▶│ Ranker │
//! │  (cached)    │         │  W × (HistoryFetcher → pred)  │           │ top 20 │
//! └──────────────┘         └───────────────────────────────┘           └────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use tw_screener::screener::{ScreenerEngine, ScreenerConfig};
//!
//! let engine = ScreenerEngine::from_config(ScreenerConfig::default());
//! let report = engine.run_scan().await?;
//! ```

pub mod config;
pub mod engine;
pub mod fetcher;
pub mod orchestrator;
pub mod predicate;
pub mod ranker;
pub mod report;

pub use config::ScreenerConfig;
pub use engine::{run_scan, ScanError, ScanReport, ScanRequest, ScreenerEngine};
pub use fetcher::HistoryFetcher;
pub use orchestrator::{ProgressCallback, ScanOrchestrator, ScanOutcome, ScanProgress};
pub use predicate::{evaluate, MomentumCriteria, ScreenResult, MIN_BARS};
pub use ranker::{rank, RankedList, DEFAULT_TOP_N};
pub use report::{ReportFormat, ScreenerReport, EMPTY_RESULT_MESSAGE};
