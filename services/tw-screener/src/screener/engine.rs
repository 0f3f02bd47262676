//! Screener engine module.
//!
//! Composes universe, orchestrator and ranker into one scan invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tw_common::validation::{Validate, ValidationError};

use super::config::ScreenerConfig;
use super::fetcher::HistoryFetcher;
use super::orchestrator::{ProgressCallback, ScanOrchestrator};
use super::ranker::{rank, RankedList, DEFAULT_TOP_N};
use crate::data::{
    shared_limiter, HistoryProvider, InstrumentId, SharedRateLimiter, YahooChartAdapter,
};
use crate::universe::{CachedUniverse, IsinListingUniverse, UniverseProvider, UniverseUnavailable};

// ============================================================================
// Errors
// ============================================================================

/// Batch-level scan failure. Zero matches is not an error.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Universe(#[from] UniverseUnavailable),

    #[error("No instruments to scan")]
    NoInstruments,

    #[error("Invalid scan configuration: {0}")]
    InvalidConfig(#[from] ValidationError),
}

impl From<ScanError> for tw_common::Error {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::Universe(e) => tw_common::Error::External(e.to_string()),
            ScanError::NoInstruments => {
                tw_common::Error::InvalidInput("No instruments to scan".into())
            }
            ScanError::InvalidConfig(e) => tw_common::Error::InvalidInput(e.to_string()),
        }
    }
}

// ============================================================================
// Request / Report
// ============================================================================

/// Per-invocation overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Scan these instead of the universe
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
    /// Scan only the first N universe instruments
    #[serde(default)]
    pub limit: Option<usize>,
    /// Worker pool size for this scan
    #[serde(default)]
    pub concurrency: Option<usize>,
}

/// Result of one scan invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Scan ID (timestamp-based)
    pub id: String,
    /// Top matches by change%
    pub ranked: RankedList,
    /// Matches before truncation
    pub matched: usize,
    /// Instruments processed
    pub scanned: usize,
    /// Instruments dropped for unavailable data
    pub skipped: usize,
    pub non_matching: usize,
    pub cancelled: bool,
    /// Skip counts by failure kind
    pub failures: BTreeMap<String, usize>,
    pub criteria_summary: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl ScanReport {
    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Scanned {} instruments in {:.1}s: {} matched, {} skipped{}",
            self.scanned,
            self.duration_secs,
            self.matched,
            self.skipped,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}

// ============================================================================
// Engine
// ============================================================================

/// The screener engine.
pub struct ScreenerEngine {
    config: ScreenerConfig,
    provider: Arc<dyn HistoryProvider>,
    universe: Arc<dyn UniverseProvider>,
    /// Outlives single scans so back-to-back scans share one budget
    limiter: Option<SharedRateLimiter>,
}

impl ScreenerEngine {
    pub fn new(
        config: ScreenerConfig,
        provider: Arc<dyn HistoryProvider>,
        universe: Arc<dyn UniverseProvider>,
    ) -> Self {
        let limiter = config.requests_per_minute.map(|rpm| {
            let limiter = shared_limiter(provider.name(), rpm);
            info!(
                provider = provider.name(),
                requests_per_minute = rpm,
                burst = limiter.capacity(),
                "History requests throttled"
            );
            limiter
        });

        Self {
            config,
            provider,
            universe,
            limiter,
        }
    }

    /// Wire the default network collaborators: Yahoo history and the cached
    /// ISIN listing universe.
    pub fn from_config(config: ScreenerConfig) -> Self {
        let adapter = match &config.history_base_url {
            Some(url) => YahooChartAdapter::with_base_url(url.clone()),
            None => YahooChartAdapter::new(),
        };

        let listing = match &config.listing_base_url {
            Some(url) => IsinListingUniverse::with_base_url(url.clone()),
            None => IsinListingUniverse::new(),
        };
        let universe = CachedUniverse::new(listing, config.universe_ttl());

        Self::new(config, Arc::new(adapter), Arc::new(universe))
    }

    pub fn config(&self) -> &ScreenerConfig {
        &self.config
    }

    /// The instrument universe, main board first.
    pub async fn list_universe(&self) -> Result<Vec<InstrumentId>, UniverseUnavailable> {
        self.universe.list_instruments().await
    }

    /// Scan the universe with configured settings.
    pub async fn run_scan(&self) -> Result<ScanReport, ScanError> {
        self.execute(&ScanRequest::default(), None, &CancellationToken::new())
            .await
    }

    /// Scan the universe, optionally restricted to its first `limit` entries.
    pub async fn run_universe_scan(&self, limit: Option<usize>) -> Result<ScanReport, ScanError> {
        let request = ScanRequest {
            limit,
            ..Default::default()
        };
        self.execute(&request, None, &CancellationToken::new()).await
    }

    /// Run one scan invocation.
    pub async fn execute(
        &self,
        request: &ScanRequest,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let mut config = self.config.clone();
        if let Some(w) = request.concurrency {
            config.concurrency = w;
        }
        config.validate()?;

        let started_at = Utc::now();
        let id = format!("scan_{}", started_at.format("%Y%m%d_%H%M%S"));

        let ids = self.resolve_ids(request, &config).await?;
        if ids.is_empty() {
            return Err(ScanError::NoInstruments);
        }

        info!(scan_id = %id, instruments = ids.len(), "Starting momentum scan");

        let fetcher = HistoryFetcher::new(
            Arc::clone(&self.provider),
            config.history_sessions,
            config.fetch_timeout(),
        )
        .with_rate_limiter(self.limiter.clone());
        let orchestrator = ScanOrchestrator::new(fetcher, config.criteria, config.concurrency);
        let outcome = orchestrator.run_with(&ids, progress, cancel).await;

        let matched = outcome.matches.len();
        let ranked = rank(outcome.matches, config.top_n);

        let completed_at = Utc::now();
        let duration_secs = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let report = ScanReport {
            id,
            ranked,
            matched,
            scanned: outcome.processed,
            skipped: outcome.skipped,
            non_matching: outcome.non_matching,
            cancelled: outcome.cancelled,
            failures: outcome.failures,
            criteria_summary: config.summary(),
            started_at,
            completed_at,
            duration_secs,
        };

        if report.skipped > 0 {
            warn!(skipped = report.skipped, failures = ?report.failures, "Some instruments had no usable data");
        }
        info!(scan_id = %report.id, "{}", report.summary());

        Ok(report)
    }

    async fn resolve_ids(
        &self,
        request: &ScanRequest,
        config: &ScreenerConfig,
    ) -> Result<Vec<InstrumentId>, ScanError> {
        if let Some(symbols) = &request.symbols {
            return Ok(symbols.iter().map(|s| InstrumentId::new(s.trim())).collect());
        }

        let mut ids = self.universe.list_instruments().await?;
        if let Some(limit) = request.limit.or(config.scan_limit) {
            ids.truncate(limit);
        }
        Ok(ids)
    }
}

/// Scan `ids` with default criteria and return the top 20.
///
/// Per-instrument failures are dropped silently. An empty `ids` slice is
/// `ScanError::NoInstruments`, never an empty list.
pub async fn run_scan(
    provider: Arc<dyn HistoryProvider>,
    ids: &[InstrumentId],
    concurrency: usize,
    progress: Option<ProgressCallback>,
) -> Result<RankedList, ScanError> {
    if ids.is_empty() {
        return Err(ScanError::NoInstruments);
    }

    let config = ScreenerConfig::default();
    let fetcher = HistoryFetcher::new(provider, config.history_sessions, config.fetch_timeout());
    let outcome = ScanOrchestrator::new(fetcher, config.criteria, concurrency)
        .run_with(ids, progress, &CancellationToken::new())
        .await;
    Ok(rank(outcome.matches, DEFAULT_TOP_N))
}
