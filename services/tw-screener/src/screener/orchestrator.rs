//! Concurrent scan orchestrator.
//!
//! Fans fetch-and-evaluate work out to at most `concurrency` tasks at a
//! time. Every task returns its own outcome and the coordinating loop is
//! the only place results are merged, so workers share no mutable state.
//!
//! ```text
//! ids ──▶ [dispatch while in_flight < W] ──▶ JoinSet ──▶ merge ──▶ ScanOutcome
//!              ▲                                │
//!              └──────── one completes ─────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fetcher::HistoryFetcher;
use super::predicate::{MomentumCriteria, ScreenResult};
use crate::data::{DataUnavailable, InstrumentId};

/// Progress snapshot emitted after each completed work item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    pub completed: usize,
    pub total: usize,
    pub matched: usize,
}

impl ScanProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

/// Observer for scan progress. Must not block.
pub type ProgressCallback = Arc<dyn Fn(ScanProgress) + Send + Sync>;

/// Merged result of one orchestrator run, in completion order.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub matches: Vec<ScreenResult>,
    /// Instruments dropped because data was unavailable
    pub skipped: usize,
    /// Instruments with usable data that did not match
    pub non_matching: usize,
    /// Work items that finished
    pub processed: usize,
    /// Work items started
    pub dispatched: usize,
    /// Dispatch stopped early on request
    pub cancelled: bool,
    /// Skip counts by failure kind
    pub failures: BTreeMap<String, usize>,
}

impl ScanOutcome {
    fn record(&mut self, result: Result<Option<ScreenResult>, DataUnavailable>) {
        self.processed += 1;
        match result {
            Ok(Some(matched)) => self.matches.push(matched),
            Ok(None) => self.non_matching += 1,
            Err(e) => {
                self.skipped += 1;
                *self.failures.entry(e.kind().to_string()).or_default() += 1;
            }
        }
    }
}

/// Applies fetcher and predicate to a list of instruments under a bounded
/// worker pool.
pub struct ScanOrchestrator {
    fetcher: HistoryFetcher,
    criteria: MomentumCriteria,
    concurrency: usize,
}

impl ScanOrchestrator {
    /// A concurrency of 0 is treated as 1.
    pub fn new(fetcher: HistoryFetcher, criteria: MomentumCriteria, concurrency: usize) -> Self {
        Self {
            fetcher,
            criteria,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Scan every identifier and wait for all of them.
    pub async fn run(&self, ids: &[InstrumentId]) -> ScanOutcome {
        self.run_with(ids, None, &CancellationToken::new()).await
    }

    /// Scan with an optional progress observer and a cancellation token.
    ///
    /// Cancellation is checked before each dispatch. Work already in flight
    /// always runs to completion and its results are kept.
    pub async fn run_with(
        &self,
        ids: &[InstrumentId],
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> ScanOutcome {
        let total = ids.len();
        let mut outcome = ScanOutcome::default();
        let mut join_set: JoinSet<Result<Option<ScreenResult>, DataUnavailable>> = JoinSet::new();
        let mut pending = ids.iter();

        info!(
            total,
            concurrency = self.concurrency,
            provider = self.fetcher.provider_name(),
            "Starting scan"
        );

        loop {
            while join_set.len() < self.concurrency && !outcome.cancelled {
                if cancel.is_cancelled() {
                    warn!(
                        dispatched = outcome.dispatched,
                        total, "Scan cancelled, draining in-flight work"
                    );
                    outcome.cancelled = true;
                    break;
                }
                let Some(id) = pending.next() else {
                    break;
                };

                let fetcher = self.fetcher.clone();
                let criteria = self.criteria;
                let id = id.clone();
                join_set.spawn(async move {
                    let history = fetcher.fetch(&id).await.map_err(|e| {
                        debug!(symbol = %id, error = %e, "Skipping instrument");
                        e
                    })?;
                    Ok(criteria.evaluate(&history))
                });
                outcome.dispatched += 1;
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };

            match joined {
                Ok(result) => outcome.record(result),
                Err(e) => {
                    warn!(error = %e, "Scan task aborted");
                    outcome.processed += 1;
                    outcome.skipped += 1;
                    *outcome.failures.entry("aborted".to_string()).or_default() += 1;
                }
            }

            if let Some(callback) = &progress {
                callback(ScanProgress {
                    completed: outcome.processed,
                    total,
                    matched: outcome.matches.len(),
                });
            }
        }

        info!(
            processed = outcome.processed,
            matched = outcome.matches.len(),
            skipped = outcome.skipped,
            cancelled = outcome.cancelled,
            "Scan finished"
        );

        outcome
    }
}
