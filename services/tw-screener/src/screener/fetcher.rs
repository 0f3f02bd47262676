//! Per-instrument history fetcher.
//!
//! Wraps a [`HistoryProvider`] with an optional shared throttle, a fetch
//! timeout and the minimum history check. One call per instrument, no
//! retry.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::predicate::MIN_BARS;
use crate::data::{
    DataUnavailable, HistoryProvider, InstrumentId, PriceHistory, SharedRateLimiter,
};

/// Fetches recent daily history for one instrument at a time.
#[derive(Clone)]
pub struct HistoryFetcher {
    provider: Arc<dyn HistoryProvider>,
    sessions: usize,
    timeout: Duration,
    limiter: Option<SharedRateLimiter>,
}

impl HistoryFetcher {
    pub fn new(provider: Arc<dyn HistoryProvider>, sessions: usize, timeout: Duration) -> Self {
        Self {
            provider,
            sessions,
            timeout,
            limiter: None,
        }
    }

    /// Throttle requests through a limiter shared by all workers.
    pub fn with_rate_limiter(mut self, limiter: Option<SharedRateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Fetch the most recent sessions for `id`.
    ///
    /// Fails with `Timeout` if the provider does not answer in time and with
    /// `InsufficientHistory` if fewer than three bars come back. Waiting for
    /// a throttle token does not count against the timeout.
    pub async fn fetch(&self, id: &InstrumentId) -> Result<PriceHistory, DataUnavailable> {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let bars = tokio::time::timeout(self.timeout, self.provider.fetch_daily(id, self.sessions))
            .await
            .map_err(|_| DataUnavailable::Timeout(self.timeout))??;

        let mut history = PriceHistory::from_bars(id.clone(), bars);
        history.truncate_to_recent(self.sessions);

        if history.len() < MIN_BARS {
            return Err(DataUnavailable::InsufficientHistory {
                bars: history.len(),
            });
        }

        debug!(symbol = %id, bars = history.len(), "Fetched history");
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{shared_limiter, PriceBar};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct FixedProvider {
        bars: usize,
        delay: Duration,
    }

    #[async_trait]
    impl HistoryProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_daily(
            &self,
            _id: &InstrumentId,
            _sessions: usize,
        ) -> Result<Vec<PriceBar>, DataUnavailable> {
            tokio::time::sleep(self.delay).await;
            Ok((0..self.bars)
                .map(|i| PriceBar {
                    date: NaiveDate::from_ymd_opt(2024, 3, 1 + i as u32).unwrap(),
                    open: 10.0,
                    high: 10.0,
                    low: 10.0,
                    close: 10.0 + i as f64,
                    volume: 1_000,
                })
                .collect())
        }
    }

    fn fetcher(bars: usize, delay: Duration, timeout: Duration) -> HistoryFetcher {
        HistoryFetcher::new(Arc::new(FixedProvider { bars, delay }), 5, timeout)
    }

    #[tokio::test]
    async fn test_fetch_keeps_recent_sessions() {
        let history = fetcher(8, Duration::ZERO, Duration::from_secs(1))
            .fetch(&"2330.TW".into())
            .await
            .unwrap();

        assert_eq!(history.len(), 5);
        assert_eq!(history.recent(0).map(|b| b.close), Some(17.0));
    }

    #[tokio::test]
    async fn test_short_history_is_unavailable() {
        let err = fetcher(2, Duration::ZERO, Duration::from_secs(1))
            .fetch(&"2330.TW".into())
            .await
            .unwrap_err();
        assert_eq!(err, DataUnavailable::InsufficientHistory { bars: 2 });
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let err = fetcher(5, Duration::from_secs(5), Duration::from_millis(20))
            .fetch(&"2330.TW".into())
            .await
            .unwrap_err();
        assert_eq!(err, DataUnavailable::Timeout(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_throttle_wait_not_counted_against_timeout() {
        // One token per second, far longer than the fetch timeout
        let fetcher = fetcher(5, Duration::ZERO, Duration::from_millis(200))
            .with_rate_limiter(Some(shared_limiter("test", 60)));

        let start = std::time::Instant::now();
        assert!(fetcher.fetch(&"2330.TW".into()).await.is_ok());
        assert!(fetcher.fetch(&"2317.TW".into()).await.is_ok());
        assert!(start.elapsed() >= Duration::from_millis(500));
    }
}
