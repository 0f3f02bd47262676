//! Yahoo chart adapter for daily TWSE/TPEx bars.
//!
//! Uses the public chart endpoint, which accepts the exchange-suffixed
//! identifiers (`2330.TW`, `6488.TWO`) directly.
//!
//! # Response shape
//! ```text
//! {"chart": {"result": [{"meta": {"gmtoffset": 28800},
//!                        "timestamp": [...],
//!                        "indicators": {"quote": [{"open": [...], "close": [...], "volume": [...]}]}}],
//!            "error": null}}
//! ```

use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::provider::{DataUnavailable, HistoryProvider};
use super::{InstrumentId, PriceBar};

/// Default chart API host
pub const YAHOO_CHART_BASE_URL: &str = "https://query1.finance.yahoo.com";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default, rename = "gmtoffset")]
    gmt_offset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Chart `range` parameter covering at least `sessions` trading days.
fn range_for_sessions(sessions: usize) -> &'static str {
    match sessions {
        0..=5 => "5d",
        6..=20 => "1mo",
        21..=60 => "3mo",
        _ => "1y",
    }
}

/// Convert a chart response into daily bars, oldest first.
///
/// Rows with a missing close or volume (halted sessions, the live
/// session before the first print) are skipped.
fn parse_chart(body: ChartResponse) -> Result<Vec<PriceBar>, DataUnavailable> {
    if let Some(err) = body.chart.error {
        return Err(DataUnavailable::Malformed(format!(
            "{}: {}",
            err.code, err.description
        )));
    }

    let result = body
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| DataUnavailable::Malformed("empty chart result".into()))?;

    let offset = result.meta.as_ref().map(|m| m.gmt_offset).unwrap_or(0);
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let at = |series: &[Option<f64>], i: usize| series.get(i).copied().flatten();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let (Some(close), Some(volume)) = (at(&quote.close, i), at(&quote.volume, i)) else {
            continue;
        };
        let date = DateTime::from_timestamp(ts + offset, 0)
            .ok_or_else(|| DataUnavailable::Malformed(format!("bad timestamp {}", ts)))?
            .date_naive();

        bars.push(PriceBar {
            date,
            open: at(&quote.open, i).unwrap_or(close),
            high: at(&quote.high, i).unwrap_or(close),
            low: at(&quote.low, i).unwrap_or(close),
            close,
            volume: volume.max(0.0) as u64,
        });
    }

    Ok(bars)
}

// ============================================================================
// Adapter
// ============================================================================

/// Daily history from the Yahoo chart API.
pub struct YahooChartAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl YahooChartAdapter {
    pub fn new() -> Self {
        Self::with_base_url(YAHOO_CHART_BASE_URL)
    }

    /// Point the adapter at another host (mirrors, tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Default for YahooChartAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryProvider for YahooChartAdapter {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_daily(
        &self,
        id: &InstrumentId,
        sessions: usize,
    ) -> Result<Vec<PriceBar>, DataUnavailable> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, id);
        debug!(url = %url, symbol = %id, "Fetching daily chart");

        let response = self
            .client
            .get(&url)
            .query(&[("range", range_for_sessions(sessions)), ("interval", "1d")])
            .send()
            .await
            .map_err(|e| DataUnavailable::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DataUnavailable::Http(status.as_u16()));
        }

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| DataUnavailable::Malformed(e.to_string()))?;

        let mut bars = parse_chart(body)?;
        if bars.len() > sessions {
            bars.drain(..bars.len() - sessions);
        }
        Ok(bars)
    }
}

// ============================================================================
// Tests
// ============================================================================
