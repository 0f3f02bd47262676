//! Momentum screening predicate.
//!
//! A pure function over the most recent bars of one instrument:
//!
//! ```text
//! C2 < C1 < C0   (two consecutive rising closes)
//! V0 / 1000 > min_volume_lots
//! change% = (C0 - C1) / C1 * 100
//! ```
//!
//! Comparisons use full precision; rounding happens only on the emitted
//! result.

use serde::{Deserialize, Serialize};

use crate::data::{InstrumentId, PriceHistory};

/// Bars required to evaluate two consecutive sessions.
pub const MIN_BARS: usize = 3;

/// Thresholds applied by the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumCriteria {
    /// Latest session volume must exceed this many lots
    #[serde(default = "default_min_volume_lots")]
    pub min_volume_lots: f64,
}

impl Default for MomentumCriteria {
    fn default() -> Self {
        Self {
            min_volume_lots: default_min_volume_lots(),
        }
    }
}

fn default_min_volume_lots() -> f64 {
    1000.0
}

/// A matched instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenResult {
    pub id: InstrumentId,
    /// Latest close, rounded to 2 decimals
    pub last_close: f64,
    /// Latest session change in percent, rounded to 2 decimals
    pub change_pct: f64,
    /// Latest session volume in lots, truncated
    pub volume_lots: u64,
}

impl MomentumCriteria {
    /// Evaluate one history. `None` means no match, including when fewer
    /// than [`MIN_BARS`] bars are present.
    pub fn evaluate(&self, history: &PriceHistory) -> Option<ScreenResult> {
        if history.len() < MIN_BARS {
            return None;
        }

        let latest = history.recent(0)?;
        let c0 = latest.close;
        let c1 = history.recent(1)?.close;
        let c2 = history.recent(2)?.close;
        let lots = latest.volume_lots();

        // A non-positive prior close cannot be rising from c2 anyway, but
        // guards the division.
        if c1 <= 0.0 {
            return None;
        }

        if !(lots > self.min_volume_lots && c0 > c1 && c1 > c2) {
            return None;
        }

        Some(ScreenResult {
            id: history.id().clone(),
            last_close: round2(c0),
            change_pct: round2((c0 - c1) / c1 * 100.0),
            volume_lots: lots as u64,
        })
    }
}

/// Evaluate with the default criteria.
pub fn evaluate(history: &PriceHistory) -> Option<ScreenResult> {
    MomentumCriteria::default().evaluate(history)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceBar;
    use chrono::NaiveDate;

    fn history(closes: &[f64], last_volume: u64) -> PriceHistory {
        let n = closes.len();
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                date: NaiveDate::from_ymd_opt(2024, 3, 4 + i as u32).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: if i + 1 == n { last_volume } else { 1_000 },
            })
            .collect();
        PriceHistory::from_bars("2330.TW".into(), bars)
    }

    #[test]
    fn test_rising_closes_with_volume_match() {
        let result = evaluate(&history(&[100.0, 105.0, 110.0], 2_000_000)).unwrap();

        assert_eq!(result.id.as_str(), "2330.TW");
        assert_eq!(result.last_close, 110.0);
        assert_eq!(result.change_pct, 4.76);
        assert_eq!(result.volume_lots, 2000);
    }

    #[test]
    fn test_latest_close_down_is_no_match() {
        assert!(evaluate(&history(&[100.0, 105.0, 103.0], 2_000_000)).is_none());
    }

    #[test]
    fn test_first_session_flat_is_no_match() {
        assert!(evaluate(&history(&[105.0, 105.0, 110.0], 2_000_000)).is_none());
    }

    #[test]
    fn test_volume_floor_is_strict() {
        // exactly 1000 lots
        assert!(evaluate(&history(&[100.0, 105.0, 110.0], 1_000_000)).is_none());
        assert!(evaluate(&history(&[100.0, 105.0, 110.0], 1_000_001)).is_some());
    }

    #[test]
    fn test_short_history_is_no_match() {
        assert!(evaluate(&history(&[105.0, 110.0], 2_000_000)).is_none());
        assert!(evaluate(&history(&[], 0)).is_none());
    }

    #[test]
    fn test_only_last_three_bars_matter() {
        // Older decline is irrelevant
        let result = evaluate(&history(&[200.0, 150.0, 100.0, 105.0, 110.0], 2_000_000));
        assert!(result.is_some());
    }

    #[test]
    fn test_comparison_uses_full_precision() {
        // 10.001 rounds to 10.00 but is still above 10.0
        let result = evaluate(&history(&[9.99, 10.0, 10.001], 5_000_000)).unwrap();
        assert_eq!(result.last_close, 10.0);
        assert_eq!(result.change_pct, 0.01);
    }

    #[test]
    fn test_volume_lots_truncated() {
        let result = evaluate(&history(&[100.0, 105.0, 110.0], 1_234_999)).unwrap();
        assert_eq!(result.volume_lots, 1234);
    }

    #[test]
    fn test_custom_floor() {
        let criteria = MomentumCriteria { min_volume_lots: 0.0 };
        assert!(criteria.evaluate(&history(&[1.0, 2.0, 3.0], 1)).is_some());
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let h = history(&[100.0, 105.0, 110.0], 2_000_000);
        assert_eq!(evaluate(&h), evaluate(&h));
    }
}
