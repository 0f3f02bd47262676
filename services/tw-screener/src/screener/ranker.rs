//! Ranking of matched instruments.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::predicate::ScreenResult;

/// Default length of the ranked list.
pub const DEFAULT_TOP_N: usize = 20;

/// Matches ordered by change% descending, at most `top_n` long.
///
/// Equal change% is ordered by identifier ascending so the output does not
/// depend on fetch completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedList(Vec<ScreenResult>);

impl RankedList {
    pub fn as_slice(&self) -> &[ScreenResult] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScreenResult> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<ScreenResult> {
        self.0
    }
}

impl<'a> IntoIterator for &'a RankedList {
    type Item = &'a ScreenResult;
    type IntoIter = std::slice::Iter<'a, ScreenResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn by_change_desc(a: &ScreenResult, b: &ScreenResult) -> Ordering {
    b.change_pct
        .total_cmp(&a.change_pct)
        .then_with(|| a.id.cmp(&b.id))
}

/// Sort and truncate matches. An empty input yields an empty list.
pub fn rank(mut matches: Vec<ScreenResult>, top_n: usize) -> RankedList {
    matches.sort_by(by_change_desc);
    matches.truncate(top_n);
    RankedList(matches)
}
