//! Report generation for scan results.
//!
//! Formats:
//! - Text (terminal table)
//! - Markdown (for documentation)
//! - JSON (for API/programmatic use)

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use super::engine::ScanReport;

/// Shown when a scan completes with zero matches.
pub const EMPTY_RESULT_MESSAGE: &str = "目前範圍內無符合條件股票（可能今日尚未開盤或量能不足）";

// ============================================================================
// Report Format
// ============================================================================

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Fixed-width table
    #[default]
    Text,
    /// Markdown table
    Markdown,
    /// Full report as JSON
    Json,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "table" => Ok(Self::Text),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

// ============================================================================
// Screener Report
// ============================================================================

/// Renders a [`ScanReport`].
pub struct ScreenerReport<'a> {
    report: &'a ScanReport,
}

impl<'a> ScreenerReport<'a> {
    pub fn new(report: &'a ScanReport) -> Self {
        Self { report }
    }

    /// Generate report in the specified format.
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => self.to_text(),
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::Json => self.to_json(),
        }
    }

    /// Completion line, or the empty-result warning.
    pub fn headline(&self) -> String {
        if self.report.ranked.is_empty() {
            EMPTY_RESULT_MESSAGE.to_string()
        } else {
            format!("掃描完成！符合條件共 {} 檔", self.report.matched)
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.headline());
        if self.report.ranked.is_empty() {
            return out;
        }

        let _ = writeln!(
            out,
            "{:<4} {:<10} {:>10} {:>8} {:>10}",
            "#", "代號", "收盤價", "漲幅(%)", "成交量(張)"
        );
        for (i, r) in self.report.ranked.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:<4} {:<10} {:>10.2} {:>8.2} {:>10}",
                i + 1,
                r.id,
                r.last_close,
                r.change_pct,
                r.volume_lots
            );
        }
        let _ = writeln!(
            out,
            "\n掃描 {} 檔，略過 {} 檔，耗時 {:.1} 秒{}",
            self.report.scanned,
            self.report.skipped,
            self.report.duration_secs,
            if self.report.cancelled { "（已中止）" } else { "" }
        );
        out
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "# 動能選股報告\n\n**掃描ID**: {}\n**時間**: {}\n**耗時**: {:.1}秒\n\n",
            self.report.id,
            self.report.completed_at.format("%Y-%m-%d %H:%M:%S"),
            self.report.duration_secs
        ));

        md.push_str("## 摘要\n\n");
        md.push_str(&format!("- **掃描**: {} 檔\n", self.report.scanned));
        md.push_str(&format!("- **符合**: {} 檔\n", self.report.matched));
        md.push_str(&format!("- **略過**: {} 檔\n", self.report.skipped));
        md.push_str(&format!("- **條件**: {}\n\n", self.report.criteria_summary));

        if self.report.ranked.is_empty() {
            md.push_str(&format!("> {}\n", EMPTY_RESULT_MESSAGE));
            return md;
        }

        md.push_str("## 排行\n\n");
        md.push_str("| # | 代號 | 收盤價 | 漲幅(%) | 成交量(張) |\n");
        md.push_str("|---|------|--------|---------|------------|\n");
        for (i, r) in self.report.ranked.iter().enumerate() {
            md.push_str(&format!(
                "| {} | {} | {:.2} | {:.2} | {} |\n",
                i + 1,
                r.id,
                r.last_close,
                r.change_pct,
                r.volume_lots
            ));
        }

        md
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self.report).unwrap_or_else(|_| "{}".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
