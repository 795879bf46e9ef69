//! Drill-down helpers over a recomputation's rows.

use serde::{Deserialize, Serialize};

use crate::models::{ReviewRow, RowIssue, RowStatus};
use crate::services::classifier::matches_status;

/// Number of quality columns spelled out in the context label.
const LABEL_COLUMN_LIMIT: usize = 5;

/// Context label shown above the drill-down table.
///
/// `cols: a, b, c` (first five, then an ellipsis) and `focus_column: '<hint>'`
/// joined by `",  "`, or `filtered_by: none` when neither applies.
pub fn filtered_by_label(quality_columns: &[String], focus_hint: Option<&str>) -> String {
    let mut parts = Vec::new();
    if !quality_columns.is_empty() {
        let shown: Vec<&str> = quality_columns
            .iter()
            .take(LABEL_COLUMN_LIMIT)
            .map(String::as_str)
            .collect();
        let more = if quality_columns.len() > LABEL_COLUMN_LIMIT {
            "…"
        } else {
            ""
        };
        parts.push(format!("cols: {}{}", shown.join(", "), more));
    }
    if let Some(hint) = focus_hint.map(str::trim).filter(|h| !h.is_empty()) {
        parts.push(format!("focus_column: '{}'", hint));
    }
    if parts.is_empty() {
        "filtered_by: none".to_string()
    } else {
        parts.join(",  ")
    }
}

/// Rows matching `status` (all when `None`), newest day first.
///
/// Undated rows keep their table order after the dated ones.
pub fn select_rows(rows: &[ReviewRow], status: Option<RowStatus>) -> Vec<&ReviewRow> {
    let mut selected: Vec<&ReviewRow> = rows
        .iter()
        .filter(|r| matches_status(&r.classification, status))
        .collect();
    // Stable sort keeps table order within a day.
    selected.sort_by(|a, b| b.date.cmp(&a.date));
    selected
}

/// Summary shown next to the drill-down table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetailMetrics {
    pub shown_rows: usize,
    pub missing_rows: usize,
    /// Missing-issue rows as a share of shown rows, in percent.
    pub missing_pct: f64,
    pub duplicate_rows: usize,
}

pub fn detail_metrics(rows: &[&ReviewRow]) -> DetailMetrics {
    let missing_rows = rows.iter().filter(|r| r.issue() == RowIssue::Missing).count();
    let duplicate_rows = rows
        .iter()
        .filter(|r| r.issue() == RowIssue::Duplicate)
        .count();
    DetailMetrics {
        shown_rows: rows.len(),
        missing_rows,
        missing_pct: 100.0 * missing_rows as f64 / rows.len().max(1) as f64,
        duplicate_rows,
    }
}
