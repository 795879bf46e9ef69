//! Classification, aggregation and filter types shared by the services.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::table::Cell;

/// Outcome of classifying one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Valid,
    Warning,
    Error,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Valid => "valid",
            RowStatus::Warning => "warning",
            RowStatus::Error => "error",
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "valid" => Ok(Self::Valid),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            other => Err(format!("Unknown row status: {}", other)),
        }
    }
}

/// Reason attached to a row's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowIssue {
    Ok,
    Missing,
    Duplicate,
}

impl RowIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowIssue::Ok => "ok",
            RowIssue::Missing => "missing",
            RowIssue::Duplicate => "duplicate",
        }
    }

    pub fn status(&self) -> RowStatus {
        match self {
            RowIssue::Ok => RowStatus::Valid,
            RowIssue::Missing => RowStatus::Warning,
            RowIssue::Duplicate => RowStatus::Error,
        }
    }
}

/// Per-row classification result, referring back to the source row by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    pub row_index: usize,
    pub status: RowStatus,
    pub issue: RowIssue,
    /// First null quality column in declared column order, recorded for
    /// duplicate rows too.
    pub first_missing_column: Option<String>,
}

/// How rows are compared when looking for duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "column", rename_all = "snake_case")]
pub enum DuplicateMode {
    AllColumns,
    ByKeyColumn(String),
}

impl fmt::Display for DuplicateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateMode::AllColumns => f.write_str("all columns"),
            DuplicateMode::ByKeyColumn(col) => write!(f, "key column '{}'", col),
        }
    }
}

/// Acceptance threshold preset for date detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStrictness {
    #[default]
    Lenient,
    Strict,
}

impl DetectionStrictness {
    /// Minimum fraction of cells that must parse as dates.
    pub fn threshold(&self) -> f64 {
        match self {
            DetectionStrictness::Lenient => 0.6,
            DetectionStrictness::Strict => 0.8,
        }
    }
}

impl std::str::FromStr for DetectionStrictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("Unknown detection mode: {}", other)),
        }
    }
}

/// Inclusive span of whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Smallest span covering every date, `None` for no dates.
    pub fn covering<I: IntoIterator<Item = NaiveDate>>(dates: I) -> Option<Self> {
        dates.into_iter().fold(None, |acc, d| match acc {
            None => Some(Self::new(d, d)),
            Some(span) => Some(Self::new(span.start.min(d), span.end.max(d))),
        })
    }
}

impl fmt::Display for DateSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// User-selected date range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeRangeFilter {
    #[default]
    All,
    /// The `days` most recent days, ending on the latest observed date.
    LastDays { days: u32 },
    /// Unset bounds default to the data's own bounds.
    Custom {
        #[serde(default)]
        start: Option<NaiveDate>,
        #[serde(default)]
        end: Option<NaiveDate>,
    },
}

/// Status tallies for a set of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub valid: usize,
    pub warning: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: RowStatus) {
        match status {
            RowStatus::Valid => self.valid += 1,
            RowStatus::Warning => self.warning += 1,
            RowStatus::Error => self.error += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.valid + self.warning + self.error
    }

    /// Share of valid rows in percent; 0 when there are no rows.
    pub fn dq_score(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            100.0 * self.valid as f64 / total as f64
        }
    }
}

impl std::ops::AddAssign for StatusCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.valid += rhs.valid;
        self.warning += rhs.warning;
        self.error += rhs.error;
    }
}

/// One day of the time series. Days with no rows are never emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub valid: usize,
    pub warning: usize,
    pub error: usize,
    pub total: usize,
    pub dq_score: f64,
    pub error_anomaly: bool,
}

impl DailyBucket {
    pub fn from_counts(date: NaiveDate, counts: StatusCounts) -> Self {
        Self {
            date,
            valid: counts.valid,
            warning: counts.warning,
            error: counts.error,
            total: counts.total(),
            dq_score: counts.dq_score(),
            error_anomaly: false,
        }
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts {
            valid: self.valid,
            warning: self.warning,
            error: self.error,
        }
    }
}

/// Headline numbers for the KPI cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiTotals {
    pub valid: usize,
    pub warning: usize,
    pub error: usize,
    pub total: usize,
    pub dq_score: f64,
}

impl From<StatusCounts> for KpiTotals {
    fn from(counts: StatusCounts) -> Self {
        Self {
            valid: counts.valid,
            warning: counts.warning,
            error: counts.error,
            total: counts.total(),
            dq_score: counts.dq_score(),
        }
    }
}

/// A classified row as shown in the drill-down table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRow {
    /// 1-based position of the row in the uploaded table.
    pub record_id: usize,
    #[serde(flatten)]
    pub classification: ClassifiedRow,
    /// Normalized day; the snapshot day when no date column is active.
    pub date: Option<NaiveDate>,
    /// Cell values in the recomputation's `column_order`.
    pub values: Vec<Cell>,
}

impl ReviewRow {
    pub fn status(&self) -> RowStatus {
        self.classification.status
    }

    pub fn issue(&self) -> RowIssue {
        self.classification.issue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_status_counts_score() {
        let mut counts = StatusCounts::default();
        assert_eq!(counts.dq_score(), 0.0);
        counts.record(RowStatus::Valid);
        counts.record(RowStatus::Valid);
        counts.record(RowStatus::Error);
        counts.record(RowStatus::Warning);
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.dq_score(), 50.0);
    }

    #[test]
    fn test_date_span_covering_and_days() {
        let span = DateSpan::covering([day(2024, 1, 3), day(2024, 1, 1), day(2024, 1, 2)]).unwrap();
        assert_eq!(span, DateSpan::new(day(2024, 1, 1), day(2024, 1, 3)));
        assert_eq!(span.days(), 3);
        assert!(span.contains(day(2024, 1, 3)));
        assert!(!span.contains(day(2024, 1, 4)));
        assert!(DateSpan::covering(Vec::new()).is_none());
    }

    #[test]
    fn test_duplicate_mode_wire_format() {
        let mode: DuplicateMode =
            serde_json::from_value(json!({"mode": "by_key_column", "column": "ID"})).unwrap();
        assert_eq!(mode, DuplicateMode::ByKeyColumn("ID".into()));
        let all: DuplicateMode = serde_json::from_value(json!({"mode": "all_columns"})).unwrap();
        assert_eq!(all, DuplicateMode::AllColumns);
    }

    #[test]
    fn test_time_range_filter_wire_format() {
        let last: TimeRangeFilter =
            serde_json::from_value(json!({"kind": "last_days", "days": 7})).unwrap();
        assert_eq!(last, TimeRangeFilter::LastDays { days: 7 });
        let custom: TimeRangeFilter =
            serde_json::from_value(json!({"kind": "custom", "start": "2024-01-02"})).unwrap();
        assert_eq!(
            custom,
            TimeRangeFilter::Custom {
                start: Some(day(2024, 1, 2)),
                end: None
            }
        );
    }

    #[test]
    fn test_strictness_thresholds() {
        assert_eq!(DetectionStrictness::Lenient.threshold(), 0.6);
        assert_eq!(DetectionStrictness::Strict.threshold(), 0.8);
        assert_eq!("STRICT".parse::<DetectionStrictness>(), Ok(DetectionStrictness::Strict));
    }

    #[test]
    fn test_issue_implies_status() {
        assert_eq!(RowIssue::Duplicate.status(), RowStatus::Error);
        assert_eq!(RowIssue::Missing.status(), RowStatus::Warning);
        assert_eq!(RowIssue::Ok.status(), RowStatus::Valid);
    }
}
