//! Request and response bodies for the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::AppError;
use crate::db::FeedbackId;
use crate::models::{RowStatus, Table};
use crate::parsing::parse_csv;
use crate::services::{DetailMetrics, ErrorRateAlert, FilterState, Recomputation};

pub use crate::db::{FeedbackPage, FeedbackSubmission, SessionAnalytics};
pub use crate::services::TableProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// `connected`, `disconnected` or `error: ...`
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackCreatedResponse {
    pub message: String,
    pub feedback_id: FeedbackId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStartRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartResponse {
    pub message: String,
    pub session_id: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionActionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionActionResponse {
    pub message: String,
    pub session_id: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionEndRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEndResponse {
    pub message: String,
    pub session_id: String,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsQuery {
    pub days: Option<i64>,
}

/// Drill-down status filter, `?status=error`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

impl StatusQuery {
    pub fn parse(&self) -> Result<Option<RowStatus>, AppError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(AppError::BadRequest),
        }
    }
}

/// Body of the quality endpoints: a table given inline or as CSV text, plus
/// the filter state for the pass.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QualityRequest {
    #[serde(default)]
    pub table: Option<Table>,
    #[serde(default)]
    pub csv: Option<String>,
    /// Single-character CSV delimiter; sniffed when absent.
    #[serde(default)]
    pub delimiter: Option<String>,
    /// Filter state for the pass; server defaults when absent.
    #[serde(default)]
    pub state: Option<FilterState>,
    /// Latest-day error alert threshold in percent; server default when absent.
    #[serde(default)]
    pub error_alert_pct: Option<f64>,
}

impl QualityRequest {
    /// Materialise the table. An inline table wins over CSV text.
    pub fn take_table(&mut self) -> Result<Table, AppError> {
        if let Some(table) = self.table.take() {
            return Ok(table);
        }
        let csv = self
            .csv
            .take()
            .ok_or_else(|| AppError::BadRequest("Either 'table' or 'csv' is required".into()))?;
        let delimiter = parse_delimiter(self.delimiter.as_deref())?;
        Ok(parse_csv(csv.as_bytes(), delimiter)?)
    }
}

fn parse_delimiter(raw: Option<&str>) -> Result<Option<u8>, AppError> {
    match raw {
        None | Some("") => Ok(None),
        Some("tab") | Some("\\t") => Ok(Some(b'\t')),
        Some(s) if s.len() == 1 && s.is_ascii() => Ok(Some(s.as_bytes()[0])),
        Some(s) => Err(AppError::BadRequest(format!(
            "Delimiter must be a single ASCII character, got '{}'",
            s
        ))),
    }
}

/// A recomputation plus the presentation data the dashboard shows with it.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    #[serde(flatten)]
    pub result: Recomputation,
    pub error_alert: Option<ErrorRateAlert>,
    pub error_alert_pct: f64,
    pub detail_metrics: DetailMetrics,
}
