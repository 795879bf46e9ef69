//! Feedback and usage-session records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

crate::define_id_type!(i64, FeedbackId);

/// Lowest and highest accepted star ratings.
pub const RATING_RANGE: (i64, i64) = (1, 5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: FeedbackId,
    pub rating: u8,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Validated feedback waiting for an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedback {
    pub rating: u8,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl NewFeedback {
    pub fn with_id(self, id: FeedbackId) -> Feedback {
        Feedback {
            id,
            rating: self.rating,
            text: self.text,
            timestamp: self.timestamp,
            user_id: self.user_id,
            session_id: self.session_id,
        }
    }
}

/// One page of feedback, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPage {
    pub feedback: Vec<Feedback>,
    pub total_count: usize,
    pub page: usize,
    pub limit: usize,
    pub total_pages: usize,
}

/// Something the user did during a session, e.g. `file_upload` or
/// `export_csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAction {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub actions: Vec<SessionAction>,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
}

impl UserSession {
    pub fn new(session_id: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            start_time,
            end_time: None,
            user_agent: None,
            ip_address: None,
            actions: Vec::new(),
            duration_minutes: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Close the session and record its length in minutes, rounded to 2 dp.
    pub fn close(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
        self.duration_minutes = Some(duration_minutes(end_time - self.start_time));
    }
}

pub fn duration_minutes(elapsed: Duration) -> f64 {
    round2(elapsed.num_milliseconds() as f64 / 60_000.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Usage statistics over sessions started in the last `period_days` days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAnalytics {
    pub period_days: i64,
    pub total_sessions: usize,
    pub completed_sessions: usize,
    pub avg_duration_minutes: f64,
    pub total_actions: usize,
    pub avg_actions_per_session: f64,
}
