use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use super::schema::{feedback_entries, user_sessions};
use crate::db::models::{Feedback, FeedbackId, NewFeedback, SessionAction, UserSession};
use crate::db::repository::{ErrorContext, RepositoryError, RepositoryResult};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = feedback_entries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FeedbackRow {
    pub id: i64,
    pub rating: i16,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl FeedbackRow {
    pub fn into_feedback(self) -> Feedback {
        Feedback {
            id: FeedbackId(self.id),
            rating: self.rating.clamp(0, u8::MAX as i16) as u8,
            text: self.text,
            timestamp: self.submitted_at,
            user_id: self.user_id,
            session_id: self.session_id,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = feedback_entries)]
pub struct NewFeedbackRow {
    pub rating: i16,
    pub text: String,
    pub submitted_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl From<NewFeedback> for NewFeedbackRow {
    fn from(f: NewFeedback) -> Self {
        Self {
            rating: i16::from(f.rating),
            text: f.text,
            submitted_at: f.timestamp,
            user_id: f.user_id,
            session_id: f.session_id,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SessionRow {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub actions: Value,
    #[allow(dead_code)] // maintained for SQL-side reporting
    pub action_count: i32,
    pub duration_minutes: Option<f64>,
}

impl SessionRow {
    pub fn into_session(self) -> RepositoryResult<UserSession> {
        let actions: Vec<SessionAction> = serde_json::from_value(self.actions).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Failed to parse session actions: {}", e),
                ErrorContext::new("decode_session")
                    .with_entity("session")
                    .with_entity_id(&self.session_id),
            )
        })?;
        Ok(UserSession {
            session_id: self.session_id,
            start_time: self.start_time,
            end_time: self.end_time,
            user_agent: self.user_agent,
            ip_address: self.ip_address,
            actions,
            duration_minutes: self.duration_minutes,
        })
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_sessions)]
pub struct NewSessionRow {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub actions: Value,
    pub action_count: i32,
    pub duration_minutes: Option<f64>,
}

impl NewSessionRow {
    pub fn from_session(session: &UserSession) -> RepositoryResult<Self> {
        let actions = serde_json::to_value(&session.actions)
            .map_err(|e| RepositoryError::internal(format!("Failed to encode actions: {}", e)))?;
        Ok(Self {
            session_id: session.session_id.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            user_agent: session.user_agent.clone(),
            ip_address: session.ip_address.clone(),
            actions,
            action_count: i32::try_from(session.actions.len()).unwrap_or(i32::MAX),
            duration_minutes: session.duration_minutes,
        })
    }
}
