//! Feedback and session operations on top of any [`FullRepository`].
//!
//! Input validation, id generation and analytics live here so every storage
//! backend behaves the same.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::models::{
    round2, Feedback, FeedbackPage, NewFeedback, SessionAction, SessionAnalytics, UserSession,
    RATING_RANGE,
};
use super::repository::{FullRepository, RepositoryError, RepositoryResult};

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 500;
pub const DEFAULT_ANALYTICS_DAYS: i64 = 7;
/// Ten years.
pub const MAX_ANALYTICS_DAYS: i64 = 3650;

/// Raw feedback as submitted by a client.
///
/// `rating` stays untyped so that strings and fractional numbers are
/// rejected with a validation message rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    #[serde(default)]
    pub rating: Option<Value>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn health_check<R: FullRepository + ?Sized>(repo: &R) -> RepositoryResult<bool> {
    repo.health_check().await
}

/// Check a submission and turn it into storable feedback.
///
/// The rating must be an integer from 1 to 5 and the trimmed text non-empty.
pub fn validate_feedback(
    submission: FeedbackSubmission,
    now: DateTime<Utc>,
) -> RepositoryResult<NewFeedback> {
    let (Some(rating), Some(text)) = (submission.rating, submission.text) else {
        return Err(RepositoryError::validation("Rating and text are required"));
    };

    let rating = rating
        .as_i64()
        .filter(|r| (RATING_RANGE.0..=RATING_RANGE.1).contains(r))
        .and_then(|r| u8::try_from(r).ok())
        .ok_or_else(|| RepositoryError::validation("Rating must be between 1 and 5"))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(RepositoryError::validation("Feedback text cannot be empty"));
    }

    Ok(NewFeedback {
        rating,
        text: text.to_string(),
        timestamp: now,
        user_id: non_blank(submission.user_id),
        session_id: non_blank(submission.session_id),
    })
}

pub async fn submit_feedback<R: FullRepository + ?Sized>(
    repo: &R,
    submission: FeedbackSubmission,
    now: DateTime<Utc>,
) -> RepositoryResult<Feedback> {
    let feedback = validate_feedback(submission, now)?;
    repo.store_feedback(feedback)
        .await
        .map_err(|e| e.with_operation("submit_feedback"))
}

/// Page `page` (1-based) of feedback, newest first.
///
/// `page` below 1 is treated as 1 and `limit` is clamped to
/// `1..=MAX_PAGE_LIMIT`.
pub async fn list_feedback_page<R: FullRepository + ?Sized>(
    repo: &R,
    page: usize,
    limit: usize,
) -> RepositoryResult<FeedbackPage> {
    let page = page.max(1);
    let limit = limit.clamp(1, MAX_PAGE_LIMIT);
    let total_count = repo.count_feedback().await?;
    let feedback = repo
        .list_feedback((page - 1).saturating_mul(limit), limit)
        .await?;

    Ok(FeedbackPage {
        feedback,
        total_count,
        page,
        limit,
        total_pages: total_count.div_ceil(limit),
    })
}

/// `session_YYYYmmdd_HHMMSS_micros` from the UTC clock.
pub fn generate_session_id(now: DateTime<Utc>) -> String {
    now.format("session_%Y%m%d_%H%M%S_%6f").to_string()
}

pub async fn start_session<R: FullRepository + ?Sized>(
    repo: &R,
    requested_id: Option<String>,
    user_agent: Option<String>,
    ip_address: Option<String>,
    now: DateTime<Utc>,
) -> RepositoryResult<UserSession> {
    let session_id = non_blank(requested_id).unwrap_or_else(|| generate_session_id(now));
    let mut session = UserSession::new(session_id, now);
    session.user_agent = non_blank(user_agent);
    session.ip_address = non_blank(ip_address);
    debug!("Starting session {}", session.session_id);
    repo.start_session(session).await
}

pub async fn track_action<R: FullRepository + ?Sized>(
    repo: &R,
    session_id: &str,
    action: &str,
    metadata: Option<Map<String, Value>>,
    now: DateTime<Utc>,
) -> RepositoryResult<SessionAction> {
    if session_id.trim().is_empty() || action.trim().is_empty() {
        return Err(RepositoryError::validation(
            "session_id and action are required",
        ));
    }
    let tracked = SessionAction {
        action: action.trim().to_string(),
        timestamp: now,
        metadata: metadata.unwrap_or_default(),
    };
    repo.record_action(session_id.trim(), tracked.clone())
        .await?;
    Ok(tracked)
}

pub async fn end_session<R: FullRepository + ?Sized>(
    repo: &R,
    session_id: &str,
    now: DateTime<Utc>,
) -> RepositoryResult<UserSession> {
    if session_id.trim().is_empty() {
        return Err(RepositoryError::validation("session_id is required"));
    }
    repo.end_session(session_id.trim(), now).await
}

/// Usage statistics for sessions started within `days` days before `now`.
pub async fn session_analytics<R: FullRepository + ?Sized>(
    repo: &R,
    days: i64,
    now: DateTime<Utc>,
) -> RepositoryResult<SessionAnalytics> {
    let days = days.max(0);
    let from = Some(days)
        .filter(|d| *d <= MAX_ANALYTICS_DAYS)
        .and_then(Duration::try_days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| {
            RepositoryError::validation(format!("days must be at most {}", MAX_ANALYTICS_DAYS))
        })?;
    let sessions = repo.sessions_started_between(from, now).await?;
    Ok(summarize_sessions(&sessions, days))
}

/// Averages and the action total cover only sessions with a recorded
/// duration; counts cover every session given.
pub fn summarize_sessions(sessions: &[UserSession], period_days: i64) -> SessionAnalytics {
    let completed_sessions = sessions.iter().filter(|s| !s.is_active()).count();
    let timed: Vec<(f64, usize)> = sessions
        .iter()
        .filter_map(|s| s.duration_minutes.map(|d| (d, s.action_count())))
        .collect();

    let total_actions: usize = timed.iter().map(|(_, actions)| actions).sum();
    let (avg_duration_minutes, avg_actions_per_session) = if timed.is_empty() {
        (0.0, 0.0)
    } else {
        let n = timed.len() as f64;
        (
            round2(timed.iter().map(|(d, _)| d).sum::<f64>() / n),
            round2(total_actions as f64 / n),
        )
    };

    SessionAnalytics {
        period_days,
        total_sessions: sessions.len(),
        completed_sessions,
        avg_duration_minutes,
        total_actions,
        avg_actions_per_session,
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::LocalRepository;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 15).unwrap()
    }

    fn submission(rating: Value, text: &str) -> FeedbackSubmission {
        FeedbackSubmission {
            rating: Some(rating),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_feedback_rules() {
        let ok = validate_feedback(submission(json!(5), "  great  "), now()).unwrap();
        assert_eq!(ok.rating, 5);
        assert_eq!(ok.text, "great");

        for bad in [json!(0), json!(6), json!(4.5), json!("4"), Value::Null] {
            let err = validate_feedback(submission(bad, "x"), now()).unwrap_err();
            assert_eq!(err.message(), "Rating must be between 1 and 5");
        }

        let err = validate_feedback(submission(json!(3), "   "), now()).unwrap_err();
        assert_eq!(err.message(), "Feedback text cannot be empty");

        let err = validate_feedback(FeedbackSubmission::default(), now()).unwrap_err();
        assert_eq!(err.message(), "Rating and text are required");
    }

    #[test]
    fn test_generate_session_id_format() {
        let id = generate_session_id(now() + Duration::microseconds(42));
        assert_eq!(id, "session_20240310_093015_000042");
    }

    #[test]
    fn test_summarize_sessions_uses_timed_sessions_only() {
        let start = now();
        let mut a = UserSession::new("a", start);
        a.actions = vec![
            SessionAction {
                action: "file_upload".into(),
                timestamp: start,
                metadata: Map::new(),
            };
            3
        ];
        a.close(start + Duration::minutes(10));
        let mut b = UserSession::new("b", start);
        b.close(start + Duration::minutes(5));
        let mut open = UserSession::new("c", start);
        open.actions.push(SessionAction {
            action: "export_csv".into(),
            timestamp: start,
            metadata: Map::new(),
        });

        let stats = summarize_sessions(&[a, b, open], 7);
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.completed_sessions, 2);
        assert_eq!(stats.avg_duration_minutes, 7.5);
        assert_eq!(stats.total_actions, 3);
        assert_eq!(stats.avg_actions_per_session, 1.5);

        let empty = summarize_sessions(&[], 1);
        assert_eq!(empty.avg_duration_minutes, 0.0);
    }

    #[tokio::test]
    async fn test_feedback_pagination() {
        let repo = LocalRepository::new();
        for i in 0..5 {
            submit_feedback(
                &repo,
                submission(json!(3), &format!("note {}", i)),
                now() + Duration::seconds(i),
            )
            .await
            .unwrap();
        }

        let page = list_feedback_page(&repo, 2, 2).await.unwrap();
        assert_eq!(page.total_count, 5);
        assert_eq!(page.total_pages, 3);
        let texts: Vec<&str> = page.feedback.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["note 2", "note 1"]);

        let clamped = list_feedback_page(&repo, 0, 0).await.unwrap();
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.limit, 1);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let repo = LocalRepository::new();
        let session = start_session(&repo, None, Some("curl/8".into()), None, now())
            .await
            .unwrap();
        assert!(session.session_id.starts_with("session_20240310_"));

        track_action(&repo, &session.session_id, "file_upload", None, now())
            .await
            .unwrap();
        let err = track_action(&repo, "missing", "x", None, now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));

        let ended = end_session(&repo, &session.session_id, now() + Duration::seconds(90))
            .await
            .unwrap();
        assert_eq!(ended.duration_minutes, Some(1.5));
        assert_eq!(ended.action_count(), 1);

        let stats = session_analytics(&repo, 7, now() + Duration::minutes(2))
            .await
            .unwrap();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.completed_sessions, 1);
        assert_eq!(stats.total_actions, 1);
    }

    #[tokio::test]
    async fn test_analytics_window_is_bounded() {
        let repo = LocalRepository::new();
        for days in [MAX_ANALYTICS_DAYS + 1, 200_000_000, 9_000_000_000_000, i64::MAX] {
            let err = session_analytics(&repo, days, now()).await.unwrap_err();
            assert!(matches!(err, RepositoryError::ValidationError { .. }));
        }
        let stats = session_analytics(&repo, MAX_ANALYTICS_DAYS, now())
            .await
            .unwrap();
        assert_eq!(stats.period_days, MAX_ANALYTICS_DAYS);
        assert_eq!(stats.total_sessions, 0);
    }
}
