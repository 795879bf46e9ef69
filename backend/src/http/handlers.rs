//! HTTP handlers for the REST API.
//!
//! Feedback and session handlers delegate to [`crate::db::services`]. Quality
//! handlers are pure computation over the request body and never touch the
//! repository; they run on the blocking pool.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use log::debug;

use super::dto::{
    AnalyticsQuery, AnalyzeResponse, FeedbackCreatedResponse, FeedbackPage, FeedbackQuery,
    FeedbackSubmission, HealthResponse, QualityRequest, SessionActionRequest,
    SessionActionResponse, SessionAnalytics, SessionEndRequest, SessionEndResponse,
    SessionStartRequest, SessionStartResponse, StatusQuery, TableProfile,
};
use super::error::AppError;
use super::state::AppState;
use crate::config::QualitySettings;
use crate::db::services::{self as db_services, DEFAULT_ANALYTICS_DAYS, DEFAULT_PAGE_LIMIT};
use crate::services::alert::clamp_threshold;
use crate::services::{
    detail_metrics, error_alert, export_rows_csv, profile_table, recompute, select_rows,
    FilterState,
};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Run CPU-bound work off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Task join error: {}", e)))?
}

fn header_string(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The request's filter state, or one built from the configured defaults.
/// A configured detection threshold applies unless the request sets its own.
fn filter_state(request: &mut QualityRequest, defaults: &QualitySettings) -> FilterState {
    let mut filter = request.state.take().unwrap_or_else(|| FilterState {
        detection: defaults.detection,
        ..Default::default()
    });
    if filter.min_valid_fraction.is_none() {
        filter.min_valid_fraction = defaults.min_valid_fraction;
    }
    filter
}

/// First hop of `X-Forwarded-For`, else `X-Real-IP`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_string(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_string(headers, "x-real-ip"))
}

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let db_status = match db_services::health_check(state.repository.as_ref()).await {
        Ok(true) => "connected".to_string(),
        Ok(false) => "disconnected".to_string(),
        Err(e) => format!("error: {}", e.message()),
    };

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: db_status,
    }))
}

// =============================================================================
// Feedback
// =============================================================================

/// POST /api/feedback
pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(submission): Json<FeedbackSubmission>,
) -> Result<(StatusCode, Json<FeedbackCreatedResponse>), AppError> {
    let stored =
        db_services::submit_feedback(state.repository.as_ref(), submission, Utc::now()).await?;

    Ok((
        StatusCode::CREATED,
        Json(FeedbackCreatedResponse {
            message: "Feedback submitted successfully".to_string(),
            feedback_id: stored.id,
        }),
    ))
}

/// GET /api/feedback?page=1&limit=50
pub async fn list_feedback(
    State(state): State<AppState>,
    Query(query): Query<FeedbackQuery>,
) -> HandlerResult<FeedbackPage> {
    let page = db_services::list_feedback_page(
        state.repository.as_ref(),
        query.page.unwrap_or(1),
        query.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
    )
    .await?;
    Ok(Json(page))
}

// =============================================================================
// Sessions
// =============================================================================

/// POST /api/session/start
///
/// The body is optional; an empty body starts a session with a generated id.
pub async fn start_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<SessionStartResponse>), AppError> {
    let request: SessionStartRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SessionStartRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?
    };

    let session = db_services::start_session(
        state.repository.as_ref(),
        request.session_id,
        header_string(&headers, header::USER_AGENT),
        client_ip(&headers),
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionStartResponse {
            message: "Session started successfully".to_string(),
            session_id: session.session_id,
            start_time: session.start_time,
        }),
    ))
}

/// POST /api/session/action
pub async fn track_action(
    State(state): State<AppState>,
    Json(request): Json<SessionActionRequest>,
) -> HandlerResult<SessionActionResponse> {
    let session_id = request.session_id.unwrap_or_default();
    let action = db_services::track_action(
        state.repository.as_ref(),
        &session_id,
        request.action.as_deref().unwrap_or_default(),
        request.metadata,
        Utc::now(),
    )
    .await?;

    Ok(Json(SessionActionResponse {
        message: "Action tracked successfully".to_string(),
        session_id: session_id.trim().to_string(),
        action: action.action,
        timestamp: action.timestamp,
    }))
}

/// POST /api/session/end
pub async fn end_session(
    State(state): State<AppState>,
    Json(request): Json<SessionEndRequest>,
) -> HandlerResult<SessionEndResponse> {
    let session_id = request.session_id.unwrap_or_default();
    let session =
        db_services::end_session(state.repository.as_ref(), &session_id, Utc::now()).await?;

    Ok(Json(SessionEndResponse {
        message: "Session ended successfully".to_string(),
        end_time: session.end_time.unwrap_or_else(Utc::now),
        duration_minutes: session.duration_minutes,
        session_id: session.session_id,
    }))
}

/// GET /api/analytics?days=7
pub async fn session_analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> HandlerResult<SessionAnalytics> {
    let stats = db_services::session_analytics(
        state.repository.as_ref(),
        query.days.unwrap_or(DEFAULT_ANALYTICS_DAYS),
        Utc::now(),
    )
    .await?;
    Ok(Json(stats))
}

// =============================================================================
// Quality review
// =============================================================================

/// POST /api/quality/analyze?status=warning
///
/// Runs one recomputation pass. With `status`, `rows` holds only the matching
/// rows, newest first, and `detail_metrics` describes them.
pub async fn analyze_quality(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
    Json(mut request): Json<QualityRequest>,
) -> HandlerResult<AnalyzeResponse> {
    let status = query.parse()?;
    let threshold = clamp_threshold(
        request
            .error_alert_pct
            .unwrap_or(state.config.quality.error_alert_pct),
    );
    let defaults = state.config.quality.clone();

    let response = blocking(move || {
        let table = request.take_table()?;
        let filter = filter_state(&mut request, &defaults);
        let mut result = recompute(&table, filter, Utc::now().date_naive())?;
        debug!(
            "Analyzed {} rows into {} buckets",
            result.rows.len(),
            result.time_series.len()
        );

        let alert = error_alert(&result.time_series, threshold);
        let selected: Vec<_> = select_rows(&result.rows, status)
            .into_iter()
            .cloned()
            .collect();
        let metrics = detail_metrics(&selected.iter().collect::<Vec<_>>());
        if status.is_some() {
            result.rows = selected;
        }

        Ok(AnalyzeResponse {
            result,
            error_alert: alert,
            error_alert_pct: threshold,
            detail_metrics: metrics,
        })
    })
    .await?;

    Ok(Json(response))
}

/// POST /api/quality/profile
pub async fn profile_upload(Json(mut request): Json<QualityRequest>) -> HandlerResult<TableProfile> {
    let profile = blocking(move || Ok(profile_table(&request.take_table()?))).await?;
    Ok(Json(profile))
}

/// POST /api/quality/export?status=error
///
/// Same body as analyze; answers with the selected rows as CSV.
pub async fn export_quality(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
    Json(mut request): Json<QualityRequest>,
) -> Result<impl IntoResponse, AppError> {
    let status = query.parse()?;
    let defaults = state.config.quality.clone();

    let csv = blocking(move || {
        let table = request.take_table()?;
        let filter = filter_state(&mut request, &defaults);
        let result = recompute(&table, filter, Utc::now().date_naive())?;
        export_rows_csv(&result.column_order, select_rows(&result.rows, status))
            .map_err(AppError::from)
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"dq_review_export.csv\"",
            ),
        ],
        csv,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_ip(&headers).as_deref(), Some("10.0.0.9"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }
}
