//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db::RepositoryError;
use crate::error::QualityError;

/// API error response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Stable code for programmatic handling
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
    Repository(RepositoryError),
    Quality(QualityError),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ApiError) {
        match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", msg)),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg))
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::new("INTERNAL_ERROR", "An unexpected error occurred"),
                )
            }
            AppError::Repository(e) => repository_response(e),
            AppError::Quality(e) => quality_response(e),
        }
    }
}

fn repository_response(err: RepositoryError) -> (StatusCode, ApiError) {
    match err {
        RepositoryError::NotFound { message, .. } => {
            (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", message))
        }
        RepositoryError::ValidationError { message, .. } => {
            (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", message))
        }
        RepositoryError::Conflict { message, .. } => {
            (StatusCode::CONFLICT, ApiError::new("CONFLICT", message))
        }
        other => {
            error!("Repository failure: {}", other);
            let status = if other.is_retryable() {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                status,
                ApiError::new("REPOSITORY_ERROR", "Database error occurred"),
            )
        }
    }
}

fn quality_response(err: QualityError) -> (StatusCode, ApiError) {
    let message = err.to_string();
    match err {
        QualityError::InputShape(_) => (
            StatusCode::BAD_REQUEST,
            ApiError::new("INPUT_SHAPE", message),
        ),
        QualityError::EmptyRange {
            requested,
            available,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::new("EMPTY_RANGE", message).with_details(json!({
                "requested": requested,
                "available": available,
            })),
        ),
        QualityError::UnknownFocusColumn(_) => (
            StatusCode::BAD_REQUEST,
            ApiError::new("UNKNOWN_FOCUS_COLUMN", message),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_body();
        (status, Json(error)).into_response()
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

impl From<QualityError> for AppError {
    fn from(err: QualityError) -> Self {
        AppError::Quality(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateSpan;
    use chrono::NaiveDate;

    #[test]
    fn test_repository_errors_map_by_kind() {
        let (status, body) =
            AppError::from(RepositoryError::not_found("Session not found")).status_and_body();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message, "Session not found");

        let (status, _) =
            AppError::from(RepositoryError::validation("bad")).status_and_body();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            AppError::from(RepositoryError::connection("refused")).status_and_body();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.message, "Database error occurred");
    }

    #[test]
    fn test_empty_range_is_unprocessable_with_ranges() {
        let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        let err = QualityError::EmptyRange {
            requested: DateSpan::new(day(20), day(25)),
            available: Some(DateSpan::new(day(1), day(3))),
        };
        let (status, body) = AppError::from(err).status_and_body();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.code, "EMPTY_RANGE");
        let details = body.details.unwrap();
        assert_eq!(details["available"]["start"], "2024-01-01");
        assert_eq!(details["requested"]["end"], "2024-01-25");
    }
}
