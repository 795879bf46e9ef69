//! Error types for the quality engine.
//!
//! Repository failures live in [`crate::db::RepositoryError`]; this module only
//! covers ingest and recomputation outcomes.

use crate::models::DateSpan;

/// Result type for quality engine operations.
pub type QualityResult<T> = Result<T, QualityError>;

/// Failures raised while ingesting or recomputing a table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QualityError {
    /// The input could not be turned into a table. No partial table is produced.
    #[error("Could not read file: {0}")]
    InputShape(String),

    /// The active date range selects no rows. Recoverable: the caller should
    /// offer the available range instead.
    #[error(
        "No rows match the date range {requested}{}",
        describe_available(.available)
    )]
    EmptyRange {
        requested: DateSpan,
        available: Option<DateSpan>,
    },

    /// A focus-column hint matched nothing. Reported as a warning on the
    /// recomputation, never returned from it.
    #[error("No column found matching '{0}'")]
    UnknownFocusColumn(String),
}

fn describe_available(available: &Option<DateSpan>) -> String {
    match available {
        Some(span) => format!(" (data available from {} to {})", span.start, span.end),
        None => " (no dated rows available)".to_string(),
    }
}

impl QualityError {
    pub fn input_shape(message: impl Into<String>) -> Self {
        Self::InputShape(message.into())
    }

    /// Whether the user can recover by changing filters rather than the input.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InputShape(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_empty_range_message_mentions_both_ranges() {
        let err = QualityError::EmptyRange {
            requested: DateSpan::new(day(2023, 1, 1), day(2023, 1, 31)),
            available: Some(DateSpan::new(day(2024, 1, 1), day(2024, 1, 3))),
        };
        let msg = err.to_string();
        assert!(msg.contains("2023-01-01 to 2023-01-31"));
        assert!(msg.contains("from 2024-01-01 to 2024-01-03"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_input_shape_is_not_recoverable() {
        let err = QualityError::input_shape("empty file");
        assert_eq!(err.to_string(), "Could not read file: empty file");
        assert!(!err.is_recoverable());
    }
}
