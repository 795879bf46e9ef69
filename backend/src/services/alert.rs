//! Error-rate alert for the most recent bucket.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::DailyBucket;

pub const DEFAULT_ERROR_ALERT_PCT: f64 = 10.0;
/// Range offered to users for the alert threshold.
pub const ERROR_ALERT_PCT_RANGE: (f64, f64) = (1.0, 20.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRateAlert {
    pub date: NaiveDate,
    pub error_rate_pct: f64,
    pub threshold_pct: f64,
    pub errors: usize,
    pub total: usize,
}

/// Alert when the latest bucket's error rate is strictly above the threshold.
///
/// The rate is `100 · error / max(1, total)`, capped at 100.
pub fn error_alert(series: &[DailyBucket], threshold_pct: f64) -> Option<ErrorRateAlert> {
    let latest = series.iter().max_by_key(|b| b.date)?;
    let rate = (100.0 * latest.error as f64 / latest.total.max(1) as f64).min(100.0);
    (rate > threshold_pct).then(|| ErrorRateAlert {
        date: latest.date,
        error_rate_pct: rate,
        threshold_pct,
        errors: latest.error,
        total: latest.total,
    })
}

/// Clamp a user-supplied threshold into the offered range.
pub fn clamp_threshold(threshold_pct: f64) -> f64 {
    if threshold_pct.is_nan() {
        return DEFAULT_ERROR_ALERT_PCT;
    }
    threshold_pct.clamp(ERROR_ALERT_PCT_RANGE.0, ERROR_ALERT_PCT_RANGE.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatusCounts;

    fn bucket(d: u32, valid: usize, error: usize) -> DailyBucket {
        DailyBucket::from_counts(
            NaiveDate::from_ymd_opt(2024, 1, d).unwrap(),
            StatusCounts {
                valid,
                warning: 0,
                error,
            },
        )
    }

    #[test]
    fn test_alert_uses_latest_bucket() {
        let series = vec![bucket(1, 0, 10), bucket(2, 9, 1)];
        // Latest day is at exactly 10%: not strictly above.
        assert_eq!(error_alert(&series, 10.0), None);
        let alert = error_alert(&series, 5.0).unwrap();
        assert_eq!(alert.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(alert.error_rate_pct, 10.0);
    }

    #[test]
    fn test_no_series_no_alert() {
        assert_eq!(error_alert(&[], 1.0), None);
    }

    #[test]
    fn test_empty_bucket_rate_is_zero() {
        assert_eq!(error_alert(&[bucket(1, 0, 0)], 1.0), None);
    }

    #[test]
    fn test_clamp_threshold() {
        assert_eq!(clamp_threshold(0.0), 1.0);
        assert_eq!(clamp_threshold(50.0), 20.0);
        assert_eq!(clamp_threshold(12.5), 12.5);
        assert_eq!(clamp_threshold(f64::NAN), DEFAULT_ERROR_ALERT_PCT);
    }
}
