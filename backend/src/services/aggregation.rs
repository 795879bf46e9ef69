//! Per-day aggregation of classified rows.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{ClassifiedRow, DailyBucket, KpiTotals, StatusCounts};

/// How many standard deviations above the mean flag an error spike.
pub const ANOMALY_SIGMA: f64 = 2.0;

/// Group rows into daily buckets, ascending by date.
///
/// `row_days` runs parallel to `rows`. Rows without a day are skipped. With
/// `None` every row lands in a single snapshot bucket dated `today`; an empty
/// row set then still yields that bucket, with zero totals.
pub fn aggregate(
    rows: &[ClassifiedRow],
    row_days: Option<&[Option<NaiveDate>]>,
    today: NaiveDate,
) -> Vec<DailyBucket> {
    let mut by_day: BTreeMap<NaiveDate, StatusCounts> = BTreeMap::new();

    match row_days {
        Some(days) => {
            for (row, day) in rows.iter().zip(days) {
                if let Some(day) = day {
                    by_day.entry(*day).or_default().record(row.status);
                }
            }
        }
        None => {
            let counts = by_day.entry(today).or_default();
            for row in rows {
                counts.record(row.status);
            }
        }
    }

    let mut buckets: Vec<DailyBucket> = by_day
        .into_iter()
        .map(|(date, counts)| DailyBucket::from_counts(date, counts))
        .collect();
    flag_error_anomalies(&mut buckets);
    buckets
}

/// Mark buckets whose error count exceeds `mean + 2·stdev` of the series.
///
/// Population standard deviation; a flat series uses a deviation of 1 so a
/// single bucket is never flagged against itself.
pub fn flag_error_anomalies(buckets: &mut [DailyBucket]) {
    if buckets.is_empty() {
        return;
    }
    let n = buckets.len() as f64;
    let mean = buckets.iter().map(|b| b.error as f64).sum::<f64>() / n;
    let variance = buckets
        .iter()
        .map(|b| (b.error as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let std = variance.sqrt();
    let std = if std > 0.0 { std } else { 1.0 };
    let limit = mean + ANOMALY_SIGMA * std;

    for bucket in buckets.iter_mut() {
        bucket.error_anomaly = bucket.error as f64 > limit;
    }
}

/// Sum a bucket series into KPI totals.
pub fn kpi_totals(buckets: &[DailyBucket]) -> KpiTotals {
    let mut counts = StatusCounts::default();
    for bucket in buckets {
        counts += bucket.counts();
    }
    counts.into()
}
