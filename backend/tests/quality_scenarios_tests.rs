//! End-to-end review passes over small uploads.

mod support;

use dq_review::models::{DateSpan, DuplicateMode, RowIssue, RowStatus, TimeRangeFilter};
use dq_review::services::{
    classify, detect, export_rows_csv, recompute, DetectionOptions, FilterState,
};
use dq_review::QualityError;
use support::{csv_table, customers, day};

fn statuses(rows: &[dq_review::models::ClassifiedRow]) -> Vec<RowStatus> {
    rows.iter().map(|r| r.status).collect()
}

#[test]
fn test_duplicate_key_outranks_missing_value() {
    let rows = classify(
        &customers(),
        &["email".to_string()],
        &DuplicateMode::ByKeyColumn("id".into()),
    );
    assert_eq!(
        statuses(&rows),
        vec![RowStatus::Error, RowStatus::Warning, RowStatus::Error]
    );
    assert_eq!(rows[1].issue, RowIssue::Missing);
    assert_eq!(rows[1].first_missing_column.as_deref(), Some("email"));
}

#[test]
fn test_all_columns_mode_needs_whole_row_match() {
    let rows = classify(
        &customers(),
        &["email".to_string()],
        &DuplicateMode::AllColumns,
    );
    assert_eq!(
        statuses(&rows),
        vec![RowStatus::Valid, RowStatus::Warning, RowStatus::Valid]
    );
}

#[test]
fn test_empty_quality_selection_checks_every_column() {
    let table = csv_table("id,email,city\n1,a@x.com,\n2,b@x.com,Oslo\n");
    let rows = classify(&table, &[], &DuplicateMode::ByKeyColumn("id".into()));
    assert_eq!(statuses(&rows), vec![RowStatus::Warning, RowStatus::Valid]);
    assert_eq!(rows[0].first_missing_column.as_deref(), Some("city"));
}

#[test]
fn test_detected_join_date_buckets_by_day() {
    let table = csv_table(
        "name,JoinDate\nada,2024-01-15\ngrace,2024-01-16\nlinus,2024-01-15\n",
    );
    let options = DetectionOptions::new(Default::default(), day(2024, 2, 1));
    assert_eq!(detect(&table, &options).as_deref(), Some("JoinDate"));

    let result = recompute(&table, FilterState::default(), day(2024, 2, 1)).unwrap();
    assert_eq!(result.detected_date_column.as_deref(), Some("JoinDate"));
    let buckets: Vec<_> = result
        .time_series
        .iter()
        .map(|b| (b.date, b.total))
        .collect();
    assert_eq!(
        buckets,
        vec![(day(2024, 1, 15), 2), (day(2024, 1, 16), 1)]
    );
    assert_eq!(result.kpi_totals.total, 3);
}

#[test]
fn test_custom_range_outside_data_is_empty_range() {
    let table = csv_table(
        "name,JoinDate\nada,2024-01-15\ngrace,2024-01-16\nlinus,2024-01-15\n",
    );
    let state = FilterState {
        date_range: TimeRangeFilter::Custom {
            start: Some(day(2025, 1, 1)),
            end: Some(day(2025, 1, 31)),
        },
        ..Default::default()
    };

    let err = recompute(&table, state, day(2025, 2, 1)).unwrap_err();
    assert_eq!(
        err,
        QualityError::EmptyRange {
            requested: DateSpan::new(day(2025, 1, 1), day(2025, 1, 31)),
            available: Some(DateSpan::new(day(2024, 1, 15), day(2024, 1, 16))),
        }
    );
    assert!(err.is_recoverable());
}

#[test]
fn test_kpis_match_series_and_rows() {
    let table = csv_table(
        "order_id,created,amount\n\
         1,2024-03-01,10\n\
         2,2024-03-01,\n\
         2,2024-03-02,7\n\
         3,2024-03-03,4\n",
    );
    let result = recompute(&table, FilterState::default(), day(2024, 3, 4)).unwrap();

    let series_total: usize = result.time_series.iter().map(|b| b.total).sum();
    assert_eq!(series_total, result.rows.len());
    assert_eq!(result.kpi_totals.total, result.rows.len());
    assert_eq!(
        result.kpi_totals.valid + result.kpi_totals.warning + result.kpi_totals.error,
        result.kpi_totals.total
    );
    assert_eq!(result.kpi_totals.error, 2);
    for bucket in &result.time_series {
        assert!((0.0..=100.0).contains(&bucket.dq_score));
    }
}

#[test]
fn test_export_follows_drilldown_order() {
    let table = csv_table("id,email\n1,a@x.com\n2,\n1,a2@x.com\n");
    let state = FilterState {
        quality_columns: vec!["email".into()],
        duplicate_mode: Some(DuplicateMode::ByKeyColumn("id".into())),
        focus_column: Some("email".into()),
        ..Default::default()
    };
    let result = recompute(&table, state, day(2024, 1, 1)).unwrap();
    assert_eq!(result.column_order[0], "email");

    let csv = export_rows_csv(&result.column_order, &result.rows).unwrap();
    let header = csv.lines().next().unwrap();
    assert!(header.contains("email"));
    assert_eq!(csv.lines().count(), 4);
}

#[test]
fn test_snapshot_export_carries_snapshot_day() {
    let table = csv_table("name,score\nada,1\ngrace,\n");
    let result = recompute(&table, FilterState::default(), day(2024, 4, 2)).unwrap();
    assert_eq!(result.detected_date_column, None);

    let csv = export_rows_csv(&result.column_order, &result.rows).unwrap();
    for line in csv.lines().skip(1) {
        assert!(line.contains("2024-04-02"), "missing snapshot day in {}", line);
    }
}
