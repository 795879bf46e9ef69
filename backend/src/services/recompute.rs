//! Filter recomputation controller.
//!
//! [`recompute`] is the single entry point the presentation layer calls after
//! any change to the upload or the filters. It takes the previous
//! [`FilterState`] by value and hands back the next one inside the
//! [`Recomputation`], so nothing survives between calls except what the caller
//! chooses to keep.
//!
//! KPI totals, the bucket series and the drill-down rows are all derived from
//! one classification pass over one filtered row set, so they always agree.

use chrono::{NaiveDate, TimeDelta};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{QualityError, QualityResult};
use crate::models::{
    ClassifiedRow, DailyBucket, DateSpan, DetectionStrictness, DuplicateMode, KpiTotals,
    ReviewRow, Table, TimeRangeFilter,
};
use crate::services::aggregation::{aggregate, kpi_totals};
use crate::services::classifier::{classify, default_duplicate_mode, effective_duplicate_mode};
use crate::services::date_detection::{column_days, detect, DetectionOptions};
use crate::services::drilldown::filtered_by_label;

/// Everything the user can change, plus the detection cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    /// Columns checked for missing values; empty means all.
    pub quality_columns: Vec<String>,
    /// `None` uses the guessed key column.
    pub duplicate_mode: Option<DuplicateMode>,
    pub date_range: TimeRangeFilter,
    pub focus_column: Option<String>,
    /// Manual date column. Overrides detection until cleared.
    pub date_column: Option<String>,
    pub detection: DetectionStrictness,
    pub min_valid_fraction: Option<f64>,
    pub detection_cache: Option<DetectionCache>,
}

impl FilterState {
    pub fn detection_options(&self, today: NaiveDate) -> DetectionOptions {
        let options = DetectionOptions::new(self.detection, today);
        match self.min_valid_fraction {
            Some(fraction) => options.with_min_valid_fraction(fraction),
            None => options,
        }
    }
}

/// Result of the last automatic detection, keyed by table content and
/// threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCache {
    pub table_fingerprint: String,
    pub threshold: f64,
    pub column: Option<String>,
}

/// Where the active date column came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateColumnSource {
    Manual,
    Detected,
    None,
}

/// Non-fatal findings of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecomputeWarning {
    UnknownFocusColumn { hint: String },
    DuplicateKeyFallback { requested: String },
    ManualDateColumnMissing { column: String },
    UnparseableDateColumn { column: String },
    UndatedRowsDropped { count: usize },
    UnknownQualityColumns { columns: Vec<String> },
}

impl RecomputeWarning {
    pub fn message(&self) -> String {
        match self {
            Self::UnknownFocusColumn { hint } => {
                QualityError::UnknownFocusColumn(hint.clone()).to_string()
            }
            Self::DuplicateKeyFallback { requested } => format!(
                "Duplicate key column '{}' not found, comparing all columns",
                requested
            ),
            Self::ManualDateColumnMissing { column } => {
                format!("Date column '{}' not found, detecting automatically", column)
            }
            Self::UnparseableDateColumn { column } => format!(
                "Column '{}' has no parseable dates, showing a single snapshot",
                column
            ),
            Self::UndatedRowsDropped { count } => {
                format!("{} rows without a parseable date were left out", count)
            }
            Self::UnknownQualityColumns { columns } => {
                format!("Ignoring unknown quality columns: {}", columns.join(", "))
            }
        }
    }
}

/// Output of one recomputation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recomputation {
    pub kpi_totals: KpiTotals,
    pub time_series: Vec<DailyBucket>,
    /// Classified rows inside the active range, in table order.
    pub rows: Vec<ReviewRow>,
    pub detected_date_column: Option<String>,
    pub date_column_source: DateColumnSource,
    pub effective_duplicate_mode: DuplicateMode,
    /// Quality columns actually checked, focus column included.
    pub quality_columns: Vec<String>,
    /// Drill-down column order; the focus column comes first.
    pub column_order: Vec<String>,
    pub focus_column: Option<String>,
    pub available_range: Option<DateSpan>,
    pub active_range: Option<DateSpan>,
    pub warnings: Vec<RecomputeWarning>,
    pub filtered_by: String,
    pub state: FilterState,
}

/// Resolve a range filter against the observed data bounds.
///
/// `None` means no restriction. Presets anchor on the latest observed day
/// (`today` without data) and never reach before the earliest one. Open
/// custom bounds take the data's bounds; reversed bounds are swapped.
pub fn resolve_range(
    filter: &TimeRangeFilter,
    data: Option<DateSpan>,
    today: NaiveDate,
) -> Option<DateSpan> {
    match *filter {
        TimeRangeFilter::All => None,
        TimeRangeFilter::LastDays { days } => {
            let end = data.map(|d| d.end).unwrap_or(today);
            let floor = data.map(|d| d.start).unwrap_or(NaiveDate::MIN);
            // Spans reaching past the calendar clamp to the floor.
            let start = TimeDelta::try_days(i64::from(days.max(1)) - 1)
                .and_then(|back| end.checked_sub_signed(back))
                .map_or(floor, |start| start.max(floor));
            Some(DateSpan::new(start, end))
        }
        TimeRangeFilter::Custom { start, end } => {
            if start.is_none() && end.is_none() {
                return None;
            }
            let lower = start.or(data.map(|d| d.start)).or(end)?;
            let upper = end.or(data.map(|d| d.end)).or(start)?;
            Some(DateSpan::new(lower.min(upper), lower.max(upper)))
        }
    }
}

/// Case-insensitive exact match first, then the first substring match.
pub fn match_focus_column(table: &Table, hint: &str) -> Option<String> {
    let needle = hint.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let columns = table.columns();
    columns
        .iter()
        .find(|c| c.to_lowercase() == needle)
        .or_else(|| columns.iter().find(|c| c.to_lowercase().contains(&needle)))
        .cloned()
}

/// Run detection, classification, range filtering and aggregation as one pass.
pub fn recompute(
    table: &Table,
    mut state: FilterState,
    today: NaiveDate,
) -> QualityResult<Recomputation> {
    let mut warnings = Vec::new();
    let options = state.detection_options(today);

    let date_column = resolve_date_column(table, &mut state, &options, &mut warnings);

    // Quality selection, focus column on top.
    let (selected, unknown): (Vec<String>, Vec<String>) = state
        .quality_columns
        .iter()
        .cloned()
        .partition(|c| table.has_column(c));
    if !unknown.is_empty() {
        warnings.push(RecomputeWarning::UnknownQualityColumns { columns: unknown });
    }
    let mut quality_columns = if selected.is_empty() {
        table.columns().to_vec()
    } else {
        selected.clone()
    };

    let focus_hint = state
        .focus_column
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty());
    let focus_column = focus_hint.and_then(|hint| {
        let matched = match_focus_column(table, hint);
        if matched.is_none() {
            warnings.push(RecomputeWarning::UnknownFocusColumn {
                hint: hint.to_string(),
            });
        }
        matched
    });
    if let Some(focus) = &focus_column {
        if !quality_columns.contains(focus) {
            quality_columns.push(focus.clone());
        }
    }
    let column_order: Vec<String> = focus_column
        .iter()
        .cloned()
        .chain(
            table
                .columns()
                .iter()
                .filter(|c| Some(*c) != focus_column.as_ref())
                .cloned(),
        )
        .collect();

    let requested_mode = state
        .duplicate_mode
        .clone()
        .unwrap_or_else(|| default_duplicate_mode(table));
    let effective_mode = effective_duplicate_mode(table, &requested_mode);
    if let DuplicateMode::ByKeyColumn(key) = &requested_mode {
        if effective_mode != requested_mode {
            warn!("Duplicate key column '{}' not in table, comparing all columns", key);
            warnings.push(RecomputeWarning::DuplicateKeyFallback {
                requested: key.clone(),
            });
        }
    }

    let classified = classify(table, &quality_columns, &effective_mode);

    // Restrict to the active range before aggregating.
    let mut available_range = None;
    let mut active_range = None;
    let mut active_date_column = None;
    let mut kept: Vec<(ClassifiedRow, Option<NaiveDate>)> = Vec::with_capacity(classified.len());

    match date_column {
        Some((index, source)) => {
            let column = table.columns()[index].clone();
            let days = column_days(table, index, &options);
            available_range = DateSpan::covering(days.iter().flatten().copied());

            if available_range.is_none() && !table.is_empty() {
                warnings.push(RecomputeWarning::UnparseableDateColumn { column });
                kept.extend(classified.into_iter().map(|row| (row, None)));
            } else {
                active_date_column = Some((column, source));
                active_range = resolve_range(&state.date_range, available_range, today);

                let undated = days.iter().filter(|d| d.is_none()).count();
                if undated > 0 {
                    warnings.push(RecomputeWarning::UndatedRowsDropped { count: undated });
                }

                kept.extend(
                    classified
                        .into_iter()
                        .zip(days)
                        .filter_map(|(row, day)| day.map(|d| (row, Some(d))))
                        .filter(|(_, day)| match (active_range, day) {
                            (Some(span), Some(d)) => span.contains(*d),
                            _ => true,
                        }),
                );

                if let Some(requested) = active_range {
                    if kept.is_empty() {
                        return Err(QualityError::EmptyRange {
                            requested,
                            available: available_range,
                        });
                    }
                }
            }
        }
        None => kept.extend(classified.into_iter().map(|row| (row, None))),
    }

    let (rows, days): (Vec<ClassifiedRow>, Vec<Option<NaiveDate>>) = kept.into_iter().unzip();
    let time_series = if active_date_column.is_some() {
        aggregate(&rows, Some(days.as_slice()), today)
    } else {
        aggregate(&rows, None, today)
    };
    let kpi = kpi_totals(&time_series);
    // Snapshot rows carry the single bucket's day.
    let snapshot_day = match active_date_column {
        Some(_) => None,
        None => time_series.first().map(|b| b.date),
    };

    let order_indexes: Vec<usize> = column_order
        .iter()
        .filter_map(|c| table.column_index(c))
        .collect();
    let review_rows: Vec<ReviewRow> = rows
        .into_iter()
        .zip(days)
        .map(|(classification, date)| {
            let source = &table.rows()[classification.row_index];
            ReviewRow {
                record_id: classification.row_index + 1,
                values: order_indexes.iter().map(|&i| source[i].clone()).collect(),
                date: date.or(snapshot_day),
                classification,
            }
        })
        .collect();

    let filtered_by = filtered_by_label(&selected, focus_hint);
    let (detected_date_column, date_column_source) = match active_date_column {
        Some((column, source)) => (Some(column), source),
        None => (None, DateColumnSource::None),
    };

    debug!(
        "Recomputed {} rows: {} buckets, date column {:?}, duplicates by {}, {} warnings",
        review_rows.len(),
        time_series.len(),
        detected_date_column,
        effective_mode,
        warnings.len()
    );

    Ok(Recomputation {
        kpi_totals: kpi,
        time_series,
        rows: review_rows,
        detected_date_column,
        date_column_source,
        effective_duplicate_mode: effective_mode,
        quality_columns,
        column_order,
        focus_column,
        available_range,
        active_range,
        warnings,
        filtered_by,
        state,
    })
}

/// Pick the date column for this pass, refreshing the detection cache when
/// the table or threshold changed. A manual choice clears the cache so that
/// clearing the choice later runs detection again.
fn resolve_date_column(
    table: &Table,
    state: &mut FilterState,
    options: &DetectionOptions,
    warnings: &mut Vec<RecomputeWarning>,
) -> Option<(usize, DateColumnSource)> {
    if let Some(manual) = state.date_column.clone() {
        state.detection_cache = None;
        if let Some(index) = table.column_index(&manual) {
            return Some((index, DateColumnSource::Manual));
        }
        warnings.push(RecomputeWarning::ManualDateColumnMissing { column: manual });
    }

    let fingerprint = table.fingerprint();
    let threshold = options.threshold();
    let cached = state
        .detection_cache
        .as_ref()
        .filter(|c| c.table_fingerprint == fingerprint && c.threshold == threshold)
        .map(|c| c.column.clone());

    let column = match cached {
        Some(column) => column,
        None => {
            let column = detect(table, options);
            state.detection_cache = Some(DetectionCache {
                table_fingerprint: fingerprint,
                threshold,
                column: column.clone(),
            });
            column
        }
    };

    column
        .and_then(|c| table.column_index(&c))
        .map(|index| (index, DateColumnSource::Detected))
}
