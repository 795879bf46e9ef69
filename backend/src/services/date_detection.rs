//! Date column detection.
//!
//! Every column whose name does not look like an identifier is tried against
//! the ordered [`DateStrategy`] list. The first strategy that parses enough
//! cells wins for that column; surviving columns are ranked by
//! `(valid_fraction, unique_day_count, span_days)` with earlier columns winning
//! ties.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::Serialize;

use crate::models::{Cell, DetectionStrictness, Table};
use crate::parsing::dates::{DateStrategy, EPOCH_SECONDS_MAX, EPOCH_SECONDS_MIN};

/// Name tokens that mark a column as an identifier rather than a date.
pub const IDENTIFIER_TOKENS: &[&str] = &["id", "index", "idx", "key", "pk", "number", "num"];

pub const MIN_PLAUSIBLE_YEAR: i32 = 1900;
/// Years beyond `current_year + MAX_YEARS_AHEAD` are treated as garbage.
pub const MAX_YEARS_AHEAD: i32 = 2;

/// Knobs for [`detect`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionOptions {
    pub strictness: DetectionStrictness,
    /// Replaces the strictness preset when set. Clamped to `[0, 1]`.
    pub min_valid_fraction: Option<f64>,
    pub current_year: i32,
}

impl DetectionOptions {
    pub fn new(strictness: DetectionStrictness, today: NaiveDate) -> Self {
        Self {
            strictness,
            min_valid_fraction: None,
            current_year: today.year(),
        }
    }

    pub fn with_min_valid_fraction(mut self, fraction: f64) -> Self {
        self.min_valid_fraction = Some(fraction.clamp(0.0, 1.0));
        self
    }

    pub fn threshold(&self) -> f64 {
        self.min_valid_fraction
            .unwrap_or_else(|| self.strictness.threshold())
    }

    fn year_is_plausible(&self, year: i32) -> bool {
        (MIN_PLAUSIBLE_YEAR..=self.current_year + MAX_YEARS_AHEAD).contains(&year)
    }
}

/// A column that survived detection, with its ranking score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateColumnCandidate {
    pub column: String,
    #[serde(skip)]
    pub index: usize,
    pub valid_fraction: f64,
    pub unique_day_count: usize,
    pub span_days: i64,
    #[serde(serialize_with = "serialize_strategy")]
    pub strategy: DateStrategy,
}

fn serialize_strategy<S: serde::Serializer>(s: &DateStrategy, ser: S) -> Result<S::Ok, S::Error> {
    ser.collect_str(s)
}

impl DateColumnCandidate {
    fn rank(&self, other: &Self) -> Ordering {
        other
            .valid_fraction
            .partial_cmp(&self.valid_fraction)
            .unwrap_or(Ordering::Equal)
            .then(other.unique_day_count.cmp(&self.unique_day_count))
            .then(other.span_days.cmp(&self.span_days))
            .then(self.index.cmp(&other.index))
    }
}

/// Whether a column name contains an identifier-like token.
///
/// Names are split on non-alphanumeric characters, camel-case humps and
/// letter/digit boundaries, so `CustomerID`, `order_num` and `Row #` match
/// while `Paid Date` and `Valid From` do not.
pub fn is_identifier_like(name: &str) -> bool {
    if name.contains('#') {
        return true;
    }
    name_tokens(name)
        .iter()
        .any(|t| IDENTIFIER_TOKENS.contains(&t.as_str()))
}

fn name_tokens(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(prev) = current.chars().last() {
            let next = chars.get(i + 1).copied();
            let hump = prev.is_lowercase() && c.is_uppercase();
            // "IDNumber": split before the 'N' that starts a lowercase run
            let acronym_end = prev.is_uppercase()
                && c.is_uppercase()
                && next.map(|n| n.is_lowercase()).unwrap_or(false);
            let digit_edge = prev.is_ascii_digit() != c.is_ascii_digit();
            if hump || acronym_end || digit_edge {
                tokens.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens.into_iter().map(|t| t.to_lowercase()).collect()
}

/// Score one column, or `None` when it cannot be a date column.
///
/// The identifier-name rule is not applied here so a user-chosen column can
/// still be evaluated.
pub fn evaluate_column(
    table: &Table,
    index: usize,
    options: &DetectionOptions,
) -> Option<DateColumnCandidate> {
    let rows = table.row_count();
    if rows == 0 {
        return None;
    }
    if !numeric_values_are_plausible_epochs(table, index) {
        return None;
    }

    let threshold = options.threshold();
    for strategy in DateStrategy::ordered() {
        let days: Vec<NaiveDate> = table
            .column_values(index)
            .filter_map(|cell| strategy.parse(cell))
            .map(|dt| dt.date())
            .collect();
        let valid_fraction = days.len() as f64 / rows as f64;
        if days.is_empty() || valid_fraction < threshold {
            continue;
        }

        // The accepted strategy decides; garbage years reject the column outright.
        if days.iter().any(|d| !options.year_is_plausible(d.year())) {
            return None;
        }

        let unique: HashSet<NaiveDate> = days.iter().copied().collect();
        let span_days = match (unique.iter().min(), unique.iter().max()) {
            (Some(min), Some(max)) => (*max - *min).num_days(),
            _ => 0,
        };
        return Some(DateColumnCandidate {
            column: table.columns()[index].clone(),
            index,
            valid_fraction,
            unique_day_count: unique.len(),
            span_days,
            strategy,
        });
    }
    None
}

/// A column whose non-null cells are all numbers must look like epoch seconds.
fn numeric_values_are_plausible_epochs(table: &Table, index: usize) -> bool {
    let mut numbers = table
        .column_values(index)
        .filter(|c| !c.is_null())
        .map(|c| match c {
            Cell::Number(n) => Some(*n),
            _ => None,
        })
        .peekable();
    if numbers.peek().is_none() {
        return true;
    }
    let values: Option<Vec<f64>> = numbers.collect();
    match values {
        Some(values) => values
            .iter()
            .all(|v| (EPOCH_SECONDS_MIN..=EPOCH_SECONDS_MAX).contains(v)),
        // Mixed column: out-of-range numbers simply fail to parse.
        None => true,
    }
}

/// All eligible columns, best first.
pub fn rank_candidates(table: &Table, options: &DetectionOptions) -> Vec<DateColumnCandidate> {
    let mut candidates: Vec<DateColumnCandidate> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| !is_identifier_like(name))
        .filter_map(|(idx, _)| evaluate_column(table, idx, options))
        .collect();
    candidates.sort_by(|a, b| a.rank(b));
    candidates
}

/// Pick the best date column, if any. Pure and idempotent.
pub fn detect(table: &Table, options: &DetectionOptions) -> Option<String> {
    let best = rank_candidates(table, options).into_iter().next();
    match &best {
        Some(c) => debug!(
            "Detected date column '{}' ({}, {:.0}% valid, {} days)",
            c.column,
            c.strategy,
            c.valid_fraction * 100.0,
            c.unique_day_count
        ),
        None => debug!("No date column detected in {} columns", table.column_count()),
    }
    best.map(|c| c.column)
}

/// Normalized day for every row of a column.
///
/// Uses the strategy detection would accept; a column that does not reach the
/// threshold (a manual choice) falls back to per-cell inference.
pub fn column_days(table: &Table, index: usize, options: &DetectionOptions) -> Vec<Option<NaiveDate>> {
    let strategy = evaluate_column(table, index, options)
        .map(|c| c.strategy)
        .unwrap_or(DateStrategy::Inferred);
    table
        .column_values(index)
        .map(|cell| strategy.parse(cell).map(|dt| dt.date()))
        .collect()
}
