//! Upload profile: shape, missingness and per-column summaries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::{Cell, CellKey, Table};

/// Dominant value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    /// Only nulls.
    Empty,
    Boolean,
    Numeric,
    Date,
    Text,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMissing {
    pub column: String,
    pub missing: usize,
    pub missing_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub column: String,
    pub kind: ColumnKind,
    /// Distinct non-null values.
    pub unique: usize,
    pub missing: usize,
    pub missing_pct: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableProfile {
    pub rows: usize,
    pub columns: usize,
    pub missing_cells: usize,
    /// Rows identical to an earlier row; the first occurrence is not counted.
    pub duplicate_rows: usize,
    /// Sorted by missing share, highest first.
    pub missing_by_column: Vec<ColumnMissing>,
    pub column_profiles: Vec<ColumnProfile>,
}

pub fn profile_table(table: &Table) -> TableProfile {
    let rows = table.row_count();
    let column_profiles: Vec<ColumnProfile> = (0..table.column_count())
        .map(|idx| profile_column(table, idx))
        .collect();

    let mut missing_by_column: Vec<ColumnMissing> = column_profiles
        .iter()
        .map(|p| ColumnMissing {
            column: p.column.clone(),
            missing: p.missing,
            missing_pct: p.missing_pct,
        })
        .collect();
    missing_by_column.sort_by(|a, b| b.missing.cmp(&a.missing));

    let mut seen: HashSet<Vec<CellKey>> = HashSet::with_capacity(rows);
    let duplicate_rows = table
        .rows()
        .iter()
        .filter(|row| !seen.insert(row.iter().map(Cell::key).collect()))
        .count();

    TableProfile {
        rows,
        columns: table.column_count(),
        missing_cells: column_profiles.iter().map(|p| p.missing).sum(),
        duplicate_rows,
        missing_by_column,
        column_profiles,
    }
}

fn profile_column(table: &Table, idx: usize) -> ColumnProfile {
    let rows = table.row_count();
    let mut missing = 0;
    let mut unique: HashSet<CellKey> = HashSet::new();
    let mut kinds: HashSet<ColumnKind> = HashSet::new();
    let mut numbers = Vec::new();

    for cell in table.column_values(idx) {
        if cell.is_null() {
            missing += 1;
            continue;
        }
        unique.insert(cell.key());
        kinds.insert(match cell {
            Cell::Bool(_) => ColumnKind::Boolean,
            Cell::Number(n) => {
                numbers.push(*n);
                ColumnKind::Numeric
            }
            Cell::Date(_) => ColumnKind::Date,
            _ => ColumnKind::Text,
        });
    }

    let kind = match kinds.len() {
        0 => ColumnKind::Empty,
        1 => kinds.into_iter().next().unwrap_or(ColumnKind::Mixed),
        _ => ColumnKind::Mixed,
    };
    let (min, max, mean) = if numbers.is_empty() {
        (None, None, None)
    } else {
        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
        (Some(min), Some(max), Some(mean))
    };

    ColumnProfile {
        column: table.columns()[idx].clone(),
        kind,
        unique: unique.len(),
        missing,
        missing_pct: 100.0 * missing as f64 / rows.max(1) as f64,
        min,
        max,
        mean,
    }
}
