//! The in-memory table every analysis runs over.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::checksum::table_fingerprint;
use crate::error::{QualityError, QualityResult};

/// Text spellings ingested as [`Cell::Null`].
pub const NULL_SPELLINGS: &[&str] = &["NA", "N/A", "null", "NULL", "NaN", "nan", "None", "#N/A"];

/// Display format for date cells.
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single typed table value.
///
/// Serialized as a plain JSON scalar: dates become strings, non-finite
/// numbers become `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Cell {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
}

impl Cell {
    /// Build a text cell, mapping blank text and null spellings to `Null`.
    pub fn text(raw: &str) -> Self {
        if is_null_text(raw) {
            Cell::Null
        } else {
            Cell::Text(raw.to_string())
        }
    }

    /// `NaN` numbers count as missing, like blank text does.
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    /// Hashable identity used for duplicate detection. Two nulls compare equal.
    pub fn key(&self) -> CellKey {
        match self {
            Cell::Null => CellKey::Null,
            Cell::Number(n) if n.is_nan() => CellKey::Null,
            Cell::Bool(b) => CellKey::Bool(*b),
            // -0.0 and 0.0 are the same value.
            Cell::Number(n) => CellKey::Number((n + 0.0).to_bits()),
            Cell::Text(s) => CellKey::Text(s.clone()),
            Cell::Date(dt) => CellKey::Date(*dt),
        }
    }

    /// Render the cell the way it appears in exports.
    pub fn display(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Bool(b) => b.to_string(),
            Cell::Number(n) => format_number(*n),
            Cell::Text(s) => s.clone(),
            Cell::Date(dt) => dt.format(DATE_TIME_FORMAT).to_string(),
        }
    }
}

pub fn is_null_text(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || NULL_SPELLINGS.contains(&trimmed)
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        String::new()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Equality key for a [`Cell`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Null,
    Bool(bool),
    Number(u64),
    Text(String),
    Date(NaiveDateTime),
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(b),
            Value::Number(n) => n.as_f64().map(Cell::Number).unwrap_or(Cell::Null),
            Value::String(s) => Cell::text(&s),
            other => Cell::Text(other.to_string()),
        }
    }
}

impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Null => Value::Null,
            Cell::Bool(b) => Value::Bool(b),
            Cell::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Cell::Text(s) => Value::String(s),
            Cell::Date(dt) => Value::String(dt.format(DATE_TIME_FORMAT).to_string()),
        }
    }
}

/// Ordered, uniquely named columns and rows of cells. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Build a table, checking that names are unique and every row has one
    /// cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> QualityResult<Self> {
        if columns.is_empty() {
            return Err(QualityError::input_shape("table has no columns"));
        }

        let mut seen = HashSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(QualityError::input_shape(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
        }

        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(QualityError::input_shape(format!(
                "row {} has {} values, expected {}",
                idx + 1,
                row.len(),
                columns.len()
            )));
        }

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        &self.rows[row][column]
    }

    /// Iterate one column top to bottom.
    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[column])
    }

    /// Content hash of header and cells.
    pub fn fingerprint(&self) -> String {
        table_fingerprint(&self.columns, &self.rows)
    }
}

/// Wire shape accepted for tables: rows may be positional arrays or objects
/// keyed by column name (absent keys are null).
#[derive(Debug, Deserialize)]
struct RawTable {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<RawRow>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRow {
    Positional(Vec<Cell>),
    Named(Map<String, Value>),
}

impl TryFrom<RawTable> for Table {
    type Error = QualityError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        let columns = raw.columns;
        let rows = raw
            .rows
            .into_iter()
            .map(|row| match row {
                RawRow::Positional(cells) => cells,
                RawRow::Named(mut map) => columns
                    .iter()
                    .map(|name| map.remove(name).map(Cell::from).unwrap_or(Cell::Null))
                    .collect(),
            })
            .collect();
        Table::new(columns, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_spellings_become_null() {
        for raw in ["", "   ", "NA", "N/A", "null", "NaN", "#N/A", " None "] {
            assert_eq!(Cell::text(raw), Cell::Null, "{raw:?}");
        }
        assert_eq!(Cell::text("n/a!"), Cell::Text("n/a!".into()));
    }

    #[test]
    fn test_nan_number_is_null_and_keys_equal() {
        assert!(Cell::Number(f64::NAN).is_null());
        assert_eq!(Cell::Number(f64::NAN).key(), Cell::Null.key());
        assert_eq!(Cell::Number(-0.0).key(), Cell::Number(0.0).key());
    }

    #[test]
    fn test_new_rejects_duplicate_columns_and_ragged_rows() {
        let dup = Table::new(vec!["a".into(), "a".into()], vec![]);
        assert!(matches!(dup, Err(QualityError::InputShape(_))));

        let ragged = Table::new(vec!["a".into(), "b".into()], vec![vec![Cell::Null]]);
        assert!(matches!(ragged, Err(QualityError::InputShape(_))));
    }

    #[test]
    fn test_deserialize_named_and_positional_rows() {
        let table: Table = serde_json::from_value(json!({
            "columns": ["id", "amount"],
            "rows": [
                [1, "x"],
                {"id": 2},
                {"amount": "NA", "id": 3}
            ]
        }))
        .unwrap();

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.cell(0, 1), &Cell::Text("x".into()));
        assert_eq!(table.cell(1, 1), &Cell::Null);
        assert_eq!(table.cell(2, 0), &Cell::Number(3.0));
        assert!(table.cell(2, 1).is_null());
    }

    #[test]
    fn test_deserialize_rejects_ragged_positional_row() {
        let result: Result<Table, _> = serde_json::from_value(json!({
            "columns": ["a", "b"],
            "rows": [[1]]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_cell_serializes_as_scalar() {
        let dt = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let value = serde_json::to_value(vec![
            Cell::Null,
            Cell::Number(2.5),
            Cell::Number(f64::INFINITY),
            Cell::Date(dt),
        ])
        .unwrap();
        assert_eq!(value, json!([null, 2.5, null, "2024-01-02 00:00:00"]));
    }

    #[test]
    fn test_display_formats_integers_without_fraction() {
        assert_eq!(Cell::Number(42.0).display(), "42");
        assert_eq!(Cell::Number(1.5).display(), "1.5");
        assert_eq!(Cell::Null.display(), "");
    }
}
