//! Row classification: duplicate beats missing beats valid.

use std::collections::{HashMap, HashSet};

use crate::models::{
    CellKey, ClassifiedRow, DuplicateMode, RowIssue, RowStatus, StatusCounts, Table,
};
use crate::services::date_detection::is_identifier_like;

/// Default duplicate key: the first identifier-looking column, else the first
/// column. `AllColumns` for a table without columns.
pub fn default_duplicate_mode(table: &Table) -> DuplicateMode {
    table
        .columns()
        .iter()
        .find(|name| is_identifier_like(name))
        .or_else(|| table.columns().first())
        .map(|name| DuplicateMode::ByKeyColumn(name.clone()))
        .unwrap_or(DuplicateMode::AllColumns)
}

/// The mode that will actually be used: a key column absent from the table
/// falls back to `AllColumns`.
pub fn effective_duplicate_mode(table: &Table, requested: &DuplicateMode) -> DuplicateMode {
    match requested {
        DuplicateMode::ByKeyColumn(key) if !table.has_column(key) => DuplicateMode::AllColumns,
        other => other.clone(),
    }
}

/// `true` for every row that has at least one other row with the same key.
/// Every member of a duplicate group is marked, not only later occurrences.
pub fn duplicate_mask(table: &Table, mode: &DuplicateMode) -> Vec<bool> {
    let key_index = match mode {
        DuplicateMode::ByKeyColumn(key) => table.column_index(key),
        DuplicateMode::AllColumns => None,
    };
    let keys: Vec<Vec<CellKey>> = table
        .rows()
        .iter()
        .map(|row| match key_index {
            Some(idx) => vec![row[idx].key()],
            None => row.iter().map(|c| c.key()).collect(),
        })
        .collect();

    let mut counts: HashMap<&[CellKey], usize> = HashMap::with_capacity(keys.len());
    for key in &keys {
        *counts.entry(key.as_slice()).or_insert(0) += 1;
    }
    keys.iter()
        .map(|key| counts.get(key.as_slice()).copied().unwrap_or(0) > 1)
        .collect()
}

/// Indexes of the quality columns in declared table order.
///
/// Unknown names are ignored; an empty (or entirely unknown) selection means
/// every column.
pub fn quality_column_indexes(table: &Table, quality_columns: &[String]) -> Vec<usize> {
    let wanted: HashSet<&str> = quality_columns.iter().map(String::as_str).collect();
    let selected: Vec<usize> = table
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, name)| wanted.contains(name.as_str()))
        .map(|(idx, _)| idx)
        .collect();
    if selected.is_empty() {
        (0..table.column_count()).collect()
    } else {
        selected
    }
}

/// Classify every row, in input order.
pub fn classify(
    table: &Table,
    quality_columns: &[String],
    duplicate_mode: &DuplicateMode,
) -> Vec<ClassifiedRow> {
    let duplicates = duplicate_mask(table, duplicate_mode);
    let quality = quality_column_indexes(table, quality_columns);

    table
        .rows()
        .iter()
        .zip(duplicates)
        .enumerate()
        .map(|(row_index, (row, is_duplicate))| {
            let first_missing_column = quality
                .iter()
                .find(|&&idx| row[idx].is_null())
                .map(|&idx| table.columns()[idx].clone());

            let issue = if is_duplicate {
                RowIssue::Duplicate
            } else if first_missing_column.is_some() {
                RowIssue::Missing
            } else {
                RowIssue::Ok
            };

            ClassifiedRow {
                row_index,
                status: issue.status(),
                issue,
                first_missing_column,
            }
        })
        .collect()
}

/// Tally statuses of a classified set.
pub fn count_statuses(rows: &[ClassifiedRow]) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for row in rows {
        counts.record(row.status);
    }
    counts
}

/// Whether a row would be flagged by the given status filter.
pub fn matches_status(row: &ClassifiedRow, status: Option<RowStatus>) -> bool {
    status.map(|s| row.status == s).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use proptest::prelude::*;

    fn table(columns: &[&str], rows: Vec<Vec<Cell>>) -> Table {
        Table::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    fn n(v: f64) -> Cell {
        Cell::Number(v)
    }

    fn t(s: &str) -> Cell {
        Cell::text(s)
    }

    #[test]
    fn test_duplicate_outranks_missing() {
        let tbl = table(
            &["ID", "Amount"],
            vec![
                vec![n(1.0), n(10.0)],
                vec![n(1.0), Cell::Null],
                vec![n(2.0), Cell::Null],
                vec![n(3.0), n(5.0)],
            ],
        );
        let rows = classify(&tbl, &[], &DuplicateMode::ByKeyColumn("ID".into()));
        let statuses: Vec<RowStatus> = rows.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![RowStatus::Error, RowStatus::Error, RowStatus::Warning, RowStatus::Valid]
        );
        assert_eq!(rows[1].issue, RowIssue::Duplicate);
        // Missing column is still recorded on a duplicate row.
        assert_eq!(rows[1].first_missing_column.as_deref(), Some("Amount"));
        assert_eq!(rows[2].first_missing_column.as_deref(), Some("Amount"));
        assert_eq!(rows[3].first_missing_column, None);
    }

    #[test]
    fn test_all_columns_mode_requires_full_row_match() {
        let tbl = table(
            &["a", "b"],
            vec![
                vec![n(1.0), t("x")],
                vec![n(1.0), t("y")],
                vec![n(1.0), t("x")],
            ],
        );
        let mask = duplicate_mask(&tbl, &DuplicateMode::AllColumns);
        assert_eq!(mask, vec![true, false, true]);
    }

    #[test]
    fn test_null_keys_are_duplicates_of_each_other() {
        let tbl = table(
            &["key", "v"],
            vec![vec![Cell::Null, n(1.0)], vec![Cell::Null, n(2.0)], vec![n(1.0), n(3.0)]],
        );
        let mask = duplicate_mask(&tbl, &DuplicateMode::ByKeyColumn("key".into()));
        assert_eq!(mask, vec![true, true, false]);
    }

    #[test]
    fn test_missing_key_column_falls_back_to_all_columns() {
        let tbl = table(
            &["a", "b"],
            vec![vec![n(1.0), n(2.0)], vec![n(1.0), n(2.0)], vec![n(1.0), n(3.0)]],
        );
        let requested = DuplicateMode::ByKeyColumn("missing".into());
        assert_eq!(effective_duplicate_mode(&tbl, &requested), DuplicateMode::AllColumns);
        assert_eq!(
            classify(&tbl, &[], &requested),
            classify(&tbl, &[], &DuplicateMode::AllColumns)
        );
    }

    #[test]
    fn test_quality_columns_limit_missing_check() {
        let tbl = table(
            &["a", "b", "c"],
            vec![vec![n(1.0), Cell::Null, Cell::Null], vec![n(2.0), n(1.0), Cell::Null]],
        );
        let only_a = classify(&tbl, &["a".to_string()], &DuplicateMode::AllColumns);
        assert!(only_a.iter().all(|r| r.status == RowStatus::Valid));

        // Declared order decides, not selection order.
        let cb = classify(
            &tbl,
            &["c".to_string(), "b".to_string()],
            &DuplicateMode::AllColumns,
        );
        assert_eq!(cb[0].first_missing_column.as_deref(), Some("b"));
        assert_eq!(cb[1].first_missing_column.as_deref(), Some("c"));
    }

    #[test]
    fn test_unknown_quality_columns_mean_all() {
        let tbl = table(&["a", "b"], vec![vec![n(1.0), Cell::Null]]);
        let rows = classify(&tbl, &["zzz".to_string()], &DuplicateMode::AllColumns);
        assert_eq!(rows[0].status, RowStatus::Warning);
    }

    #[test]
    fn test_default_duplicate_mode_guess() {
        let with_id = table(&["name", "CustomerID"], vec![]);
        assert_eq!(
            default_duplicate_mode(&with_id),
            DuplicateMode::ByKeyColumn("CustomerID".into())
        );
        let without = table(&["name", "amount"], vec![]);
        assert_eq!(
            default_duplicate_mode(&without),
            DuplicateMode::ByKeyColumn("name".into())
        );
    }

    #[test]
    fn test_zero_rows() {
        let tbl = table(&["a"], vec![]);
        assert!(classify(&tbl, &[], &DuplicateMode::AllColumns).is_empty());
    }

    fn arb_cell() -> impl Strategy<Value = Cell> {
        prop_oneof![
            Just(Cell::Null),
            (0i32..4).prop_map(|v| Cell::Number(v as f64)),
            "[ab]".prop_map(Cell::Text),
        ]
    }

    fn arb_table() -> impl Strategy<Value = Table> {
        (1usize..4).prop_flat_map(|width| {
            prop::collection::vec(prop::collection::vec(arb_cell(), width), 0..25).prop_map(
                move |rows| {
                    let columns = (0..width).map(|i| format!("c{}", i)).collect();
                    Table::new(columns, rows).unwrap()
                },
            )
        })
    }

    proptest! {
        #[test]
        fn prop_every_row_classified_once_and_deterministic(tbl in arb_table()) {
            let mode = DuplicateMode::ByKeyColumn("c0".into());
            let first = classify(&tbl, &[], &mode);
            prop_assert_eq!(first.len(), tbl.row_count());
            for (i, row) in first.iter().enumerate() {
                prop_assert_eq!(row.row_index, i);
            }
            prop_assert_eq!(first, classify(&tbl, &[], &mode));
        }

        #[test]
        fn prop_duplicates_are_always_errors(tbl in arb_table()) {
            let mask = duplicate_mask(&tbl, &DuplicateMode::AllColumns);
            let rows = classify(&tbl, &[], &DuplicateMode::AllColumns);
            for (row, dup) in rows.iter().zip(mask) {
                prop_assert_eq!(dup, row.status == RowStatus::Error);
                if !dup && row.first_missing_column.is_some() {
                    prop_assert_eq!(row.status, RowStatus::Warning);
                }
            }
        }

        #[test]
        fn prop_counts_sum_to_rows(tbl in arb_table()) {
            let rows = classify(&tbl, &[], &DuplicateMode::AllColumns);
            prop_assert_eq!(count_statuses(&rows).total(), tbl.row_count());
        }
    }
}
