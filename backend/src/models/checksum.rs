//! Content fingerprints for uploaded tables.
//!
//! The recomputation controller stores a table's fingerprint in `FilterState`
//! so it can tell "same table, new filters" apart from "new upload".

use sha2::{Digest, Sha256};

use super::table::Cell;

const FIELD_SEP: u8 = 0x1f;
const RECORD_SEP: u8 = 0x1e;

/// Fingerprint a table's header and cells.
///
/// Each cell is hashed with a type tag so `Text("1")` and `Number(1.0)` differ.
pub fn table_fingerprint(columns: &[String], rows: &[Vec<Cell>]) -> String {
    let mut hasher = Sha256::new();
    for name in columns {
        hasher.update(name.as_bytes());
        hasher.update([FIELD_SEP]);
    }
    hasher.update([RECORD_SEP]);

    for row in rows {
        for cell in row {
            match cell {
                Cell::Null => hasher.update([0u8]),
                Cell::Bool(b) => hasher.update([1u8, *b as u8]),
                Cell::Number(n) => {
                    hasher.update([2u8]);
                    hasher.update(n.to_bits().to_le_bytes());
                }
                Cell::Text(s) => {
                    hasher.update([3u8]);
                    hasher.update(s.as_bytes());
                }
                Cell::Date(dt) => {
                    hasher.update([4u8]);
                    hasher.update(dt.and_utc().timestamp().to_le_bytes());
                }
            }
            hasher.update([FIELD_SEP]);
        }
        hasher.update([RECORD_SEP]);
    }

    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_distinguishes_cell_types() {
        let cols = vec!["a".to_string()];
        let text = vec![vec![Cell::Text("1".into())]];
        let number = vec![vec![Cell::Number(1.0)]];
        assert_ne!(
            table_fingerprint(&cols, &text),
            table_fingerprint(&cols, &number)
        );
    }

    #[test]
    fn test_fingerprint_depends_on_header() {
        let rows = vec![vec![Cell::Null]];
        assert_ne!(
            table_fingerprint(&["a".to_string()], &rows),
            table_fingerprint(&["b".to_string()], &rows)
        );
    }
}
