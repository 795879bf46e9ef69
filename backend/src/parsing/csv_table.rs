//! Delimited-text ingestion into a typed [`Table`].

use std::collections::HashSet;

use csv::{ReaderBuilder, StringRecord};
use log::debug;

use crate::error::{QualityError, QualityResult};
use crate::models::{table::is_null_text, Cell, Table};

/// Delimiters considered when none is given, in tie-break order.
pub const CANDIDATE_DELIMITERS: &[u8] = b",;\t|";

/// Parse delimited text into a table.
///
/// The first record is the header. Short records are padded with nulls and
/// long records are truncated to the header width. Invalid UTF-8 is replaced
/// rather than rejected.
pub fn parse_csv(bytes: &[u8], delimiter: Option<u8>) -> QualityResult<Table> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    if text.trim().is_empty() {
        return Err(QualityError::input_shape("the file is empty"));
    }

    let delimiter = delimiter.unwrap_or_else(|| sniff_delimiter(text));
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let header = rdr
        .headers()
        .map_err(|e| QualityError::input_shape(format!("unreadable header: {}", e)))?
        .clone();
    if header.is_empty() {
        return Err(QualityError::input_shape("no header row found"));
    }
    let columns = unique_headers(&header);
    let width = columns.len();

    let mut rows = Vec::new();
    let mut repaired = 0usize;
    for (idx, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| {
            QualityError::input_shape(format!("malformed record {}: {}", idx + 2, e))
        })?;
        if record.len() != width {
            repaired += 1;
        }
        let mut row: Vec<Cell> = record.iter().take(width).map(parse_cell).collect();
        row.resize(width, Cell::Null);
        rows.push(row);
    }

    debug!(
        "Parsed CSV: {} columns, {} rows, delimiter {:?}, {} ragged rows repaired",
        width,
        rows.len(),
        delimiter as char,
        repaired
    );

    Table::new(columns, rows)
}

/// Pick the candidate delimiter occurring most often in the header line,
/// ignoring quoted text. Defaults to a comma.
pub fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut counts = [0usize; 4];
    let mut in_quotes = false;
    for b in header.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(pos) = CANDIDATE_DELIMITERS.iter().position(|&d| d == b) {
            counts[pos] += 1;
        }
    }

    let mut best = 0;
    for (i, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = i;
        }
    }
    if counts[best] == 0 {
        b','
    } else {
        CANDIDATE_DELIMITERS[best]
    }
}

/// Type one raw field.
pub fn parse_cell(raw: &str) -> Cell {
    if is_null_text(raw) {
        return Cell::Null;
    }
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Cell::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Cell::Bool(false);
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Cell::Number(n),
        _ => Cell::Text(trimmed.to_string()),
    }
}

/// Blank names become `Unnamed: <index>`; repeats get `.1`, `.2`, ... suffixes.
fn unique_headers(header: &StringRecord) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(header.len());
    header
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let base = match raw.trim() {
                "" => format!("Unnamed: {}", i),
                name => name.to_string(),
            };
            let mut name = base.clone();
            let mut n = 1;
            while seen.contains(&name) {
                name = format!("{}.{}", base, n);
                n += 1;
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typed_cells() {
        let table = parse_csv(b"id,amount,flag,note\n1,2.5,true,hello\n2,NA,FALSE,\n", None)
            .unwrap();
        assert_eq!(table.columns(), ["id", "amount", "flag", "note"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, 1), &Cell::Number(2.5));
        assert_eq!(table.cell(0, 2), &Cell::Bool(true));
        assert_eq!(table.cell(0, 3), &Cell::Text("hello".into()));
        assert_eq!(table.cell(1, 1), &Cell::Null);
        assert_eq!(table.cell(1, 2), &Cell::Bool(false));
        assert_eq!(table.cell(1, 3), &Cell::Null);
    }

    #[test]
    fn test_sniffs_semicolon_and_tab() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3"), b';');
        assert_eq!(sniff_delimiter("a\tb\n1\t2"), b'\t');
        assert_eq!(sniff_delimiter("\"x,y\";z\n"), b';');
        assert_eq!(sniff_delimiter("single"), b',');

        let table = parse_csv(b"a;b\n1;2\n", None).unwrap();
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn test_explicit_delimiter_overrides_sniffing() {
        let table = parse_csv(b"a,b|c\n1,2|3\n", Some(b'|')).unwrap();
        assert_eq!(table.columns(), ["a,b", "c"]);
    }

    #[test]
    fn test_ragged_rows_are_repaired() {
        let table = parse_csv(b"a,b,c\n1\n1,2,3,4\n", None).unwrap();
        assert_eq!(table.rows()[0], vec![Cell::Number(1.0), Cell::Null, Cell::Null]);
        assert_eq!(
            table.rows()[1],
            vec![Cell::Number(1.0), Cell::Number(2.0), Cell::Number(3.0)]
        );
    }

    #[test]
    fn test_headers_made_unique() {
        let table = parse_csv(b"name,,name,name\n1,2,3,4\n", None).unwrap();
        assert_eq!(table.columns(), ["name", "Unnamed: 1", "name.1", "name.2"]);
    }

    #[test]
    fn test_empty_input_is_input_shape_error() {
        assert!(matches!(parse_csv(b"", None), Err(QualityError::InputShape(_))));
        assert!(matches!(parse_csv(b"  \n\n", None), Err(QualityError::InputShape(_))));
    }

    #[test]
    fn test_header_only_gives_empty_table() {
        let table = parse_csv(b"a,b\n", None).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_count(), 2);
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let table = parse_csv(b"name\ncaf\xe9\n", None).unwrap();
        match table.cell(0, 0) {
            Cell::Text(s) => assert!(s.starts_with("caf")),
            other => panic!("unexpected cell {:?}", other),
        }
    }

    #[test]
    fn test_bom_is_stripped() {
        let table = parse_csv("\u{feff}id,x\n1,2\n".as_bytes(), None).unwrap();
        assert_eq!(table.columns()[0], "id");
    }

    #[test]
    fn test_infinity_text_stays_text() {
        assert_eq!(parse_cell("inf"), Cell::Text("inf".into()));
        assert_eq!(parse_cell(" 42 "), Cell::Number(42.0));
    }
}
