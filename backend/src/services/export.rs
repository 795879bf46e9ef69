//! CSV export of classified rows.

use anyhow::{Context, Result};
use csv::WriterBuilder;

use crate::models::ReviewRow;

/// Columns appended after the table's own columns.
pub const EXPORT_EXTRA_COLUMNS: &[&str] = &["status", "issue", "column", "date", "record_id"];

/// Write rows as CSV: the original cells in `column_order`, then status,
/// issue, first missing column, day and record id.
pub fn export_rows_csv<'a, I>(column_order: &[String], rows: I) -> Result<String>
where
    I: IntoIterator<Item = &'a ReviewRow>,
{
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    let header = column_order
        .iter()
        .map(String::as_str)
        .chain(EXPORT_EXTRA_COLUMNS.iter().copied());
    writer
        .write_record(header)
        .context("Failed to write CSV header")?;

    for row in rows {
        let mut record: Vec<String> = row.values.iter().map(|c| c.display()).collect();
        record.push(row.status().to_string());
        record.push(row.issue().as_str().to_string());
        record.push(
            row.classification
                .first_missing_column
                .clone()
                .unwrap_or_default(),
        );
        record.push(row.date.map(|d| d.to_string()).unwrap_or_default());
        record.push(row.record_id.to_string());
        writer
            .write_record(&record)
            .with_context(|| format!("Failed to write record {}", row.record_id))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV export: {}", e))?;
    String::from_utf8(bytes).context("CSV export is not valid UTF-8")
}
