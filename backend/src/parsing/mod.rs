//! Turning raw uploads and raw cells into typed values.

pub mod csv_table;
pub mod dates;

pub use csv_table::{parse_csv, sniff_delimiter};
pub use dates::DateStrategy;
