//! Quality engine services.
//!
//! Leaves first: [`date_detection`] and [`classifier`] work on a single
//! [`Table`](crate::models::Table), [`aggregation`] folds classified rows into
//! daily buckets, and [`recompute`] ties them together under a
//! [`FilterState`]. The remaining modules derive presentation data from a
//! finished pass.

pub mod aggregation;
pub mod alert;
pub mod classifier;
pub mod date_detection;
pub mod drilldown;
pub mod export;
pub mod profile;
pub mod recompute;

pub use aggregation::{aggregate, kpi_totals};
pub use alert::{error_alert, ErrorRateAlert};
pub use classifier::classify;
pub use date_detection::{detect, DetectionOptions};
pub use drilldown::{detail_metrics, select_rows, DetailMetrics};
pub use export::export_rows_csv;
pub use profile::{profile_table, TableProfile};
pub use recompute::{recompute, resolve_range, FilterState, Recomputation, RecomputeWarning};
