//! # Data-quality review engine
//!
//! Classifies every row of an uploaded table as valid, warning (missing
//! values) or error (duplicates), rolls the results up into a daily
//! data-quality series, and recomputes the whole view atomically whenever a
//! filter changes.
//!
//! ## Architecture
//!
//! - [`models`]: tables, cells and the classification/aggregation types
//! - [`parsing`]: CSV ingestion and date parsing strategies
//! - [`services`]: date detection, classification, aggregation and the
//!   recomputation controller, plus profile, alert, drill-down and export
//! - [`db`]: feedback and usage-session storage (local or Postgres)
//! - [`http`]: axum REST API (feature `http-server`)
//! - [`config`]: server and quality defaults from TOML and the environment
//!
//! ```no_run
//! use chrono::Utc;
//! use dq_review::{parsing::parse_csv, services::{recompute, FilterState}};
//!
//! let table = parse_csv(b"id,date,email\n1,2024-01-01,a@x\n1,2024-01-01,\n", None)?;
//! let pass = recompute(&table, FilterState::default(), Utc::now().date_naive())?;
//! println!("dq score {:.1}", pass.kpi_totals.dq_score);
//! # Ok::<(), dq_review::error::QualityError>(())
//! ```

// RepositoryError carries an ErrorContext
#![allow(clippy::result_large_err)]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod parsing;
pub mod services;

#[cfg(feature = "http-server")]
pub mod http;

pub use error::{QualityError, QualityResult};
