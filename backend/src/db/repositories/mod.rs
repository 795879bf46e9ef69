//! Storage backends.
//!
//! - `local`: in-memory store with an optional JSON snapshot file
//! - `postgres`: Diesel-backed store (feature `postgres-repo`)
pub mod local;
#[cfg(feature = "postgres-repo")]
pub mod postgres;

pub use local::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use postgres::{PoolStats, PostgresConfig, PostgresRepository};
