//! Feedback and usage-session storage.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  HTTP handlers                               │
//! └───────────────────┬──────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────┐
//! │  services.rs: validation, ids, analytics     │
//! └───────────────────┬──────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────┐
//! │  repository/: FeedbackRepository,            │
//! │               SessionRepository              │
//! └───────────────────┬──────────────────────────┘
//!          ┌──────────┴───────────┐
//! ┌────────▼─────────┐   ┌────────▼──────────────┐
//! │ Postgres (Diesel)│   │ Local (memory + JSON) │
//! └──────────────────┘   └───────────────────────┘
//! ```
//!
//! The backend is picked once per process by [`init_repository`]. When
//! Postgres is selected but cannot be reached, the local store is used
//! instead so that feedback keeps working.

#[cfg(not(any(feature = "postgres-repo", feature = "local-repo")))]
compile_error!("Enable at least one repository backend feature.");

pub mod factory;
pub mod models;
pub mod repo_config;
pub mod repositories;
pub mod repository;
pub mod services;

#[cfg(feature = "postgres-repo")]
pub use repositories::postgres::{PoolStats, PostgresConfig};

pub use factory::{RepositoryBuilder, RepositoryFactory, RepositoryType};
pub use models::{
    Feedback, FeedbackId, FeedbackPage, NewFeedback, SessionAction, SessionAnalytics, UserSession,
};
pub use repo_config::RepositoryConfig;
pub use repositories::LocalRepository;
#[cfg(feature = "postgres-repo")]
pub use repositories::PostgresRepository;
pub use repository::{
    ErrorContext, FeedbackRepository, FullRepository, RepositoryError, RepositoryResult,
    SessionRepository,
};
pub use services::FeedbackSubmission;

use anyhow::{Context, Result};
use std::sync::{Arc, OnceLock};

static REPOSITORY: OnceLock<Arc<dyn FullRepository>> = OnceLock::new();

/// Select and initialise the process-wide repository.
///
/// Calling it again after a successful initialisation is a no-op.
pub async fn init_repository() -> Result<()> {
    if REPOSITORY.get().is_some() {
        return Ok(());
    }

    let repo = RepositoryFactory::from_env_with_fallback()
        .await
        .context("Failed to initialise repository")?;
    let _ = REPOSITORY.set(repo);
    Ok(())
}

/// The repository set up by [`init_repository`].
pub fn get_repository() -> Result<&'static Arc<dyn FullRepository>> {
    REPOSITORY
        .get()
        .context("Repository not initialized. Call init_repository() first.")
}
