//! Application state for the HTTP server.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::repository::FullRepository;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Feedback and session storage
    pub repository: Arc<dyn FullRepository>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(repository: Arc<dyn FullRepository>, config: AppConfig) -> Self {
        Self {
            repository,
            config: Arc::new(config),
        }
    }

    /// State with default configuration, for tests and embedding.
    pub fn with_repository(repository: Arc<dyn FullRepository>) -> Self {
        Self::new(repository, AppConfig::default())
    }
}
