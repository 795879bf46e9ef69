use async_trait::async_trait;

use super::error::RepositoryResult;
use crate::db::models::{Feedback, NewFeedback};

/// Storage for feedback submissions.
///
/// Implementations must be `Send + Sync` so they can sit behind the shared
/// HTTP state.
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Cheap connectivity probe. `Ok(false)` or an error means unhealthy.
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// Persist validated feedback and return it with its assigned id.
    async fn store_feedback(&self, feedback: NewFeedback) -> RepositoryResult<Feedback>;

    /// Feedback ordered newest first, skipping `offset` entries.
    async fn list_feedback(&self, offset: usize, limit: usize) -> RepositoryResult<Vec<Feedback>>;

    async fn count_feedback(&self) -> RepositoryResult<usize>;
}
