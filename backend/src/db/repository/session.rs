use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::error::RepositoryResult;
use crate::db::models::{SessionAction, UserSession};

/// Storage for usage sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session.
    ///
    /// Fails with `Conflict` when the id is already taken.
    async fn start_session(&self, session: UserSession) -> RepositoryResult<UserSession>;

    async fn get_session(&self, session_id: &str) -> RepositoryResult<Option<UserSession>>;

    /// Append an action to a session.
    ///
    /// Fails with `NotFound` when the session does not exist. Actions on ended
    /// sessions are still recorded.
    async fn record_action(&self, session_id: &str, action: SessionAction)
        -> RepositoryResult<()>;

    /// Close an active session and store its duration.
    ///
    /// Fails with `NotFound` when the session is unknown or already ended.
    async fn end_session(
        &self,
        session_id: &str,
        end_time: DateTime<Utc>,
    ) -> RepositoryResult<UserSession>;

    /// Sessions whose start time lies in `[from, to]`.
    async fn sessions_started_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<UserSession>>;
}
