//! Storage traits for user feedback and usage sessions.
//!
//! - [`error`]: error type shared by every backend
//! - [`feedback`]: feedback submissions
//! - [`session`]: usage sessions and their tracked actions
//!
//! Backends implement both traits and are handed around as
//! `Arc<dyn FullRepository>`:
//!
//! ```ignore
//! async fn record_upload<R: FullRepository + ?Sized>(repo: &R, id: &str) -> RepositoryResult<()> {
//!     repo.record_action(id, action).await
//! }
//! ```

pub mod error;
pub mod feedback;
pub mod session;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};
pub use feedback::FeedbackRepository;
pub use session::SessionRepository;

/// Every storage capability the HTTP layer needs.
pub trait FullRepository: FeedbackRepository + SessionRepository {}

impl<T> FullRepository for T where T: FeedbackRepository + SessionRepository {}
