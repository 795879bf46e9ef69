//! axum HTTP surface: feedback and session tracking backed by the
//! repository, plus stateless quality-review endpoints.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                              │
//! │  - JSON bodies, CORS, gzip, request tracing              │
//! └───────────────┬──────────────────────────┬───────────────┘
//!                 │                          │
//! ┌───────────────▼──────────────┐ ┌─────────▼───────────────┐
//! │ db::services → repository    │ │ services::recompute     │
//! │ (feedback, sessions)         │ │ (pure, spawn_blocking)  │
//! └──────────────────────────────┘ └─────────────────────────┘
//! ```

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::{ApiError, AppError};
pub use router::create_router;
pub use state::AppState;
