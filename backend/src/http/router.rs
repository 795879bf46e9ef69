//! Router configuration for the HTTP API.
//!
//! ```text
//! GET  /health
//! POST /api/feedback            GET /api/feedback?page=&limit=
//! POST /api/session/start       POST /api/session/action
//! POST /api/session/end         GET  /api/analytics?days=
//! POST /api/quality/analyze     POST /api/quality/profile
//! POST /api/quality/export
//! ```

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // Permissive CORS; the dashboard is served from a different origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route(
            "/feedback",
            post(handlers::submit_feedback).get(handlers::list_feedback),
        )
        .route("/session/start", post(handlers::start_session))
        .route("/session/action", post(handlers::track_action))
        .route("/session/end", post(handlers::end_session))
        .route("/analytics", get(handlers::session_analytics))
        .route("/quality/analyze", post(handlers::analyze_quality))
        .route("/quality/profile", post(handlers::profile_upload))
        .route("/quality/export", post(handlers::export_quality));

    let body_limit = state.config.max_upload_bytes();

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CompressionLayer::new()),
        )
        .with_state(state)
}
