//! Postgres storage for feedback and sessions using Diesel.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Embedded migrations run at start-up
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel::sql_types::{Jsonb, Text};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;

use crate::db::models::{Feedback, NewFeedback, SessionAction, UserSession};
use crate::db::repository::{
    ErrorContext, FeedbackRepository, RepositoryError, RepositoryResult, SessionRepository,
};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub database_url: String,
    pub max_pool_size: u32,
    pub min_pool_size: u32,
    pub connection_timeout_sec: u64,
    pub idle_timeout_sec: u64,
    /// Retries for transient failures.
    pub max_retries: u32,
    /// First retry delay; doubles on each attempt.
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Read the connection settings listed in the module docs.
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;
        let defaults = Self::default();

        Ok(Self {
            database_url,
            max_pool_size: env_or("PG_POOL_MAX", defaults.max_pool_size),
            min_pool_size: env_or("PG_POOL_MIN", defaults.min_pool_size),
            connection_timeout_sec: env_or("PG_CONN_TIMEOUT_SEC", defaults.connection_timeout_sec),
            idle_timeout_sec: env_or("PG_IDLE_TIMEOUT_SEC", defaults.idle_timeout_sec),
            max_retries: env_or("PG_MAX_RETRIES", defaults.max_retries),
            retry_delay_ms: env_or("PG_RETRY_DELAY_MS", defaults.retry_delay_ms),
        })
    }

    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool state and query counters.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub connections_in_use: u32,
    pub idle_connections: u32,
    pub total_connections: u32,
    pub max_size: u32,
    pub total_queries: u64,
    pub failed_queries: u64,
    pub retried_operations: u64,
}

#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    total_queries: Arc<AtomicU64>,
    failed_queries: Arc<AtomicU64>,
    retried_operations: Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Build the pool and run pending migrations.
    ///
    /// Blocks while connecting; call it from `spawn_blocking` inside a runtime.
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true)
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
                RepositoryError::internal_with_context(
                    format!("Migration failed: {}", e),
                    ErrorContext::new("run_migrations"),
                )
            })?;
        }

        Ok(Self {
            pool,
            config,
            total_queries: Arc::new(AtomicU64::new(0)),
            failed_queries: Arc::new(AtomicU64::new(0)),
            retried_operations: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Run `f` on a pooled connection off the async runtime, retrying
    /// retryable failures with exponential backoff.
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2;
                }

                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1)),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }
}

fn session_not_found(operation: &str, session_id: &str, message: &str) -> RepositoryError {
    RepositoryError::not_found_with_context(
        message,
        ErrorContext::new(operation)
            .with_entity("session")
            .with_entity_id(session_id),
    )
}

#[async_trait]
impl FeedbackRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(RepositoryError::from)
        })
        .await
    }

    async fn store_feedback(&self, feedback: NewFeedback) -> RepositoryResult<Feedback> {
        let row = NewFeedbackRow::from(feedback);
        self.with_conn(move |conn| {
            diesel::insert_into(feedback_entries::table)
                .values(&row)
                .returning(FeedbackRow::as_returning())
                .get_result(conn)
                .map(FeedbackRow::into_feedback)
                .map_err(|e| RepositoryError::from(e).with_operation("store_feedback"))
        })
        .await
    }

    async fn list_feedback(&self, offset: usize, limit: usize) -> RepositoryResult<Vec<Feedback>> {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let rows: Vec<FeedbackRow> = feedback_entries::table
                .order((
                    feedback_entries::submitted_at.desc(),
                    feedback_entries::id.desc(),
                ))
                .offset(offset)
                .limit(limit)
                .select(FeedbackRow::as_select())
                .load(conn)
                .map_err(RepositoryError::from)?;
            Ok(rows.into_iter().map(FeedbackRow::into_feedback).collect())
        })
        .await
    }

    async fn count_feedback(&self) -> RepositoryResult<usize> {
        self.with_conn(|conn| {
            let n: i64 = feedback_entries::table
                .count()
                .get_result(conn)
                .map_err(RepositoryError::from)?;
            Ok(usize::try_from(n).unwrap_or(0))
        })
        .await
    }
}

#[async_trait]
impl SessionRepository for PostgresRepository {
    async fn start_session(&self, session: UserSession) -> RepositoryResult<UserSession> {
        let row = NewSessionRow::from_session(&session)?;
        self.with_conn(move |conn| {
            diesel::insert_into(user_sessions::table)
                .values(&row)
                .execute(conn)
                .map_err(|e| match RepositoryError::from(e) {
                    RepositoryError::Conflict { .. } => RepositoryError::conflict_with_context(
                        "Session already exists",
                        ErrorContext::new("start_session")
                            .with_entity("session")
                            .with_entity_id(&row.session_id),
                    ),
                    other => other.with_operation("start_session"),
                })
        })
        .await?;
        Ok(session)
    }

    async fn get_session(&self, session_id: &str) -> RepositoryResult<Option<UserSession>> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            user_sessions::table
                .find(&session_id)
                .select(SessionRow::as_select())
                .first::<SessionRow>(conn)
                .optional()
                .map_err(RepositoryError::from)?
                .map(SessionRow::into_session)
                .transpose()
        })
        .await
    }

    async fn record_action(
        &self,
        session_id: &str,
        action: SessionAction,
    ) -> RepositoryResult<()> {
        let session_id = session_id.to_string();
        let appended = serde_json::to_value(vec![action])
            .map_err(|e| RepositoryError::internal(format!("Failed to encode action: {}", e)))?;
        self.with_conn(move |conn| {
            let updated = sql_query(
                "UPDATE user_sessions \
                 SET actions = actions || $1, action_count = action_count + 1 \
                 WHERE session_id = $2",
            )
            .bind::<Jsonb, _>(&appended)
            .bind::<Text, _>(&session_id)
            .execute(conn)
            .map_err(RepositoryError::from)?;
            if updated == 0 {
                return Err(session_not_found(
                    "record_action",
                    &session_id,
                    "Session not found",
                ));
            }
            Ok(())
        })
        .await
    }

    async fn end_session(
        &self,
        session_id: &str,
        end_time: DateTime<Utc>,
    ) -> RepositoryResult<UserSession> {
        let session_id = session_id.to_string();
        self.with_conn(move |conn| {
            conn.transaction(|tx| {
                let row = user_sessions::table
                    .find(&session_id)
                    .filter(user_sessions::end_time.is_null())
                    .for_update()
                    .select(SessionRow::as_select())
                    .first::<SessionRow>(tx)
                    .optional()
                    .map_err(RepositoryError::from)?
                    .ok_or_else(|| {
                        session_not_found("end_session", &session_id, "Active session not found")
                    })?;

                let mut session = row.into_session()?;
                session.close(end_time);

                diesel::update(user_sessions::table.find(&session_id))
                    .set((
                        user_sessions::end_time.eq(session.end_time),
                        user_sessions::duration_minutes.eq(session.duration_minutes),
                    ))
                    .execute(tx)
                    .map_err(RepositoryError::from)?;
                Ok(session)
            })
        })
        .await
    }

    async fn sessions_started_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<UserSession>> {
        self.with_conn(move |conn| {
            let rows: Vec<SessionRow> = user_sessions::table
                .filter(user_sessions::start_time.ge(from))
                .filter(user_sessions::start_time.le(to))
                .select(SessionRow::as_select())
                .load(conn)
                .map_err(RepositoryError::from)?;
            rows.into_iter().map(SessionRow::into_session).collect()
        })
        .await
    }
}
