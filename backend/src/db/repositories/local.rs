//! In-process feedback and session store.
//!
//! Data lives in memory behind a `parking_lot::RwLock`. When a snapshot path is
//! configured (`DQ_LOCAL_STORE_PATH`) the whole store is loaded from that JSON
//! file on start-up and rewritten after every change, so the fallback survives
//! restarts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::db::models::{Feedback, FeedbackId, NewFeedback, SessionAction, UserSession};
use crate::db::repository::{
    ErrorContext, FeedbackRepository, RepositoryError, RepositoryResult, SessionRepository,
};

/// Environment variable naming the JSON snapshot file.
pub const LOCAL_STORE_PATH_ENV: &str = "DQ_LOCAL_STORE_PATH";

#[derive(Clone, Default)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
    snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalData {
    feedback: Vec<Feedback>,
    sessions: BTreeMap<String, UserSession>,
    next_feedback_id: i64,
    #[serde(skip, default = "healthy")]
    is_healthy: bool,
}

fn healthy() -> bool {
    true
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            feedback: Vec::new(),
            sessions: BTreeMap::new(),
            next_feedback_id: 1,
            is_healthy: true,
        }
    }
}

impl LocalRepository {
    /// Empty store that never touches disk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a JSON snapshot at `path`.
    ///
    /// A missing file starts an empty store; an unreadable one is an error.
    pub fn with_snapshot(path: impl Into<PathBuf>) -> RepositoryResult<Self> {
        let path = path.into();
        let data = if path.exists() {
            let raw = fs::read_to_string(&path).map_err(|e| {
                RepositoryError::internal_with_context(
                    e.to_string(),
                    ErrorContext::new("load_snapshot").with_details(path.display().to_string()),
                )
            })?;
            serde_json::from_str(&raw).map_err(|e| {
                RepositoryError::internal_with_context(
                    format!("Corrupt local store: {}", e),
                    ErrorContext::new("load_snapshot").with_details(path.display().to_string()),
                )
            })?
        } else {
            LocalData::default()
        };
        debug!(
            "Local store loaded from {} ({} feedback, {} sessions)",
            path.display(),
            data.feedback.len(),
            data.sessions.len()
        );
        Ok(Self {
            data: Arc::new(RwLock::new(data)),
            snapshot_path: Some(path),
        })
    }

    /// Snapshot-backed when `DQ_LOCAL_STORE_PATH` is set, in-memory otherwise.
    pub fn from_env() -> RepositoryResult<Self> {
        match std::env::var(LOCAL_STORE_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::with_snapshot(path.trim()),
            _ => Ok(Self::new()),
        }
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Simulate a connection failure (or recovery).
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
    }

    pub fn feedback_count(&self) -> usize {
        self.data.read().feedback.len()
    }

    pub fn session_count(&self) -> usize {
        self.data.read().sessions.len()
    }

    fn check_health(data: &LocalData, operation: &str) -> RepositoryResult<()> {
        if !data.is_healthy {
            return Err(RepositoryError::connection_with_context(
                "Local store is not healthy",
                ErrorContext::new(operation),
            ));
        }
        Ok(())
    }

    /// Apply `change` and save the snapshot. A failed save restores the
    /// previous state, so memory never holds writes the file lacks.
    ///
    /// The save is blocking file I/O under the write lock: snapshots land in
    /// the same order as the writes they record.
    fn commit<T>(
        &self,
        data: &mut LocalData,
        change: impl FnOnce(&mut LocalData) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        let previous = self.snapshot_path.is_some().then(|| data.clone());
        let out = change(data)?;
        if let Err(e) = self.persist(data) {
            if let Some(previous) = previous {
                *data = previous;
            }
            return Err(e);
        }
        Ok(out)
    }

    /// Rewrite the snapshot file; the caller holds the write lock.
    fn persist(&self, data: &LocalData) -> RepositoryResult<()> {
        let Some(path) = self.snapshot_path.as_ref() else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| RepositoryError::internal(format!("Failed to encode store: {}", e)))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, path))
            .map_err(|e| {
                RepositoryError::internal_with_context(
                    e.to_string(),
                    ErrorContext::new("persist_snapshot").with_details(path.display().to_string()),
                )
            })
    }
}

#[async_trait]
impl FeedbackRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn store_feedback(&self, feedback: NewFeedback) -> RepositoryResult<Feedback> {
        let mut data = self.data.write();
        Self::check_health(&data, "store_feedback")?;

        self.commit(&mut data, |d| {
            let stored = feedback.with_id(FeedbackId(d.next_feedback_id));
            d.next_feedback_id += 1;
            d.feedback.push(stored.clone());
            Ok(stored)
        })
    }

    async fn list_feedback(&self, offset: usize, limit: usize) -> RepositoryResult<Vec<Feedback>> {
        let data = self.data.read();
        Self::check_health(&data, "list_feedback")?;

        let mut all: Vec<&Feedback> = data.feedback.iter().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(all
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_feedback(&self) -> RepositoryResult<usize> {
        let data = self.data.read();
        Self::check_health(&data, "count_feedback")?;
        Ok(data.feedback.len())
    }
}

#[async_trait]
impl SessionRepository for LocalRepository {
    async fn start_session(&self, session: UserSession) -> RepositoryResult<UserSession> {
        let mut data = self.data.write();
        Self::check_health(&data, "start_session")?;

        if data.sessions.contains_key(&session.session_id) {
            return Err(RepositoryError::conflict_with_context(
                "Session already exists",
                ErrorContext::new("start_session")
                    .with_entity("session")
                    .with_entity_id(&session.session_id),
            ));
        }
        self.commit(&mut data, |d| {
            d.sessions
                .insert(session.session_id.clone(), session.clone());
            Ok(session)
        })
    }

    async fn get_session(&self, session_id: &str) -> RepositoryResult<Option<UserSession>> {
        let data = self.data.read();
        Self::check_health(&data, "get_session")?;
        Ok(data.sessions.get(session_id).cloned())
    }

    async fn record_action(
        &self,
        session_id: &str,
        action: SessionAction,
    ) -> RepositoryResult<()> {
        let mut data = self.data.write();
        Self::check_health(&data, "record_action")?;

        self.commit(&mut data, |d| {
            let session = d.sessions.get_mut(session_id).ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    "Session not found",
                    ErrorContext::new("record_action")
                        .with_entity("session")
                        .with_entity_id(session_id),
                )
            })?;
            session.actions.push(action);
            Ok(())
        })
    }

    async fn end_session(
        &self,
        session_id: &str,
        end_time: DateTime<Utc>,
    ) -> RepositoryResult<UserSession> {
        let mut data = self.data.write();
        Self::check_health(&data, "end_session")?;

        self.commit(&mut data, |d| {
            let session = d
                .sessions
                .get_mut(session_id)
                .filter(|s| s.is_active())
                .ok_or_else(|| {
                    RepositoryError::not_found_with_context(
                        "Active session not found",
                        ErrorContext::new("end_session")
                            .with_entity("session")
                            .with_entity_id(session_id),
                    )
                })?;
            session.close(end_time);
            Ok(session.clone())
        })
    }

    async fn sessions_started_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<UserSession>> {
        let data = self.data.read();
        Self::check_health(&data, "sessions_started_between")?;
        Ok(data
            .sessions
            .values()
            .filter(|s| s.start_time >= from && s.start_time <= to)
            .cloned()
            .collect())
    }
}
