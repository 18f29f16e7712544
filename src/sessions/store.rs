//! Session storage seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::sessions::progress::{ProgressUpdate, ScenarioProgress};
use crate::sessions::types::{ChatMessage, ChatSession, ForkPlan, NewMessage, NewSession};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persistence for chat sessions, their messages and scenario progress.
///
/// `fork_session` and `update_progress` must be atomic: a failure leaves no
/// partial copy and no half-applied update.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Prepare tables. Idempotent.
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Sessions owned by `user_id`, most recently updated first.
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, StoreError>;

    async fn create_session(&self, new: NewSession) -> Result<ChatSession, StoreError>;

    async fn get_session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError>;

    /// Messages of a session, oldest first.
    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, StoreError>;

    /// Append a message and bump the session's `updated_at`.
    async fn append_message(&self, session_id: Uuid, message: NewMessage) -> Result<ChatMessage, StoreError>;

    /// Copy a session and all of its messages as one unit.
    /// Returns the new session and the number of messages copied.
    async fn fork_session(&self, plan: ForkPlan) -> Result<(ChatSession, u64), StoreError>;

    /// Merge a progress update under the session's lock.
    async fn update_progress(
        &self,
        session_id: Uuid,
        update: ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Result<ScenarioProgress, StoreError>;

    async fn clear_progress(&self, session_id: Uuid) -> Result<(), StoreError>;
}
