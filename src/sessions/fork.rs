//! Session forking.
//!
//! A fork gives another user a private copy of a session: its own vector
//! store, and every message carried over with its original timestamp.
//! The vector store is created before the copy; when the copy fails it is
//! deleted again.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::VectorStoreProvisioner;
use crate::http::ErrorEnvelope;
use crate::observability::metrics;
use crate::proxy::ProxyError;
use crate::sessions::store::{SessionStore, StoreError};
use crate::sessions::types::{ChatSession, ForkPlan, Visibility};

#[derive(Debug, Error)]
pub enum ForkError {
    #[error("Session not found")]
    NotFound,

    #[error("Cannot fork your own session")]
    OwnSession,

    #[error("Public sessions cannot be forked")]
    PublicSession,

    #[error("Failed to create vector store: {0}")]
    VectorStore(#[source] ProxyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ForkError {
    fn outcome(&self) -> &'static str {
        match self {
            ForkError::NotFound => "not_found",
            ForkError::OwnSession | ForkError::PublicSession => "rejected",
            ForkError::VectorStore(_) => "vector_store_error",
            ForkError::Store(_) => "store_error",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            ForkError::NotFound => ErrorEnvelope::new(StatusCode::NOT_FOUND, self.to_string()),
            ForkError::OwnSession | ForkError::PublicSession => {
                ErrorEnvelope::new(StatusCode::BAD_REQUEST, self.to_string())
            }
            ForkError::VectorStore(e) => {
                ErrorEnvelope::new(StatusCode::BAD_GATEWAY, "Failed to create vector store").with_details(e.to_string())
            }
            ForkError::Store(e) => {
                ErrorEnvelope::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fork session").with_details(e.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkOutcome {
    pub session: ChatSession,
    pub messages_copied: u64,
}

/// Reject forks of one's own sessions and of public sessions.
pub fn check_forkable(session: &ChatSession, requester: &str) -> Result<(), ForkError> {
    if session.user_id == requester {
        return Err(ForkError::OwnSession);
    }
    if session.visibility == Visibility::Public || session.is_public {
        return Err(ForkError::PublicSession);
    }
    Ok(())
}

pub struct ForkService {
    store: Arc<dyn SessionStore>,
    vector_stores: Arc<dyn VectorStoreProvisioner>,
}

impl ForkService {
    pub fn new(store: Arc<dyn SessionStore>, vector_stores: Arc<dyn VectorStoreProvisioner>) -> Self {
        Self { store, vector_stores }
    }

    pub async fn fork(&self, original_id: Uuid, requester: &str) -> Result<ForkOutcome, ForkError> {
        let result = self.try_fork(original_id, requester).await;
        match &result {
            Ok(outcome) => {
                metrics::record_fork("success");
                tracing::info!(
                    original = %original_id,
                    forked = %outcome.session.id,
                    requester = %requester,
                    messages = outcome.messages_copied,
                    "Session forked"
                );
            }
            Err(e) => {
                metrics::record_fork(e.outcome());
                tracing::warn!(original = %original_id, requester = %requester, error = %e, "Session fork failed");
            }
        }
        result
    }

    async fn try_fork(&self, original_id: Uuid, requester: &str) -> Result<ForkOutcome, ForkError> {
        let original = self.store.get_session(original_id).await?.ok_or(ForkError::NotFound)?;
        check_forkable(&original, requester)?;

        let new_session_id = Uuid::new_v4();
        let vector_store_id = self
            .vector_stores
            .create(requester, new_session_id)
            .await
            .map_err(ForkError::VectorStore)?;

        let plan = ForkPlan {
            original_id,
            requester: requester.to_string(),
            new_session_id,
            vector_store_id: vector_store_id.clone(),
            now: Utc::now(),
        };
        let (session, messages_copied) = match self.store.fork_session(plan).await {
            Ok(copied) => copied,
            Err(e) => {
                self.release_vector_store(&vector_store_id).await;
                return Err(match e {
                    StoreError::NotFound(_) => ForkError::NotFound,
                    other => ForkError::Store(other),
                });
            }
        };

        Ok(ForkOutcome { session, messages_copied })
    }

    async fn release_vector_store(&self, vector_store_id: &str) {
        match self.vector_stores.delete(vector_store_id).await {
            Ok(()) => tracing::info!(vector_store_id, "Released vector store of failed fork"),
            Err(e) => tracing::warn!(vector_store_id, error = %e, "Vector store of failed fork is orphaned"),
        }
    }
}
