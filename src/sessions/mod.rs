//! Chat-session subsystem.
//!
//! # Data Flow
//! ```text
//! /api/chat-sessions/*
//!     → handlers.rs (parse ids and bodies, envelope every failure)
//!     → fork.rs (ownership/visibility rules, vector store, one-shot copy)
//!     → progress.rs (merge updates into scenario progress)
//!     → store.rs (SessionStore: postgres.rs or memory.rs)
//! ```

pub mod fork;
pub mod handlers;
pub mod memory;
pub mod postgres;
pub mod progress;
pub mod store;
pub mod types;

use std::sync::Arc;

use crate::backend::VectorStoreProvisioner;
use crate::config::DatabaseConfig;

pub use fork::{ForkError, ForkOutcome, ForkService};
pub use memory::MemorySessionStore;
pub use postgres::PgSessionStore;
pub use progress::{apply_update, ProgressUpdate, ScenarioProgress};
pub use store::{SessionStore, StoreError};
pub use types::{ChatMessage, ChatSession, ForkPlan, NewMessage, NewSession, Visibility};

/// Session store plus the services built on it.
#[derive(Clone)]
pub struct Sessions {
    pub store: Arc<dyn SessionStore>,
    pub forks: Arc<ForkService>,
}

impl Sessions {
    pub fn new(store: Arc<dyn SessionStore>, vector_stores: Arc<dyn VectorStoreProvisioner>) -> Self {
        let forks = Arc::new(ForkService::new(store.clone(), vector_stores));
        Self { store, forks }
    }
}

/// Open the configured store, or `None` when sessions are not configured.
pub fn open_store(config: &DatabaseConfig) -> Result<Option<Arc<dyn SessionStore>>, StoreError> {
    if config.in_memory {
        tracing::info!("Using in-memory session store");
        return Ok(Some(Arc::new(MemorySessionStore::new())));
    }
    match config.url.as_deref() {
        Some(url) => {
            tracing::info!(pool_size = config.pool_size, "Using postgres session store");
            Ok(Some(Arc::new(PgSessionStore::connect(url, config.pool_size)?)))
        }
        None => {
            tracing::warn!("No chat database configured; session routes will answer 500");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_selection() {
        let none = DatabaseConfig {
            url: None,
            in_memory: false,
            ..Default::default()
        };
        assert!(open_store(&none).unwrap().is_none());

        let memory = DatabaseConfig {
            in_memory: true,
            ..Default::default()
        };
        assert!(open_store(&memory).unwrap().is_some());
    }
}
