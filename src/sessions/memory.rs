//! In-process session store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::sessions::progress::{apply_update, ProgressUpdate, ScenarioProgress};
use crate::sessions::store::{SessionStore, StoreError};
use crate::sessions::types::{ChatMessage, ChatSession, ForkPlan, NewMessage, NewSession};

#[derive(Default)]
struct Tables {
    sessions: HashMap<Uuid, ChatSession>,
    messages: HashMap<Uuid, Vec<ChatMessage>>,
}

/// Keeps everything behind one lock, so multi-row operations are atomic.
#[derive(Default)]
pub struct MemorySessionStore {
    tables: Mutex<Tables>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, StoreError> {
        let tables = self.tables();
        let mut sessions: Vec<_> = tables
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    async fn create_session(&self, new: NewSession) -> Result<ChatSession, StoreError> {
        let session = ChatSession::new(new, Utc::now());
        self.tables().sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError> {
        Ok(self.tables().sessions.get(&id).cloned())
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
        let tables = self.tables();
        if !tables.sessions.contains_key(&session_id) {
            return Err(StoreError::NotFound(session_id));
        }
        let mut messages = tables.messages.get(&session_id).cloned().unwrap_or_default();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn append_message(&self, session_id: Uuid, message: NewMessage) -> Result<ChatMessage, StoreError> {
        let now = Utc::now();
        let mut tables = self.tables();
        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or(StoreError::NotFound(session_id))?;
        session.updated_at = now;

        let message = message.into_message(session_id, now);
        tables.messages.entry(session_id).or_default().push(message.clone());
        Ok(message)
    }

    async fn fork_session(&self, plan: ForkPlan) -> Result<(ChatSession, u64), StoreError> {
        let mut tables = self.tables();
        let original = tables
            .sessions
            .get(&plan.original_id)
            .ok_or(StoreError::NotFound(plan.original_id))?;
        let forked = ChatSession::forked(original, &plan);

        let copies: Vec<ChatMessage> = tables
            .messages
            .get(&plan.original_id)
            .map(|messages| {
                messages
                    .iter()
                    .map(|m| ChatMessage {
                        id: Uuid::new_v4(),
                        session_id: forked.id,
                        user_id: plan.requester.clone(),
                        ..m.clone()
                    })
                    .collect()
            })
            .unwrap_or_default();
        let copied = copies.len() as u64;

        tables.sessions.insert(forked.id, forked.clone());
        tables.messages.insert(forked.id, copies);
        Ok((forked, copied))
    }

    async fn update_progress(
        &self,
        session_id: Uuid,
        update: ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Result<ScenarioProgress, StoreError> {
        let mut tables = self.tables();
        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or(StoreError::NotFound(session_id))?;
        let progress = apply_update(session.scenario_progress.take(), &update, now);
        session.scenario_progress = Some(progress.clone());
        session.updated_at = now;
        Ok(progress)
    }

    async fn clear_progress(&self, session_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables();
        let session = tables
            .sessions
            .get_mut(&session_id)
            .ok_or(StoreError::NotFound(session_id))?;
        session.scenario_progress = None;
        session.updated_at = Utc::now();
        Ok(())
    }
}
