//! Postgres-backed session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, Object, Pool, PoolConfig, Runtime};
use serde_json::Value;
use tokio_postgres::{NoTls, Row};
use uuid::Uuid;

use crate::sessions::progress::{apply_update, ProgressUpdate, ScenarioProgress};
use crate::sessions::store::{SessionStore, StoreError};
use crate::sessions::types::{ChatMessage, ChatSession, ForkPlan, NewMessage, NewSession, Visibility};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS chat_sessions (
    id                UUID PRIMARY KEY,
    user_id           TEXT NOT NULL,
    title             TEXT NOT NULL DEFAULT '',
    visibility        TEXT NOT NULL DEFAULT 'private',
    forked_from       UUID REFERENCES chat_sessions(id) ON DELETE SET NULL,
    vector_store_id   TEXT,
    scenario_progress JSONB,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at        TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS chat_sessions_user_idx ON chat_sessions (user_id, updated_at DESC);

CREATE TABLE IF NOT EXISTS chat_messages (
    id          UUID PRIMARY KEY,
    session_id  UUID NOT NULL REFERENCES chat_sessions(id) ON DELETE CASCADE,
    user_id     TEXT NOT NULL,
    role        TEXT NOT NULL,
    content     TEXT NOT NULL,
    metadata    JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS chat_messages_session_idx ON chat_messages (session_id, created_at);
"#;

const SESSION_COLUMNS: &str =
    "id, user_id, title, visibility, forked_from, vector_store_id, scenario_progress, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, session_id, user_id, role, content, metadata, created_at";

pub struct PgSessionStore {
    pool: Pool,
}

impl PgSessionStore {
    pub fn connect(url: &str, pool_size: usize) -> Result<Self, StoreError> {
        let config = Config {
            url: Some(url.to_string()),
            pool: Some(PoolConfig::new(pool_size)),
            ..Default::default()
        };
        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Pool(e.to_string()))?;
        Ok(Self { pool })
    }

    async fn client(&self) -> Result<Object, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }
}

fn session_from_row(row: &Row) -> Result<ChatSession, StoreError> {
    let visibility = Visibility::from_db(row.get::<_, &str>("visibility"));
    let progress = match row.get::<_, Option<Value>>("scenario_progress") {
        Some(Value::Null) | None => None,
        Some(value) => Some(serde_json::from_value::<ScenarioProgress>(value)?),
    };
    Ok(ChatSession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        visibility,
        is_public: visibility == Visibility::Public,
        forked_from: row.get("forked_from"),
        vector_store_id: row.get("vector_store_id"),
        scenario_progress: progress,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn message_from_row(row: &Row) -> ChatMessage {
    ChatMessage {
        id: row.get("id"),
        session_id: row.get("session_id"),
        user_id: row.get("user_id"),
        role: row.get("role"),
        content: row.get("content"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let client = self.client().await?;
        client.batch_execute(SCHEMA).await?;
        Ok(())
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>, StoreError> {
        let client = self.client().await?;
        let sql = format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE user_id = $1 ORDER BY updated_at DESC");
        let rows = client.query(&sql, &[&user_id]).await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn create_session(&self, new: NewSession) -> Result<ChatSession, StoreError> {
        let session = ChatSession::new(new, Utc::now());
        let client = self.client().await?;
        client
            .execute(
                "INSERT INTO chat_sessions (id, user_id, title, visibility, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
                &[
                    &session.id,
                    &session.user_id,
                    &session.title,
                    &session.visibility.as_str(),
                    &session.created_at,
                    &session.updated_at,
                ],
            )
            .await?;
        Ok(session)
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError> {
        let client = self.client().await?;
        let sql = format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1");
        client.query_opt(&sql, &[&id]).await?.as_ref().map(session_from_row).transpose()
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
        let client = self.client().await?;
        let exists = client
            .query_opt("SELECT 1 FROM chat_sessions WHERE id = $1", &[&session_id])
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound(session_id));
        }
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE session_id = $1 ORDER BY created_at, id");
        let rows = client.query(&sql, &[&session_id]).await?;
        Ok(rows.iter().map(message_from_row).collect())
    }

    async fn append_message(&self, session_id: Uuid, message: NewMessage) -> Result<ChatMessage, StoreError> {
        let now = Utc::now();
        let message = message.into_message(session_id, now);

        let mut client = self.client().await?;
        let tx = client.transaction().await?;
        let touched = tx
            .execute("UPDATE chat_sessions SET updated_at = $2 WHERE id = $1", &[&session_id, &now])
            .await?;
        if touched == 0 {
            return Err(StoreError::NotFound(session_id));
        }
        tx.execute(
            "INSERT INTO chat_messages (id, session_id, user_id, role, content, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &message.id,
                &message.session_id,
                &message.user_id,
                &message.role,
                &message.content,
                &message.metadata,
                &message.created_at,
            ],
        )
        .await?;
        tx.commit().await?;
        Ok(message)
    }

    async fn fork_session(&self, plan: ForkPlan) -> Result<(ChatSession, u64), StoreError> {
        let mut client = self.client().await?;
        let tx = client.transaction().await?;

        let sql = format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1 FOR SHARE");
        let original = match tx.query_opt(&sql, &[&plan.original_id]).await? {
            Some(row) => session_from_row(&row)?,
            None => return Err(StoreError::NotFound(plan.original_id)),
        };
        let forked = ChatSession::forked(&original, &plan);

        tx.execute(
            "INSERT INTO chat_sessions (id, user_id, title, visibility, forked_from, vector_store_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &forked.id,
                &forked.user_id,
                &forked.title,
                &forked.visibility.as_str(),
                &forked.forked_from,
                &forked.vector_store_id,
                &forked.created_at,
                &forked.updated_at,
            ],
        )
        .await?;

        let copied = tx
            .execute(
                "INSERT INTO chat_messages (id, session_id, user_id, role, content, metadata, created_at) \
                 SELECT gen_random_uuid(), $1, $2, role, content, metadata, created_at \
                 FROM chat_messages WHERE session_id = $3",
                &[&forked.id, &plan.requester, &plan.original_id],
            )
            .await?;

        tx.commit().await?;
        Ok((forked, copied))
    }

    async fn update_progress(
        &self,
        session_id: Uuid,
        update: ProgressUpdate,
        now: DateTime<Utc>,
    ) -> Result<ScenarioProgress, StoreError> {
        let mut client = self.client().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_opt(
                "SELECT scenario_progress FROM chat_sessions WHERE id = $1 FOR UPDATE",
                &[&session_id],
            )
            .await?
            .ok_or(StoreError::NotFound(session_id))?;
        let existing = match row.get::<_, Option<Value>>("scenario_progress") {
            Some(Value::Null) | None => None,
            Some(value) => Some(serde_json::from_value::<ScenarioProgress>(value)?),
        };

        let progress = apply_update(existing, &update, now);
        let stored = serde_json::to_value(&progress)?;
        tx.execute(
            "UPDATE chat_sessions SET scenario_progress = $2, updated_at = $3 WHERE id = $1",
            &[&session_id, &stored, &now],
        )
        .await?;
        tx.commit().await?;
        Ok(progress)
    }

    async fn clear_progress(&self, session_id: Uuid) -> Result<(), StoreError> {
        let client = self.client().await?;
        let now = Utc::now();
        let cleared = client
            .execute(
                "UPDATE chat_sessions SET scenario_progress = NULL, updated_at = $2 WHERE id = $1",
                &[&session_id, &now],
            )
            .await?;
        if cleared == 0 {
            return Err(StoreError::NotFound(session_id));
        }
        Ok(())
    }
}
