//! Chat session and message records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::sessions::progress::ScenarioProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }

    /// Parse a stored value; anything unrecognised is private.
    pub fn from_db(value: &str) -> Self {
        if value.eq_ignore_ascii_case("public") {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub visibility: Visibility,
    /// Mirrors `visibility`; kept for clients that read the flag.
    pub is_public: bool,
    pub forked_from: Option<Uuid>,
    pub vector_store_id: Option<String>,
    pub scenario_progress: Option<ScenarioProgress>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(new: NewSession, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title: new.title,
            visibility: new.visibility,
            is_public: new.visibility == Visibility::Public,
            forked_from: None,
            vector_store_id: None,
            scenario_progress: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Private copy of `original` owned by the fork requester.
    pub fn forked(original: &ChatSession, plan: &ForkPlan) -> Self {
        Self {
            id: plan.new_session_id,
            user_id: plan.requester.clone(),
            title: original.title.clone(),
            visibility: Visibility::Private,
            is_public: false,
            forked_from: Some(original.id),
            vector_store_id: Some(plan.vector_store_id.clone()),
            scenario_progress: None,
            created_at: plan.now,
            updated_at: plan.now,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "NewSessionBody")]
pub struct NewSession {
    pub user_id: String,
    pub title: String,
    pub visibility: Visibility,
}

#[derive(Deserialize)]
struct NewSessionBody {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default, rename = "userId")]
    user_id_camel: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    visibility: Visibility,
}

impl TryFrom<NewSessionBody> for NewSession {
    type Error = &'static str;

    fn try_from(body: NewSessionBody) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: body.user_id.or(body.user_id_camel).ok_or("missing field `user_id`")?,
            title: body.title,
            visibility: body.visibility,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: String,
    pub role: String,
    pub content: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "NewMessageBody")]
pub struct NewMessage {
    pub user_id: String,
    pub role: String,
    pub content: String,
    pub metadata: Option<Value>,
}

#[derive(Deserialize)]
struct NewMessageBody {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default, rename = "userId")]
    user_id_camel: Option<String>,
    role: String,
    content: String,
    #[serde(default)]
    metadata: Option<Value>,
}

impl TryFrom<NewMessageBody> for NewMessage {
    type Error = &'static str;

    fn try_from(body: NewMessageBody) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: body.user_id.or(body.user_id_camel).ok_or("missing field `user_id`")?,
            role: body.role,
            content: body.content,
            metadata: body.metadata,
        })
    }
}

impl NewMessage {
    pub fn into_message(self, session_id: Uuid, now: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4(),
            session_id,
            user_id: self.user_id,
            role: self.role,
            content: self.content,
            metadata: self.metadata.unwrap_or_else(|| Value::Object(Default::default())),
            created_at: now,
        }
    }
}

/// Everything a store needs to copy a session in one step.
#[derive(Debug, Clone)]
pub struct ForkPlan {
    pub original_id: Uuid,
    pub requester: String,
    pub new_session_id: Uuid,
    pub vector_store_id: String,
    pub now: DateTime<Utc>,
}
