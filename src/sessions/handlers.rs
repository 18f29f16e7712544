//! Chat-session HTTP handlers.
//!
//! Bodies and path ids are parsed by hand so that malformed input comes
//! back as an [`ErrorEnvelope`] rather than axum's plain-text rejection.

use std::collections::HashMap;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::http::server::AppState;
use crate::http::ErrorEnvelope;
use crate::observability::metrics;
use crate::sessions::fork::ForkError;
use crate::sessions::progress::ProgressUpdate;
use crate::sessions::store::StoreError;
use crate::sessions::types::{NewMessage, NewSession};
use crate::sessions::Sessions;

/// Request body as extracted, with size-limit rejections kept for the envelope.
type RawBody = Result<Bytes, BytesRejection>;

pub const NOT_CONFIGURED: &str = "CHAT_DATABASE_URL is not configured";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("CHAT_DATABASE_URL is not configured")]
    NotConfigured,

    #[error("{0}")]
    BadRequest(String),

    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Session not found")]
    NotFound,

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Fork(#[from] ForkError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => ApiError::NotFound,
            other => ApiError::Store(other),
        }
    }
}

impl ApiError {
    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            ApiError::NotConfigured => ErrorEnvelope::new(StatusCode::INTERNAL_SERVER_ERROR, NOT_CONFIGURED),
            ApiError::BadRequest(message) => ErrorEnvelope::new(StatusCode::BAD_REQUEST, message.clone()),
            ApiError::BodyRead(details) => {
                ErrorEnvelope::new(StatusCode::PAYLOAD_TOO_LARGE, "Failed to read request body").with_details(details.clone())
            }
            ApiError::NotFound => ErrorEnvelope::new(StatusCode::NOT_FOUND, "Session not found"),
            ApiError::Store(e) => {
                ErrorEnvelope::new(StatusCode::INTERNAL_SERVER_ERROR, "Database error").with_details(e.to_string())
            }
            ApiError::Fork(e) => e.envelope(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.envelope().into_response()
    }
}

fn sessions(state: &AppState) -> Result<&Sessions, ApiError> {
    state.sessions.as_ref().ok_or(ApiError::NotConfigured)
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid session id: {raw}")))
}

fn parse_body<T: DeserializeOwned>(body: RawBody) -> Result<T, ApiError> {
    let body = body.map_err(|e| ApiError::BodyRead(e.body_text()))?;
    serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))
}

fn finish(result: Result<Response, ApiError>, route: &'static str, method: &str, start: Instant) -> Response {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            match &e {
                ApiError::Store(_) | ApiError::NotConfigured => {
                    tracing::error!(route = route, error = %e, "Session request failed")
                }
                _ => tracing::debug!(route = route, error = %e, "Session request rejected"),
            }
            e.into_response()
        }
    };
    metrics::record_request(route, method, response.status().as_u16(), start);
    response
}

/// `GET /api/chat-sessions?user_id=`
pub async fn list_sessions(State(state): State<AppState>, Query(query): Query<HashMap<String, String>>) -> Response {
    let start = Instant::now();
    finish(list_sessions_inner(&state, &query).await, "sessions", "GET", start)
}

async fn list_sessions_inner(state: &AppState, query: &HashMap<String, String>) -> Result<Response, ApiError> {
    let sessions = sessions(state)?;
    let user_id = query
        .get("user_id")
        .or_else(|| query.get("userId"))
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing user_id".into()))?;
    let listed = sessions.store.list_sessions(user_id).await?;
    Ok(Json(json!({ "sessions": listed })).into_response())
}

/// `POST /api/chat-sessions`
pub async fn create_session(State(state): State<AppState>, body: RawBody) -> Response {
    let start = Instant::now();
    finish(create_session_inner(&state, body).await, "sessions", "POST", start)
}

async fn create_session_inner(state: &AppState, body: RawBody) -> Result<Response, ApiError> {
    let sessions = sessions(state)?;
    let new: NewSession = parse_body(body)?;
    if new.user_id.is_empty() {
        return Err(ApiError::BadRequest("Missing user_id".into()));
    }
    let session = sessions.store.create_session(new).await?;
    Ok((StatusCode::CREATED, Json(json!({ "session": session }))).into_response())
}

/// `GET /api/chat-sessions/{id}`
pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let start = Instant::now();
    finish(get_session_inner(&state, &id).await, "session", "GET", start)
}

async fn get_session_inner(state: &AppState, id: &str) -> Result<Response, ApiError> {
    let sessions = sessions(state)?;
    let id = parse_id(id)?;
    let session = sessions.store.get_session(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(json!({ "session": session })).into_response())
}

/// `GET /api/chat-sessions/{id}/messages`
pub async fn list_messages(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let start = Instant::now();
    finish(list_messages_inner(&state, &id).await, "messages", "GET", start)
}

async fn list_messages_inner(state: &AppState, id: &str) -> Result<Response, ApiError> {
    let sessions = sessions(state)?;
    let id = parse_id(id)?;
    let messages = sessions.store.list_messages(id).await?;
    Ok(Json(json!({ "messages": messages })).into_response())
}

/// `POST /api/chat-sessions/{id}/messages`
pub async fn append_message(State(state): State<AppState>, Path(id): Path<String>, body: RawBody) -> Response {
    let start = Instant::now();
    finish(append_message_inner(&state, &id, body).await, "messages", "POST", start)
}

async fn append_message_inner(state: &AppState, id: &str, body: RawBody) -> Result<Response, ApiError> {
    let sessions = sessions(state)?;
    let id = parse_id(id)?;
    let message: NewMessage = parse_body(body)?;
    let message = sessions.store.append_message(id, message).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": message }))).into_response())
}

#[derive(Debug, Deserialize)]
struct ForkRequest {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default, rename = "sessionId")]
    session_id_camel: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default, rename = "userId")]
    user_id_camel: Option<String>,
}

impl ForkRequest {
    fn session_id(&self) -> Option<&str> {
        first_non_empty(&self.session_id, &self.session_id_camel)
    }

    fn user_id(&self) -> Option<&str> {
        first_non_empty(&self.user_id, &self.user_id_camel)
    }
}

fn first_non_empty<'a>(a: &'a Option<String>, b: &'a Option<String>) -> Option<&'a str> {
    [a, b].into_iter().flatten().map(String::as_str).find(|s| !s.is_empty())
}

/// `POST /api/chat-sessions/fork`
pub async fn fork_session(State(state): State<AppState>, body: RawBody) -> Response {
    let start = Instant::now();
    finish(fork_session_inner(&state, body).await, "fork", "POST", start)
}

async fn fork_session_inner(state: &AppState, body: RawBody) -> Result<Response, ApiError> {
    let sessions = sessions(state)?;
    let request: ForkRequest = parse_body(body)?;
    let (Some(session_id), Some(user_id)) = (request.session_id(), request.user_id()) else {
        return Err(ApiError::BadRequest("Missing session_id or user_id".into()));
    };
    let session_id = parse_id(session_id)?;
    let outcome = sessions.forks.fork(session_id, user_id).await?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

/// `GET /api/chat-sessions/{id}/scenario-progress`
pub async fn get_progress(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let start = Instant::now();
    finish(get_progress_inner(&state, &id).await, "scenario-progress", "GET", start)
}

async fn get_progress_inner(state: &AppState, id: &str) -> Result<Response, ApiError> {
    let sessions = sessions(state)?;
    let id = parse_id(id)?;
    let session = sessions.store.get_session(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(json!({ "progress": session.scenario_progress })).into_response())
}

/// `PUT /api/chat-sessions/{id}/scenario-progress`
pub async fn put_progress(State(state): State<AppState>, Path(id): Path<String>, body: RawBody) -> Response {
    let start = Instant::now();
    finish(put_progress_inner(&state, &id, body).await, "scenario-progress", "PUT", start)
}

async fn put_progress_inner(state: &AppState, id: &str, body: RawBody) -> Result<Response, ApiError> {
    let sessions = sessions(state)?;
    let id = parse_id(id)?;
    let update: ProgressUpdate = parse_body(body)?;
    let progress = sessions.store.update_progress(id, update, Utc::now()).await?;
    Ok(Json(json!({ "progress": progress })).into_response())
}

/// `DELETE /api/chat-sessions/{id}/scenario-progress`
pub async fn delete_progress(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let start = Instant::now();
    finish(delete_progress_inner(&state, &id).await, "scenario-progress", "DELETE", start)
}

async fn delete_progress_inner(state: &AppState, id: &str) -> Result<Response, ApiError> {
    let sessions = sessions(state)?;
    let id = parse_id(id)?;
    sessions.store.clear_progress(id).await?;
    Ok(Json(json!({ "success": true })).into_response())
}
