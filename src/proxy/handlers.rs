//! Proxy HTTP handlers.

use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, Method, Request},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::proxy::error::ProxyError;
use crate::proxy::forward::ForwardedRequest;
use crate::proxy::relay::relay;
use crate::proxy::route::ProxyRoute;

/// `ANY /api/proxy/*`
pub async fn proxy_passthrough(State(state): State<AppState>, request: Request<Body>) -> Response {
    let route = state.routes.passthrough.clone();
    dispatch(&state, &route, request).await
}

/// Chat request as sent by the frontend.
///
/// Each naming style is its own field, so a body may carry either spelling
/// or both. `question` and the snake_case ids take precedence.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default, rename = "conversationId")]
    pub conversation_id_camel: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, rename = "userId")]
    pub user_id_camel: Option<String>,
    #[serde(default)]
    pub history: Option<Value>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ChatRequest {
    /// Body the backend `/chat` endpoint expects.
    pub fn into_backend_payload(self) -> Result<Value, ProxyError> {
        let question = non_blank(self.question)
            .or_else(|| non_blank(self.message))
            .ok_or_else(|| ProxyError::BadRequest("Missing question".into()))?;

        Ok(json!({
            "question": question,
            "conversation_id": self.conversation_id.or(self.conversation_id_camel),
            "user_id": self.user_id.or(self.user_id_camel),
            "history": self.history.unwrap_or_else(|| json!([])),
        }))
    }
}

/// `POST /api/proxy/chat`
pub async fn proxy_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();

    let body = match body {
        Ok(body) => body,
        Err(e) => return finish(Err(ProxyError::BodyRead(e.body_text())), "chat", &Method::POST, start),
    };

    let request: ChatRequest = if body.is_empty() {
        ChatRequest::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Chat request body is not valid JSON");
            ChatRequest::default()
        })
    };

    let payload = match request.into_backend_payload() {
        Ok(payload) => payload,
        Err(e) => return finish(Err(e), "chat", &Method::POST, start),
    };

    let forwarded = ForwardedRequest::json(&state.routes.chat, Method::POST, payload, &headers);
    let result = execute(&state, &forwarded).await;
    finish(result, "chat", &Method::POST, start)
}

/// Read the inbound body once, forward, and relay.
pub async fn dispatch(state: &AppState, route: &ProxyRoute, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, state.config.listener.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => return finish(Err(ProxyError::BodyRead(e.to_string())), "passthrough", &parts.method, start),
    };

    let forwarded = ForwardedRequest::from_parts(route, &parts, bytes);
    let result = execute(state, &forwarded).await;
    finish(result, "passthrough", &parts.method, start)
}

async fn execute(state: &AppState, forwarded: &ForwardedRequest) -> Result<Response, ProxyError> {
    let upstream_start = Instant::now();
    let response = state.forwarder.forward(forwarded).await?;
    metrics::record_upstream(response.status().as_u16(), upstream_start);
    relay(response).await
}

fn finish(result: Result<Response, ProxyError>, route: &'static str, method: &Method, start: Instant) -> Response {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(route, error = %e, "Proxy request failed");
            e.into_response()
        }
    };
    metrics::record_request(route, method.as_str(), response.status().as_u16(), start);
    response
}
