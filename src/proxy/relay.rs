//! Backend response relay.
//!
//! # Decision Rule
//! ```text
//! backend status not 2xx        → ProxyError::Upstream (same status, JSON envelope)
//! Content-Type text/event-stream → Stream   (byte passthrough, fixed headers)
//! anything else                  → Json     (parse + re-serialize, backend status)
//!                                  └─ parse failure → RawText (original Content-Type or text/plain)
//! ```

use axum::{
    body::{Body, Bytes},
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::proxy::error::ProxyError;
use crate::proxy::stream::{event_stream_response, relay_stream};

/// How a backend response is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayDecision {
    Stream,
    Json,
    RawText,
}

impl RelayDecision {
    /// Initial decision from the backend Content-Type. `Json` may still
    /// degrade to `RawText` once the body is seen.
    pub fn for_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.to_ascii_lowercase().contains("text/event-stream") => RelayDecision::Stream,
            _ => RelayDecision::Json,
        }
    }
}

/// Relay a backend response to the original caller.
pub async fn relay(response: reqwest::Response) -> Result<Response, ProxyError> {
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);

    if !status.is_success() {
        let details = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, details = %details, "Backend returned error status");
        return Err(ProxyError::Upstream { status, details });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    match RelayDecision::for_content_type(content_type.as_deref()) {
        RelayDecision::Stream => Ok(event_stream_response(status, relay_stream(response.bytes_stream()))),
        RelayDecision::Json | RelayDecision::RawText => {
            let body = response.bytes().await.map_err(ProxyError::UpstreamBody)?;
            Ok(buffered_response(status, content_type.as_deref(), body))
        }
    }
}

/// Build the response for a fully buffered backend body.
pub fn buffered_response(status: StatusCode, content_type: Option<&str>, body: Bytes) -> Response {
    match serde_json::from_slice::<Value>(&body) {
        Ok(value) => (status, Json(value)).into_response(),
        Err(_) => {
            let content_type = content_type
                .and_then(|ct| HeaderValue::from_str(ct).ok())
                .unwrap_or_else(|| HeaderValue::from_static("text/plain"));
            let mut response = Response::new(Body::from(body));
            *response.status_mut() = status;
            response.headers_mut().insert(CONTENT_TYPE, content_type);
            response
        }
    }
}
