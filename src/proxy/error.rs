//! Error normalization for the proxy path.
//!
//! Every failure between receiving a request and handing back the relayed
//! response ends up here and leaves as an [`ErrorEnvelope`]. Nothing is
//! retried.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::ErrorEnvelope;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Required configuration is missing.
    #[error("{0}")]
    Configuration(String),

    /// The backend could not be reached (DNS, refused, timeout).
    #[error("Backend connection error: {source}")]
    Connection {
        backend_url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend accepted the request but sent no response head in time.
    #[error("Backend did not respond within {}s", after.as_secs())]
    Timeout { backend_url: String, after: Duration },

    /// The backend answered with a non-2xx status.
    #[error("Backend returned {status}")]
    Upstream { status: StatusCode, details: String },

    /// The backend response body could not be read.
    #[error("Failed to read backend response: {0}")]
    UpstreamBody(#[source] reqwest::Error),

    /// The inbound request is unusable.
    #[error("{0}")]
    BadRequest(String),

    /// The inbound body could not be read (too large, aborted).
    #[error("Failed to read request body: {0}")]
    BodyRead(String),
}

impl ProxyError {
    /// Status code reported to the caller.
    pub fn status(&self) -> StatusCode {
        self.envelope().status_code()
    }

    /// Shape the error as the uniform JSON envelope.
    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            ProxyError::Configuration(message) => {
                ErrorEnvelope::new(StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            }
            ProxyError::Connection { backend_url, source } => {
                ErrorEnvelope::new(StatusCode::INTERNAL_SERVER_ERROR, "Backend connection error")
                    .with_message(source.to_string())
                    .with_backend_url(backend_url.clone())
            }
            ProxyError::Timeout { backend_url, .. } => {
                ErrorEnvelope::new(StatusCode::INTERNAL_SERVER_ERROR, "Backend connection error")
                    .with_message(self.to_string())
                    .with_backend_url(backend_url.clone())
            }
            ProxyError::Upstream { status, details } => {
                ErrorEnvelope::new(*status, "Backend request failed").with_details(details.clone())
            }
            ProxyError::UpstreamBody(source) => {
                ErrorEnvelope::new(StatusCode::BAD_GATEWAY, "Failed to read backend response")
                    .with_details(source.to_string())
            }
            ProxyError::BadRequest(message) => {
                ErrorEnvelope::new(StatusCode::BAD_REQUEST, message.clone())
            }
            ProxyError::BodyRead(details) => {
                ErrorEnvelope::new(StatusCode::PAYLOAD_TOO_LARGE, "Failed to read request body")
                    .with_details(details.clone())
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.envelope().into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_keeps_backend_status() {
        let err = ProxyError::Upstream {
            status: StatusCode::NOT_FOUND,
            details: "no such agent".into(),
        };
        let envelope = err.envelope();
        assert_eq!(envelope.status, 404);
        assert_eq!(envelope.details.as_deref(), Some("no such agent"));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_configuration_is_500_with_literal_message() {
        let err = ProxyError::Configuration("NEXT_PUBLIC_BACKEND_URL is not configured".into());
        let envelope = err.envelope();
        assert_eq!(envelope.status, 500);
        assert_eq!(envelope.error, "NEXT_PUBLIC_BACKEND_URL is not configured");
    }

    #[test]
    fn test_timeout_reads_like_connection_error() {
        let err = ProxyError::Timeout {
            backend_url: "http://backend:8000".into(),
            after: Duration::from_secs(3),
        };
        let envelope = err.envelope();
        assert_eq!(envelope.status, 500);
        assert_eq!(envelope.error, "Backend connection error");
        assert_eq!(envelope.message.as_deref(), Some("Backend did not respond within 3s"));
        assert_eq!(envelope.backend_url.as_deref(), Some("http://backend:8000"));
    }

    #[test]
    fn test_bad_request() {
        assert_eq!(
            ProxyError::BadRequest("Missing question".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
