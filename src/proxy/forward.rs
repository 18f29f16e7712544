//! Outbound request construction and dispatch.
//!
//! # Responsibilities
//! - Turn an inbound request into a [`ForwardedRequest`] (body read once)
//! - Apply the header policy: Content-Type, Accept, Authorization only
//! - Issue exactly one outbound call per inbound request
//!
//! # Design Decisions
//! - Malformed JSON bodies are dropped, not rejected
//! - Multipart bodies travel untouched with their boundary-bearing Content-Type
//! - No retries; failures go straight to the error normalizer
//! - Only the wait for the response head is bounded; streamed bodies are not

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE, PRAGMA},
    request::Parts,
    HeaderMap, HeaderValue, Method,
};
use serde_json::Value;

use crate::backend::BackendLocator;
use crate::config::TimeoutConfig;
use crate::proxy::error::ProxyError;
use crate::proxy::route::ProxyRoute;

const EVENT_STREAM: &str = "text/event-stream";
const APPLICATION_JSON: &str = "application/json";

/// Payload of a forwarded request.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardBody {
    Empty,
    Json(Value),
    Multipart { content_type: HeaderValue, bytes: Bytes },
}

impl ForwardBody {
    /// Classify a raw inbound body by its Content-Type.
    pub fn from_inbound(content_type: Option<&HeaderValue>, bytes: Bytes) -> Self {
        if let Some(ct) = content_type {
            let is_multipart = ct
                .to_str()
                .map(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"))
                .unwrap_or(false);
            if is_multipart {
                return ForwardBody::Multipart {
                    content_type: ct.clone(),
                    bytes,
                };
            }
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return ForwardBody::Empty;
        }

        match serde_json::from_slice(&bytes) {
            Ok(value) => ForwardBody::Json(value),
            Err(e) => {
                tracing::warn!(error = %e, len = bytes.len(), "Inbound body is not valid JSON, forwarding without body");
                ForwardBody::Empty
            }
        }
    }

    pub fn is_multipart(&self) -> bool {
        matches!(self, ForwardBody::Multipart { .. })
    }
}

/// Everything needed to issue the outbound call.
#[derive(Debug, Clone)]
pub struct ForwardedRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: ForwardBody,
    pub streaming: bool,
}

impl ForwardedRequest {
    /// Build from the inbound request head and its (already read) body.
    pub fn from_parts(route: &ProxyRoute, parts: &Parts, body: Bytes) -> Self {
        let body = ForwardBody::from_inbound(parts.headers.get(CONTENT_TYPE), body);
        let query = parts
            .uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self::build(route, parts.method.clone(), parts.uri.path(), query, &parts.headers, body)
    }

    /// Build a JSON request constructed by a handler.
    pub fn json(route: &ProxyRoute, method: Method, payload: Value, inbound_headers: &HeaderMap) -> Self {
        Self::build(route, method, "", Vec::new(), inbound_headers, ForwardBody::Json(payload))
    }

    /// Build a body-less request constructed by a handler.
    pub fn empty(route: &ProxyRoute, method: Method, inbound_headers: &HeaderMap) -> Self {
        Self::build(route, method, "", Vec::new(), inbound_headers, ForwardBody::Empty)
    }

    fn build(
        route: &ProxyRoute,
        method: Method,
        inbound_path: &str,
        query: Vec<(String, String)>,
        inbound_headers: &HeaderMap,
        body: ForwardBody,
    ) -> Self {
        let path = route.backend_path(inbound_path);
        let streaming = route.is_streaming(&path);

        let mut headers = HeaderMap::new();
        match &body {
            ForwardBody::Multipart { content_type, .. } => {
                headers.insert(CONTENT_TYPE, content_type.clone());
            }
            _ => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
            }
        }
        if streaming {
            headers.insert(ACCEPT, HeaderValue::from_static(EVENT_STREAM));
        } else if let Some(accept) = inbound_headers.get(ACCEPT) {
            headers.insert(ACCEPT, accept.clone());
        }
        if let Some(auth) = inbound_headers.get(AUTHORIZATION) {
            headers.insert(AUTHORIZATION, auth.clone());
        }
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        for (name, value) in route.header_overrides.iter() {
            headers.insert(name.clone(), value.clone());
        }

        Self {
            method,
            path,
            query,
            headers,
            body,
            streaming,
        }
    }

    /// Bytes to send, or `None` when the outbound request carries no body.
    pub fn outbound_body(&self) -> Option<Bytes> {
        match &self.body {
            ForwardBody::Empty => None,
            ForwardBody::Json(value) => Some(Bytes::from(value.to_string())),
            ForwardBody::Multipart { bytes, .. } => Some(bytes.clone()),
        }
    }
}

/// Issues outbound calls to the backend.
pub struct Forwarder {
    client: reqwest::Client,
    locator: Arc<BackendLocator>,
    response_timeout: Duration,
}

impl Forwarder {
    /// `response_timeout` bounds the time until the backend sends its response head.
    pub fn new(client: reqwest::Client, locator: Arc<BackendLocator>, response_timeout: Duration) -> Self {
        Self {
            client,
            locator,
            response_timeout,
        }
    }

    /// Shared HTTP client for the backend.
    pub fn build_client(timeouts: &TimeoutConfig) -> Result<reqwest::Client, reqwest::Error> {
        // No total timeout: event streams stay open as long as the backend keeps them open.
        reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn locator(&self) -> &BackendLocator {
        &self.locator
    }

    /// Send the request to the backend.
    pub async fn forward(&self, request: &ForwardedRequest) -> Result<reqwest::Response, ProxyError> {
        let origin = self.locator.upstream_origin()?;
        let url = format!("{origin}{}", request.path);

        tracing::debug!(
            method = %request.method,
            url = %url,
            streaming = request.streaming,
            multipart = request.body.is_multipart(),
            "Forwarding request to backend"
        );

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = request.outbound_body() {
            builder = builder.body(body);
        }

        match tokio::time::timeout(self.response_timeout, builder.send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(source)) => Err(ProxyError::Connection {
                backend_url: origin.to_string(),
                source,
            }),
            Err(_) => Err(ProxyError::Timeout {
                backend_url: origin.to_string(),
                after: self.response_timeout,
            }),
        }
    }
}
