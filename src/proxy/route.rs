//! Per-route forwarding parameters.
//!
//! One [`ProxyRoute`] describes how a family of inbound requests maps onto
//! the backend: which backend path to call, whether the call is a stream,
//! and which headers to force.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::backend::locator::PROXY_API_BASE;

/// Backend path used when the proxied suffix is empty.
pub const DEFAULT_BACKEND_PATH: &str = "/status";

/// How the backend path is derived from the inbound path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTarget {
    /// Everything after `prefix` in the inbound path.
    Suffix { prefix: String },
    /// Always this backend path.
    Fixed(String),
}

/// Decides whether a backend call should ask for an event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamingPredicate {
    Never,
    Always,
    /// Path contains `/chat` or is exactly `/stream`.
    ChatOrStream,
}

impl StreamingPredicate {
    pub fn matches(self, backend_path: &str) -> bool {
        match self {
            StreamingPredicate::Never => false,
            StreamingPredicate::Always => true,
            StreamingPredicate::ChatOrStream => {
                backend_path.contains("/chat") || backend_path == "/stream"
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyRoute {
    pub target: PathTarget,
    pub streaming: StreamingPredicate,
    pub header_overrides: HeaderMap,
}

impl ProxyRoute {
    /// The generic `/api/proxy/*` passthrough.
    pub fn passthrough() -> Self {
        Self {
            target: PathTarget::Suffix {
                prefix: PROXY_API_BASE.to_string(),
            },
            streaming: StreamingPredicate::ChatOrStream,
            header_overrides: HeaderMap::new(),
        }
    }

    /// A route that always calls one backend path.
    pub fn fixed(path: impl Into<String>) -> Self {
        Self {
            target: PathTarget::Fixed(path.into()),
            streaming: StreamingPredicate::Never,
            header_overrides: HeaderMap::new(),
        }
    }

    pub fn streaming(mut self) -> Self {
        self.streaming = StreamingPredicate::Always;
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.header_overrides.insert(name, value);
        self
    }

    /// Backend path for an inbound request path.
    pub fn backend_path(&self, inbound_path: &str) -> String {
        match &self.target {
            PathTarget::Fixed(path) => path.clone(),
            PathTarget::Suffix { prefix } => {
                let suffix = inbound_path.strip_prefix(prefix.as_str()).unwrap_or(inbound_path);
                let suffix = suffix.trim_start_matches('/');
                if suffix.is_empty() {
                    DEFAULT_BACKEND_PATH.to_string()
                } else {
                    format!("/{suffix}")
                }
            }
        }
    }

    pub fn is_streaming(&self, backend_path: &str) -> bool {
        self.streaming.matches(backend_path)
    }
}

/// Routes the HTTP layer dispatches through.
#[derive(Debug, Clone)]
pub struct ProxyRoutes {
    pub passthrough: ProxyRoute,
    pub chat: ProxyRoute,
}

impl Default for ProxyRoutes {
    fn default() -> Self {
        Self {
            passthrough: ProxyRoute::passthrough(),
            // The backend serves chat at `/chat`, not `/api/chat`.
            chat: ProxyRoute::fixed("/chat").streaming(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_path() {
        let route = ProxyRoute::passthrough();
        assert_eq!(route.backend_path("/api/proxy/agents/list"), "/agents/list");
        assert_eq!(route.backend_path("/api/proxy"), "/status");
        assert_eq!(route.backend_path("/api/proxy/"), "/status");
    }

    #[test]
    fn test_fixed_path() {
        let route = ProxyRoute::fixed("/chat");
        assert_eq!(route.backend_path("/api/proxy/chat"), "/chat");
        assert_eq!(route.backend_path("/anything"), "/chat");
    }

    #[test]
    fn test_streaming_predicate() {
        let route = ProxyRoute::passthrough();
        assert!(route.is_streaming("/chat"));
        assert!(route.is_streaming("/agents/42/chat/history"));
        assert!(route.is_streaming("/stream"));
        assert!(!route.is_streaming("/stream/status"));
        assert!(!route.is_streaming("/vector-stores"));

        assert!(ProxyRoutes::default().chat.is_streaming("/chat"));
        assert!(!ProxyRoute::fixed("/chat").is_streaming("/chat"));
    }
}
