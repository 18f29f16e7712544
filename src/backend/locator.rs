//! Backend origin resolution.
//!
//! # Responsibilities
//! - Decide where API calls from a given execution context should go
//! - Provide the origin this server forwards proxied requests to
//!
//! # Design Decisions
//! - Pure configuration lookup, no I/O
//! - Browsers on production hosts go through the same-origin proxy to avoid
//!   cross-origin restrictions

use serde::Serialize;

use crate::config::BackendConfig;
use crate::proxy::ProxyError;

/// Path prefix of the local mock API.
pub const MOCK_API_BASE: &str = "/api";

/// Path prefix of the same-origin proxy.
pub const PROXY_API_BASE: &str = "/api/proxy";

/// Where a caller is running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionContext {
    Server,
    Browser { hostname: String },
}

/// Resolved destination for API calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTarget {
    /// Local mock API, same origin.
    MockApi,
    /// Same-origin proxy in front of the real backend.
    SameOriginProxy,
    /// The backend origin itself; empty when none is configured.
    External(String),
}

impl BackendTarget {
    /// Base URL or path that API paths are appended to.
    pub fn api_base(&self) -> &str {
        match self {
            BackendTarget::MockApi => MOCK_API_BASE,
            BackendTarget::SameOriginProxy => PROXY_API_BASE,
            BackendTarget::External(origin) => origin,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BackendTarget::MockApi => "mock",
            BackendTarget::SameOriginProxy => "proxy",
            BackendTarget::External(_) => "external",
        }
    }
}

/// What `/api/client-config` reports to the frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub target: &'static str,
    pub api_base: String,
}

impl From<&BackendTarget> for ClientConfig {
    fn from(target: &BackendTarget) -> Self {
        Self {
            target: target.kind(),
            api_base: target.api_base().to_string(),
        }
    }
}

/// Resolves backend addresses from configuration.
#[derive(Debug, Clone)]
pub struct BackendLocator {
    backend_url: Option<String>,
    use_real_backend: bool,
    development_hosts: Vec<String>,
}

impl BackendLocator {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            backend_url: config
                .url
                .as_ref()
                .map(|u| u.trim_end_matches('/').to_string())
                .filter(|u| !u.is_empty()),
            use_real_backend: config.use_real_backend,
            development_hosts: config
                .development_hosts
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Resolve the API destination for a caller.
    pub fn resolve(&self, context: &ExecutionContext) -> BackendTarget {
        if !self.use_real_backend {
            return BackendTarget::MockApi;
        }

        match context {
            ExecutionContext::Server => BackendTarget::SameOriginProxy,
            ExecutionContext::Browser { hostname } if self.is_production_host(hostname) => {
                BackendTarget::SameOriginProxy
            }
            ExecutionContext::Browser { .. } => {
                BackendTarget::External(self.backend_url.clone().unwrap_or_default())
            }
        }
    }

    /// Origin this server forwards proxied requests to.
    pub fn upstream_origin(&self) -> Result<&str, ProxyError> {
        self.backend_url
            .as_deref()
            .ok_or_else(|| ProxyError::Configuration("NEXT_PUBLIC_BACKEND_URL is not configured".into()))
    }

    /// Configured origin for diagnostics, empty when unset.
    pub fn origin_for_display(&self) -> &str {
        self.backend_url.as_deref().unwrap_or_default()
    }

    fn is_production_host(&self, hostname: &str) -> bool {
        let hostname = hostname.to_ascii_lowercase();
        !self.development_hosts.iter().any(|h| *h == hostname)
    }
}

/// Strip an optional port from a `Host` header value.
pub fn hostname_from_host_header(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // IPv6 literal: "[::1]:3000"
        return rest.split(']').next().unwrap_or(rest);
    }
    host.split(':').next().unwrap_or(host)
}
