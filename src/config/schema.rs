//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the BFF service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BffConfig {
    /// Listener configuration (bind address, body limits).
    pub listener: ListenerConfig,

    /// External compute backend.
    pub backend: BackendConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Chat session database.
    pub database: DatabaseConfig,

    /// Meta-description lookup cache.
    pub meta_cache: MetaCacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Largest inbound request body accepted, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_body_bytes: 25 * 1024 * 1024, // file uploads go through the proxy
        }
    }
}

/// Backend (compute service) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend origin, e.g. "http://localhost:5000". `NEXT_PUBLIC_BACKEND_URL`.
    pub url: Option<String>,

    /// Talk to the real backend instead of the local mock API.
    /// `NEXT_PUBLIC_USE_REAL_BACKEND`.
    pub use_real_backend: bool,

    /// Hostnames treated as development (everything else is production).
    pub development_hosts: Vec<String>,

    /// Backend path used to provision a vector store for a forked session.
    pub vector_store_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            use_real_backend: false,
            development_hosts: vec!["localhost".to_string(), "127.0.0.1".to_string()],
            vector_store_path: "/vector-stores".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed until response headers are produced, in seconds.
    /// Streamed bodies are not bounded by this.
    pub request_secs: u64,

    /// Timeout for fetching third-party pages for meta descriptions.
    pub meta_fetch_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 60,
            meta_fetch_secs: 5,
        }
    }
}

/// Chat session database configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string. `CHAT_DATABASE_URL`, falling back to `DATABASE_URL`.
    pub url: Option<String>,

    /// Maximum pooled connections.
    pub pool_size: usize,

    /// Keep sessions in process memory instead of Postgres (development only).
    pub in_memory: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 16,
            in_memory: false,
        }
    }
}

/// Meta-description cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetaCacheConfig {
    /// Maximum cached URLs.
    pub capacity: usize,

    /// Entry lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for MetaCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_secs: 600,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
