//! Meta-description lookup.
//!
//! # Data Flow
//! ```text
//! GET /api/proxy/meta-description?url=
//!     → validate url (http/https only)
//!     → TtlCache hit? → { description, cached: true }
//!     → fetch page → extract.rs → cache → { description, cached: false }
//! ```
//!
//! Pages without a description are cached too, as `null`.

pub mod extract;
pub mod handler;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde::Serialize;
use thiserror::Error;

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::config::MetaCacheConfig;
use crate::http::ErrorEnvelope;
use crate::observability::metrics;

pub use extract::extract_description;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; TutorBot/1.0; +link-preview)";

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("Missing url parameter")]
    MissingUrl,

    #[error("Invalid url: {0}")]
    InvalidUrl(String),

    #[error("Page returned {0}")]
    Status(StatusCode),

    #[error("Failed to fetch page: {0}")]
    Fetch(#[from] reqwest::Error),
}

impl MetaError {
    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            MetaError::MissingUrl | MetaError::InvalidUrl(_) => {
                ErrorEnvelope::new(StatusCode::BAD_REQUEST, self.to_string())
            }
            MetaError::Status(status) => {
                ErrorEnvelope::new(*status, "Failed to fetch page").with_details(self.to_string())
            }
            MetaError::Fetch(e) => ErrorEnvelope::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch page")
                .with_details(e.to_string()),
        }
    }
}

/// Lookup result returned to the caller.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetaDescription {
    pub url: String,
    pub description: Option<String>,
    pub cached: bool,
}

/// Fetches and caches page descriptions.
pub struct MetaDescriptions {
    client: reqwest::Client,
    cache: TtlCache<String, Option<String>>,
}

impl MetaDescriptions {
    pub fn new(client: reqwest::Client, config: &MetaCacheConfig) -> Self {
        Self::with_clock(client, config, Arc::new(SystemClock))
    }

    pub fn with_clock(client: reqwest::Client, config: &MetaCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            cache: TtlCache::with_clock(config.capacity, Duration::from_secs(config.ttl_secs), clock),
        }
    }

    /// HTTP client for third-party pages.
    pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.len()
    }

    /// Description for `raw_url`, from cache when fresh.
    pub async fn lookup(&self, raw_url: &str) -> Result<MetaDescription, MetaError> {
        let url = parse_page_url(raw_url)?;
        let key = url.to_string();

        if let Some(description) = self.cache.get(&key) {
            metrics::record_meta_lookup("hit");
            return Ok(MetaDescription {
                url: key,
                description,
                cached: true,
            });
        }
        metrics::record_meta_lookup("miss");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %key, status = %status, "Page fetch returned error status");
            return Err(MetaError::Status(
                StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            ));
        }
        let html = response.text().await?;
        let description = extract_description(&html);

        self.cache.insert(key.clone(), description.clone());
        metrics::record_meta_cache_size(self.cache.len());

        Ok(MetaDescription {
            url: key,
            description,
            cached: false,
        })
    }
}

fn parse_page_url(raw: &str) -> Result<url::Url, MetaError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(MetaError::MissingUrl);
    }
    let url = url::Url::parse(raw).map_err(|e| MetaError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(MetaError::InvalidUrl(format!("unsupported scheme '{other}'"))),
    }
}
