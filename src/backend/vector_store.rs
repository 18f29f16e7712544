//! Vector store provisioning for forked sessions.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::proxy::{ForwardedRequest, Forwarder, ProxyError, ProxyRoute};

#[async_trait]
pub trait VectorStoreProvisioner: Send + Sync {
    /// Create a vector store for `session_id` and return its id.
    async fn create(&self, user_id: &str, session_id: Uuid) -> Result<String, ProxyError>;

    /// Remove a vector store nothing refers to. A store that is already gone is not an error.
    async fn delete(&self, vector_store_id: &str) -> Result<(), ProxyError>;
}

/// Creates vector stores on the backend with `POST {vector_store_path}` and
/// removes them with `DELETE {vector_store_path}/{id}`.
pub struct BackendVectorStores {
    forwarder: Arc<Forwarder>,
    path: String,
    route: ProxyRoute,
}

impl BackendVectorStores {
    pub fn new(forwarder: Arc<Forwarder>, path: &str) -> Self {
        let path = path.trim_end_matches('/').to_string();
        Self {
            forwarder,
            route: ProxyRoute::fixed(path.clone()),
            path,
        }
    }
}

async fn upstream_failure(response: reqwest::Response) -> ProxyError {
    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let details = response.text().await.unwrap_or_default();
    ProxyError::Upstream { status, details }
}

#[async_trait]
impl VectorStoreProvisioner for BackendVectorStores {
    async fn create(&self, user_id: &str, session_id: Uuid) -> Result<String, ProxyError> {
        let payload = json!({
            "user_id": user_id,
            "session_id": session_id,
            "name": format!("session-{session_id}"),
        });
        let request = ForwardedRequest::json(&self.route, Method::POST, payload, &HeaderMap::new());
        let response = self.forwarder.forward(&request).await?;
        if !response.status().is_success() {
            return Err(upstream_failure(response).await);
        }

        let body: Value = response.json().await.map_err(ProxyError::UpstreamBody)?;
        vector_store_id(&body).ok_or_else(|| ProxyError::Upstream {
            status: StatusCode::BAD_GATEWAY,
            details: "vector store response carried no id".to_string(),
        })
    }

    async fn delete(&self, vector_store_id: &str) -> Result<(), ProxyError> {
        let route = ProxyRoute::fixed(format!("{}/{vector_store_id}", self.path));
        let request = ForwardedRequest::empty(&route, Method::DELETE, &HeaderMap::new());
        let response = self.forwarder.forward(&request).await?;
        if response.status().is_success() || response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(upstream_failure(response).await)
    }
}

fn vector_store_id(body: &Value) -> Option<String> {
    ["id", "vector_store_id", "vectorStoreId"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Generates ids locally when no backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalVectorStores;

#[async_trait]
impl VectorStoreProvisioner for LocalVectorStores {
    async fn create(&self, _user_id: &str, _session_id: Uuid) -> Result<String, ProxyError> {
        Ok(format!("vs_local_{}", Uuid::new_v4().simple()))
    }

    async fn delete(&self, _vector_store_id: &str) -> Result<(), ProxyError> {
        Ok(())
    }
}
