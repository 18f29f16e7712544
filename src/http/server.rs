//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with every handler
//! - Wire up middleware (tracing, request IDs, timeouts, body limits)
//! - Keep every middleware failure inside the JSON error envelope
//! - Build shared state: backend locator, forwarder, meta cache, sessions
//! - Serve until the shutdown broadcast fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::{DefaultBodyLimit, State},
    http::{header::HOST, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    BoxError, Json, Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::timeout::{error::Elapsed, TimeoutLayer};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::backend::locator::hostname_from_host_header;
use crate::backend::{
    BackendLocator, BackendVectorStores, ClientConfig, ExecutionContext, LocalVectorStores, VectorStoreProvisioner,
};
use crate::config::BffConfig;
use crate::http::ErrorEnvelope;
use crate::meta::{handler::get_meta_description, MetaDescriptions};
use crate::proxy::handlers::{proxy_chat, proxy_passthrough};
use crate::proxy::{Forwarder, ProxyRoutes};
use crate::sessions::handlers as session_handlers;
use crate::sessions::{SessionStore, Sessions};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BffConfig>,
    pub locator: Arc<BackendLocator>,
    pub forwarder: Arc<Forwarder>,
    pub routes: Arc<ProxyRoutes>,
    pub meta: Arc<MetaDescriptions>,
    /// `None` when no chat database is configured.
    pub sessions: Option<Sessions>,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// HTTP server for the tutor frontend.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server. `store` is `None` when sessions are not configured.
    pub fn new(config: BffConfig, store: Option<Arc<dyn SessionStore>>) -> Result<Self, ServerError> {
        let config = Arc::new(config);
        let locator = Arc::new(BackendLocator::new(&config.backend));

        let client = Forwarder::build_client(&config.timeouts)?;
        let forwarder = Arc::new(Forwarder::new(
            client,
            locator.clone(),
            Duration::from_secs(config.timeouts.request_secs),
        ));

        let meta_client = MetaDescriptions::build_client(Duration::from_secs(config.timeouts.meta_fetch_secs))?;
        let meta = Arc::new(MetaDescriptions::new(meta_client, &config.meta_cache));

        let vector_stores: Arc<dyn VectorStoreProvisioner> = if config.backend.url.is_some() {
            Arc::new(BackendVectorStores::new(forwarder.clone(), &config.backend.vector_store_path))
        } else {
            Arc::new(LocalVectorStores)
        };
        let sessions = store.map(|store| Sessions::new(store, vector_stores));

        let state = AppState {
            config: config.clone(),
            locator,
            forwarder,
            routes: Arc::new(ProxyRoutes::default()),
            meta,
            sessions,
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Proxied routes are bounded by the forwarder's response timeout, which
    /// stops at the response head so event streams stay open. Every other
    /// route runs under a whole-request timeout.
    fn build_router(config: &BffConfig, state: AppState) -> Router {
        let max_body = config.listener.max_body_bytes;
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);

        let timed = Router::new()
            .route("/api/proxy/meta-description", get(get_meta_description))
            .route("/api/client-config", get(client_config))
            .route(
                "/api/chat-sessions",
                get(session_handlers::list_sessions).post(session_handlers::create_session),
            )
            .route("/api/chat-sessions/fork", post(session_handlers::fork_session))
            .route("/api/chat-sessions/{id}", get(session_handlers::get_session))
            .route(
                "/api/chat-sessions/{id}/messages",
                get(session_handlers::list_messages).post(session_handlers::append_message),
            )
            .route(
                "/api/chat-sessions/{id}/scenario-progress",
                get(session_handlers::get_progress)
                    .put(session_handlers::put_progress)
                    .delete(session_handlers::delete_progress),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(handle_middleware_error))
                    .layer(TimeoutLayer::new(request_timeout)),
            );

        Router::new()
            .route("/api/proxy/chat", post(proxy_chat))
            .route("/api/proxy", any(proxy_passthrough))
            .route("/api/proxy/{*path}", any(proxy_passthrough))
            .merge(timed)
            .with_state(state)
            .layer(DefaultBodyLimit::max(max_body))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backend = %self.state.locator.origin_for_display(),
            sessions = self.state.sessions.is_some(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &BffConfig {
        &self.state.config
    }
}

async fn handle_middleware_error(err: BoxError) -> ErrorEnvelope {
    if err.is::<Elapsed>() {
        tracing::warn!("Request timed out");
        ErrorEnvelope::new(StatusCode::GATEWAY_TIMEOUT, "Request timed out")
    } else {
        tracing::error!(error = %err, "Middleware failure");
        ErrorEnvelope::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").with_details(err.to_string())
    }
}

/// `GET /api/client-config`: where the browser at `Host` should send API calls.
async fn client_config(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let hostname = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(hostname_from_host_header)
        .unwrap_or("localhost");

    let target = state.locator.resolve(&ExecutionContext::Browser {
        hostname: hostname.to_string(),
    });
    Json(ClientConfig::from(&target)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_elapsed_becomes_gateway_timeout_envelope() {
        let envelope = handle_middleware_error(Box::new(Elapsed::new())).await;
        assert_eq!(envelope.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(envelope.error, "Request timed out");
    }

    #[tokio::test]
    async fn test_other_middleware_errors_are_500() {
        let envelope = handle_middleware_error("layer exploded".into()).await;
        assert_eq!(envelope.status, 500);
        assert_eq!(envelope.details.as_deref(), Some("layer exploded"));
    }
}
