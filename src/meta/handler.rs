use std::time::Instant;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::http::server::AppState;
use crate::observability::metrics;

#[derive(Debug, Deserialize)]
pub struct MetaQuery {
    #[serde(default)]
    pub url: String,
}

/// `GET /api/proxy/meta-description?url=`
pub async fn get_meta_description(State(state): State<AppState>, Query(query): Query<MetaQuery>) -> Response {
    let start = Instant::now();
    let response = match state.meta.lookup(&query.url).await {
        Ok(found) => Json(found).into_response(),
        Err(e) => {
            tracing::warn!(url = %query.url, error = %e, "Meta description lookup failed");
            e.envelope().into_response()
        }
    };
    metrics::record_request("meta-description", "GET", response.status().as_u16(), start);
    response
}
