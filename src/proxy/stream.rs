//! Event-stream passthrough.
//!
//! Backend chunks are handed to the client as they arrive, unmodified and
//! in order. A read error ends the stream with a single terminal
//! `{"type":"error"}` event so every route signals interruption the same way.
//!
//! Dropping the returned stream (client went away) drops the upstream
//! response, which closes the backend connection.

use std::convert::Infallible;
use std::fmt::Display;
use std::pin::Pin;

use axum::{
    body::{Body, Bytes},
    http::{
        header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::Response,
};
use futures_util::{Stream, StreamExt};

use crate::observability::metrics;

struct RelayState<S> {
    upstream: Pin<Box<S>>,
    chunks: u64,
    bytes: u64,
}

/// Relay upstream chunks, closing with an error event on read failure.
pub fn relay_stream<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let initial = Some(RelayState {
        upstream: Box::pin(upstream),
        chunks: 0,
        bytes: 0,
    });

    futures_util::stream::unfold(initial, |state| async move {
        let mut state = state?;
        match state.upstream.next().await {
            Some(Ok(chunk)) => {
                state.chunks += 1;
                state.bytes += chunk.len() as u64;
                Some((Ok(chunk), Some(state)))
            }
            Some(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    chunks = state.chunks,
                    bytes = state.bytes,
                    "Backend stream interrupted"
                );
                metrics::record_stream_end("error");
                Some((Ok(error_event(&e.to_string())), None))
            }
            None => {
                tracing::debug!(chunks = state.chunks, bytes = state.bytes, "Backend stream complete");
                metrics::record_stream_end("complete");
                None
            }
        }
    })
}

/// The terminal event sent when the backend stream breaks.
pub fn error_event(message: &str) -> Bytes {
    let payload = serde_json::json!({
        "type": "error",
        "error": "Stream interrupted",
        "message": message,
    });
    Bytes::from(format!("data: {payload}\n\n"))
}

/// Wrap a relayed stream in a response with the fixed event-stream headers.
pub fn event_stream_response<S>(status: StatusCode, stream: S) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    let mut response = Response::new(Body::from_stream(stream));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}
