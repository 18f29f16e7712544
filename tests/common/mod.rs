//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode},
    response::Response,
    Router,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use tutor_bff::config::BffConfig;
use tutor_bff::http::HttpServer;
use tutor_bff::lifecycle::Shutdown;
use tutor_bff::sessions::{MemorySessionStore, SessionStore};

/// A request as seen by a mock backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone, Default)]
pub struct Recorder {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Recorder {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> RecordedRequest {
        self.requests().pop().expect("backend received no request")
    }
}

/// Canned backend answer.
#[derive(Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: Bytes,
}

impl MockResponse {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: Some("application/json"),
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }

    pub fn text(status: u16, content_type: Option<&'static str>, body: &str) -> Self {
        Self {
            status,
            content_type,
            body: Bytes::copy_from_slice(body.as_bytes()),
        }
    }
}

/// Start an axum backend that records every request and answers with `response`.
pub async fn start_mock_backend(response: MockResponse) -> (SocketAddr, Recorder) {
    let recorder = Recorder::default();
    let seen = recorder.clone();

    let app = Router::new().fallback(move |request: Request<Body>| {
        let seen = seen.clone();
        let response = response.clone();
        async move {
            let (parts, body) = request.into_parts();
            let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
            seen.requests.lock().unwrap().push(RecordedRequest {
                method: parts.method,
                path: parts.uri.path().to_string(),
                query: parts.uri.query().map(str::to_string),
                headers: parts.headers,
                body,
            });

            let mut builder = Response::builder().status(StatusCode::from_u16(response.status).unwrap());
            if let Some(content_type) = response.content_type {
                builder = builder.header("content-type", content_type);
            }
            builder.body(Body::from(response.body)).unwrap()
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, recorder)
}

/// Read one HTTP/1.1 request (headers plus Content-Length body) off the socket.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut remaining = content_length.saturating_sub(buf.len() - header_end);
    while remaining > 0 {
        let n = socket.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        remaining = remaining.saturating_sub(n);
    }
}

/// Start a raw TCP backend that answers with an event stream made of
/// `chunks`, then either ends it cleanly or drops the connection in the
/// middle of a chunk.
pub async fn start_sse_backend(chunks: Vec<&'static str>, abort: bool) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let chunks = chunks.clone();
            tokio::spawn(async move {
                read_request(&mut socket).await;

                let head = "HTTP/1.1 200 OK\r\n\
                            Content-Type: text/event-stream\r\n\
                            Transfer-Encoding: chunked\r\n\
                            Connection: close\r\n\r\n";
                let _ = socket.write_all(head.as_bytes()).await;

                for chunk in chunks {
                    let framed = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                    let _ = socket.write_all(framed.as_bytes()).await;
                    let _ = socket.flush().await;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }

                if abort {
                    // Announce 64 bytes, deliver 5, hang up.
                    let _ = socket.write_all(b"40\r\ndata:").await;
                    let _ = socket.flush().await;
                    tokio::time::sleep(Duration::from_millis(20)).await;
                } else {
                    let _ = socket.write_all(b"0\r\n\r\n").await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start a raw TCP backend that streams `event` every 20ms until the peer
/// goes away. The receiver gets one message per connection whose writes
/// started failing.
pub async fn start_endless_sse_backend(event: &'static str) -> (SocketAddr, mpsc::UnboundedReceiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                read_request(&mut socket).await;

                let head = "HTTP/1.1 200 OK\r\n\
                            Content-Type: text/event-stream\r\n\
                            Transfer-Encoding: chunked\r\n\r\n";
                if socket.write_all(head.as_bytes()).await.is_err() {
                    let _ = closed_tx.send(());
                    return;
                }

                // Give up after about 30s even if nobody hangs up.
                for _ in 0..1500 {
                    let framed = format!("{:x}\r\n{}\r\n", event.len(), event);
                    let written = socket.write_all(framed.as_bytes()).await;
                    if written.is_err() || socket.flush().await.is_err() {
                        let _ = closed_tx.send(());
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
            });
        }
    });
    (addr, closed_rx)
}

/// Start a backend that accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config pointing at `backend`, or at nothing when `None`.
pub fn config_for(backend: Option<SocketAddr>) -> BffConfig {
    let mut config = BffConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.backend.url = backend.map(|addr| format!("http://{addr}"));
    config.backend.use_real_backend = backend.is_some();
    config.timeouts.connect_secs = 2;
    config
}

/// Start the service with an in-memory session store.
pub async fn spawn_server(config: BffConfig) -> TestServer {
    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    spawn_server_with_store(config, Some(store)).await
}

pub async fn spawn_server_with_store(config: BffConfig, store: Option<Arc<dyn SessionStore>>) -> TestServer {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, store).unwrap();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestServer { addr, shutdown }
}
