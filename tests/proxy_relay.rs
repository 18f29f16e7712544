//! Passthrough proxy behavior against mock backends.

use axum::http::Method;
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_get_without_body_forwards_without_body() {
    let (backend, recorder) = common::start_mock_backend(common::MockResponse::json(200, r#"{"ok":true}"#)).await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;

    let res = reqwest::Client::new()
        .get(server.url("/api/proxy/documents?page=2"))
        .header("authorization", "Bearer t0ken")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({"ok": true}));

    let seen = recorder.last();
    assert_eq!(seen.method, Method::GET);
    assert_eq!(seen.path, "/documents");
    assert_eq!(seen.query.as_deref(), Some("page=2"));
    assert!(seen.body.is_empty());
    assert_eq!(seen.headers.get("authorization").unwrap(), "Bearer t0ken");
    assert_eq!(seen.headers.get("cache-control").unwrap(), "no-cache");
}

#[tokio::test]
async fn test_bare_proxy_path_hits_status() {
    let (backend, recorder) = common::start_mock_backend(common::MockResponse::json(200, r#"{"status":"up"}"#)).await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;

    let res = reqwest::get(server.url("/api/proxy")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(recorder.last().path, "/status");
}

#[tokio::test]
async fn test_json_body_is_forwarded() {
    let (backend, recorder) = common::start_mock_backend(common::MockResponse::json(201, r#"{"id":"d1"}"#)).await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;

    let res = reqwest::Client::new()
        .post(server.url("/api/proxy/documents"))
        .json(&json!({"title": "Mitosis"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 201);
    let seen = recorder.last();
    assert_eq!(seen.headers.get("content-type").unwrap(), "application/json");
    assert_eq!(serde_json::from_slice::<Value>(&seen.body).unwrap(), json!({"title": "Mitosis"}));
}

#[tokio::test]
async fn test_backend_error_status_is_preserved() {
    let (backend, _) = common::start_mock_backend(common::MockResponse::text(
        503,
        Some("text/plain"),
        "maintenance window",
    ))
    .await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;

    let res = reqwest::get(server.url("/api/proxy/documents")).await.unwrap();
    assert_eq!(res.status(), 503);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Backend request failed");
    assert_eq!(body["details"], "maintenance window");
    assert_eq!(body["status"], 503);
}

#[tokio::test]
async fn test_raw_text_keeps_content_type() {
    let (backend, _) =
        common::start_mock_backend(common::MockResponse::text(200, Some("text/csv"), "a,b\n1,2\n")).await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;

    let res = reqwest::get(server.url("/api/proxy/export")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers().get("content-type").unwrap(), "text/csv");
    assert_eq!(res.text().await.unwrap(), "a,b\n1,2\n");
}

#[tokio::test]
async fn test_raw_text_without_content_type_is_plain() {
    let (backend, _) = common::start_mock_backend(common::MockResponse::text(200, None, "pong")).await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;

    let res = reqwest::get(server.url("/api/proxy/ping")).await.unwrap();
    assert_eq!(res.status(), 200);
    assert!(res
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(res.text().await.unwrap(), "pong");
}

#[tokio::test]
async fn test_unreachable_backend_reports_connection_error() {
    let backend = common::closed_port().await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;

    let res = reqwest::get(server.url("/api/proxy/documents")).await.unwrap();
    assert_eq!(res.status(), 500);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Backend connection error");
    assert_eq!(body["backendUrl"], format!("http://{backend}"));
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_missing_backend_url_is_configuration_error() {
    let server = common::spawn_server(common::config_for(None)).await;

    let res = reqwest::get(server.url("/api/proxy/documents")).await.unwrap();
    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "NEXT_PUBLIC_BACKEND_URL is not configured");
}

#[tokio::test]
async fn test_multipart_upload_passes_through() {
    let (backend, recorder) = common::start_mock_backend(common::MockResponse::json(200, r#"{"uploaded":1}"#)).await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;

    let boundary = "XyZ123";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\ncell walls\r\n--{boundary}--\r\n"
    );
    let res = reqwest::Client::new()
        .post(server.url("/api/proxy/upload"))
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .body(body.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    let seen = recorder.last();
    assert_eq!(
        seen.headers.get("content-type").unwrap(),
        &format!("multipart/form-data; boundary={boundary}")
    );
    assert_eq!(seen.body, body.as_bytes());
}

#[tokio::test]
async fn test_request_id_is_returned() {
    let (backend, _) = common::start_mock_backend(common::MockResponse::json(200, "{}")).await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;

    let res = reqwest::get(server.url("/api/proxy/ping")).await.unwrap();
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_client_config_reflects_host() {
    let (backend, _) = common::start_mock_backend(common::MockResponse::json(200, "{}")).await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;
    let client = reqwest::Client::new();

    let local: Value = client
        .get(server.url("/api/client-config"))
        .header("host", "localhost:3000")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(local["target"], "external");
    assert_eq!(local["apiBase"], format!("http://{backend}"));

    let production: Value = client
        .get(server.url("/api/client-config"))
        .header("host", "tutor.example.org")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(production["target"], "proxy");
    assert_eq!(production["apiBase"], "/api/proxy");
}

#[tokio::test]
async fn test_backend_that_never_answers_times_out_as_envelope() {
    let backend = common::start_silent_backend().await;
    let mut config = common::config_for(Some(backend));
    config.timeouts.request_secs = 1;
    let server = common::spawn_server(config).await;

    let res = reqwest::get(server.url("/api/proxy/documents")).await.unwrap();
    assert_eq!(res.status(), 500);
    assert!(res
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Backend connection error");
    assert_eq!(body["status"], 500);
    assert_eq!(body["backendUrl"], format!("http://{backend}"));
    assert_eq!(body["message"], "Backend did not respond within 1s");
}

#[tokio::test]
async fn test_oversized_bodies_get_envelopes() {
    let (backend, recorder) = common::start_mock_backend(common::MockResponse::json(200, "{}")).await;
    let mut config = common::config_for(Some(backend));
    config.listener.max_body_bytes = 64;
    let server = common::spawn_server(config).await;
    let client = reqwest::Client::new();
    let big = json!({"question": "x".repeat(1024), "user_id": "alice"});

    for path in ["/api/proxy/documents", "/api/proxy/chat", "/api/chat-sessions"] {
        let res = client.post(server.url(path)).json(&big).send().await.unwrap();
        assert_eq!(res.status(), 413, "{path}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "Failed to read request body", "{path}");
        assert_eq!(body["status"], 413);
    }
    assert!(recorder.requests().is_empty());
}

#[tokio::test]
async fn test_stream_path_interruption_ends_with_one_error_event() {
    let token = "data: {\"type\":\"token\",\"content\":\"a\"}\n\n";
    let backend = common::start_sse_backend(vec![token], true).await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;

    let res = reqwest::Client::new()
        .post(server.url("/api/proxy/stream"))
        .json(&json!({"question": "go"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.headers().get("content-type").unwrap(), "text/event-stream");
    let body = res.text().await.unwrap();
    assert!(body.starts_with(token));
    assert_eq!(body.matches("\"type\":\"error\"").count(), 1);
    assert!(body.ends_with("\n\n"));
}
