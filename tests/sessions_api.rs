//! Chat-session routes over the in-memory store.

use reqwest::Client;
use serde_json::{json, Value};

mod common;

async fn create_session(client: &Client, server: &common::TestServer, owner: &str, visibility: &str) -> String {
    let res = client
        .post(server.url("/api/chat-sessions"))
        .json(&json!({"user_id": owner, "title": "Photosynthesis", "visibility": visibility}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    body["session"]["id"].as_str().unwrap().to_string()
}

async fn add_message(client: &Client, server: &common::TestServer, session: &str, user: &str, content: &str) {
    let res = client
        .post(server.url(&format!("/api/chat-sessions/{session}/messages")))
        .json(&json!({"userId": user, "role": "user", "content": content}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
}

#[tokio::test]
async fn test_fork_copies_private_session() {
    let server = common::spawn_server(common::config_for(None)).await;
    let client = Client::new();

    let original = create_session(&client, &server, "alice", "private").await;
    for text in ["light reactions", "calvin cycle", "chlorophyll"] {
        add_message(&client, &server, &original, "alice", text).await;
    }

    let res = client
        .post(server.url("/api/chat-sessions/fork"))
        .json(&json!({"sessionId": original, "userId": "bob"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["messagesCopied"], 3);
    let forked = &body["session"];
    assert_eq!(forked["user_id"], "bob");
    assert_eq!(forked["visibility"], "private");
    assert_eq!(forked["is_public"], false);
    assert_eq!(forked["forked_from"], original.as_str());
    assert!(forked["vector_store_id"].as_str().unwrap().starts_with("vs_local_"));

    let forked_id = forked["id"].as_str().unwrap();
    let messages: Value = client
        .get(server.url(&format!("/api/chat-sessions/{forked_id}/messages")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = messages["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["content"], "light reactions");
    assert!(messages.iter().all(|m| m["user_id"] == "bob"));
}

#[tokio::test]
async fn test_fork_rejections() {
    let server = common::spawn_server(common::config_for(None)).await;
    let client = Client::new();

    let private = create_session(&client, &server, "alice", "private").await;
    let public = create_session(&client, &server, "alice", "public").await;

    let own = client
        .post(server.url("/api/chat-sessions/fork"))
        .json(&json!({"session_id": private, "user_id": "alice"}))
        .send()
        .await
        .unwrap();
    assert_eq!(own.status(), 400);
    let own: Value = own.json().await.unwrap();
    assert!(own["error"].is_string());

    let shared = client
        .post(server.url("/api/chat-sessions/fork"))
        .json(&json!({"session_id": public, "user_id": "bob"}))
        .send()
        .await
        .unwrap();
    assert_eq!(shared.status(), 400);

    let unknown = client
        .post(server.url("/api/chat-sessions/fork"))
        .json(&json!({"session_id": "6f1c1e8e-3f7e-4c55-9a51-0f2f6f0d9a11", "user_id": "bob"}))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);

    let missing = client
        .post(server.url("/api/chat-sessions/fork"))
        .json(&json!({"user_id": "bob"}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 400);
}

#[tokio::test]
async fn test_fork_provisions_vector_store_on_backend() {
    let (backend, recorder) =
        common::start_mock_backend(common::MockResponse::json(200, r#"{"id":"vs_remote_1"}"#)).await;
    let server = common::spawn_server(common::config_for(Some(backend))).await;
    let client = Client::new();

    let original = create_session(&client, &server, "alice", "private").await;
    let body: Value = client
        .post(server.url("/api/chat-sessions/fork"))
        .json(&json!({"sessionId": original, "userId": "bob"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["session"]["vector_store_id"], "vs_remote_1");
    let seen = recorder.last();
    assert_eq!(seen.path, "/vector-stores");
    assert_eq!(serde_json::from_slice::<Value>(&seen.body).unwrap()["user_id"], "bob");
}

#[tokio::test]
async fn test_scenario_progress_lifecycle() {
    let server = common::spawn_server(common::config_for(None)).await;
    let client = Client::new();
    let session = create_session(&client, &server, "alice", "private").await;
    let url = server.url(&format!("/api/chat-sessions/{session}/scenario-progress"));

    let empty: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert!(empty["progress"].is_null());

    let first: Value = client
        .put(&url)
        .json(&json!({"scenario_id": "lab-safety", "current_step": 1, "responses": {"q1": "goggles"}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let started = first["progress"]["scenario_started_at"].clone();
    assert!(started.is_string());
    assert!(first["progress"]["scenario_completed_at"].is_null());

    let done: Value = client
        .put(&url)
        .json(&json!({"completed": true, "responses": {"q2": "gloves"}}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(done["progress"]["completed"], true);
    assert!(done["progress"]["scenario_completed_at"].is_string());
    assert_eq!(done["progress"]["scenario_started_at"], started);
    assert_eq!(done["progress"]["responses"], json!({"q1": "goggles", "q2": "gloves"}));

    let stored: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(stored["progress"], done["progress"]);

    let cleared: Value = client.delete(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(cleared["success"], true);
    let after: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert!(after["progress"].is_null());
}

#[tokio::test]
async fn test_progress_unknown_session() {
    let server = common::spawn_server(common::config_for(None)).await;
    let res = reqwest::get(server.url(
        "/api/chat-sessions/6f1c1e8e-3f7e-4c55-9a51-0f2f6f0d9a11/scenario-progress",
    ))
    .await
    .unwrap();
    assert_eq!(res.status(), 404);
}

#[tokio::test]
async fn test_list_sessions_requires_user() {
    let server = common::spawn_server(common::config_for(None)).await;
    let client = Client::new();
    create_session(&client, &server, "alice", "private").await;

    let missing = client.get(server.url("/api/chat-sessions")).send().await.unwrap();
    assert_eq!(missing.status(), 400);

    let listed: Value = client
        .get(server.url("/api/chat-sessions?user_id=alice"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["sessions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_sessions_without_database() {
    let server = common::spawn_server_with_store(common::config_for(None), None).await;

    let res = Client::new()
        .post(server.url("/api/chat-sessions/fork"))
        .json(&json!({"sessionId": "6f1c1e8e-3f7e-4c55-9a51-0f2f6f0d9a11", "userId": "bob"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "CHAT_DATABASE_URL is not configured");
}

#[tokio::test]
async fn test_bodies_with_both_spellings() {
    let server = common::spawn_server(common::config_for(None)).await;
    let client = Client::new();

    let res = client
        .post(server.url("/api/chat-sessions"))
        .json(&json!({"user_id": "alice", "userId": "alice", "title": "Osmosis"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
    let body: Value = res.json().await.unwrap();
    let session = body["session"]["id"].as_str().unwrap().to_string();

    let res = client
        .post(server.url(&format!("/api/chat-sessions/{session}/messages")))
        .json(&json!({"user_id": "alice", "userId": "alice", "role": "user", "content": "why?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);

    let res = client
        .put(server.url(&format!("/api/chat-sessions/{session}/scenario-progress")))
        .json(&json!({"currentStep": 2, "current_step": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["progress"]["current_step"], 2);

    let res = client
        .post(server.url("/api/chat-sessions/fork"))
        .json(&json!({"session_id": session, "sessionId": session, "user_id": "bob", "userId": "bob"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 201);
}
