//! The HTTP API of a running `panel serve`.

use core::time::Duration;
use std::time::Instant;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

use crate::common::{spawn_mock_database, spawn_panel, wait_for_listening, write_fixture};

async fn get_json(client: &Client, url: &str) -> Value {
    client
        .get(url)
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("response is not JSON")
}

/// Poll `/api/status` until the connection reaches `expected`.
async fn wait_for_connection(client: &Client, base: &str, expected: &str) {
    let start = Instant::now();
    loop {
        let status = get_json(client, &format!("{base}/api/status")).await;
        if status["connection"] == expected {
            return;
        }
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "connection never became {expected}: {status}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn auto_connect_then_query() {
    let database = spawn_mock_database().await;
    let fixture = write_fixture("query", database.addr, true);
    let _panel = spawn_panel(&fixture);
    wait_for_listening(fixture.port, 10).await;
    let base = format!("http://127.0.0.1:{}", fixture.port);
    let client = Client::new();

    wait_for_connection(&client, &base, "connected").await;

    let response = client
        .post(format!("{base}/api/query"))
        .body("SELECT * FROM users;")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"][0]["result"]["query"], "SELECT * FROM users;");
    assert_eq!(body["result"][0]["result"]["ns"], "it");
    assert!(body["elapsed_ms"].as_f64().is_some(), "elapsed missing: {body}");
}

#[tokio::test]
async fn settings_change_invalidates_the_session() {
    let database = spawn_mock_database().await;
    let fixture = write_fixture("settings", database.addr, false);
    let _panel = spawn_panel(&fixture);
    wait_for_listening(fixture.port, 10).await;
    let base = format!("http://127.0.0.1:{}", fixture.port);
    let client = Client::new();

    let status = get_json(&client, &format!("{base}/api/status")).await;
    assert_eq!(status["connection"], "disconnected", "auto-connect is off");

    let response = client
        .post(format!("{base}/api/session/connect"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut settings = get_json(&client, &format!("{base}/api/settings")).await;
    assert!(settings.get("password").is_none(), "password leaked: {settings}");
    settings["namespace"] = json!("elsewhere");
    let saved: Value = client
        .put(format!("{base}/api/settings"))
        .json(&settings)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(saved, json!({ "saved": true, "disconnected": true }));

    let response = client
        .post(format!("{base}/api/query"))
        .body("INFO FOR DB;")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "not_connected");
}

#[tokio::test]
async fn missing_runtime_is_reported_not_fatal() {
    let database = spawn_mock_database().await;
    let fixture = write_fixture("runtime", database.addr, false);
    let _panel = spawn_panel(&fixture);
    wait_for_listening(fixture.port, 10).await;
    let base = format!("http://127.0.0.1:{}", fixture.port);
    let client = Client::new();

    let response = client
        .post(format!("{base}/api/container/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "kind": "runtime_unavailable" }));

    let container = get_json(&client, &format!("{base}/api/container")).await;
    assert_eq!(container["state"], "unknown");
    assert_eq!(container["container"], "surrealdb-ext");
}
