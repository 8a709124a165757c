//! End-to-end tests of the request observability pipeline over real sockets.

use std::time::{Duration, Instant};

use serde_json::{json, Value};

mod common;

const LIST_LABELS: [&str; 3] = ["GET", "/api/users", "200"];

#[tokio::test]
async fn test_concurrent_requests_are_all_recorded() {
    let server = common::start_server(|_| {}).await;
    let client = reqwest::Client::new();

    let requests: Vec<_> = (0..10)
        .map(|_| {
            let client = client.clone();
            let url = server.url("/api/users");
            tokio::spawn(async move { client.get(url).send().await.unwrap().status() })
        })
        .collect();
    for request in requests {
        assert_eq!(request.await.unwrap(), reqwest::StatusCode::OK);
    }

    let metrics = &server.state.metrics;
    let series = metrics.http_request_duration.series(&LIST_LABELS).unwrap();
    assert_eq!(series.count(), 10);
    assert_eq!(metrics.http_requests_total.get(&LIST_LABELS), Some(10));
    assert_eq!(metrics.user_requests_total.get(&["list"]), Some(10));
    assert_eq!(metrics.active_connections.get(&[]), Some(0.0));

    let cumulative = series.cumulative();
    assert!(cumulative.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(cumulative.last().copied(), Some(10));

    let text = client
        .get(server.url("/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains(
        "http_request_duration_seconds_count{method=\"GET\",route=\"/api/users\",status_code=\"200\"} 10"
    ));
    assert!(text.contains(
        "http_request_duration_seconds_bucket{le=\"+Inf\",method=\"GET\",route=\"/api/users\",status_code=\"200\"} 10"
    ));
}

#[tokio::test]
async fn test_snapshot_is_stable_without_traffic() {
    let server = common::start_server(|_| {}).await;
    reqwest::get(server.url("/health")).await.unwrap();

    let registry = server.state.metrics.registry();
    assert_eq!(registry.snapshot(), registry.snapshot());
}

#[tokio::test]
async fn test_missing_fields_rejected_without_side_effects() {
    let server = common::start_server(|_| {}).await;

    let response = reqwest::Client::new()
        .post(server.url("/api/users"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Name and email are required" }));

    let metrics = &server.state.metrics;
    assert_eq!(metrics.users_created_total.get(&[]), None);
    assert_eq!(
        metrics.http_requests_total.get(&["POST", "/api/users", "400"]),
        Some(1)
    );

    let events = server.log_events();
    let warning = events
        .iter()
        .find(|e| e["message"] == "Invalid user creation request")
        .expect("warn event written to file");
    assert_eq!(warning["level"], "warn");
    assert_eq!(warning["name"], false);
    assert_eq!(warning["email"], false);
    assert_eq!(warning["environment"], "test");
}

#[tokio::test]
async fn test_request_events_carry_request_id() {
    let server = common::start_server(|_| {}).await;

    let response = reqwest::Client::new()
        .get(server.url("/health"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-me");

    let events = server.log_events();
    let completion = events
        .iter()
        .find(|e| e["message"] == "Response 200")
        .unwrap();
    assert_eq!(completion["requestId"], "trace-me");
    assert_eq!(completion["route"], "/health");
    assert_eq!(completion["service"], "instrumented-server");
    assert_eq!(completion["domain"], "app");
}

#[tokio::test]
async fn test_events_shipped_to_remote_endpoint() {
    let loki = common::start_mock_loki(Duration::ZERO).await;
    let base_url = loki.base_url();
    let server = common::start_server(move |config| {
        config.remote_log.enabled = true;
        config.remote_log.alloy_url = base_url;
    })
    .await;

    reqwest::get(server.url("/")).await.unwrap();

    let shipped = common::eventually(Duration::from_secs(3), || {
        loki.received().iter().any(|body| {
            body["streams"][0]["values"][0][1]
                .as_str()
                .is_some_and(|payload| payload.contains("Root endpoint accessed"))
        })
    })
    .await;
    assert!(shipped, "root event never reached the push endpoint");

    let body = loki
        .received()
        .into_iter()
        .find(|b| b["streams"][0]["stream"]["level"] == "info")
        .unwrap();
    let stream = &body["streams"][0];
    assert_eq!(stream["stream"]["app"], "instrumented-server");
    assert_eq!(stream["stream"]["service"], "observability-template");
    let ns = stream["values"][0][0].as_str().unwrap();
    assert!(ns.len() >= 19 && ns.chars().all(|c| c.is_ascii_digit()));
}

#[tokio::test]
async fn test_slow_remote_endpoint_does_not_delay_responses() {
    let loki = common::start_mock_loki(Duration::from_secs(3)).await;
    let base_url = loki.base_url();
    let server = common::start_server(move |config| {
        config.remote_log.enabled = true;
        config.remote_log.alloy_url = base_url;
        config.remote_log.timeout_secs = 1;
    })
    .await;

    let started = Instant::now();
    let response = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(started.elapsed() < Duration::from_millis(500));

    let events = server.log_events();
    assert!(events.iter().any(|e| e["message"] == "Response 200"));
}

#[tokio::test]
async fn test_unreachable_remote_endpoint_is_harmless() {
    let server = common::start_server(|config| {
        config.remote_log.enabled = true;
        config.remote_log.alloy_url = "http://127.0.0.1:1".to_string();
    })
    .await;

    let response = reqwest::get(server.url("/api/users/200")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(server
        .log_events()
        .iter()
        .any(|e| e["message"] == "User retrieved successfully"));
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let server = common::start_server(|_| {}).await;
    reqwest::get(server.url("/health")).await.unwrap();

    server.shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server stops after shutdown");
    assert!(result.unwrap().is_ok());
}
