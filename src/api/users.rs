//! Demo user API.
//!
//! Exercises the instrumentation end to end: request logs, custom counters,
//! a timed "database" lookup with simulated latency and injectable failures.
//! There is no storage; every response is synthesized.

use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::http::response::{json_error, ApiError};
use crate::http::server::AppState;
use crate::observability::meta;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl User {
    fn new(id: u64, name: &str, email: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            email: email.to_string(),
            created_at: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// IDs above this are treated as existing users.
const KNOWN_USER_THRESHOLD: u64 = 100;

fn sample_users() -> Vec<User> {
    vec![
        User::new(1, "Alice", "alice@example.com"),
        User::new(2, "Bob", "bob@example.com"),
        User::new(3, "Charlie", "charlie@example.com"),
    ]
}

/// Simulated lookup delay, uniform in `[0, max_ms)`.
fn simulated_latency(max_ms: u64) -> Duration {
    if max_ms == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(fastrand::u64(0..max_ms))
    }
}

/// `local@domain.tld`: no whitespace, a single `@`, and a dot inside the domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub async fn list_users(State(state): State<AppState>) -> Result<Response, ApiError> {
    state.logger.info("Users endpoint accessed", meta(json!({})));

    let demo = &state.config.demo;
    let delay = simulated_latency(demo.max_latency_ms);
    let failure_rate = demo.failure_rate;

    let lookup = state
        .metrics
        .time_operation("select", "users", async move {
            tokio::time::sleep(delay).await;
            if fastrand::f64() < failure_rate {
                Err("Database connection failed")
            } else {
                Ok(sample_users())
            }
        })
        .await;

    let users = match lookup {
        Ok(users) => users,
        Err(e) => {
            state
                .logger
                .error("Failed to retrieve users", meta(json!({ "error": e })));
            return Err(ApiError::internal("Failed to retrieve users", e));
        }
    };

    if let Err(e) = state.metrics.record_user_action("list") {
        tracing::warn!(error = %e, "Failed to record user action");
    }
    state.logger.info(
        "Users retrieved successfully",
        meta(json!({ "count": users.len() })),
    );

    let count = users.len();
    Ok(Json(json!({ "users": users, "count": count })).into_response())
}

pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            state.logger.warn(
                "Invalid user creation request",
                meta(json!({ "error": rejection.body_text() })),
            );
            return json_error(StatusCode::BAD_REQUEST, "Invalid JSON body");
        }
    };

    let name = payload.name.filter(|n| !n.is_empty());
    let email = payload.email.filter(|e| !e.is_empty());
    state.logger.info(
        "User creation requested",
        meta(json!({ "name": name, "email": email })),
    );

    let (name, email) = match (name, email) {
        (Some(name), Some(email)) => (name, email),
        (name, email) => {
            state.logger.warn(
                "Invalid user creation request",
                meta(json!({ "name": name.is_some(), "email": email.is_some() })),
            );
            return json_error(StatusCode::BAD_REQUEST, "Name and email are required");
        }
    };

    if !is_valid_email(&email) {
        state
            .logger
            .warn("Invalid email format", meta(json!({ "email": email })));
        return json_error(StatusCode::BAD_REQUEST, "Invalid email format");
    }

    let user = User {
        id: fastrand::u64(4..1004),
        name,
        email,
        created_at: Some(timestamp()),
    };

    if let Err(e) = state
        .metrics
        .record_user_action("create")
        .and_then(|()| state.metrics.record_user_creation())
    {
        tracing::warn!(error = %e, "Failed to record user creation");
    }
    state.logger.info(
        "User created successfully",
        meta(json!({ "userId": user.id, "name": user.name, "email": user.email })),
    );

    (StatusCode::CREATED, Json(json!({ "user": user }))).into_response()
}

pub async fn get_user(State(state): State<AppState>, Path(raw_id): Path<String>) -> Response {
    state
        .logger
        .info("User lookup requested", meta(json!({ "userId": raw_id })));

    let Ok(id) = raw_id.parse::<u64>() else {
        state
            .logger
            .warn("Invalid user ID", meta(json!({ "userId": raw_id })));
        return json_error(StatusCode::BAD_REQUEST, "Invalid user ID");
    };

    if id > KNOWN_USER_THRESHOLD {
        let user = User {
            id,
            name: format!("User {}", id),
            email: format!("user{}@example.com", id),
            created_at: Some(timestamp()),
        };
        state
            .logger
            .info("User retrieved successfully", meta(json!({ "userId": id })));
        return Json(json!({ "user": user })).into_response();
    }

    state
        .logger
        .warn("User not found", meta(json!({ "userId": id })));
    json_error(StatusCode::NOT_FOUND, "User not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, Environment};
    use crate::http::server::build_router;
    use crate::observability::logging::{EventStamp, FileSink};
    use crate::observability::{AppMetrics, MetricRegistry, StructuredLogger};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use std::path::Path as FsPath;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state(log_dir: &FsPath, failure_rate: f64) -> AppState {
        let mut config = AppConfig::default();
        config.environment = Environment::Test;
        config.demo.max_latency_ms = 0;
        config.demo.failure_rate = failure_rate;
        let metrics =
            AppMetrics::register(Arc::new(MetricRegistry::new()), &config.metrics).unwrap();
        let logger = StructuredLogger::new(EventStamp::from_config(&config))
            .with_file(FileSink::new(log_dir, "app.log"));
        AppState::new(config, Arc::new(metrics), Arc::new(logger))
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = build_router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/users")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn logged_messages(dir: &FsPath) -> Vec<(String, String)> {
        std::fs::read_to_string(dir.join("app.log"))
            .unwrap()
            .lines()
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                (
                    v["level"].as_str().unwrap().to_string(),
                    v["message"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a@b.c"));
        assert!(!is_valid_email("alice"));
        assert!(!is_valid_email("alice@example"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("alice@.com"));
        assert!(!is_valid_email("alice@example."));
        assert!(!is_valid_email("al ice@example.com"));
        assert!(!is_valid_email("a@b@c.com"));
    }

    #[tokio::test]
    async fn test_list_users() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), 0.0);

        let (status, body) = send(state.clone(), get("/api/users")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 3);
        assert_eq!(body["users"][0]["name"], "Alice");

        assert_eq!(state.metrics.user_requests_total.get(&["list"]), Some(1));
        let db = state
            .metrics
            .database_operation_duration
            .series(&["select", "users"])
            .unwrap();
        assert_eq!(db.count(), 1);
    }

    #[tokio::test]
    async fn test_list_users_failure() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), 1.0);

        let (status, body) = send(state.clone(), get("/api/users")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["message"], "Failed to retrieve users");

        assert_eq!(state.metrics.user_requests_total.get(&["list"]), None);
        assert_eq!(
            state
                .metrics
                .http_requests_total
                .get(&["GET", "/api/users", "500"]),
            Some(1)
        );
        let messages = logged_messages(dir.path());
        assert!(messages.contains(&("error".into(), "Failed to retrieve users".into())));
    }

    #[tokio::test]
    async fn test_create_user() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), 0.0);

        let (status, body) = send(
            state.clone(),
            post(r#"{"name":"Dana","email":"dana@example.com"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["name"], "Dana");
        let id = body["user"]["id"].as_u64().unwrap();
        assert!((4..1004).contains(&id));
        assert!(body["user"]["createdAt"].is_string());

        assert_eq!(state.metrics.users_created_total.get(&[]), Some(1));
        assert_eq!(state.metrics.user_requests_total.get(&["create"]), Some(1));
    }

    #[tokio::test]
    async fn test_create_user_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), 0.0);

        let (status, body) = send(state.clone(), post("{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Name and email are required" }));
        assert_eq!(state.metrics.users_created_total.get(&[]), None);

        let messages = logged_messages(dir.path());
        assert!(messages.contains(&("warn".into(), "Invalid user creation request".into())));
    }

    #[tokio::test]
    async fn test_create_user_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), 0.0);

        let (status, body) =
            send(state.clone(), post(r#"{"name":"Dana","email":"nope"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid email format");

        let (status, body) = send(state, post("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON body");
    }

    #[tokio::test]
    async fn test_get_user() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), 0.0);

        let (status, body) = send(state.clone(), get("/api/users/150")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["id"], 150);

        let (status, body) = send(state.clone(), get("/api/users/7")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "User not found");

        let (status, body) = send(state.clone(), get("/api/users/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid user ID");

        assert_eq!(
            state
                .metrics
                .http_requests_total
                .get(&["GET", "/api/users/{id}", "404"]),
            Some(1)
        );
    }
}
