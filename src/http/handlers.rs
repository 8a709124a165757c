//! Service endpoints: banner, health, metrics scrape, and the 404 fallback.

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;

use crate::http::server::AppState;
use crate::observability::{meta, metrics::CONTENT_TYPE, ProcessStats};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the server state was created.
    pub uptime: f64,
    pub memory: MemoryUsage,
    pub environment: String,
    pub version: &'static str,
}

/// Process memory in bytes; `null` where the platform cannot report it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss: Option<u64>,
    pub virtual_memory: Option<u64>,
}

impl From<ProcessStats> for MemoryUsage {
    fn from(stats: ProcessStats) -> Self {
        Self {
            rss: stats.resident_memory_bytes,
            virtual_memory: stats.virtual_memory_bytes,
        }
    }
}

pub async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.logger.info("Root endpoint accessed", meta(json!({})));
    Json(json!({
        "message": "Instrumented server",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment.as_str(),
        "endpoints": {
            "health": "/health",
            "metrics": "/metrics",
            "api": "/api/users",
        },
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: state.started_at.elapsed().as_secs_f64(),
        memory: ProcessStats::collect().into(),
        environment: state.config.environment.to_string(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Text exposition of every registered instrument.
pub async fn metrics(State(state): State<AppState>) -> Response {
    if let Err(e) = state.metrics.refresh_process_metrics() {
        tracing::warn!(error = %e, "Failed to refresh process metrics");
    }
    let body = state.metrics.registry().snapshot();
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response()
}

pub async fn not_found(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    state.logger.warn(
        "Route not found",
        meta(json!({
            "method": method.as_str(),
            "url": uri.to_string(),
        })),
    );
    let body = json!({
        "error": "Not found",
        "message": format!("Route {} {} not found", method, uri),
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
