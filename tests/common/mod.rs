//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use instrumented_server::config::{AppConfig, Environment};
use instrumented_server::http::{AppState, HttpServer};
use instrumented_server::lifecycle::Shutdown;
use instrumented_server::observability::shipper::LOKI_PUSH_PATH;
use instrumented_server::observability::{AppMetrics, MetricRegistry, StructuredLogger};

/// A server bound to an ephemeral port, logging into a temporary directory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
    log_dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir.path().join("app.log")
    }

    /// Every NDJSON line written so far.
    pub fn log_events(&self) -> Vec<Value> {
        std::fs::read_to_string(self.log_path())
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

/// Start a server with test defaults, adjusted by `configure`.
pub async fn start_server(configure: impl FnOnce(&mut AppConfig)) -> TestServer {
    let log_dir = tempfile::tempdir().unwrap();

    let mut config = AppConfig::default();
    config.environment = Environment::Test;
    config.server.bind_address = "127.0.0.1:0".to_string();
    config.logging.directory = log_dir.path().to_string_lossy().into_owned();
    config.demo.max_latency_ms = 20;
    configure(&mut config);

    let metrics =
        AppMetrics::register(Arc::new(MetricRegistry::new()), &config.metrics).unwrap();
    let logger = StructuredLogger::from_config(&config).unwrap();

    let listener = TcpListener::bind(&config.server.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(config, Arc::new(metrics), Arc::new(logger));
    let state = server.state().clone();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    TestServer {
        addr,
        state,
        shutdown,
        handle,
        log_dir,
    }
}

/// A Loki-compatible push endpoint that records every body it accepts.
pub struct MockLoki {
    pub addr: SocketAddr,
    pub received: Arc<Mutex<Vec<Value>>>,
}

impl MockLoki {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

/// Start a mock push endpoint that answers after `delay`.
pub async fn start_mock_loki(delay: Duration) -> MockLoki {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();

    let app = Router::new().route(
        LOKI_PUSH_PATH,
        post(move |Json(body): Json<Value>| {
            let sink = sink.clone();
            async move {
                tokio::time::sleep(delay).await;
                sink.lock().unwrap().push(body);
                StatusCode::NO_CONTENT
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockLoki { addr, received }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
