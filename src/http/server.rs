//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (tracing, request ID, instrumentation, limits)
//! - Bind the server to a listener and drain on shutdown
//!
//! # Design Decisions
//! - Instrumentation wraps every route and the fallback
//! - The request timeout sits inside instrumentation so timeouts are recorded

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::DefaultBodyLimit, middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::api;
use crate::config::AppConfig;
use crate::http::handlers;
use crate::http::middleware::instrument_request;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::observability::{AppMetrics, StructuredLogger};

/// Application state injected into handlers and middleware.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub metrics: Arc<AppMetrics>,
    pub logger: Arc<StructuredLogger>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, metrics: Arc<AppMetrics>, logger: Arc<StructuredLogger>) -> Self {
        Self {
            config: Arc::new(config),
            metrics,
            logger,
            started_at: Instant::now(),
        }
    }
}

/// HTTP server for the instrumented service.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(config: AppConfig, metrics: Arc<AppMetrics>, logger: Arc<StructuredLogger>) -> Self {
        let state = AppState::new(config, metrics, logger);
        let router = build_router(state.clone());
        Self { router, state }
    }

    /// Clone of the router, for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        self.state.logger.flush();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
///
/// Layers listed later wrap the ones before them.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let server = &state.config.server;
    let timeout = Duration::from_secs(server.request_timeout_secs);
    let body_limit = server.body_limit_bytes;

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .merge(api::routes())
        .fallback(handlers::not_found)
        .layer(TimeoutLayer::new(timeout))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), instrument_request))
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
