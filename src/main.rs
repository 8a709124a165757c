//! Instrumented HTTP server.
//!
//! ```text
//!   Client ──▶ TraceLayer ──▶ request ID ──▶ instrumentation ──▶ handler
//!                                               │         │
//!                                   MetricRegistry   StructuredLogger
//!                                         │           │     │      │
//!                                    GET /metrics  console file  Loki push
//! ```

use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use instrumented_server::config::Cli;
use instrumented_server::http::HttpServer;
use instrumented_server::lifecycle::Shutdown;
use instrumented_server::observability::{meta, AppMetrics, MetricRegistry, StructuredLogger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        bind_address = %config.server.bind_address,
        remote_log = config.remote_log.enabled,
        "instrumented-server starting"
    );

    let registry = Arc::new(MetricRegistry::new());
    let metrics = Arc::new(AppMetrics::register(registry, &config.metrics)?);
    let logger = Arc::new(StructuredLogger::from_config(&config)?);

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let local_addr = listener.local_addr()?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    shutdown.on_signal(logger.clone());

    logger.info(
        "Server started successfully",
        meta(json!({
            "port": local_addr.port(),
            "environment": config.environment.as_str(),
            "version": env!("CARGO_PKG_VERSION"),
        })),
    );

    let server = HttpServer::new(config, metrics, logger);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
