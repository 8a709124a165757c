//! OS signal handling and shutdown broadcast.
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The received signal is logged through the structured logger so it
//!   reaches the file and remote sinks too
//! - A signal only triggers the broadcast; draining is the server's job

use std::sync::Arc;

use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::observability::{meta, StructuredLogger};

/// Broadcast that tells the server to stop accepting and drain.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receivers only see triggers sent after they subscribed.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Spawn a task that triggers this broadcast on the first SIGINT or SIGTERM.
    pub fn on_signal(&self, logger: Arc<StructuredLogger>) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move { wait_for_signal(&logger, &shutdown).await })
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for SIGINT or SIGTERM, log it, and trigger `shutdown`.
pub async fn wait_for_signal(logger: &StructuredLogger, shutdown: &Shutdown) {
    let name = next_signal().await;
    logger.info(
        format!("Received {}, shutting down gracefully", name),
        meta(json!({ "signal": name })),
    );
    shutdown.trigger();
}

#[cfg(unix)]
async fn next_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install SIGTERM handler");
            return ctrl_c().await;
        }
    };

    tokio::select! {
        name = ctrl_c() => name,
        _ = term.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn next_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    "SIGINT"
}
