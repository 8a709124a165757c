//! Remote log shipping to a Loki-compatible push endpoint.
//!
//! # Responsibilities
//! - Group events into one stream per `{app, level, service}` label set
//! - POST the envelope once, under a hard timeout
//!
//! # Design Decisions
//! - At-most-once: no queue, no retry, no backpressure
//! - Failures are reported on the console only; the structured logger is not
//!   re-entered from here

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::logging::LogEvent;

/// Path appended to the agent base URL.
pub const LOKI_PUSH_PATH: &str = "/loki/api/v1/push";

#[derive(Debug, Error)]
pub enum ShipError {
    #[error("log push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("log push rejected with status {0}")]
    Status(u16),

    #[error("log payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Push request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    pub streams: Vec<LogStream>,
}

/// One stream: a label set and its `[ns_timestamp, payload]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogStream {
    pub stream: StreamLabels,
    pub values: Vec<[String; 2]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamLabels {
    pub app: String,
    pub level: String,
    pub service: String,
}

#[derive(Debug, Clone)]
pub struct RemoteLogShipper {
    client: reqwest::Client,
    push_url: String,
    app: String,
    service: String,
}

impl RemoteLogShipper {
    pub fn new(
        push_url: impl Into<String>,
        app: &str,
        service: &str,
        timeout: Duration,
    ) -> Result<Self, ShipError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            push_url: push_url.into(),
            app: app.to_string(),
            service: service.to_string(),
        })
    }

    pub fn push_url(&self) -> &str {
        &self.push_url
    }

    /// Build the envelope for `events`, streams in first-seen order.
    pub fn build_request(&self, events: &[LogEvent]) -> Result<PushRequest, ShipError> {
        let mut streams: Vec<LogStream> = Vec::new();

        for event in events {
            let labels = StreamLabels {
                app: self.app.clone(),
                level: event.level().to_string(),
                service: self.service.clone(),
            };
            let value = [nanos(event.timestamp()), serde_json::to_string(event)?];

            match streams.iter_mut().find(|s| s.stream == labels) {
                Some(stream) => stream.values.push(value),
                None => streams.push(LogStream {
                    stream: labels,
                    values: vec![value],
                }),
            }
        }

        Ok(PushRequest { streams })
    }

    /// Send `events` in a single POST.
    pub async fn push(&self, events: &[LogEvent]) -> Result<(), ShipError> {
        if events.is_empty() {
            return Ok(());
        }

        let body = self.build_request(events)?;
        let response = self.client.post(&self.push_url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ShipError::Status(status.as_u16()));
        }
        Ok(())
    }

    /// Fire-and-forget [`push`](Self::push) on a detached task.
    pub fn dispatch(&self, events: Vec<LogEvent>) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                tracing::warn!(url = %self.push_url, "No async runtime; remote log push skipped");
                return;
            }
        };

        let shipper = self.clone();
        handle.spawn(async move {
            if let Err(e) = shipper.push(&events).await {
                tracing::warn!(
                    url = %shipper.push_url,
                    events = events.len(),
                    error = %e,
                    "Failed to send log to remote endpoint"
                );
            }
        });
    }
}

fn nanos(timestamp: DateTime<Utc>) -> String {
    match timestamp.timestamp_nanos_opt() {
        Some(ns) => ns.to_string(),
        None => format!("{}000", timestamp.timestamp_micros()),
    }
}
