//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::observability::shipper::LOKI_PUSH_PATH;

/// Default histogram buckets for HTTP request durations, in seconds.
pub const DEFAULT_HTTP_BUCKETS: [f64; 8] = [0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Default histogram buckets for database operation durations, in seconds.
pub const DEFAULT_DB_BUCKETS: [f64; 7] = [0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0];

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment mode. Controls debug logging and error detail exposure.
    pub environment: Environment,

    /// Listener and request handling settings.
    pub server: ServerConfig,

    /// Structured logger settings (console + file).
    pub logging: LoggingConfig,

    /// Optional remote log push (Loki-compatible).
    pub remote_log: RemoteLogConfig,

    /// Metric instrument settings.
    pub metrics: MetricsConfig,

    /// Behaviour of the demo API routes.
    pub demo: DemoConfig,
}

/// Deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    #[value(alias = "dev")]
    Development,
    Test,
    #[value(alias = "prod")]
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Request timeout (total time to produce a response) in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 30,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Structured logger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `service` field stamped on every event.
    pub service: String,

    /// Default `domain` tag; callers may override it per event.
    pub domain: String,

    /// Enable the local NDJSON file sink.
    pub file_enabled: bool,

    /// Directory holding the log file. Created if absent.
    pub directory: String,

    /// Log file name inside `directory`.
    pub file_name: String,

    /// Console filter used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            service: "instrumented-server".to_string(),
            domain: "app".to_string(),
            file_enabled: true,
            directory: "logs".to_string(),
            file_name: "app.log".to_string(),
            filter: "instrumented_server=info,tower_http=info".to_string(),
        }
    }
}

/// Remote log push configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteLogConfig {
    /// Enable shipping events to the push endpoint.
    pub enabled: bool,

    /// Base URL of the log agent (e.g., Grafana Alloy on port 3100).
    pub alloy_url: String,

    /// `app` stream label.
    pub app: String,

    /// `service` stream label.
    pub service: String,

    /// Hard timeout for one push, in seconds.
    pub timeout_secs: u64,
}

impl RemoteLogConfig {
    /// Full push URL derived from `alloy_url`.
    pub fn push_url(&self) -> String {
        format!("{}{}", self.alloy_url.trim_end_matches('/'), LOKI_PUSH_PATH)
    }
}

impl Default for RemoteLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            alloy_url: "http://localhost:3100".to_string(),
            app: "instrumented-server".to_string(),
            service: "observability-template".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Metric instrument configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Buckets for `http_request_duration_seconds`.
    pub http_duration_buckets: Vec<f64>,

    /// Buckets for `database_operation_duration_seconds`.
    pub db_duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            http_duration_buckets: DEFAULT_HTTP_BUCKETS.to_vec(),
            db_duration_buckets: DEFAULT_DB_BUCKETS.to_vec(),
        }
    }
}

/// Demo route behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Upper bound (exclusive) of the simulated lookup latency in ms. 0 disables it.
    pub max_latency_ms: u64,

    /// Probability in [0, 1] that a user listing fails.
    pub failure_rate: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            max_latency_ms: 100,
            failure_rate: 0.0,
        }
    }
}
