//! Application instrument set.
//!
//! # Metrics
//! - process resource gauges (see [`crate::observability::process`])
//! - `http_request_duration_seconds` (histogram): latency by method, route, status_code
//! - `http_requests_total` (counter): requests by method, route, status_code
//! - `http_active_connections` (gauge): requests currently in flight
//! - `user_requests_total` (counter): user API calls by endpoint
//! - `users_created_total` (counter): users created
//! - `database_operation_duration_seconds` (histogram): by operation, table

use std::future::Future;
use std::sync::Arc;

use crate::config::MetricsConfig;
use crate::observability::metrics::{Counter, Gauge, Histogram, MetricRegistry, MetricsError};
use crate::observability::process::{ProcessMetrics, ProcessStats};

/// Label names shared by the HTTP request instruments.
pub const HTTP_LABELS: [&str; 3] = ["method", "route", "status_code"];

#[derive(Debug, Clone)]
pub struct AppMetrics {
    registry: Arc<MetricRegistry>,
    pub process: ProcessMetrics,
    pub http_request_duration: Histogram,
    pub http_requests_total: Counter,
    pub active_connections: Gauge,
    pub user_requests_total: Counter,
    pub users_created_total: Counter,
    pub database_operation_duration: Histogram,
}

impl AppMetrics {
    /// Register every instrument on `registry`.
    ///
    /// Fails on the first duplicate or invalid instrument; callers treat this
    /// as fatal at startup.
    pub fn register(
        registry: Arc<MetricRegistry>,
        config: &MetricsConfig,
    ) -> Result<Self, MetricsError> {
        let process = ProcessMetrics::register(&registry)?;
        let http_request_duration = registry.histogram(
            "http_request_duration_seconds",
            "Duration of HTTP requests in seconds",
            &HTTP_LABELS,
            &config.http_duration_buckets,
        )?;
        let http_requests_total = registry.counter(
            "http_requests_total",
            "Total number of HTTP requests",
            &HTTP_LABELS,
        )?;
        let active_connections = registry.gauge(
            "http_active_connections",
            "Number of active HTTP connections",
            &[],
        )?;
        let user_requests_total = registry.counter(
            "user_requests_total",
            "Total user-related API requests",
            &["endpoint"],
        )?;
        let users_created_total = registry.counter(
            "users_created_total",
            "Total number of users created",
            &[],
        )?;
        let database_operation_duration = registry.histogram(
            "database_operation_duration_seconds",
            "Duration of database operations",
            &["operation", "table"],
            &config.db_duration_buckets,
        )?;
        Ok(Self {
            registry,
            process,
            http_request_duration,
            http_requests_total,
            active_connections,
            user_requests_total,
            users_created_total,
            database_operation_duration,
        })
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Re-read the process resource gauges, typically right before a scrape.
    pub fn refresh_process_metrics(&self) -> Result<ProcessStats, MetricsError> {
        self.process.refresh()
    }

    /// Observe the duration and count one request under the same label tuple.
    pub fn record_http_request(
        &self,
        method: &str,
        route: &str,
        status_code: &str,
        duration_secs: f64,
    ) -> Result<(), MetricsError> {
        let labels = [method, route, status_code];
        self.http_request_duration.observe(&labels, duration_secs)?;
        self.http_requests_total.inc(&labels)
    }

    pub fn record_user_action(&self, endpoint: &str) -> Result<(), MetricsError> {
        self.user_requests_total.inc(&[endpoint])
    }

    pub fn record_user_creation(&self) -> Result<(), MetricsError> {
        self.users_created_total.inc(&[])
    }

    pub fn record_database_operation(
        &self,
        operation: &str,
        table: &str,
        duration_secs: f64,
    ) -> Result<(), MetricsError> {
        self.database_operation_duration
            .observe(&[operation, table], duration_secs)
    }

    /// Await `operation`, observing its duration whether it succeeds or not.
    pub async fn time_operation<F, T>(&self, operation: &str, table: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let timer = self
            .database_operation_duration
            .start_timer(&[operation, table]);
        let output = fut.await;
        if let Err(e) = timer.observe_duration() {
            tracing::warn!(operation, table, error = %e, "Failed to record operation duration");
        }
        output
    }
}
