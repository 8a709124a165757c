//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, rates within [0, 1])
//! - Check histogram buckets and the remote push URL up front

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::AppConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the whole config, collecting every error instead of stopping at the first.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("`{}` is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if config.server.body_limit_bytes == 0 {
        errors.push(ValidationError::new("server.body_limit_bytes", "must be > 0"));
    }

    if config.logging.service.trim().is_empty() {
        errors.push(ValidationError::new("logging.service", "must not be empty"));
    }
    if config.logging.file_enabled && config.logging.file_name.trim().is_empty() {
        errors.push(ValidationError::new("logging.file_name", "must not be empty"));
    }

    if config.remote_log.enabled {
        match Url::parse(&config.remote_log.push_url()) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                "remote_log.alloy_url",
                format!("unsupported scheme `{}`", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("remote_log.alloy_url", e.to_string())),
        }
        if config.remote_log.timeout_secs == 0 {
            errors.push(ValidationError::new("remote_log.timeout_secs", "must be > 0"));
        }
    }

    check_buckets(&mut errors, "metrics.http_duration_buckets", &config.metrics.http_duration_buckets);
    check_buckets(&mut errors, "metrics.db_duration_buckets", &config.metrics.db_duration_buckets);

    if !(0.0..=1.0).contains(&config.demo.failure_rate) {
        errors.push(ValidationError::new("demo.failure_rate", "must be within [0, 1]"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_buckets(errors: &mut Vec<ValidationError>, field: &str, buckets: &[f64]) {
    if buckets.is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
    } else if buckets.iter().any(|b| !b.is_finite()) {
        errors.push(ValidationError::new(field, "must be finite"));
    } else if !buckets.windows(2).all(|w| w[0] < w[1]) {
        errors.push(ValidationError::new(field, "must be strictly ascending"));
    }
}
