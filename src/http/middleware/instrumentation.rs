//! Request instrumentation middleware.
//!
//! Per request: `STARTED → (handler runs) → COMPLETING → RECORDED`.
//!
//! On start the active-connections gauge goes up and a [`RequestTimer`] is
//! created. The timer is consumed exactly once: by [`RequestTimer::finish`]
//! when a response exists, or by its `Drop` impl when the request future is
//! dropped first (client disconnect). Either way the gauge comes back down.
//!
//! The middleware is also the handler-error boundary: panics are caught and
//! turned into a 500, and failures carried on the response are logged with
//! the request context.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use futures_util::FutureExt;
use serde_json::{json, Value};

use crate::http::request::{request_id, user_agent};
use crate::http::response::{unhandled_error_response, HandlerFailure};
use crate::http::server::AppState;
use crate::observability::{meta, AppMetrics, LogLevel, MetricsError, StructuredLogger};

/// Status label recorded when the client went away before a response existed.
pub const ABORTED_STATUS: u16 = 499;

/// Per-request timing context, owned by one middleware invocation.
#[derive(Debug)]
pub struct RequestTimer {
    metrics: Arc<AppMetrics>,
    logger: Arc<StructuredLogger>,
    start: Instant,
    method: String,
    path: String,
    route: String,
    request_id: Option<String>,
    completed: bool,
}

impl RequestTimer {
    /// Capture the start instant and count the request as active.
    pub fn start(
        metrics: Arc<AppMetrics>,
        logger: Arc<StructuredLogger>,
        request: &Request,
    ) -> Self {
        let path = request.uri().path().to_string();
        // Unmatched requests (404 fallback) are labelled with the raw path.
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(|matched| matched.as_str().to_string())
            .unwrap_or_else(|| path.clone());

        if let Err(e) = metrics.active_connections.inc(&[]) {
            report_metric_error("http_active_connections", &e);
        }

        Self {
            metrics,
            logger,
            start: Instant::now(),
            method: request.method().to_string(),
            path,
            route,
            request_id: request_id(request.headers()).map(str::to_string),
            completed: false,
        }
    }

    /// Record the completed request. Returns the measured duration in seconds.
    pub fn finish(mut self, status: StatusCode, failure: Option<&HandlerFailure>) -> f64 {
        self.completed = true;
        let mut extra = serde_json::Map::new();
        if let Some(failure) = failure {
            extra.insert("error".into(), Value::String(failure.detail.clone()));
        }
        self.record(status.as_u16(), LogLevel::Info, extra)
    }

    fn record(&self, status: u16, level: LogLevel, extra: serde_json::Map<String, Value>) -> f64 {
        let duration = self.start.elapsed().as_secs_f64();
        let status_code = status.to_string();

        if let Err(e) =
            self.metrics
                .record_http_request(&self.method, &self.route, &status_code, duration)
        {
            report_metric_error("http_request", &e);
        }
        if let Err(e) = self.metrics.active_connections.dec(&[]) {
            report_metric_error("http_active_connections", &e);
        }

        let mut fields = meta(json!({
            "method": self.method,
            "path": self.path,
            "route": self.route,
            "statusCode": status,
            "duration": duration,
        }));
        if let Some(id) = &self.request_id {
            fields.insert("requestId".into(), Value::String(id.clone()));
        }
        fields.extend(extra);

        self.logger.log(level, format!("Response {}", status), fields);
        duration
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        let mut extra = serde_json::Map::new();
        extra.insert("aborted".into(), Value::Bool(true));
        self.record(ABORTED_STATUS, LogLevel::Warn, extra);
    }
}

/// Axum middleware wrapping every route and the fallback.
pub async fn instrument_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let timer = RequestTimer::start(state.metrics.clone(), state.logger.clone(), &request);

    let url = request.uri().to_string();
    let agent = user_agent(request.headers()).map(str::to_string);
    state.logger.debug(
        "Request received",
        meta(json!({
            "method": request.method().as_str(),
            "path": request.uri().path(),
            "userAgent": agent,
            "requestId": timer.request_id,
        })),
    );
    let method = request.method().clone();

    let response = match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            state.logger.error(
                "Unhandled error",
                meta(json!({
                    "error": detail,
                    "method": method.as_str(),
                    "url": url,
                    "userAgent": agent,
                    "requestId": timer.request_id,
                })),
            );
            unhandled_error_response(state.logger.is_development(), &detail)
        }
    };

    let failure = response.extensions().get::<HandlerFailure>();
    timer.finish(response.status(), failure);
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn report_metric_error(metric: &str, error: &MetricsError) {
    tracing::error!(metric, error = %error, "Failed to record request metrics");
}
