//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request instrumentation middleware produces:
//!     → metrics.rs / app_metrics.rs (counters, gauges, histograms)
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → GET /metrics (text exposition scrape)
//!     → console, local NDJSON file
//!     → shipper.rs (remote push, best-effort)
//! ```
//!
//! # Design Decisions
//! - No process-wide singletons: registry and logger are built in `main` and
//!   passed through the HTTP state
//! - Request ID flows into every request log event
//! - Instrumentation is best-effort and never fails a request

pub mod app_metrics;
pub mod logging;
pub mod metrics;
pub mod process;
pub mod shipper;

pub use app_metrics::AppMetrics;
pub use logging::{meta, LogEvent, LogLevel, Metadata, StructuredLogger};
pub use metrics::{MetricRegistry, MetricsError};
pub use process::{ProcessMetrics, ProcessStats};
pub use shipper::RemoteLogShipper;
