//! Instrumented HTTP service library.
//!
//! Request-scoped observability for an Axum service: a metric registry with
//! text exposition, request instrumentation middleware, a structured logger
//! with console, file and remote sinks, and a Loki push shipper.

pub mod api;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
