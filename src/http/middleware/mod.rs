//! Axum middleware applied to every route.

pub mod instrumentation;

pub use instrumentation::{instrument_request, RequestTimer};
