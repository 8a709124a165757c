//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID, header helpers)
//!     → middleware/ (timing, metrics, request logs, panic boundary)
//!     → handlers.rs / api (route handlers)
//!     → response.rs (error bodies)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{ApiError, HandlerFailure};
pub use server::{AppState, HttpServer};
