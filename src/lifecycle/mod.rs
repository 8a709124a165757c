//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! SIGTERM/SIGINT → log through the structured logger → trigger Shutdown
//!     → server stops accepting → in-flight requests drain → exit
//! ```

pub mod signals;

pub use signals::Shutdown;
