//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → server.rs (axum routing, tracing, request timeout)
//!     → params.rs (validate + extract the argument map)
//!     → handler.rs (acquire transport → rpc call → unwrap response)
//!     → JSON reply (200 / 400 / 503 / 500)
//! ```

pub mod handler;
pub mod params;
pub mod server;

pub use server::HttpServer;
