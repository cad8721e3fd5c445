//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Metric recording is cheap and lock-free; helpers are never called
//!   while holding the pool mutex
//! - One helper function per metric keeps names and labels in one place

pub mod logging;
pub mod metrics;
