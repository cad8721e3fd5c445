//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Broker → Pool → HTTP server
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C received → drain flag flips, broadcast fires
//!         → pool refuses new acquisitions
//!         → HTTP server stops accepting
//!         → pool monitors exit
//!         → pool closes clients, broker releases resources
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the signal out to every long-running task
//! - The pool polls a drain flag so saturated waiters shed immediately
//!   instead of queueing behind a fleet that is being torn down
//! - Teardown order mirrors startup order in reverse

pub mod shutdown;

pub use shutdown::{DrainFlag, Shutdown};
