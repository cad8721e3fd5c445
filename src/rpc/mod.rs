//! RPC subsystem: envelope, transport, and client pool.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → pool.rs (acquire a transport, bounded + elastic)
//!     → client.rs (correlate one call)
//!         → message.rs (envelope with fresh message_id)
//!         → broker append on service.<svc>.rpc/<method>
//!         → parked on a one-shot slot keyed by message_id
//!     backend replies on the transport's whoami channel
//!         → subscription callback wakes the parked caller
//!     → pool.rs (release the slot)
//! ```
//!
//! # Design Decisions
//! - Correlation is by envelope message_id, never by broker entry ID
//! - One subscription per transport serves all of its in-flight calls
//! - The pool's mutex is the only lock in the core; the per-transport
//!   pending map is a concurrent map touched outside it

pub mod client;
pub mod message;
pub mod pool;

use thiserror::Error;

use crate::broker::BrokerError;

pub use client::RpcClient;
pub use message::RpcMessage;
pub use pool::{ClientGuard, RpcClientPool};

/// Error type for RPC operations.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Broker handshake or I/O failure, surfaced as-is and never retried.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// `call` was issued before `start`.
    #[error("client is not subscribed to its response channel")]
    NotStarted,

    /// `start` was issued on a client that is already subscribed.
    #[error("client is already subscribed")]
    AlreadyStarted,

    /// The per-call deadline elapsed before a response arrived.
    #[error("rpc call timeout")]
    CallTimeout,

    /// Pool acquisition timed out with every transport at its cap.
    #[error("timeout: no available clients")]
    PoolSaturated,

    /// Acquisition refused because the gateway has begun draining.
    #[error("gateway is shutting down")]
    ShuttingDown,

    /// The transport was closed while the call was in flight, or `start`
    /// was issued after `close`.
    #[error("client closed")]
    ClientClosed,
}
