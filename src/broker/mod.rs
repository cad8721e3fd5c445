//! Message broker abstraction.
//!
//! # Data Flow
//! ```text
//! RPC client → append() → per-service request stream → backend service
//! backend service → publish() → per-transport response channel
//!     → subscribe() callback → RPC client correlator
//! ```
//!
//! # Design Decisions
//! - The core depends only on this trait; concrete brokers are pluggable
//! - Channel and stream names are transparently namespaced by a key prefix
//! - Streams accept flat string→string entries; non-string values are
//!   JSON-encoded before append
//! - Per-channel delivery order is preserved; cross-channel order is not

pub mod memory;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryBroker;

/// Callback invoked for every message delivered on a subscribed channel.
///
/// Messages arrive as decoded string-keyed JSON maps.
pub type MessageHandler = Arc<dyn Fn(HashMap<String, Value>) + Send + Sync>;

/// Error type for broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker handshake or I/O failed.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    /// An unsubscribe was issued for a channel that was never subscribed.
    #[error("no subscription found for channel {0}")]
    NotSubscribed(String),
}

/// Capability set the gateway core requires from a message broker.
///
/// One implementation is an in-memory broker ([`MemoryBroker`]); a
/// Redis-streams deployment satisfies the same contract.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Establish an inbound subscription on `channel`.
    ///
    /// The subscription is established synchronously: once this returns,
    /// later publishes by peers to `channel` will be observed by
    /// `on_message`. Delivery order on one channel is preserved.
    async fn subscribe(&self, channel: &str, on_message: MessageHandler) -> Result<(), BrokerError>;

    /// Tear down a previously established subscription.
    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError>;

    /// Publish a JSON payload to a pub/sub channel.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError>;

    /// Append a message to a named stream, returning the broker-assigned
    /// entry ID. Non-string values are JSON-encoded so the broker sees a
    /// flat string→string structure.
    async fn append(
        &self,
        stream: &str,
        values: HashMap<String, Value>,
    ) -> Result<String, BrokerError>;

    /// Return a fresh globally unique identifier.
    fn new_id(&self) -> String;

    /// Release all broker resources.
    async fn close(&self) -> Result<(), BrokerError>;
}
