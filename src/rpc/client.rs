//! RPC transport.
//!
//! # Responsibilities
//! - Own one broker subscription (the transport's `whoami` channel)
//! - Publish outbound envelopes to per-service request streams
//! - Demultiplex inbound responses to parked callers by `message_id`
//! - Enforce per-call deadlines
//!
//! # Design Decisions
//! - One subscription serves arbitrarily many in-flight calls; backends
//!   reply to the `who` channel carried in the envelope
//! - The pending slot is registered before the outbound append, so a
//!   response can never arrive before its slot exists
//! - The slot is removed on every exit path: delivery, deadline, append
//!   failure, close, and a caller future dropped mid-wait

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time;

use crate::broker::{Broker, MessageHandler};
use crate::observability::metrics;
use crate::rpc::message::RpcMessage;
use crate::rpc::RpcError;

/// Applied when a caller passes no timeout, or a zero one.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

type PendingMap = DashMap<String, oneshot::Sender<RpcMessage>>;

/// Unregisters a call's pending slot when the call ends, however it ends.
/// A dropped caller must not strand its correlation entry.
struct PendingSlotCleanup {
    pending: Arc<PendingMap>,
    message_id: String,
}

impl Drop for PendingSlotCleanup {
    fn drop(&mut self) {
        self.pending.remove(&self.message_id);
    }
}

/// One logical broker attachment, multiplexing many concurrent calls.
///
/// Owned by the pool that created it; handlers borrow it for the duration
/// of one request.
pub struct RpcClient {
    broker: Arc<dyn Broker>,
    whoami: String,
    pending: Arc<PendingMap>,
    subscribed: AtomicBool,
    closed: AtomicBool,
}

impl RpcClient {
    /// Create an unstarted client with a broker-assigned identity.
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        let whoami = broker.new_id();
        Self {
            broker,
            whoami,
            pending: Arc::new(DashMap::new()),
            subscribed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// The transport identity; also the pub/sub channel responses arrive on.
    pub fn whoami(&self) -> &str {
        &self.whoami
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    /// Number of calls currently parked on this transport.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Subscribe on the `whoami` channel and begin dispatching responses.
    ///
    /// The subscription callback takes the pending slot for the inbound
    /// envelope's `message_id` and delivers the envelope to it. Responses
    /// with no matching slot are counted and dropped.
    pub async fn start(&self) -> Result<(), RpcError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RpcError::ClientClosed);
        }
        if self.subscribed.load(Ordering::SeqCst) {
            return Err(RpcError::AlreadyStarted);
        }

        let pending = Arc::clone(&self.pending);
        let handler: MessageHandler = Arc::new(move |raw| {
            let message = RpcMessage::from_map(raw);
            match pending.remove(&message.message_id) {
                Some((_, slot)) => {
                    // A send can only fail if the caller already gave up
                    // on its deadline; the response is dropped either way.
                    let _ = slot.send(message);
                }
                None => {
                    metrics::record_unmatched_response();
                    tracing::debug!(
                        message_id = %message.message_id,
                        "dropping response with no pending call"
                    );
                }
            }
        });

        self.broker.subscribe(&self.whoami, handler).await?;
        self.subscribed.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Publish one RPC request and wait for its correlated response.
    ///
    /// Returns the inbound envelope's `response` map, or
    /// [`RpcError::CallTimeout`] when the deadline elapses first.
    pub async fn call(
        &self,
        service: &str,
        method: &str,
        args: HashMap<String, Value>,
        timeout: Option<Duration>,
    ) -> Result<HashMap<String, Value>, RpcError> {
        if !self.subscribed.load(Ordering::SeqCst) {
            return Err(RpcError::NotStarted);
        }

        let effective = match timeout {
            Some(t) if !t.is_zero() => t,
            _ => DEFAULT_CALL_TIMEOUT,
        };

        let request = RpcMessage::new(method, &self.whoami, args, effective);
        let message_id = request.message_id.clone();

        let (slot, wait) = oneshot::channel();
        // Registration must be visible before the append; a fast backend
        // can reply before append() returns.
        self.pending.insert(message_id.clone(), slot);
        // Removes the slot however this call ends: delivery, deadline,
        // append failure, or the caller's future being dropped mid-wait.
        let _cleanup = PendingSlotCleanup {
            pending: Arc::clone(&self.pending),
            message_id: message_id.clone(),
        };

        let stream = format!("service.{service}.rpc/{}", request.rpc);
        self.broker.append(&stream, request.to_map()).await?;

        match time::timeout(effective, wait).await {
            Ok(Ok(response)) => Ok(response.response),
            Ok(Err(_)) => Err(RpcError::ClientClosed),
            Err(_) => {
                metrics::record_call_timeout();
                tracing::warn!(
                    message_id = %message_id,
                    service,
                    method,
                    timeout_ms = effective.as_millis() as u64,
                    "rpc call timed out"
                );
                Err(RpcError::CallTimeout)
            }
        }
    }

    /// Unsubscribe, refuse new calls, and wake every parked caller.
    ///
    /// Pending slots are resolved by dropping their senders, so in-flight
    /// callers observe [`RpcError::ClientClosed`] instead of waiting out
    /// their deadlines.
    pub async fn close(&self) -> Result<(), RpcError> {
        if self.subscribed.load(Ordering::SeqCst) {
            self.broker.unsubscribe(&self.whoami).await?;
            self.subscribed.store(false, Ordering::SeqCst);
        }
        self.closed.store(true, Ordering::SeqCst);
        self.pending.clear();
        Ok(())
    }
}
