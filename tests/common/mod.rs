//! Shared utilities for integration testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;

use rpc_gateway::broker::memory::StreamEntry;
use rpc_gateway::broker::{Broker, BrokerError, MemoryBroker, MessageHandler};
use rpc_gateway::rpc::RpcMessage;

/// Rebuild the request envelope from a flat stream entry.
pub fn entry_to_message(entry: &StreamEntry) -> RpcMessage {
    let values = entry
        .values
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect::<HashMap<_, _>>();
    RpcMessage::from_map(values)
}

/// Spawn a backend that answers every envelope appended to `stream` with
/// the given envelope-level `response` map, echoing the correlation ID.
pub fn spawn_echo_backend(broker: Arc<MemoryBroker>, stream: &str, response: Value) {
    let mut events = broker.stream_events(stream);
    tokio::spawn(async move {
        while let Some(entry) = events.recv().await {
            let mut reply = entry_to_message(&entry);
            reply.response = match &response {
                Value::Object(map) => map.clone().into_iter().collect(),
                _ => HashMap::new(),
            };
            publish_reply(&broker, reply).await;
        }
    });
}

/// Publish a response envelope to its `who` channel.
pub async fn publish_reply(broker: &MemoryBroker, reply: RpcMessage) {
    let who = reply.who.clone();
    let payload = reply.to_json().expect("reply serializes");
    broker.publish(&who, &payload).await.expect("publish reply");
}

/// Broker wrapper that fails `subscribe` after a fixed number of
/// successes; everything else delegates to the in-memory broker.
#[allow(dead_code)]
pub struct FlakyBroker {
    inner: MemoryBroker,
    subscribes_left: AtomicUsize,
}

impl FlakyBroker {
    #[allow(dead_code)]
    pub fn new(prefix: &str, successful_subscribes: usize) -> Self {
        Self {
            inner: MemoryBroker::new(prefix),
            subscribes_left: AtomicUsize::new(successful_subscribes),
        }
    }
}

#[async_trait::async_trait]
impl Broker for FlakyBroker {
    async fn subscribe(&self, channel: &str, on_message: MessageHandler) -> Result<(), BrokerError> {
        let left = self.subscribes_left.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |n| n.checked_sub(1),
        );
        if left.is_err() {
            return Err(BrokerError::Unavailable("injected subscribe failure".into()));
        }
        self.inner.subscribe(channel, on_message).await
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError> {
        self.inner.unsubscribe(channel).await
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        self.inner.publish(channel, payload).await
    }

    async fn append(
        &self,
        stream: &str,
        values: HashMap<String, Value>,
    ) -> Result<String, BrokerError> {
        self.inner.append(stream, values).await
    }

    fn new_id(&self) -> String {
        self.inner.new_id()
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.inner.close().await
    }
}
