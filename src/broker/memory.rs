//! In-process broker implementation.
//!
//! Pub/sub channels and append-only streams backed by process memory.
//! This is the broker the test suite and local development run against;
//! it implements the same contract a Redis streams deployment would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::broker::{Broker, BrokerError, MessageHandler};

/// One entry appended to a stream. Values are the flat string→string form
/// the broker stores.
#[derive(Debug, Clone)]
pub struct StreamEntry {
    /// Broker-assigned entry ID.
    pub id: String,
    pub values: HashMap<String, String>,
}

#[derive(Default)]
struct StreamState {
    entries: Vec<StreamEntry>,
    consumers: Vec<mpsc::UnboundedSender<StreamEntry>>,
}

/// In-memory broker with a configurable key prefix.
pub struct MemoryBroker {
    prefix: String,
    subscriptions: DashMap<String, MessageHandler>,
    streams: DashMap<String, StreamState>,
    next_entry: AtomicU64,
}

impl MemoryBroker {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            subscriptions: DashMap::new(),
            streams: DashMap::new(),
            next_entry: AtomicU64::new(0),
        }
    }

    /// Register a consumer for a stream and return the receiving end.
    ///
    /// Entries appended after registration are delivered in append order.
    /// This is how in-process backends consume request streams.
    pub fn stream_events(&self, stream: &str) -> mpsc::UnboundedReceiver<StreamEntry> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams
            .entry(self.key(stream))
            .or_default()
            .consumers
            .push(tx);
        rx
    }

    /// Snapshot of everything appended to a stream so far.
    pub fn stream_entries(&self, stream: &str) -> Vec<StreamEntry> {
        self.streams
            .get(&self.key(stream))
            .map(|state| state.entries.clone())
            .unwrap_or_default()
    }

    fn key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.prefix, name)
        }
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn subscribe(&self, channel: &str, on_message: MessageHandler) -> Result<(), BrokerError> {
        self.subscriptions.insert(self.key(channel), on_message);
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError> {
        self.subscriptions
            .remove(&self.key(channel))
            .map(|_| ())
            .ok_or_else(|| BrokerError::NotSubscribed(channel.to_string()))
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), BrokerError> {
        // Clone the handler out of the map so delivery runs without any
        // broker lock held; a handler may publish in turn.
        let handler = self
            .subscriptions
            .get(&self.key(channel))
            .map(|entry| entry.value().clone());

        if let Some(handler) = handler {
            // Malformed payloads are dropped, matching pub/sub semantics.
            if let Ok(decoded) = serde_json::from_str::<HashMap<String, Value>>(payload) {
                handler(decoded);
            }
        }
        Ok(())
    }

    async fn append(
        &self,
        stream: &str,
        values: HashMap<String, Value>,
    ) -> Result<String, BrokerError> {
        let mut flat = HashMap::with_capacity(values.len());
        for (key, value) in values {
            let encoded = match value {
                Value::String(s) => s,
                other => serde_json::to_string(&other)
                    .map_err(|err| BrokerError::Unavailable(err.to_string()))?,
            };
            flat.insert(key, encoded);
        }

        let seq = self.next_entry.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = StreamEntry {
            id: format!("{seq}-0"),
            values: flat,
        };

        let mut state = self.streams.entry(self.key(stream)).or_default();
        state.entries.push(entry.clone());
        state
            .consumers
            .retain(|consumer| consumer.send(entry.clone()).is_ok());

        Ok(entry.id)
    }

    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.subscriptions.clear();
        self.streams.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber() {
        let broker = MemoryBroker::new("test");
        let seen: Arc<Mutex<Vec<HashMap<String, Value>>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        broker
            .subscribe(
                "replies",
                Arc::new(move |msg| sink.lock().unwrap().push(msg)),
            )
            .await
            .unwrap();

        broker
            .publish("replies", r#"{"message_id":"abc"}"#)
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["message_id"], Value::String("abc".into()));
    }

    #[tokio::test]
    async fn unsubscribe_unknown_channel_errors() {
        let broker = MemoryBroker::new("test");
        let err = broker.unsubscribe("nope").await.unwrap_err();
        assert!(matches!(err, BrokerError::NotSubscribed(_)));
    }

    #[tokio::test]
    async fn append_flattens_non_string_values() {
        let broker = MemoryBroker::new("test");
        let mut values = HashMap::new();
        values.insert("rpc".to_string(), Value::String("login".into()));
        values.insert("deadline".to_string(), Value::from(1234));
        values.insert(
            "args".to_string(),
            serde_json::json!({"user": "alice"}),
        );

        let id = broker.append("service.auth.rpc/login", values).await.unwrap();
        assert!(!id.is_empty());

        let entries = broker.stream_entries("service.auth.rpc/login");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].values["rpc"], "login");
        assert_eq!(entries[0].values["deadline"], "1234");
        assert_eq!(entries[0].values["args"], r#"{"user":"alice"}"#);
    }

    #[tokio::test]
    async fn stream_consumers_observe_appends_in_order() {
        let broker = MemoryBroker::new("test");
        let mut events = broker.stream_events("service.svc.rpc/op");

        for n in 0..3 {
            let mut values = HashMap::new();
            values.insert("seq".to_string(), Value::String(n.to_string()));
            broker.append("service.svc.rpc/op", values).await.unwrap();
        }

        for n in 0..3 {
            let entry = events.recv().await.unwrap();
            assert_eq!(entry.values["seq"], n.to_string());
        }
    }

    #[tokio::test]
    async fn prefix_isolates_namespaces() {
        let broker_a = MemoryBroker::new("a");
        assert_eq!(broker_a.key("chan"), "a.chan");

        let bare = MemoryBroker::new("");
        assert_eq!(bare.key("chan"), "chan");
    }
}
