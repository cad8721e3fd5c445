//! RPC message envelope.
//!
//! The canonical structure exchanged in both directions. Payload maps
//! (`args`, `response`, `stash`, `trace`) may arrive either as native JSON
//! objects or as JSON-encoded strings when the broker only carries flat
//! string→string pairs; both wire forms deserialize identically.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single RPC envelope.
///
/// `message_id` is the correlation key: backends echo it verbatim in their
/// response, and the transport demultiplexes on it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcMessage {
    /// Method name.
    #[serde(default)]
    pub rpc: String,

    /// Globally unique correlation ID, created by the calling transport.
    #[serde(default)]
    pub message_id: String,

    /// Opaque identifier reserved for broker-specific routing.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transport_id: String,

    /// Identity of the originating transport; responses are published on
    /// the pub/sub channel of this name.
    #[serde(default)]
    pub who: String,

    /// Absolute expiry, seconds since the Unix epoch.
    #[serde(default, deserialize_with = "deadline_from_wire")]
    pub deadline: i64,

    #[serde(default, deserialize_with = "payload_map_from_wire")]
    pub args: HashMap<String, Value>,

    #[serde(default, deserialize_with = "payload_map_from_wire")]
    pub response: HashMap<String, Value>,

    #[serde(default, deserialize_with = "payload_map_from_wire")]
    pub stash: HashMap<String, Value>,

    #[serde(default, deserialize_with = "payload_map_from_wire")]
    pub trace: HashMap<String, Value>,
}

impl RpcMessage {
    /// Build a request envelope with a fresh correlation ID and an
    /// absolute deadline `now + timeout`.
    pub fn new(rpc: &str, who: &str, args: HashMap<String, Value>, timeout: Duration) -> Self {
        Self {
            rpc: rpc.to_string(),
            message_id: Uuid::new_v4().to_string(),
            transport_id: String::new(),
            who: who.to_string(),
            deadline: unix_now() + timeout.as_secs() as i64,
            args,
            response: HashMap::new(),
            stash: HashMap::new(),
            trace: HashMap::new(),
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from the JSON wire form, accepting payload maps in
    /// either native or string-encoded shape.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Convert to a string-keyed value map for a broker append.
    pub fn to_map(&self) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert("rpc".to_string(), Value::String(self.rpc.clone()));
        map.insert(
            "message_id".to_string(),
            Value::String(self.message_id.clone()),
        );
        map.insert(
            "transport_id".to_string(),
            Value::String(self.transport_id.clone()),
        );
        map.insert("who".to_string(), Value::String(self.who.clone()));
        map.insert("deadline".to_string(), Value::from(self.deadline));
        map.insert("args".to_string(), map_to_value(&self.args));
        map.insert("response".to_string(), map_to_value(&self.response));
        map.insert("stash".to_string(), map_to_value(&self.stash));
        map.insert("trace".to_string(), map_to_value(&self.trace));
        map
    }

    /// Rebuild an envelope from a decoded broker message. Fields that are
    /// missing or malformed fall back to their defaults.
    pub fn from_map(data: HashMap<String, Value>) -> Self {
        let object = Value::Object(data.into_iter().collect());
        serde_json::from_value(object).unwrap_or_default()
    }
}

fn map_to_value(map: &HashMap<String, Value>) -> Value {
    Value::Object(map.clone().into_iter().collect())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

/// Accept a payload map either as a native JSON object or as a
/// JSON-encoded string; anything else collapses to an empty map.
fn payload_map_from_wire<'de, D>(deserializer: D) -> Result<HashMap<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        _ => HashMap::new(),
    })
}

/// Accept the deadline as a JSON number or its string encoding.
fn deadline_from_wire<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(number) => number.as_i64().unwrap_or(0),
        Value::String(raw) => raw.parse().unwrap_or(0),
        _ => 0,
    })
}
