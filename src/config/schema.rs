//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! gateway. All types derive Serde traits for deserialization from config
//! files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Broker namespace settings.
    pub broker: BrokerConfig,

    /// RPC client pool thresholds.
    pub rpc_pool: RpcPoolConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Expose `GET /health` backed by a pool probe.
    pub health_route_enabled: bool,

    /// Expose `GET /status` backed by a pool probe.
    pub status_route_enabled: bool,

    /// Route definitions mapping HTTP requests to RPC calls.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Broker namespace settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Key prefix applied to every channel and stream name.
    pub prefix: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            prefix: "myriad".to_string(),
        }
    }
}

/// RPC client pool thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcPoolConfig {
    /// Transports started eagerly and kept through scale-down.
    pub initial_clients: usize,

    /// Hard ceiling on the fleet size.
    pub max_clients: usize,

    /// Concurrent requests allowed per transport.
    pub max_requests_per_client: usize,

    /// Cadence of the scale-down and fleet monitors, in milliseconds.
    pub monitor_interval_ms: u64,

    /// Close idle transports back toward `initial_clients`.
    pub scale_down: bool,
}

impl RpcPoolConfig {
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }
}

impl Default for RpcPoolConfig {
    fn default() -> Self {
        Self {
            initial_clients: 4,
            max_clients: 20,
            max_requests_per_client: 10,
            monitor_interval_ms: 15_000,
            scale_down: true,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request HTTP timeout in seconds.
    pub request_secs: u64,

    /// Per-call RPC timeout in seconds.
    pub rpc_call_secs: u64,

    /// Pool acquisition timeout in seconds.
    pub pool_acquire_secs: u64,
}

impl TimeoutConfig {
    pub fn rpc_call(&self) -> Duration {
        Duration::from_secs(self.rpc_call_secs)
    }

    pub fn pool_acquire(&self) -> Duration {
        Duration::from_secs(self.pool_acquire_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 90,
            rpc_call_secs: 60,
            pool_acquire_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Route configuration mapping one HTTP route to one RPC call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Request path (axum syntax, e.g. "/payments/{id}/authorize").
    pub path: String,

    /// HTTP method to register ("GET" or "POST").
    #[serde(rename = "type", default = "default_route_method")]
    pub http_method: String,

    /// Target service; underscores are rewritten to dots when forming the
    /// stream name. Derived from the path when absent.
    #[serde(default)]
    pub service: Option<String>,

    /// Target RPC method. Derived from the path when absent.
    #[serde(default)]
    pub method: Option<String>,

    /// Declared parameter schema; undeclared arguments are dropped.
    #[serde(default)]
    pub params: Vec<ParamConfig>,

    #[serde(default)]
    pub description: String,
}

fn default_route_method() -> String {
    "GET".to_string()
}

/// Declared type of a route parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    #[default]
    String,
    Integer,
    Number,
    Boolean,
}

/// One declared route parameter.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParamConfig {
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: ParamKind,

    /// Missing required parameters fail validation with a 400.
    #[serde(default)]
    pub required: bool,

    /// Regex a string parameter must match.
    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default)]
    pub description: String,
}
