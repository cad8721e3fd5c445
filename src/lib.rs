//! HTTP-to-RPC Gateway Library
//!
//! Accepts HTTP requests on configured routes, translates each into a
//! structured RPC envelope, dispatches it over a shared message broker,
//! awaits the correlated response, and returns it as HTTP JSON. The core
//! is a bounded, elastic pool of broker-backed RPC transports.

pub mod broker;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rpc;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use rpc::{RpcClient, RpcClientPool, RpcError, RpcMessage};
