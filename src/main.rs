//! HTTP-to-RPC Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────┐
//!                      │                 RPC GATEWAY                     │
//!                      │                                                 │
//!   HTTP Request       │  ┌─────────┐   ┌──────────┐   ┌─────────────┐  │
//!   ───────────────────┼─▶│  http   │──▶│  params  │──▶│ rpc client  │  │
//!                      │  │ server  │   │ validate │   │    pool     │  │
//!                      │  └─────────┘   └──────────┘   └──────┬──────┘  │
//!                      │                                      │         │
//!                      │                                      ▼         │
//!                      │                               ┌─────────────┐  │      ┌─────────┐
//!                      │                               │  transport  │──┼─────▶│ broker  │
//!   HTTP Response      │  ┌──────────────┐             │ correlator  │◀─┼──────│ streams │
//!   ◀──────────────────┼──│ response map │◀────────────└─────────────┘  │      │ pub/sub │
//!                      │  └──────────────┘                              │      └────┬────┘
//!                      │                                                 │          │
//!                      │  ┌──────────────────────────────────────────┐  │          ▼
//!                      │  │          Cross-Cutting Concerns           │  │      backend
//!                      │  │  config │ observability │ lifecycle       │  │      services
//!                      │  └──────────────────────────────────────────┘  │
//!                      └────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use rpc_gateway::broker::{Broker, MemoryBroker};
use rpc_gateway::config::{load_config, GatewayConfig};
use rpc_gateway::http::HttpServer;
use rpc_gateway::lifecycle::Shutdown;
use rpc_gateway::observability::{logging, metrics};
use rpc_gateway::rpc::RpcClientPool;

#[derive(Parser)]
#[command(name = "rpc-gateway")]
#[command(about = "HTTP-to-RPC gateway over a shared message broker", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config/gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Fall back to defaults when no config file is present.
    let config = if cli.config.exists() {
        load_config(&cli.config)?
    } else {
        GatewayConfig::default()
    };

    logging::init_logging(&config.observability.log_level);

    tracing::info!("rpc-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        initial_clients = config.rpc_pool.initial_clients,
        max_clients = config.rpc_pool.max_clients,
        max_requests_per_client = config.rpc_pool.max_requests_per_client,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new(config.broker.prefix.clone()));

    let shutdown = Shutdown::new();
    let pool = RpcClientPool::new(Arc::clone(&broker), &config.rpc_pool, &shutdown).await;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, Arc::clone(&pool));
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    tokio::signal::ctrl_c().await?;
    shutdown.trigger();
    server_task.await??;

    // Teardown mirrors startup in reverse.
    pool.close().await;
    if let Err(err) = broker.close().await {
        tracing::warn!(error = %err, "broker close failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
