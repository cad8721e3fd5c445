//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router from the configured routes
//! - Wire up middleware (tracing, request timeout)
//! - Serve with graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::http::handler;
use crate::rpc::RpcClientPool;

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and pool.
    pub fn new(config: GatewayConfig, pool: Arc<RpcClientPool>) -> Self {
        let router = Self::build_router(&config, pool);
        Self { router, config }
    }

    /// Build the axum router with all routes and middleware layers.
    fn build_router(config: &GatewayConfig, pool: Arc<RpcClientPool>) -> Router {
        let mut router = Router::new();

        for route in &config.routes {
            router = router.route(
                &route.path,
                handler::route_handler(route.clone(), Arc::clone(&pool), &config.timeouts),
            );
        }

        if config.health_route_enabled {
            let probe_pool = Arc::clone(&pool);
            router = router.route(
                "/health",
                get(move || {
                    let pool = Arc::clone(&probe_pool);
                    async move { handler::health(pool).await }
                }),
            );
        }

        if config.status_route_enabled {
            let probe_pool = Arc::clone(&pool);
            router = router.route(
                "/status",
                get(move || {
                    let pool = Arc::clone(&probe_pool);
                    async move { handler::status(pool).await }
                }),
            );
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until
    /// the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
