//! RPC client pool.
//!
//! # Responsibilities
//! - Allocate transports and enforce the per-transport request ceiling
//! - Scale the fleet up to `max_clients` on demand
//! - Scale idle transports back toward `initial_clients`
//! - Arbitrate fairly when the fleet is saturated
//!
//! # Design Decisions
//! - One mutex guards the client list and the active-request counts; it is
//!   held across client start/close but never across a wait
//! - Saturated acquirers poll at a bounded cadence with the mutex
//!   released, so any freed slot is observed within one poll cycle
//! - Checkouts are RAII guards: a slot is returned when its guard drops,
//!   which covers request futures cancelled mid-call
//! - Once the drain flag flips, acquisitions fail fast instead of
//!   queueing behind a fleet that is being torn down
//! - A transport whose close fails stays in the fleet; accounting
//!   consistency wins over eager reclamation

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::time::{self, Instant};

use crate::broker::Broker;
use crate::config::RpcPoolConfig;
use crate::lifecycle::{DrainFlag, Shutdown};
use crate::observability::metrics;
use crate::rpc::client::RpcClient;
use crate::rpc::RpcError;

/// Cadence at which saturated acquirers re-scan the fleet.
pub const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct PoolState {
    /// Live transports in insertion order.
    clients: Vec<Arc<RpcClient>>,
    /// Active-request count per transport identity.
    active: HashMap<String, usize>,
}

/// A bounded, elastic collection of RPC transports.
pub struct RpcClientPool {
    state: Mutex<PoolState>,
    broker: Arc<dyn Broker>,
    initial_clients: usize,
    max_clients: usize,
    max_requests_per_client: usize,
    monitor_interval: Duration,
    scale_down: bool,
    drain: DrainFlag,
}

impl RpcClientPool {
    /// Build the pool, start `initial_clients` transports, and spawn the
    /// scale-down and fleet monitors. Monitors exit on the shutdown
    /// signal; the drain flag makes later acquisitions fail fast.
    pub async fn new(
        broker: Arc<dyn Broker>,
        config: &RpcPoolConfig,
        shutdown: &Shutdown,
    ) -> Arc<Self> {
        let pool = Arc::new(Self {
            state: Mutex::new(PoolState::default()),
            broker,
            initial_clients: config.initial_clients,
            max_clients: config.max_clients,
            max_requests_per_client: config.max_requests_per_client,
            monitor_interval: config.monitor_interval(),
            scale_down: config.scale_down,
            drain: shutdown.drain_flag(),
        });

        {
            let mut state = pool.state.lock().await;
            for _ in 0..pool.initial_clients {
                let client = Arc::new(RpcClient::new(Arc::clone(&pool.broker)));
                match client.start().await {
                    Ok(()) => {
                        state.active.insert(client.whoami().to_string(), 0);
                        state.clients.push(client);
                        metrics::record_pool_scale_up();
                        tracing::info!(fleet = state.clients.len(), "added client to pool");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to start initial rpc client");
                    }
                }
            }
        }

        tokio::spawn(Self::run_scale_down(Arc::clone(&pool), shutdown.subscribe()));
        tokio::spawn(Self::run_monitor(Arc::clone(&pool), shutdown.subscribe()));
        pool
    }

    /// Check out a transport with its active-request count incremented.
    ///
    /// Scans the fleet in insertion order for a transport under its cap;
    /// failing that, grows the fleet while below `max_clients`; failing
    /// that, polls for a freed slot until `timeout` elapses. The returned
    /// guard gives the slot back when dropped.
    pub async fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<ClientGuard, RpcError> {
        if self.drain.is_draining() {
            return Err(RpcError::ShuttingDown);
        }

        let deadline = Instant::now() + timeout;

        {
            let mut state = self.state.lock().await;
            if let Some(client) = self.checkout(&mut state) {
                return Ok(ClientGuard::new(client, Arc::clone(self)));
            }

            if state.clients.len() < self.max_clients {
                let client = Arc::new(RpcClient::new(Arc::clone(&self.broker)));
                match client.start().await {
                    Ok(()) => {
                        state.active.insert(client.whoami().to_string(), 1);
                        state.clients.push(Arc::clone(&client));
                        metrics::record_pool_scale_up();
                        tracing::info!(
                            client = %client.whoami(),
                            fleet = state.clients.len(),
                            "added client to pool"
                        );
                        return Ok(ClientGuard::new(client, Arc::clone(self)));
                    }
                    Err(err) => {
                        // Discard the stillborn client and fall through to
                        // waiting on the existing fleet.
                        tracing::warn!(error = %err, "failed to start new rpc client");
                    }
                }
            }
        }

        loop {
            if self.drain.is_draining() {
                return Err(RpcError::ShuttingDown);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(RpcError::PoolSaturated);
            }
            time::sleep(ACQUIRE_POLL_INTERVAL.min(deadline - now)).await;

            let mut state = self.state.lock().await;
            if let Some(client) = self.checkout(&mut state) {
                return Ok(ClientGuard::new(client, Arc::clone(self)));
            }
        }
    }

    fn checkout(&self, state: &mut PoolState) -> Option<Arc<RpcClient>> {
        let PoolState { clients, active } = state;
        for client in clients.iter() {
            let count = active.entry(client.whoami().to_string()).or_insert(0);
            if *count < self.max_requests_per_client {
                *count += 1;
                return Some(Arc::clone(client));
            }
        }
        None
    }

    /// Return a transport after a request completes.
    ///
    /// A transport already removed by scale-down is a no-op.
    pub async fn release(&self, client: &RpcClient) {
        let mut state = self.state.lock().await;
        if let Some(count) = state.active.get_mut(client.whoami()) {
            if *count > 0 {
                *count -= 1;
            }
        }
    }

    /// Current fleet size.
    pub async fn active_count(&self) -> usize {
        self.state.lock().await.clients.len()
    }

    /// Sum of active-request counts across the fleet.
    pub async fn total_active(&self) -> usize {
        self.state.lock().await.active.values().sum()
    }

    /// Close every transport in the fleet.
    pub async fn close(&self) {
        let state = self.state.lock().await;
        for client in &state.clients {
            if let Err(err) = client.close().await {
                tracing::warn!(
                    client = %client.whoami(),
                    error = %err,
                    "failed to close rpc client"
                );
            }
        }
    }

    async fn run_scale_down(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval_at(
            Instant::now() + self.monitor_interval,
            self.monitor_interval,
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => self.scale_down_idle().await,
                _ = shutdown.recv() => break,
            }
        }
    }

    /// Walk the tail of the fleet from the end toward `initial_clients`,
    /// closing and removing transports with no active requests.
    async fn scale_down_idle(&self) {
        if !self.scale_down {
            return;
        }

        let mut state = self.state.lock().await;
        if state.clients.len() <= self.initial_clients {
            return;
        }

        let mut idle_count = 0;
        for index in (self.initial_clients..state.clients.len()).rev() {
            let client = Arc::clone(&state.clients[index]);
            let active = state.active.get(client.whoami()).copied().unwrap_or(0);
            tracing::debug!(client = %client.whoami(), active, "pool client load");
            if active != 0 {
                continue;
            }

            if let Err(err) = client.close().await {
                // Keep the transport in the fleet rather than lose track
                // of a live subscription.
                tracing::warn!(
                    client = %client.whoami(),
                    error = %err,
                    "failed to close idle client"
                );
                continue;
            }
            state.clients.remove(index);
            state.active.remove(client.whoami());
            idle_count += 1;
        }

        if idle_count > 0 {
            metrics::record_pool_scale_down(idle_count);
            tracing::info!(
                idle_count,
                fleet = state.clients.len(),
                "scaled down idle clients"
            );
        }
    }

    async fn run_monitor(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval_at(
            Instant::now() + self.monitor_interval,
            self.monitor_interval,
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (fleet, active) = {
                        let state = self.state.lock().await;
                        (state.clients.len(), state.active.values().sum::<usize>())
                    };
                    metrics::record_pool_gauges(fleet, active);
                    tracing::debug!(fleet, active, "pool load");
                }
                _ = shutdown.recv() => break,
            }
        }
    }
}

/// RAII checkout of one pool slot.
///
/// Derefs to the transport for the duration of one request. The slot is
/// returned when the guard drops, so a handler future cancelled while
/// parked on its RPC call still gives its slot back; [`release`] returns
/// it eagerly instead of waiting for the drop.
///
/// [`release`]: ClientGuard::release
pub struct ClientGuard {
    client: Arc<RpcClient>,
    pool: Arc<RpcClientPool>,
    released: bool,
}

impl std::fmt::Debug for ClientGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientGuard")
            .field("released", &self.released)
            .finish()
    }
}

impl ClientGuard {
    fn new(client: Arc<RpcClient>, pool: Arc<RpcClientPool>) -> Self {
        Self {
            client,
            pool,
            released: false,
        }
    }

    /// The checked-out transport.
    pub fn client(&self) -> &Arc<RpcClient> {
        &self.client
    }

    /// Return the slot now instead of at drop.
    pub async fn release(mut self) {
        self.released = true;
        self.pool.release(&self.client).await;
    }
}

impl Deref for ClientGuard {
    type Target = RpcClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Returning the slot needs the pool mutex, so a dropped guard
        // hands the release to its own task.
        let pool = Arc::clone(&self.pool);
        let client = Arc::clone(&self.client);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { pool.release(&client).await });
        }
    }
}
