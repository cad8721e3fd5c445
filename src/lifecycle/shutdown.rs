//! Shutdown coordination for the gateway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Coordinator for graceful shutdown.
///
/// Couples two signals: a broadcast channel that parked long-running tasks
/// (the HTTP server, the pool monitors) select on to exit, and a drain
/// flag that the client pool polls so acquisitions fail fast instead of
/// queueing behind a fleet that is about to be torn down. Triggering it is
/// the gateway's equivalent of cancelling the process-wide lifecycle
/// context.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    draining: Arc<AtomicBool>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            draining: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the shutdown broadcast.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Cheap, clonable view of the drain state, for components that poll
    /// on their own cadence instead of parking on the broadcast.
    pub fn drain_flag(&self) -> DrainFlag {
        DrainFlag(Arc::clone(&self.draining))
    }

    /// Begin the drain.
    ///
    /// The flag flips before the broadcast fires, so any task woken by the
    /// signal already observes the draining state.
    pub fn trigger(&self) {
        self.draining.store(true, Ordering::SeqCst);
        let _ = self.tx.send(());
    }

    /// Whether the drain has begun.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle onto the drain state, held by the client pool.
#[derive(Clone)]
pub struct DrainFlag(Arc<AtomicBool>);

impl DrainFlag {
    pub fn is_draining(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
