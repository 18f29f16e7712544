//! Shutdown coordination for the BFF.
//!
//! The signal listener holds a clone and triggers it; the HTTP server
//! subscribes and drains in-flight requests when it fires. Integration
//! tests trigger it when their server handle is dropped.

use tokio::sync::broadcast;

/// Broadcasts a single "stop" to every subscribed task.
///
/// Cloning shares the same channel, so any clone can trigger it.
#[derive(Clone)]
pub struct Shutdown {
    /// Sending half; receivers are handed out by [`Shutdown::subscribe`].
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a coordinator with no subscribers yet.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Receiver that resolves once [`Shutdown::trigger`] is called.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Fire the signal. Receivers subscribed later will not see it.
    /// Triggering with nobody subscribed is a no-op.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Number of tasks still listening for the signal.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
