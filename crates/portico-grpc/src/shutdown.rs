//! Graceful-drain primitives: a broadcast shutdown signal and an in-flight
//! call tracker.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Notify};

/// A one-way, broadcast shutdown signal.
///
/// Cloned freely across the accept loop and connection tasks; once triggered
/// it stays triggered, and every pending or future [`recv`](Self::recv)
/// completes immediately.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    tx: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Triggers shutdown. Idempotent.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            // No receivers is fine; the flag alone carries the state.
            let _ = self.tx.send(());
        }
    }

    /// Returns `true` once shutdown has been triggered.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Waits until shutdown is triggered.
    pub async fn recv(&self) {
        let mut rx = self.tx.subscribe();
        // Subscribe before the flag check so a trigger between the two is
        // still observed via the channel.
        if self.triggered.load(Ordering::SeqCst) {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts calls currently being handled, for drain-on-stop.
///
/// Admission and drain agree on one protocol: [`close`](Self::close) first,
/// then [`wait_idle`](Self::wait_idle). Once closed, [`try_track`](Self::try_track)
/// refuses every new call, so the idle count cannot rise again after the
/// drain has sampled it as zero.
#[derive(Debug, Clone, Default)]
pub struct InflightCalls {
    active: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
    idle: Arc<Notify>,
}

impl InflightCalls {
    /// Creates an idle, open tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one call, unless admission has been closed.
    ///
    /// The call is live until the token drops. Increments before checking the
    /// closed flag: if the flag read sees the tracker open, the increment is
    /// ordered before [`close`] and therefore visible to the subsequent
    /// [`wait_idle`].
    ///
    /// [`close`]: Self::close
    /// [`wait_idle`]: Self::wait_idle
    #[must_use]
    pub fn try_track(&self) -> Option<CallToken> {
        self.active.fetch_add(1, Ordering::SeqCst);
        let token = CallToken {
            active: Arc::clone(&self.active),
            idle: Arc::clone(&self.idle),
        };
        if self.closed.load(Ordering::SeqCst) {
            // Dropping the token rolls the count back and wakes the drain.
            drop(token);
            return None;
        }
        Some(token)
    }

    /// Closes admission. Subsequent [`try_track`](Self::try_track) calls
    /// return `None`; already-issued tokens are unaffected.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Number of calls currently live.
    #[must_use]
    pub fn count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Waits until every tracked call has finished.
    ///
    /// Call [`close`](Self::close) first; otherwise a call admitted after the
    /// count is sampled can outlive the wait.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// RAII registration of one in-flight call.
#[derive(Debug)]
pub struct CallToken {
    active: Arc<AtomicUsize>,
    idle: Arc<Notify>,
}

impl Drop for CallToken {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}
