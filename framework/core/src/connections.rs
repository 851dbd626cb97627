use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counts connections opened and closed during a run.
///
/// Connections register through [ConnectionTracker::track] and hold the returned
/// [ConnectionToken] for as long as the socket is open. Dropping the token records the close,
/// so a connection is counted as closed exactly once whichever path releases it.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    opened: AtomicU64,
    closed: AtomicU64,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(self: &Arc<Self>) -> ConnectionToken {
        self.opened.fetch_add(1, Ordering::AcqRel);
        ConnectionToken {
            tracker: self.clone(),
        }
    }

    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Acquire)
    }

    pub fn closed(&self) -> u64 {
        self.closed.load(Ordering::Acquire)
    }

    /// Connections that have been opened and not yet closed.
    pub fn open(&self) -> u64 {
        // Read closed first so a concurrent open/close pair can't make the difference negative.
        let closed = self.closed();
        self.opened().saturating_sub(closed)
    }
}

/// Proof that a connection is open. Dropping it marks the connection closed.
#[derive(Debug)]
pub struct ConnectionToken {
    tracker: Arc<ConnectionTracker>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        self.tracker.closed.fetch_add(1, Ordering::AcqRel);
    }
}
