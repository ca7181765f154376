//! Connection admission and tracking.
//!
//! Every accepted TCP connection is first admitted by a [`ConnectionLimiter`]
//! and then registered with a [`ConnectionTracker`]. Both hand back values
//! that release their slot when dropped, so a connection task only has to
//! keep them alive until hyper is done with the socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

/// Counts live connections so shutdown can wait for them to drain.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    active: AtomicUsize,
    drained: Notify,
}

/// Registration of one live connection. Dropping it unregisters the connection.
#[derive(Debug)]
pub struct ConnectionGuard {
    inner: Arc<TrackerInner>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.drained.notify_waiters();
        }
    }
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection for as long as the returned guard lives.
    pub fn track(&self) -> ConnectionGuard {
        self.inner.active.fetch_add(1, Ordering::AcqRel);
        ConnectionGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of connections currently registered.
    pub fn count(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Waits until no connection is registered, or `grace` elapses.
    ///
    /// Returns `true` when every connection finished in time.
    pub async fn drain(&self, grace: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.inner.drained.notified();
                if self.count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(grace, drained).await.is_ok()
    }
}

/// Why a connection was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtCapacity {
    pub max_connections: usize,
}

/// Caps concurrent connections with a semaphore (`0` = unlimited).
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    semaphore: Option<Arc<Semaphore>>,
    max_connections: usize,
}

impl ConnectionLimiter {
    pub fn new(max_connections: usize) -> Self {
        let semaphore = (max_connections > 0).then(|| Arc::new(Semaphore::new(max_connections)));
        Self {
            semaphore,
            max_connections,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.semaphore.is_some()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Admits one connection.
    ///
    /// `Ok(Some(permit))` must be held for the life of the connection.
    /// `Ok(None)` means no limit is configured.
    pub fn admit(&self) -> Result<Option<OwnedSemaphorePermit>, AtCapacity> {
        match &self.semaphore {
            None => Ok(None),
            Some(sem) => Arc::clone(sem)
                .try_acquire_owned()
                .map(Some)
                .map_err(|_| AtCapacity {
                    max_connections: self.max_connections,
                }),
        }
    }

    /// Permits still available, `None` when unlimited.
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|sem| sem.available_permits())
    }
}
