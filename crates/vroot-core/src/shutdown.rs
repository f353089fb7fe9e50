//! Teardown of in-flight interception calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::pending::PendingRequestTable;

/// Number of interception calls currently executing.
#[derive(Debug, Default)]
pub struct CallbackCounter {
    active: AtomicUsize,
}

impl CallbackCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the current call until the returned guard is dropped.
    pub fn enter(&self) -> CallbackGuard<'_> {
        self.active.fetch_add(1, Ordering::AcqRel);
        CallbackGuard { counter: self }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// Decrements the [`CallbackCounter`] when dropped.
pub struct CallbackGuard<'a> {
    counter: &'a CallbackCounter,
}

impl Drop for CallbackGuard<'_> {
    fn drop(&mut self) {
        self.counter.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Summary of a completed teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Waiters that were blocked on a provider when shutdown began.
    pub woken: usize,
    /// Time spent waiting for in-flight calls to return.
    pub waited: Duration,
}

/// Unblocks pending requests and waits for interception calls to return.
///
/// Must run after the host stopped delivering new calls and before any
/// shared resource is released.
pub struct ShutdownCoordinator {
    pending: Arc<PendingRequestTable>,
    callbacks: Arc<CallbackCounter>,
    initial_wait: Duration,
    poll_interval: Duration,
}

impl ShutdownCoordinator {
    pub fn new(
        pending: Arc<PendingRequestTable>,
        callbacks: Arc<CallbackCounter>,
        initial_wait: Duration,
        poll_interval: Duration,
    ) -> Self {
        ShutdownCoordinator {
            pending,
            callbacks,
            initial_wait,
            poll_interval,
        }
    }

    /// Set the shutdown flag and wake every pending request's waiter.
    pub fn begin_shutdown(&self) -> usize {
        let woken = self.pending.abort_all();
        info!(woken, "shutdown started, pending requests aborted");
        woken
    }

    /// Block until no interception call is executing.
    ///
    /// The first check happens only after `initial_wait`: a call the host
    /// already dispatched may not have incremented the counter yet when
    /// interception was disabled.
    pub fn wait_for_drain(&self) -> Duration {
        let started = Instant::now();
        if !self.initial_wait.is_zero() {
            thread::sleep(self.initial_wait);
        }
        loop {
            let active = self.callbacks.active();
            if active == 0 {
                break;
            }
            debug!(active, "waiting for interception calls to drain");
            thread::sleep(self.poll_interval);
        }
        let waited = started.elapsed();
        info!(?waited, "interception calls drained");
        waited
    }

    /// [`begin_shutdown`](Self::begin_shutdown) followed by
    /// [`wait_for_drain`](Self::wait_for_drain).
    pub fn shutdown(&self) -> DrainReport {
        let woken = self.begin_shutdown();
        let waited = self.wait_for_drain();
        DrainReport { woken, waited }
    }
}
