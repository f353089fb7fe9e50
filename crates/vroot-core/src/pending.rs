//! In-flight hydration requests and the blocking wait on their answers.
//!
//! All table state is guarded by one mutex. It is taken for insert, remove,
//! and match-and-wake only; a waiting thread sleeps on its own condition
//! variable, which releases the mutex for the duration of the sleep.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::message::{MessageType, RequestMessage, ResponseOutcome};

/// Why a request could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("Shutdown in progress, request {0} not registered")]
    ShuttingDown(u64),

    #[error("Request id {0} is already pending")]
    DuplicateId(u64),
}

/// How a wait on a pending request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Responded(ResponseOutcome),
    ShutDown,
}

struct OutstandingMessage {
    request: RequestMessage,
    /// Written once by the responder; `Some` means completed.
    response: Option<ResponseOutcome>,
    waker: Arc<Condvar>,
}

/// Registry of requests awaiting a provider's answer, keyed by request id.
pub struct PendingRequestTable {
    entries: Mutex<HashMap<u64, OutstandingMessage>>,
    shutting_down: AtomicBool,
    next_id: AtomicU64,
    poll_interval: Duration,
}

impl PendingRequestTable {
    /// `poll_interval` bounds how long a waiter sleeps between checks of the
    /// shutdown flag when no wakeup arrives.
    pub fn new(poll_interval: Duration) -> Self {
        PendingRequestTable {
            entries: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            poll_interval,
        }
    }

    /// Allocate a request id. Ids start at 1 and are never reused.
    pub fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Lock-free read of the shutdown flag.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Insert `request` unless shutdown has begun.
    ///
    /// The flag is read under the table lock, so a request is either
    /// registered before [`abort_all`](Self::abort_all) runs (and will be
    /// woken by it) or refused.
    pub fn register(&self, request: RequestMessage) -> Result<PendingRequest<'_>, RegisterError> {
        let id = request.id;
        let waker = Arc::new(Condvar::new());

        let mut entries = self.entries.lock();
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(RegisterError::ShuttingDown(id));
        }
        if entries.contains_key(&id) {
            return Err(RegisterError::DuplicateId(id));
        }
        entries.insert(
            id,
            OutstandingMessage {
                request,
                response: None,
                waker: Arc::clone(&waker),
            },
        );
        drop(entries);

        trace!(request_id = id, "registered pending request");
        Ok(PendingRequest {
            table: self,
            id,
            waker,
        })
    }

    /// Record a provider's answer and wake the thread waiting on it.
    ///
    /// Returns `false` when `response` is not terminal or no request with
    /// `id` is pending; neither case is an error.
    pub fn deliver_response(&self, id: u64, response: MessageType) -> bool {
        let Some(outcome) = response.as_response() else {
            debug!(request_id = id, ?response, "ignoring non-terminal response");
            return false;
        };

        let mut entries = self.entries.lock();
        match entries.get_mut(&id) {
            Some(message) if message.response.is_none() => {
                message.response = Some(outcome);
                message.waker.notify_one();
                true
            }
            Some(_) => {
                debug!(request_id = id, "duplicate response ignored");
                false
            }
            None => {
                debug!(request_id = id, "response for request that is no longer pending");
                false
            }
        }
    }

    /// Set the shutdown flag and wake every waiter. Returns how many were woken.
    pub fn abort_all(&self) -> usize {
        let entries = self.entries.lock();
        self.shutting_down.store(true, Ordering::Release);
        for message in entries.values() {
            message.waker.notify_all();
        }
        entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.lock().contains_key(&id)
    }

    /// Payloads of every pending request, ordered by id.
    pub fn outstanding(&self) -> Vec<RequestMessage> {
        let entries = self.entries.lock();
        let mut requests: Vec<_> = entries.values().map(|m| m.request.clone()).collect();
        requests.sort_by_key(|r| r.id);
        requests
    }

    /// Remove an entry. Removing an id that is not present is a no-op.
    fn remove(&self, id: u64) -> bool {
        self.entries.lock().remove(&id).is_some()
    }
}

/// A registered request, owned by the thread that issued it.
///
/// Dropping it removes the entry from the table, so every exit path of the
/// issuer cleans up exactly once.
pub struct PendingRequest<'a> {
    table: &'a PendingRequestTable,
    id: u64,
    waker: Arc<Condvar>,
}

impl PendingRequest<'_> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until a response arrives or shutdown begins.
    ///
    /// Shutdown takes precedence over a response that raced with it.
    pub fn wait(&self) -> WaitOutcome {
        let mut entries = self.table.entries.lock();
        loop {
            if self.table.is_shutting_down() {
                return WaitOutcome::ShutDown;
            }
            match entries.get(&self.id).and_then(|m| m.response) {
                Some(outcome) => return WaitOutcome::Responded(outcome),
                // Only this handle removes the entry, so `None` means "not yet".
                None => {
                    let _ = self.waker.wait_for(&mut entries, self.table.poll_interval);
                }
            }
        }
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        self.table.remove(self.id);
        trace!(request_id = self.id, "removed pending request");
    }
}
