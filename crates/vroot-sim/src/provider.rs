//! A provider process answering hydration requests from a worker thread.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};
use vroot_core::{AccessArbiter, ChannelError, MessageType, ProviderChannel, RequestMessage};

use crate::tree::MemFs;

/// How the provider reacts to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    /// Hydrate the object, then answer success.
    Succeed,
    /// Answer failure without touching the object.
    Fail,
    /// Accept the message and never answer.
    Ignore,
    /// Refuse the message at the channel.
    RejectSend,
    /// Sleep, then behave as [`Behaviour::Succeed`].
    SucceedAfter(Duration),
}

struct Job {
    root_index: i16,
    message: RequestMessage,
    behaviour: Behaviour,
}

struct Shared {
    fs: Arc<MemFs>,
    arbiter: Mutex<Weak<AccessArbiter>>,
    queue: Mutex<VecDeque<Job>>,
    signal: Condvar,
    stop: AtomicBool,
    sent: Mutex<Vec<RequestMessage>>,
}

impl Shared {
    fn answer(&self, job: Job) {
        let response = match job.behaviour {
            Behaviour::Ignore | Behaviour::RejectSend => return,
            Behaviour::Fail => MessageType::ResponseFail,
            Behaviour::Succeed | Behaviour::SucceedAfter(_) => {
                if let Behaviour::SucceedAfter(delay) = job.behaviour {
                    thread::sleep(delay);
                }
                if let Some(root) = self.fs.root_path(job.root_index) {
                    let absolute = if job.message.relative_path.is_empty() {
                        root
                    } else {
                        format!("{}/{}", root.trim_end_matches('/'), job.message.relative_path)
                    };
                    self.fs.mark_hydrated(&absolute);
                }
                MessageType::ResponseSuccess
            }
        };

        let Some(arbiter) = self.arbiter.lock().upgrade() else {
            debug!(request_id = job.message.id, "no arbiter attached, response dropped");
            return;
        };
        let delivered = arbiter.deliver_response(job.message.id, response);
        trace!(request_id = job.message.id, ?response, delivered, "provider answered");
    }
}

/// Simulated provider. Messages are queued by [`ProviderChannel::send`] and
/// answered on a dedicated worker thread.
pub struct SimProvider {
    shared: Arc<Shared>,
    default_behaviour: Mutex<Behaviour>,
    overrides: Mutex<HashMap<String, Behaviour>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SimProvider {
    pub fn new(fs: Arc<MemFs>) -> Self {
        let shared = Arc::new(Shared {
            fs,
            arbiter: Mutex::new(Weak::new()),
            queue: Mutex::new(VecDeque::new()),
            signal: Condvar::new(),
            stop: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::spawn(move || loop {
            let job = {
                let mut queue = worker_shared.queue.lock();
                loop {
                    if worker_shared.stop.load(Ordering::Acquire) {
                        return;
                    }
                    if let Some(job) = queue.pop_front() {
                        break job;
                    }
                    worker_shared
                        .signal
                        .wait_for(&mut queue, Duration::from_millis(5));
                }
            };
            worker_shared.answer(job);
        });

        SimProvider {
            shared,
            default_behaviour: Mutex::new(Behaviour::Succeed),
            overrides: Mutex::new(HashMap::new()),
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Route answers to `arbiter`. Held weakly so the provider never keeps
    /// a stopped service alive.
    pub fn attach(&self, arbiter: &Arc<AccessArbiter>) {
        *self.shared.arbiter.lock() = Arc::downgrade(arbiter);
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.default_behaviour.lock() = behaviour;
    }

    /// Behaviour for one root-relative path, overriding the default.
    pub fn set_behaviour_for(&self, relative_path: impl Into<String>, behaviour: Behaviour) {
        self.overrides.lock().insert(relative_path.into(), behaviour);
    }

    pub fn behaviour_for(&self, relative_path: &str) -> Behaviour {
        self.overrides
            .lock()
            .get(relative_path)
            .copied()
            .unwrap_or(*self.default_behaviour.lock())
    }

    /// Every message accepted by the channel, in send order.
    pub fn sent(&self) -> Vec<RequestMessage> {
        self.shared.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.shared.sent.lock().len()
    }

    /// Stop the worker. Queued messages are never answered.
    pub fn shutdown(&self) {
        self.shared.stop.store(true, Ordering::Release);
        self.shared.signal.notify_all();
        if let Some(handle) = self.worker.lock().take() {
            // The last arbiter reference can be released on the worker itself.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl ProviderChannel for SimProvider {
    fn send(&self, root_index: i16, message: &RequestMessage) -> Result<(), ChannelError> {
        let behaviour = self.behaviour_for(&message.relative_path);
        if behaviour == Behaviour::RejectSend {
            return Err(ChannelError::Rejected {
                root: root_index,
                reason: "provider queue closed".to_string(),
            });
        }
        if self.shared.stop.load(Ordering::Acquire) {
            return Err(ChannelError::NotConnected(root_index));
        }

        self.shared.sent.lock().push(message.clone());
        self.shared.queue.lock().push_back(Job {
            root_index,
            message: message.clone(),
            behaviour,
        });
        self.shared.signal.notify_one();
        Ok(())
    }
}

impl Drop for SimProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}
