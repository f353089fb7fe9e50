//! The interception host: routes simulated filesystem calls to the arbiter
//! while a listener is registered.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use vroot_core::{
    AccessArbiter, AccessRequest, ActionMask, CallerContext, FsNode, InterceptionHost,
    IntegrityViolation, ServiceError, Verdict,
};

use crate::tree::{Event, EventLog};

/// A calling process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimCaller {
    pub pid: i32,
    pub name: String,
}

impl SimCaller {
    pub fn new(pid: i32, name: impl Into<String>) -> Self {
        SimCaller {
            pid,
            name: name.into(),
        }
    }
}

impl CallerContext for SimCaller {
    fn pid(&self) -> i32 {
        self.pid
    }

    fn process_name(&self) -> String {
        // Hosts only keep the first 16 bytes of a process name.
        let mut end = self.name.len().min(vroot_config::MAX_PROCESS_NAME_LEN);
        while !self.name.is_char_boundary(end) {
            end -= 1;
        }
        self.name[..end].to_string()
    }
}

/// Simulated access-control scope.
#[derive(Default)]
pub struct SimHost {
    listener: RwLock<Option<Arc<AccessArbiter>>>,
    dispatched: AtomicUsize,
    bypassed: AtomicUsize,
    events: EventLog,
}

impl SimHost {
    pub fn new(events: EventLog) -> Self {
        SimHost {
            events,
            ..Default::default()
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener.read().is_some()
    }

    /// Calls routed to the arbiter.
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Calls that ran with no listener registered.
    pub fn bypassed(&self) -> usize {
        self.bypassed.load(Ordering::Relaxed)
    }

    /// Perform one access. With no listener registered nothing is
    /// arbitrated and the access proceeds.
    pub fn access(
        &self,
        caller: &SimCaller,
        node: &dyn FsNode,
        action: ActionMask,
    ) -> Result<Verdict, IntegrityViolation> {
        let Some(arbiter) = self.listener.read().clone() else {
            self.bypassed.fetch_add(1, Ordering::Relaxed);
            return Ok(Verdict::Allow);
        };
        self.dispatched.fetch_add(1, Ordering::Relaxed);

        let result = arbiter.decide(&AccessRequest::new(caller, node, action));
        self.events.push(Event::CallReturned { pid: caller.pid });
        result
    }
}

impl InterceptionHost for SimHost {
    fn listen(&self, arbiter: Arc<AccessArbiter>) -> Result<(), ServiceError> {
        let mut listener = self.listener.write();
        if listener.is_some() {
            return Err(ServiceError::Listen("listener already registered".to_string()));
        }
        *listener = Some(arbiter);
        self.events.push(Event::Listen);
        Ok(())
    }

    fn unlisten(&self) {
        if self.listener.write().take().is_some() {
            self.events.push(Event::Unlisten);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_name_truncated() {
        let caller = SimCaller::new(1, "a-very-long-process-name");
        assert_eq!(caller.process_name(), "a-very-long-proc");
        assert_eq!(SimCaller::new(2, "mds").process_name(), "mds");
    }

    #[test]
    fn test_access_without_listener() {
        let host = SimHost::default();
        let node = crate::tree::MemNode::file("/repo/a");
        let verdict = host
            .access(&SimCaller::new(1, "cat"), &node, ActionMask::READ_DATA)
            .unwrap();
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(host.bypassed(), 1);
        assert_eq!(host.dispatched(), 0);
    }
}
