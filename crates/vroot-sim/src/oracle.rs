//! Ground-truth model of what the arbiter should decide.
//!
//! Kept deliberately separate from `vroot_core::policy`: every rule is
//! restated here from the action bits so a mistake in one is caught by the
//! other.

use std::collections::{HashMap, HashSet};

use vroot_config::TransportFailurePolicy;
use vroot_core::{ActionMask, DenyReason, NodeKind, Verdict};

use crate::provider::Behaviour;

/// What the real system should produce for one access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Verdict(Verdict),
    /// The flag word cannot be read; no verdict may be produced.
    IntegrityViolation,
}

/// Static description of one node in the simulated tree.
#[derive(Debug, Clone)]
pub struct NodeModel {
    pub kind: NodeKind,
    /// Lives under an unmanaged mount.
    pub unmanaged: bool,
    /// Flagged as inside a root.
    pub in_root: bool,
    /// Flagged in a root, but the registry cannot find it.
    pub orphaned: bool,
    pub attributes_fail: bool,
    pub resolvable: bool,
}

/// Tracks the state the system should be in.
pub struct Oracle {
    nodes: HashMap<String, NodeModel>,
    empty: HashSet<String>,
    crawlers: HashSet<String>,
    provider_pid: i32,
    online: bool,
    behaviour: Behaviour,
    policy: TransportFailurePolicy,
}

impl Oracle {
    pub fn new(
        crawlers: impl IntoIterator<Item = String>,
        provider_pid: i32,
        policy: TransportFailurePolicy,
    ) -> Self {
        Oracle {
            nodes: HashMap::new(),
            empty: HashSet::new(),
            crawlers: crawlers.into_iter().collect(),
            provider_pid,
            online: true,
            behaviour: Behaviour::Succeed,
            policy,
        }
    }

    pub fn add_node(&mut self, path: impl Into<String>, model: NodeModel, empty: bool) {
        let path = path.into();
        if empty {
            self.empty.insert(path.clone());
        }
        self.nodes.insert(path, model);
    }

    pub fn is_empty(&self, path: &str) -> bool {
        self.empty.contains(path)
    }

    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    pub fn set_behaviour(&mut self, behaviour: Behaviour) {
        self.behaviour = behaviour;
    }

    pub fn mark_hydrated(&mut self, path: &str) {
        self.empty.remove(path);
    }

    /// Predict the outcome of `process` (pid `pid`) performing `action` on
    /// `path`. Pure: call [`commit`](Self::commit) to apply side effects.
    pub fn predict(&self, path: &str, pid: i32, process: &str, action: ActionMask) -> Expected {
        let Some(node) = self.nodes.get(path) else {
            return Expected::Verdict(Verdict::Allow);
        };
        if node.unmanaged {
            return Expected::Verdict(Verdict::Allow);
        }
        if matches!(
            node.kind,
            NodeKind::None
                | NodeKind::Block
                | NodeKind::Character
                | NodeKind::Socket
                | NodeKind::Fifo
                | NodeKind::Bad
        ) {
            return Expected::Verdict(Verdict::Allow);
        }
        if node.attributes_fail {
            return Expected::IntegrityViolation;
        }
        if !node.in_root {
            return Expected::Verdict(Verdict::Allow);
        }

        let empty = self.empty.contains(path);
        if empty && self.crawlers.contains(process) {
            return Expected::Verdict(Verdict::Deny(DenyReason::Crawler));
        }
        if node.orphaned {
            return Expected::Verdict(Verdict::Allow);
        }
        if !self.online {
            return Expected::Verdict(offline(node.kind, empty, action));
        }
        if pid == self.provider_pid || !empty || !needs_content(node.kind, action) {
            return Expected::Verdict(Verdict::Allow);
        }
        if !node.resolvable {
            return Expected::Verdict(Verdict::Deny(DenyReason::PathUnresolved));
        }

        Expected::Verdict(match self.behaviour {
            Behaviour::Succeed | Behaviour::SucceedAfter(_) => Verdict::Allow,
            Behaviour::Fail => Verdict::Deny(DenyReason::HydrationFailed),
            Behaviour::RejectSend => match self.policy {
                TransportFailurePolicy::Allow => Verdict::Allow,
                TransportFailurePolicy::Deny => Verdict::Deny(DenyReason::ProviderUnreachable),
            },
            // Never used by random runs: the caller would block until shutdown.
            Behaviour::Ignore => Verdict::Deny(DenyReason::ShuttingDown),
        })
    }

    /// Apply the side effects of an access that produced `expected`.
    pub fn commit(&mut self, path: &str, pid: i32, process: &str, action: ActionMask, expected: Expected) {
        let hydrated = matches!(expected, Expected::Verdict(Verdict::Allow))
            && self.online
            && pid != self.provider_pid
            && self.empty.contains(path)
            && !self.crawlers.contains(process)
            && matches!(self.behaviour, Behaviour::Succeed | Behaviour::SucceedAfter(_))
            && self.nodes.get(path).is_some_and(|node| {
                node.in_root
                    && !node.orphaned
                    && !node.unmanaged
                    && node.resolvable
                    && needs_content(node.kind, action)
                    && !matches!(
                        node.kind,
                        NodeKind::None
                            | NodeKind::Block
                            | NodeKind::Character
                            | NodeKind::Socket
                            | NodeKind::Fifo
                            | NodeKind::Bad
                    )
            });
        if hydrated {
            self.empty.remove(path);
        }
    }
}

fn needs_content(kind: NodeKind, action: ActionMask) -> bool {
    let bits = action.bits();
    if kind == NodeKind::Directory {
        // list, search, read security, read attributes, read xattrs
        bits & (0x2 | 0x8 | 0x800 | 0x80 | 0x200) != 0
    } else {
        // read/write attributes, read/write xattrs, read/write data, execute
        bits & (0x80 | 0x100 | 0x200 | 0x400 | 0x2 | 0x4 | 0x8) != 0
    }
}

fn offline(kind: NodeKind, empty: bool, action: ActionMask) -> Verdict {
    let query_only = action.contains(ActionMask::ACCESS);
    let writes = ActionMask::WRITE_ATTRIBUTES
        | ActionMask::WRITE_EXTATTRIBUTES
        | ActionMask::WRITE_DATA
        | ActionMask::APPEND_DATA
        | ActionMask::WRITE_SECURITY
        | ActionMask::LINKTARGET;
    if !query_only && action.intersects(writes) {
        return Verdict::Deny(DenyReason::OfflineWrite);
    }
    if !empty {
        return Verdict::Allow;
    }

    let always = ActionMask::ACCESS
        | ActionMask::DELETE_CHILD
        | ActionMask::DELETE
        | ActionMask::READ_EXTATTRIBUTES;
    if action.intersects(always) {
        return Verdict::Allow;
    }
    let walk = ActionMask::READ_ATTRIBUTES
        | ActionMask::READ_SECURITY
        | ActionMask::LIST_DIRECTORY
        | ActionMask::SEARCH;
    if kind == NodeKind::Directory && action.intersects(walk) {
        return Verdict::Allow;
    }
    Verdict::Deny(DenyReason::OfflinePlaceholder)
}
