//! In-memory filesystem standing in for the host's vnode layer.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use vroot_core::{
    AccessFlags, AttributeError, AttributeOracle, FsNode, NodeKind, PathError,
    ProviderConnection, RegistryError, RootRegistry, VirtualizationRoot,
};

/// Lifecycle and call events, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    RegistryInit,
    RegistryRelease,
    Listen,
    Unlisten,
    CallReturned { pid: i32 },
}

/// Append-only event log shared between the simulated components.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.0.lock().push(event);
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.0.lock().clone()
    }

    /// Position of the first occurrence of `event`.
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.0.lock().iter().position(|e| e == event)
    }
}

/// A filesystem object as handed to the interception hook.
#[derive(Debug, Clone)]
pub struct MemNode {
    path: String,
    kind: NodeKind,
    resolvable: bool,
}

impl MemNode {
    pub fn file(path: impl Into<String>) -> Self {
        Self::new(path, NodeKind::Regular)
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self::new(path, NodeKind::Directory)
    }

    pub fn new(path: impl Into<String>, kind: NodeKind) -> Self {
        MemNode {
            path: path.into(),
            kind,
            resolvable: true,
        }
    }

    /// A node the host cannot turn back into a path.
    pub fn unresolvable(mut self) -> Self {
        self.resolvable = false;
        self
    }

    /// Where the node lives, whether or not the host can report it.
    pub fn location(&self) -> &str {
        &self.path
    }
}

impl FsNode for MemNode {
    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn path(&self) -> Result<String, PathError> {
        if self.resolvable {
            Ok(self.path.clone())
        } else {
            Err(PathError::Unresolvable(self.path.clone()))
        }
    }
}

/// The registry and attribute store only ever see nodes as `&dyn FsNode`;
/// an unresolvable node still carries its location in the error.
fn location_of(node: &dyn FsNode) -> String {
    match node.path() {
        Ok(path) => path,
        Err(PathError::Unresolvable(path)) => path,
        Err(e) => e.to_string(),
    }
}

#[derive(Debug, Clone)]
struct RootEntry {
    index: i16,
    path: String,
    provider: Option<i32>,
}

#[derive(Debug, Default)]
struct TreeState {
    roots: Vec<RootEntry>,
    flags: HashMap<String, AccessFlags>,
    unmanaged_prefixes: Vec<String>,
    failing_attributes: HashSet<String>,
    /// Paths the registry claims are in a root even though no root exists.
    orphaned: HashSet<String>,
}

/// In-memory root registry and attribute store.
///
/// Nodes are identified by path. A path with no recorded flags reads as
/// empty flags, i.e. outside every root.
#[derive(Debug, Default)]
pub struct MemFs {
    state: RwLock<TreeState>,
    root_lookups: AtomicUsize,
    flag_reads: AtomicUsize,
    events: EventLog,
}

fn is_within(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: EventLog) -> Self {
        MemFs {
            events,
            ..Default::default()
        }
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Register a root. The root directory itself is marked as inside it.
    pub fn add_root(&self, index: i16, path: impl Into<String>, provider: Option<i32>) {
        let path = path.into();
        let mut state = self.state.write();
        state.flags.insert(path.clone(), AccessFlags::IN_ROOT);
        state.roots.push(RootEntry {
            index,
            path,
            provider,
        });
    }

    /// Record a node inside a root, empty or hydrated.
    pub fn add_placeholder(&self, path: impl Into<String>, empty: bool) {
        let mut flags = AccessFlags::IN_ROOT;
        if empty {
            flags |= AccessFlags::EMPTY;
        }
        self.state.write().flags.insert(path.into(), flags);
    }

    pub fn set_flags(&self, path: impl Into<String>, flags: AccessFlags) {
        self.state.write().flags.insert(path.into(), flags);
    }

    pub fn flags(&self, path: &str) -> AccessFlags {
        self.state.read().flags.get(path).copied().unwrap_or_default()
    }

    /// Clear the `EMPTY` flag, as a provider does after writing real content.
    pub fn mark_hydrated(&self, path: &str) {
        if let Some(flags) = self.state.write().flags.get_mut(path) {
            flags.remove(AccessFlags::EMPTY);
        }
    }

    pub fn add_unmanaged_prefix(&self, prefix: impl Into<String>) {
        self.state.write().unmanaged_prefixes.push(prefix.into());
    }

    pub fn fail_attributes(&self, path: impl Into<String>) {
        self.state.write().failing_attributes.insert(path.into());
    }

    /// Hide `path` from root lookup while leaving its flags alone.
    pub fn orphan(&self, path: impl Into<String>) {
        self.state.write().orphaned.insert(path.into());
    }

    pub fn set_provider(&self, index: i16, provider: Option<i32>) {
        let mut state = self.state.write();
        if let Some(root) = state.roots.iter_mut().find(|r| r.index == index) {
            root.provider = provider;
        }
    }

    pub fn provider(&self, index: i16) -> Option<i32> {
        self.state
            .read()
            .roots
            .iter()
            .find(|r| r.index == index)
            .and_then(|r| r.provider)
    }

    pub fn root_path(&self, index: i16) -> Option<String> {
        self.state
            .read()
            .roots
            .iter()
            .find(|r| r.index == index)
            .map(|r| r.path.clone())
    }

    pub fn root_lookups(&self) -> usize {
        self.root_lookups.load(Ordering::Relaxed)
    }

    pub fn flag_reads(&self) -> usize {
        self.flag_reads.load(Ordering::Relaxed)
    }
}

impl RootRegistry for MemFs {
    fn is_on_managed_filesystem(&self, node: &dyn FsNode) -> bool {
        let path = location_of(node);
        !self
            .state
            .read()
            .unmanaged_prefixes
            .iter()
            .any(|prefix| is_within(&path, prefix))
    }

    fn find_root_containing(&self, node: &dyn FsNode) -> Option<VirtualizationRoot> {
        self.root_lookups.fetch_add(1, Ordering::Relaxed);
        let path = location_of(node);
        let state = self.state.read();
        if state.orphaned.contains(&path) {
            return None;
        }
        state
            .roots
            .iter()
            .filter(|root| is_within(&path, &root.path))
            .max_by_key(|root| root.path.len())
            .map(|root| VirtualizationRoot {
                index: root.index,
                path: root.path.clone(),
                provider: root.provider.map(|pid| ProviderConnection { pid }),
            })
    }

    fn init(&self) -> Result<(), RegistryError> {
        self.events.push(Event::RegistryInit);
        Ok(())
    }

    fn release(&self) -> Result<(), RegistryError> {
        self.events.push(Event::RegistryRelease);
        Ok(())
    }
}

impl AttributeOracle for MemFs {
    fn read_flags(&self, node: &dyn FsNode) -> Result<AccessFlags, AttributeError> {
        self.flag_reads.fetch_add(1, Ordering::Relaxed);
        let path = location_of(node);
        let state = self.state.read();
        if state.failing_attributes.contains(&path) {
            return Err(AttributeError::Io(std::io::Error::other(format!(
                "flag word unreadable for {}",
                path
            ))));
        }
        Ok(state.flags.get(&path).copied().unwrap_or_default())
    }
}
