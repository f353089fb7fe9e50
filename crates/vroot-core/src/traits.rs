use crate::error::{AttributeError, ChannelError, RegistryError};
use crate::message::RequestMessage;
use crate::node::{AccessFlags, FsNode};

/// A connected provider process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderConnection {
    pub pid: i32,
}

/// Snapshot of a virtualization root, valid for the duration of one lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualizationRoot {
    /// Registry slot of the root; used to address its provider.
    pub index: i16,
    /// Absolute path of the root directory.
    pub path: String,
    /// Live provider connection, `None` when the root is offline.
    pub provider: Option<ProviderConnection>,
}

impl VirtualizationRoot {
    pub fn offline(index: i16, path: impl Into<String>) -> Self {
        VirtualizationRoot {
            index,
            path: path.into(),
            provider: None,
        }
    }

    pub fn online(index: i16, path: impl Into<String>, provider_pid: i32) -> Self {
        VirtualizationRoot {
            index,
            path: path.into(),
            provider: Some(ProviderConnection { pid: provider_pid }),
        }
    }

    pub fn is_online(&self) -> bool {
        self.provider.is_some()
    }

    /// True when `pid` is this root's provider.
    pub fn is_provider(&self, pid: i32) -> bool {
        self.provider.is_some_and(|p| p.pid == pid)
    }
}

/// Maps filesystem objects to the root that governs them.
pub trait RootRegistry: Send + Sync {
    /// Whether the object lives on a filesystem type this system manages.
    fn is_on_managed_filesystem(&self, node: &dyn FsNode) -> bool;

    fn find_root_containing(&self, node: &dyn FsNode) -> Option<VirtualizationRoot>;

    /// Called once before interception is enabled.
    fn init(&self) -> Result<(), RegistryError> {
        Ok(())
    }

    /// Called once after every in-flight interception call has drained.
    fn release(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// Reads the persistent flags attached to a filesystem object.
pub trait AttributeOracle: Send + Sync {
    fn read_flags(&self, node: &dyn FsNode) -> Result<AccessFlags, AttributeError>;
}

/// Delivers request messages to the provider of a root.
pub trait ProviderChannel: Send + Sync {
    fn send(&self, root_index: i16, message: &RequestMessage) -> Result<(), ChannelError>;
}
