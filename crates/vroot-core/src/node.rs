use bitflags::bitflags;

use crate::error::PathError;

/// Filesystem object type, mirroring the host's vnode types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    None,
    Regular,
    Directory,
    Block,
    Character,
    Symlink,
    Socket,
    Fifo,
    Bad,
    Stream,
    Complex,
    /// A type the host reported that this crate does not know.
    Unknown(u32),
}

impl NodeKind {
    pub fn is_dir(self) -> bool {
        self == NodeKind::Directory
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeKind::None => "none",
            NodeKind::Regular => "file",
            NodeKind::Directory => "directory",
            NodeKind::Block => "block device",
            NodeKind::Character => "character device",
            NodeKind::Symlink => "symlink",
            NodeKind::Socket => "socket",
            NodeKind::Fifo => "fifo",
            NodeKind::Bad => "bad",
            NodeKind::Stream => "stream",
            NodeKind::Complex => "complex",
            NodeKind::Unknown(_) => "unknown",
        }
    }
}

bitflags! {
    /// Persistent per-object flags written by the provider side.
    #[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Default)]
    pub struct AccessFlags: u32 {
        /// The object has not been hydrated yet.
        const EMPTY = 0x0000_0008;
        /// The object lives inside some virtualization root.
        const IN_ROOT = 0x0000_0040;
    }
}

impl AccessFlags {
    pub fn is_in_root(self) -> bool {
        self.contains(AccessFlags::IN_ROOT)
    }

    pub fn is_empty_placeholder(self) -> bool {
        self.contains(AccessFlags::EMPTY)
    }
}

/// A filesystem object handed to the interception hook.
pub trait FsNode: Send + Sync {
    fn kind(&self) -> NodeKind;

    /// Absolute path of the object.
    fn path(&self) -> Result<String, PathError>;
}

/// The calling thread's process, as exposed by the hook's context argument.
pub trait CallerContext {
    fn pid(&self) -> i32;

    /// Short process name; hosts truncate it to 16 bytes.
    fn process_name(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_helpers() {
        let flags = AccessFlags::IN_ROOT | AccessFlags::EMPTY;
        assert!(flags.is_in_root());
        assert!(flags.is_empty_placeholder());
        assert!(!AccessFlags::default().is_in_root());
        assert!(!AccessFlags::IN_ROOT.is_empty_placeholder());
    }

    #[test]
    fn test_kind_labels() {
        assert!(NodeKind::Directory.is_dir());
        assert!(!NodeKind::Symlink.is_dir());
        assert_eq!(NodeKind::Unknown(42).label(), "unknown");
    }
}
