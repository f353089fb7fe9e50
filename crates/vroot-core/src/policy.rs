//! Pure policy tables: which objects are governed, what an offline root
//! permits, and which actions need hydrated content.

use crate::action::ActionMask;
use crate::message::MessageType;
use crate::node::{AccessFlags, NodeKind};
use crate::verdict::{DenyReason, Verdict};

/// Actions that mutate data, metadata, or link structure.
pub const WRITE_ACTIONS: ActionMask = ActionMask::WRITE_ATTRIBUTES
    .union(ActionMask::WRITE_EXTATTRIBUTES)
    .union(ActionMask::WRITE_DATA)
    .union(ActionMask::APPEND_DATA)
    .union(ActionMask::WRITE_SECURITY)
    .union(ActionMask::LINKTARGET);

/// Actions an offline placeholder of any kind still permits: queries and deletion.
pub const OFFLINE_PLACEHOLDER_ACTIONS: ActionMask = ActionMask::ACCESS
    .union(ActionMask::DELETE_CHILD)
    .union(ActionMask::DELETE)
    .union(ActionMask::READ_EXTATTRIBUTES);

/// Extra actions an offline placeholder directory permits, so that recursive
/// removal can walk it.
pub const OFFLINE_PLACEHOLDER_DIRECTORY_ACTIONS: ActionMask = ActionMask::READ_ATTRIBUTES
    .union(ActionMask::READ_SECURITY)
    .union(ActionMask::LIST_DIRECTORY)
    .union(ActionMask::SEARCH);

/// Directory actions that need the real listing.
pub const DIRECTORY_HYDRATION_ACTIONS: ActionMask = ActionMask::LIST_DIRECTORY
    .union(ActionMask::SEARCH)
    .union(ActionMask::READ_SECURITY)
    .union(ActionMask::READ_ATTRIBUTES)
    .union(ActionMask::READ_EXTATTRIBUTES);

/// File actions that need the real content.
pub const FILE_HYDRATION_ACTIONS: ActionMask = ActionMask::READ_ATTRIBUTES
    .union(ActionMask::WRITE_ATTRIBUTES)
    .union(ActionMask::READ_EXTATTRIBUTES)
    .union(ActionMask::WRITE_EXTATTRIBUTES)
    .union(ActionMask::READ_DATA)
    .union(ActionMask::WRITE_DATA)
    .union(ActionMask::EXECUTE);

/// How the arbiter treats an object of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindDisposition {
    /// Never governed; allow immediately.
    Ignore,
    Govern,
    /// Governed, but rare enough to be worth a log line.
    GovernUnusual,
}

pub fn classify_kind(kind: NodeKind) -> KindDisposition {
    match kind {
        NodeKind::None
        | NodeKind::Block
        | NodeKind::Character
        | NodeKind::Socket
        | NodeKind::Fifo
        | NodeKind::Bad => KindDisposition::Ignore,
        NodeKind::Regular | NodeKind::Directory | NodeKind::Symlink => KindDisposition::Govern,
        NodeKind::Stream | NodeKind::Complex | NodeKind::Unknown(_) => {
            KindDisposition::GovernUnusual
        }
    }
}

/// Verdict for an object in a root whose provider is not connected.
pub fn offline_verdict(flags: AccessFlags, kind: NodeKind, action: ActionMask) -> Verdict {
    if action.none_of(ActionMask::ACCESS) && action.any_of(WRITE_ACTIONS) {
        return Verdict::Deny(DenyReason::OfflineWrite);
    }

    if flags.is_empty_placeholder() {
        if action.any_of(OFFLINE_PLACEHOLDER_ACTIONS) {
            return Verdict::Allow;
        }
        if kind.is_dir() && action.any_of(OFFLINE_PLACEHOLDER_DIRECTORY_ACTIONS) {
            return Verdict::Allow;
        }
        return Verdict::Deny(DenyReason::OfflinePlaceholder);
    }

    Verdict::Allow
}

/// The hydration request `action` calls for on an object of `kind`, if any.
///
/// Emptiness is checked by the caller.
pub fn hydration_kind(kind: NodeKind, action: ActionMask) -> Option<MessageType> {
    if kind.is_dir() {
        action
            .any_of(DIRECTORY_HYDRATION_ACTIONS)
            .then_some(MessageType::EnumerateDirectory)
    } else {
        action
            .any_of(FILE_HYDRATION_ACTIONS)
            .then_some(MessageType::HydrateFile)
    }
}
