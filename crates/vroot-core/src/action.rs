//! Access actions as reported by the host's interception hook.
//!
//! Bit values follow the host's vnode-scope action encoding. Several names
//! alias the same bit because the host reuses a bit for the file and the
//! directory flavour of an operation.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
    pub struct ActionMask: u32 {
        const READ_DATA = 1 << 1;
        const LIST_DIRECTORY = Self::READ_DATA.bits();
        const WRITE_DATA = 1 << 2;
        const ADD_FILE = Self::WRITE_DATA.bits();
        const EXECUTE = 1 << 3;
        const SEARCH = Self::EXECUTE.bits();
        const DELETE = 1 << 4;
        const APPEND_DATA = 1 << 5;
        const ADD_SUBDIRECTORY = Self::APPEND_DATA.bits();
        const DELETE_CHILD = 1 << 6;
        const READ_ATTRIBUTES = 1 << 7;
        const WRITE_ATTRIBUTES = 1 << 8;
        const READ_EXTATTRIBUTES = 1 << 9;
        const WRITE_EXTATTRIBUTES = 1 << 10;
        const READ_SECURITY = 1 << 11;
        const WRITE_SECURITY = 1 << 12;
        const TAKE_OWNERSHIP = 1 << 13;
        const SYNCHRONIZE = 1 << 20;
        const LINKTARGET = 1 << 25;
        const CHECKIMMUTABLE = 1 << 26;
        const SEARCHBYANYONE = 1 << 29;
        const NOIMMUTABLE = 1 << 30;
        /// Pure query: the caller only asks whether the access would be allowed.
        const ACCESS = 1 << 31;
    }
}

impl ActionMask {
    /// True when any bit of `mask` is present.
    pub fn any_of(self, mask: ActionMask) -> bool {
        self.intersects(mask)
    }

    /// True when no bit of `mask` is present.
    pub fn none_of(self, mask: ActionMask) -> bool {
        !self.intersects(mask)
    }

    /// Raw bits as delivered by the host, unknown bits preserved.
    pub fn from_raw(bits: u32) -> Self {
        ActionMask::from_bits_retain(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_share_bits() {
        assert_eq!(ActionMask::LIST_DIRECTORY, ActionMask::READ_DATA);
        assert_eq!(ActionMask::SEARCH, ActionMask::EXECUTE);
        assert_eq!(ActionMask::ADD_FILE, ActionMask::WRITE_DATA);
        assert_eq!(ActionMask::ADD_SUBDIRECTORY, ActionMask::APPEND_DATA);
    }

    #[test]
    fn test_any_and_none() {
        let action = ActionMask::READ_DATA | ActionMask::READ_ATTRIBUTES;
        assert!(action.any_of(ActionMask::READ_ATTRIBUTES | ActionMask::WRITE_DATA));
        assert!(action.none_of(ActionMask::WRITE_DATA | ActionMask::DELETE));
        assert!(ActionMask::empty().none_of(ActionMask::all()));
    }

    #[test]
    fn test_from_raw_keeps_unknown_bits() {
        let action = ActionMask::from_raw(0x2 | (1 << 15));
        assert!(action.contains(ActionMask::READ_DATA));
        assert_eq!(action.bits(), 0x2 | (1 << 15));
    }
}
