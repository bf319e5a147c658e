//! The change classifier: raw flags to one canonical action.
//!
//! Classification looks only at the core-masked flags. The accepted
//! combinations, in precedence order:
//!
//! | Core flags          | Action             |
//! |---------------------|--------------------|
//! | Undelete [+ Edit]   | `Undelete`         |
//! | Rename + Delete     | `RenameThenDelete` |
//! | Rename + Edit       | `RenameThenEdit`   |
//! | Rename              | `Rename`           |
//! | Branch [+ Edit]     | `Branch`           |
//! | Add [+ Edit]        | `Add`              |
//! | Delete              | `Delete`           |
//! | Edit                | `Edit`             |
//! | (none)              | `None`             |
//!
//! Anything else is rejected with [`UnmanagedFlags`].

use std::fmt;

use serde::Serialize;

use super::flags::ChangeFlags;

/// What replaying a change actually does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanonicalAction {
    /// Create the item.
    Add,
    /// Rewrite file content.
    Edit,
    /// Remove the item.
    Delete,
    /// Move the item to its new path.
    Rename,
    /// Create the item as a branch of another path (replayed as an add).
    Branch,
    /// Restore a deleted item (replayed as an add).
    Undelete,
    /// Move, then rewrite content at the new path.
    RenameThenEdit,
    /// The item is gone; the rename is discarded and the item deleted.
    RenameThenDelete,
    /// Nothing to replay.
    None,
}

impl CanonicalAction {
    /// `true` when replay needs the item's path from the previous changeset.
    #[must_use]
    pub const fn is_rename(self) -> bool {
        matches!(self, Self::Rename | Self::RenameThenEdit)
    }

    /// `true` when replay writes content from the source.
    #[must_use]
    pub const fn fetches_content(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Branch | Self::Undelete | Self::Edit | Self::RenameThenEdit
        )
    }
}

impl fmt::Display for CanonicalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Rename => "rename",
            Self::Branch => "branch",
            Self::Undelete => "undelete",
            Self::RenameThenEdit => "rename+edit",
            Self::RenameThenDelete => "rename+delete",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// A flag combination the classifier does not accept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnmanagedFlags {
    /// Flags as reported by the source.
    pub raw: ChangeFlags,
    /// The same flags after masking.
    pub masked: ChangeFlags,
}

impl fmt::Display for UnmanagedFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unmanaged change: {} (masked: {})", self.raw, self.masked)
    }
}

impl std::error::Error for UnmanagedFlags {}

const UNDELETE_EDIT: ChangeFlags = ChangeFlags::UNDELETE.union(ChangeFlags::EDIT);
const RENAME_DELETE: ChangeFlags = ChangeFlags::RENAME.union(ChangeFlags::DELETE);
const RENAME_EDIT: ChangeFlags = ChangeFlags::RENAME.union(ChangeFlags::EDIT);
const BRANCH_EDIT: ChangeFlags = ChangeFlags::BRANCH.union(ChangeFlags::EDIT);
const ADD_EDIT: ChangeFlags = ChangeFlags::ADD.union(ChangeFlags::EDIT);

/// Map raw flags to exactly one canonical action.
///
/// # Errors
/// Returns [`UnmanagedFlags`] for any core-masked combination outside the
/// table in the module docs.
pub fn classify(flags: ChangeFlags) -> Result<CanonicalAction, UnmanagedFlags> {
    let masked = flags.masked(ChangeFlags::CORE_MASK);
    let action = match masked {
        ChangeFlags::UNDELETE | UNDELETE_EDIT => CanonicalAction::Undelete,
        RENAME_DELETE => CanonicalAction::RenameThenDelete,
        RENAME_EDIT => CanonicalAction::RenameThenEdit,
        ChangeFlags::RENAME => CanonicalAction::Rename,
        ChangeFlags::BRANCH | BRANCH_EDIT => CanonicalAction::Branch,
        ChangeFlags::ADD | ADD_EDIT => CanonicalAction::Add,
        ChangeFlags::DELETE => CanonicalAction::Delete,
        ChangeFlags::EDIT => CanonicalAction::Edit,
        ChangeFlags::EMPTY => CanonicalAction::None,
        _ => return Err(UnmanagedFlags { raw: flags, masked }),
    };
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_flags() {
        assert_eq!(classify(ChangeFlags::ADD), Ok(CanonicalAction::Add));
        assert_eq!(classify(ChangeFlags::EDIT), Ok(CanonicalAction::Edit));
        assert_eq!(classify(ChangeFlags::DELETE), Ok(CanonicalAction::Delete));
        assert_eq!(classify(ChangeFlags::RENAME), Ok(CanonicalAction::Rename));
        assert_eq!(classify(ChangeFlags::BRANCH), Ok(CanonicalAction::Branch));
        assert_eq!(classify(ChangeFlags::UNDELETE), Ok(CanonicalAction::Undelete));
        assert_eq!(classify(ChangeFlags::EMPTY), Ok(CanonicalAction::None));
    }

    #[test]
    fn delete_wins_over_rename() {
        assert_eq!(
            classify(ChangeFlags::RENAME | ChangeFlags::DELETE),
            Ok(CanonicalAction::RenameThenDelete)
        );
    }

    #[test]
    fn rename_with_edit_keeps_both() {
        assert_eq!(
            classify(ChangeFlags::RENAME | ChangeFlags::EDIT),
            Ok(CanonicalAction::RenameThenEdit)
        );
    }

    #[test]
    fn edit_is_absorbed_by_creating_actions() {
        assert_eq!(classify(ADD_EDIT), Ok(CanonicalAction::Add));
        assert_eq!(classify(BRANCH_EDIT), Ok(CanonicalAction::Branch));
        assert_eq!(classify(UNDELETE_EDIT), Ok(CanonicalAction::Undelete));
    }

    #[test]
    fn ambient_flags_are_ignored() {
        let flags = ChangeFlags::EDIT | ChangeFlags::ENCODING | ChangeFlags::MERGE;
        assert_eq!(classify(flags), Ok(CanonicalAction::Edit));
        assert_eq!(classify(ChangeFlags::LOCK), Ok(CanonicalAction::None));
    }

    #[test]
    fn source_rename_does_not_affect_classification() {
        assert_eq!(
            classify(ChangeFlags::SOURCE_RENAME | ChangeFlags::DELETE),
            Ok(CanonicalAction::Delete)
        );
    }

    #[test]
    fn unknown_combination_reports_raw_and_masked() {
        let raw = ChangeFlags::ADD | ChangeFlags::DELETE | ChangeFlags::LOCK;
        let err = classify(raw).unwrap_err();
        assert_eq!(err.raw, raw);
        assert_eq!(err.masked, ChangeFlags::ADD | ChangeFlags::DELETE);
        let msg = err.to_string();
        assert!(msg.contains("Lock"), "raw flags should be in message: {msg}");
        assert!(msg.contains("masked: Add, Delete"), "got: {msg}");
    }

    #[test]
    fn rename_predicates() {
        assert!(CanonicalAction::Rename.is_rename());
        assert!(CanonicalAction::RenameThenEdit.is_rename());
        assert!(!CanonicalAction::RenameThenDelete.is_rename());
        assert!(CanonicalAction::RenameThenEdit.fetches_content());
        assert!(!CanonicalAction::Delete.fetches_content());
    }
}

// ---------------------------------------------------------------------------
// Property tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_flags() -> impl Strategy<Value = ChangeFlags> {
        (0u16..0x1000).prop_map(ChangeFlags::from_bits_truncate)
    }

    proptest! {
        #[test]
        fn prop_classification_is_deterministic(flags in arb_flags()) {
            prop_assert_eq!(classify(flags), classify(flags));
        }

        #[test]
        fn prop_only_core_bits_matter(flags in arb_flags()) {
            let core = flags.masked(ChangeFlags::CORE_MASK);
            prop_assert_eq!(classify(flags).ok(), classify(core).ok());
        }

        #[test]
        fn prop_errors_carry_masked_flags(flags in arb_flags()) {
            if let Err(e) = classify(flags) {
                prop_assert_eq!(e.raw, flags);
                prop_assert_eq!(e.masked, flags.masked(ChangeFlags::CORE_MASK));
                prop_assert!(!e.masked.is_empty());
            }
        }

        #[test]
        fn prop_delete_without_rename_never_survives_with_other_flags(flags in arb_flags()) {
            let core = flags.masked(ChangeFlags::CORE_MASK);
            if core.contains(ChangeFlags::DELETE) && !core.contains(ChangeFlags::RENAME) {
                let ok = core == ChangeFlags::DELETE;
                prop_assert_eq!(classify(flags).is_ok(), ok);
            }
        }
    }
}
