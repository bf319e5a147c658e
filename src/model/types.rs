//! Core history types for histport.
//!
//! Changesets, changes and items as reported by a history source. All of
//! these are immutable once fetched.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::flags::ChangeFlags;

// ---------------------------------------------------------------------------
// ChangesetId
// ---------------------------------------------------------------------------

/// A source changeset number. Monotonically increasing across history.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChangesetId(u32);

impl ChangesetId {
    /// Wrap a raw changeset number.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw changeset number.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The changeset before this one, or `None` for changeset 0.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self.0.checked_sub(1) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }
}

impl fmt::Display for ChangesetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChangesetId {
    type Err = std::num::ParseIntError;

    /// Accepts `42` or `C42`, the way changesets are usually quoted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('C')
            .or_else(|| s.strip_prefix('c'))
            .unwrap_or(s);
        digits.parse().map(Self)
    }
}

impl From<u32> for ChangesetId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// ItemKind
// ---------------------------------------------------------------------------

/// Whether a versioned item is a file or a folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// A regular file with content.
    File,
    /// A directory. Has no content of its own.
    Folder,
}

impl ItemKind {
    /// `true` for [`ItemKind::Folder`].
    #[must_use]
    pub const fn is_folder(self) -> bool {
        matches!(self, Self::Folder)
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Folder => f.write_str("folder"),
        }
    }
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// One version of a versioned item: where it lived at a given changeset.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// Full server path, e.g. `$/Project/Main/src/lib.cs`.
    pub server_path: String,
    /// File or folder.
    pub kind: ItemKind,
    /// Stable identity across renames.
    pub item_id: u64,
    /// The changeset this version belongs to.
    pub changeset_id: ChangesetId,
}

impl Item {
    /// Build an item version.
    pub fn new(
        server_path: impl Into<String>,
        kind: ItemKind,
        item_id: u64,
        changeset_id: ChangesetId,
    ) -> Self {
        Self {
            server_path: server_path.into(),
            kind,
            item_id,
            changeset_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Change
// ---------------------------------------------------------------------------

/// A raw change record: an item version plus the flags the source reported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    /// The item as it is after this change.
    pub item: Item,
    /// Raw, unmasked action flags.
    pub flags: ChangeFlags,
}

impl Change {
    /// Build a change record.
    pub const fn new(item: Item, flags: ChangeFlags) -> Self {
        Self { item, flags }
    }

    /// Server path of the item after the change.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.item.server_path
    }
}

// ---------------------------------------------------------------------------
// Changeset
// ---------------------------------------------------------------------------

/// An atomic batch of changes from the history source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    /// Changeset number.
    pub id: ChangesetId,
    /// Source-side identity of the committer.
    pub committer: String,
    /// Check-in comment, verbatim.
    #[serde(default)]
    pub comment: String,
    /// When the changeset was created, in UTC.
    pub created_at: DateTime<Utc>,
    /// Raw change records, in the order the source reported them.
    #[serde(default)]
    pub changes: Vec<Change>,
}
