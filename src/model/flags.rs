//! Raw change-action flags as reported by the history source.
//!
//! A single change record may carry several flags at once (`Rename | Edit`,
//! `Add | Edit`, ...). [`ChangeFlags`] is a small bit set over the flag
//! universe, with the two masks the replay engine works against:
//!
//! - [`ChangeFlags::CORE_MASK`]: the flags that decide the canonical action.
//! - [`ChangeFlags::FULL_MASK`]: the core mask plus `SourceRename`, used only
//!   when ordering a changeset.
//!
//! Flags outside both masks (`Encoding`, `Merge`, `Lock`, ...) are reported by
//! the source but never influence replay.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A set of raw change-action flags.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ChangeFlags(u16);

impl ChangeFlags {
    /// No flags.
    pub const EMPTY: Self = Self(0);
    /// Item was added.
    pub const ADD: Self = Self(1 << 0);
    /// Item content changed.
    pub const EDIT: Self = Self(1 << 1);
    /// Item was deleted.
    pub const DELETE: Self = Self(1 << 2);
    /// Item was renamed (moved).
    pub const RENAME: Self = Self(1 << 3);
    /// Item was branched from another path.
    pub const BRANCH: Self = Self(1 << 4);
    /// A previously deleted item was restored.
    pub const UNDELETE: Self = Self(1 << 5);
    /// Item is the source side of a rename recorded against another item.
    pub const SOURCE_RENAME: Self = Self(1 << 6);
    /// File encoding changed.
    pub const ENCODING: Self = Self(1 << 7);
    /// Change came from a merge.
    pub const MERGE: Self = Self(1 << 8);
    /// Item was locked.
    pub const LOCK: Self = Self(1 << 9);
    /// Change was a rollback of an earlier one.
    pub const ROLLBACK: Self = Self(1 << 10);
    /// Item properties changed.
    pub const PROPERTY: Self = Self(1 << 11);

    /// Flags that determine the canonical action of a change.
    pub const CORE_MASK: Self = Self(
        Self::ADD.0 | Self::BRANCH.0 | Self::DELETE.0 | Self::EDIT.0 | Self::RENAME.0 | Self::UNDELETE.0,
    );

    /// [`CORE_MASK`](Self::CORE_MASK) plus `SourceRename`, for ordering.
    pub const FULL_MASK: Self = Self(Self::CORE_MASK.0 | Self::SOURCE_RENAME.0);

    const NAMES: [(Self, &'static str); 12] = [
        (Self::ADD, "Add"),
        (Self::EDIT, "Edit"),
        (Self::DELETE, "Delete"),
        (Self::RENAME, "Rename"),
        (Self::BRANCH, "Branch"),
        (Self::UNDELETE, "Undelete"),
        (Self::SOURCE_RENAME, "SourceRename"),
        (Self::ENCODING, "Encoding"),
        (Self::MERGE, "Merge"),
        (Self::LOCK, "Lock"),
        (Self::ROLLBACK, "Rollback"),
        (Self::PROPERTY, "Property"),
    ];

    /// Build from raw bits, dropping bits outside the known universe.
    #[must_use]
    pub const fn from_bits_truncate(bits: u16) -> Self {
        Self(bits & ((1 << Self::NAMES.len()) - 1))
    }

    /// The raw bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Set union, usable in `const` context.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Keep only the flags present in `mask`.
    #[must_use]
    pub const fn masked(self, mask: Self) -> Self {
        Self(self.0 & mask.0)
    }

    /// `true` if every flag in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// `true` if no flag is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Names of the set flags, in a fixed order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl BitOr for ChangeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for ChangeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ChangeFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.masked(rhs)
    }
}

impl fmt::Display for ChangeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let mut first = true;
        for name in self.names() {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Debug for ChangeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChangeFlags({self})")
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Error from parsing an unknown flag name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlagParseError {
    /// The name that was not recognised.
    pub value: String,
}

impl fmt::Display for FlagParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown change flag {:?} (expected one of: add, edit, delete, rename, branch, undelete, source-rename, encoding, merge, lock, rollback, property)",
            self.value
        )
    }
}

impl std::error::Error for FlagParseError {}

impl FromStr for ChangeFlags {
    type Err = FlagParseError;

    /// Parse a single flag name. Case, `-` and `_` are ignored, so
    /// `SourceRename`, `source-rename` and `source_rename` are equivalent.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if normalised == "none" {
            return Ok(Self::EMPTY);
        }
        Self::NAMES
            .into_iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(&normalised))
            .map(|(flag, _)| flag)
            .ok_or_else(|| FlagParseError {
                value: s.to_owned(),
            })
    }
}

impl TryFrom<Vec<String>> for ChangeFlags {
    type Error = FlagParseError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        names
            .iter()
            .try_fold(Self::EMPTY, |acc, name| Ok(acc | name.parse::<Self>()?))
    }
}

impl From<ChangeFlags> for Vec<String> {
    fn from(flags: ChangeFlags) -> Self {
        flags.names().map(str::to_owned).collect()
    }
}
