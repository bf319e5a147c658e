//! Rename conflict policy.
//!
//! A rename is decided from a handful of facts about the working copy before
//! anything is touched. Two folder-only shapes are tolerated as residue of an
//! earlier partial run (or of out-of-order history) and only logged; every
//! other missing-source or occupied-destination shape is fatal.

use crate::model::ItemKind;

/// What the working copy looks like for one rename.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenameFacts {
    /// File or folder.
    pub kind: ItemKind,
    /// Old and new local paths are identical.
    pub same_path: bool,
    /// Old and new differ only by letter case.
    pub case_only: bool,
    /// The old path exists locally.
    pub old_exists: bool,
    /// The new path exists locally.
    pub new_exists: bool,
}

/// How a rename is replayed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenamePlan {
    /// Nothing to do.
    Noop,
    /// Ordinary working-copy move.
    Move,
    /// Rename directly in the repository (case-only change).
    ServerSideMove,
    /// Two files exchanging paths: stage a swap.
    Swap,
    /// Folder already renamed by an earlier run: only redirect.
    AssumeApplied,
    /// Folder destination already created out of order: only redirect.
    AssumeCreated,
}

impl RenamePlan {
    /// `true` for the two tolerated conflict shapes.
    #[must_use]
    pub const fn is_tolerated(self) -> bool {
        matches!(self, Self::AssumeApplied | Self::AssumeCreated)
    }
}

/// The rename cannot be replayed: its source is missing and nothing explains
/// why.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceMissing;

/// Decide how to replay a rename.
///
/// # Errors
/// Returns [`SourceMissing`] when the old path is absent, except for a
/// folder whose new path is already present.
pub const fn plan_rename(facts: RenameFacts) -> Result<RenamePlan, SourceMissing> {
    if facts.same_path {
        return Ok(RenamePlan::Noop);
    }
    if !facts.old_exists {
        return match (facts.kind, facts.new_exists) {
            (ItemKind::Folder, true) => Ok(RenamePlan::AssumeApplied),
            _ => Err(SourceMissing),
        };
    }
    if facts.case_only {
        return Ok(RenamePlan::ServerSideMove);
    }
    if !facts.new_exists {
        return Ok(RenamePlan::Move);
    }
    match facts.kind {
        ItemKind::File => Ok(RenamePlan::Swap),
        ItemKind::Folder => Ok(RenamePlan::AssumeCreated),
    }
}
