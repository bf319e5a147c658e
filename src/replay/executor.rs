//! The replay executor: applies one ordered change to the working copy.
//!
//! Dispatch is by canonical action and item kind:
//!
//! | Action                  | File                                  | Folder                           |
//! |-------------------------|---------------------------------------|----------------------------------|
//! | Add / Branch / Undelete | write content, `add`                  | create dir, `add_empty`          |
//! | Edit                    | rewrite content                       | fatal                            |
//! | Delete                  | `remove` if present                   | `remove`, else cleanup + force   |
//! | Rename                  | see [`plan_rename`]                   | see [`plan_rename`]              |
//! | Rename + Edit           | rename, then rewrite content          | rename, then fatal               |
//! | Rename + Delete         | delete (the rename is discarded)      | delete                           |
//!
//! A folder rename that would be a working-copy move is done in the
//! repository instead when a later rename in the same changeset turns out to
//! be case-only beneath it.
//!
//! The executor never commits. The only state it mutates besides the working
//! copy is the [`ChangesetState`] it is handed.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use histport_svn::{ReplicaTarget, Revision};

use crate::error::ReplayError;
use crate::model::{CanonicalAction, Changeset, ChangesetId, Item, ItemKind};
use crate::source::HistorySource;
use crate::users::UsernameMap;

use super::metadata::{format_revision_date, server_side_move_message};
use super::order::PlannedChange;
use super::paths::{PathMapper, is_case_only_change};
use super::recovery::{RenameFacts, RenamePlan, SourceMissing, plan_rename};
use super::transaction::ChangesetState;

/// What applying a change actually did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The working copy was changed as requested.
    Applied,
    /// Nothing needed doing.
    Skipped,
    /// A working-copy move was scheduled.
    Moved,
    /// The rename was committed directly in the repository.
    ServerSideMoved(Revision),
    /// The rename was staged as part of a file swap.
    Swapped,
    /// A folder rename conflict was tolerated; only a redirect was recorded.
    Tolerated(RenamePlan),
    /// A folder could only be removed with cleanup and force.
    ForcedRemoval,
}

/// Result of applying one change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedChange {
    /// Local path after the change.
    pub path: PathBuf,
    /// Local path before the change, for renames.
    pub old_path: Option<PathBuf>,
    /// What was done.
    pub outcome: ChangeOutcome,
}

impl AppliedChange {
    const fn at(path: PathBuf, outcome: ChangeOutcome) -> Self {
        Self {
            path,
            old_path: None,
            outcome,
        }
    }
}

/// Applies ordered changes against a history source and a replication target.
#[derive(Clone, Copy)]
pub struct Executor<'a> {
    source: &'a dyn HistorySource,
    target: &'a dyn ReplicaTarget,
    paths: &'a PathMapper,
    users: &'a UsernameMap,
}

impl<'a> Executor<'a> {
    /// Build an executor over the given collaborators.
    pub const fn new(
        source: &'a dyn HistorySource,
        target: &'a dyn ReplicaTarget,
        paths: &'a PathMapper,
        users: &'a UsernameMap,
    ) -> Self {
        Self {
            source,
            target,
            paths,
            users,
        }
    }

    /// The replication target.
    #[must_use]
    pub fn target(&self) -> &'a dyn ReplicaTarget {
        self.target
    }

    /// Apply one planned change. `later` holds the changes still to come in
    /// the same changeset.
    ///
    /// # Errors
    /// Any fatal condition for this change; see [`ReplayError`].
    pub fn apply(
        &self,
        changeset: &Changeset,
        planned: &PlannedChange,
        later: &[PlannedChange],
        state: &mut ChangesetState,
    ) -> Result<AppliedChange, ReplayError> {
        let item = &planned.change.item;
        let path = self.paths.local_path(&item.server_path)?;

        match planned.action {
            CanonicalAction::Add | CanonicalAction::Branch | CanonicalAction::Undelete => {
                self.create(changeset.id, item, &path)?;
                Ok(AppliedChange::at(path, ChangeOutcome::Applied))
            }
            CanonicalAction::Edit => {
                self.edit(changeset.id, item, &path)?;
                Ok(AppliedChange::at(path, ChangeOutcome::Applied))
            }
            CanonicalAction::Delete => {
                let outcome = self.delete(changeset.id, item.kind, &path)?;
                Ok(AppliedChange::at(path, outcome))
            }
            CanonicalAction::Rename => self.rename(changeset, item, path, later, state),
            CanonicalAction::RenameThenEdit => {
                let applied = self.rename(changeset, item, path, later, state)?;
                self.edit(changeset.id, item, &applied.path)?;
                Ok(applied)
            }
            CanonicalAction::RenameThenDelete => {
                self.rename_then_delete(changeset.id, item, path, state)
            }
            CanonicalAction::None => {
                tracing::debug!(path = %path.display(), "no action");
                Ok(AppliedChange::at(path, ChangeOutcome::Skipped))
            }
        }
    }

    /// Overwrite author and date of `revision` with the source changeset's.
    ///
    /// # Errors
    /// Returns [`ReplayError::Target`] if the target refuses the change.
    pub fn stamp_revision(
        &self,
        changeset: ChangesetId,
        revision: Revision,
        committer: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), ReplayError> {
        let author = self.users.map(committer);
        let date = format_revision_date(created_at);
        tracing::debug!(%revision, author, date = %date, "rewriting revision metadata");
        self.target
            .set_revision_metadata(revision, author, &date)
            .map_err(|e| {
                ReplayError::target_failed("set revision metadata", None, Some(changeset), e)
            })
    }

    // -----------------------------------------------------------------------
    // Add / Edit
    // -----------------------------------------------------------------------

    fn create(&self, changeset: ChangesetId, item: &Item, path: &Path) -> Result<(), ReplayError> {
        match item.kind {
            ItemKind::File => {
                tracing::info!(path = %path.display(), "adding file");
                self.write_content(changeset, item, path)?;
                self.target
                    .add(path)
                    .map_err(|e| ReplayError::target_failed("add", Some(path), Some(changeset), e))
            }
            ItemKind::Folder => {
                tracing::info!(path = %path.display(), "adding folder");
                fs::create_dir_all(path)
                    .map_err(|e| ReplayError::io("create directory", path, e))?;
                self.target.add_empty(path).map_err(|e| {
                    ReplayError::target_failed("add folder", Some(path), Some(changeset), e)
                })
            }
        }
    }

    fn edit(&self, changeset: ChangesetId, item: &Item, path: &Path) -> Result<(), ReplayError> {
        if item.kind.is_folder() {
            return Err(ReplayError::EditOnFolder {
                changeset,
                path: item.server_path.clone(),
            });
        }
        tracing::info!(path = %path.display(), "editing file");
        self.write_content(changeset, item, path)
    }

    fn write_content(
        &self,
        changeset: ChangesetId,
        item: &Item,
        path: &Path,
    ) -> Result<(), ReplayError> {
        let mut content = self
            .source
            .fetch_content(item)
            .map_err(|e| {
                ReplayError::source_failed(
                    "fetch content",
                    Some(item.server_path.as_str()),
                    Some(changeset),
                    e,
                )
            })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ReplayError::io("create directory", parent, e))?;
        }
        let mut file = fs::File::create(path).map_err(|e| ReplayError::io("write", path, e))?;
        std::io::copy(&mut content, &mut file).map_err(|e| ReplayError::io("write", path, e))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Delete
    // -----------------------------------------------------------------------

    fn delete(
        &self,
        changeset: ChangesetId,
        kind: ItemKind,
        path: &Path,
    ) -> Result<ChangeOutcome, ReplayError> {
        match kind {
            ItemKind::File => {
                if !path.is_file() {
                    tracing::debug!(path = %path.display(), "file already gone");
                    return Ok(ChangeOutcome::Skipped);
                }
                tracing::info!(path = %path.display(), "deleting file");
                self.target.remove(path).map_err(|e| {
                    ReplayError::target_failed("remove", Some(path), Some(changeset), e)
                })?;
                Ok(ChangeOutcome::Applied)
            }
            ItemKind::Folder => {
                if !path.is_dir() || path == self.target.working_copy() {
                    tracing::debug!(path = %path.display(), "folder already gone or is the root");
                    return Ok(ChangeOutcome::Skipped);
                }
                tracing::info!(path = %path.display(), "deleting folder");
                let Err(first) = self.target.remove(path) else {
                    return Ok(ChangeOutcome::Applied);
                };
                tracing::warn!(
                    path = %path.display(),
                    error = %first,
                    "could not remove folder normally, forcing removal"
                );
                self.target.cleanup(path).map_err(|e| {
                    ReplayError::target_failed("clean up", Some(path), Some(changeset), e)
                })?;
                self.target.force_remove(path).map_err(|e| {
                    ReplayError::target_failed("force-remove", Some(path), Some(changeset), e)
                })?;
                Ok(ChangeOutcome::ForcedRemoval)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Rename
    // -----------------------------------------------------------------------

    /// Local path `item` had before this changeset, with redirects applied.
    fn previous_local_path(
        &self,
        changeset: ChangesetId,
        item: &Item,
        state: &ChangesetState,
    ) -> Result<PathBuf, ReplayError> {
        let previous = self
            .source
            .previous_version(item)
            .map_err(|e| {
                ReplayError::source_failed(
                    "resolve previous version",
                    Some(item.server_path.as_str()),
                    Some(changeset),
                    e,
                )
            })?;
        let local = self.paths.local_path(&previous.server_path)?;
        Ok(state.redirects.resolve(&local))
    }

    /// `true` if a rename in `later` becomes case-only once the folder move
    /// `old` -> `new` is applied. Such a child can only be moved in the
    /// repository, which needs its parent committed at `new` first.
    fn case_only_child_follows(
        &self,
        old: &Path,
        new: &Path,
        later: &[PlannedChange],
        state: &ChangesetState,
    ) -> bool {
        later
            .iter()
            .filter(|p| {
                matches!(
                    p.action,
                    CanonicalAction::Rename | CanonicalAction::RenameThenEdit
                )
            })
            .any(|p| {
                let item = &p.change.item;
                let Ok(child_new) = self.paths.local_path(&item.server_path) else {
                    return false;
                };
                if !child_new.starts_with(new) {
                    return false;
                }
                let Ok(previous) = self.source.previous_version(item) else {
                    return false;
                };
                let Ok(child_old) = self.paths.local_path(&previous.server_path) else {
                    return false;
                };
                let child_old = state.redirects.resolve(&child_old);
                let Ok(rest) = child_old.strip_prefix(old) else {
                    return false;
                };
                is_case_only_change(&new.join(rest), &child_new)
            })
    }

    fn server_side_move(
        &self,
        changeset: &Changeset,
        old: &Path,
        new: &Path,
    ) -> Result<Revision, ReplayError> {
        let revision = self
            .target
            .server_side_move(old, new, &server_side_move_message(changeset.id))
            .map_err(|e| {
                ReplayError::target_failed("server-side move", Some(old), Some(changeset.id), e)
            })?;
        self.target
            .update()
            .map_err(|e| ReplayError::target_failed("update", None, Some(changeset.id), e))?;
        self.stamp_revision(
            changeset.id,
            revision,
            &changeset.committer,
            changeset.created_at,
        )?;
        Ok(revision)
    }

    fn rename(
        &self,
        changeset: &Changeset,
        item: &Item,
        new: PathBuf,
        later: &[PlannedChange],
        state: &mut ChangesetState,
    ) -> Result<AppliedChange, ReplayError> {
        let old = self.previous_local_path(changeset.id, item, state)?;
        let exists = |p: &Path| match item.kind {
            ItemKind::File => p.is_file(),
            ItemKind::Folder => p.is_dir(),
        };
        let facts = RenameFacts {
            kind: item.kind,
            same_path: old == new,
            case_only: is_case_only_change(&old, &new),
            old_exists: exists(old.as_path()),
            new_exists: exists(new.as_path()),
        };
        let plan = plan_rename(facts).map_err(|SourceMissing| ReplayError::RenameSourceMissing {
            changeset: changeset.id,
            kind: item.kind,
            old_path: old.clone(),
            new_path: new.clone(),
        })?;

        let outcome = match plan {
            RenamePlan::Noop => {
                tracing::debug!(path = %new.display(), "rename to same path, nothing to do");
                ChangeOutcome::Skipped
            }
            RenamePlan::Move
                if item.kind.is_folder()
                    && self.case_only_child_follows(&old, &new, later, state) =>
            {
                tracing::info!(
                    from = %old.display(),
                    to = %new.display(),
                    "folder holds a case-only rename, moving in the repository"
                );
                ChangeOutcome::ServerSideMoved(self.server_side_move(changeset, &old, &new)?)
            }
            RenamePlan::Move => {
                tracing::info!(kind = %item.kind, from = %old.display(), to = %new.display(), "renaming");
                self.target.move_path(&old, &new).map_err(|e| {
                    ReplayError::target_failed("move", Some(old.as_path()), Some(changeset.id), e)
                })?;
                ChangeOutcome::Moved
            }
            RenamePlan::ServerSideMove => {
                tracing::info!(
                    kind = %item.kind,
                    from = %old.display(),
                    to = %new.display(),
                    "case-only rename, moving in the repository"
                );
                ChangeOutcome::ServerSideMoved(self.server_side_move(changeset, &old, &new)?)
            }
            RenamePlan::Swap => {
                tracing::warn!(
                    from = %old.display(),
                    to = %new.display(),
                    "rename onto an existing file; treating as a file swap"
                );
                state.swaps.stage(changeset.id, &old, &new)?;
                ChangeOutcome::Swapped
            }
            RenamePlan::AssumeApplied => {
                tracing::warn!(
                    from = %old.display(),
                    to = %new.display(),
                    "folder rename source is gone but destination exists; assuming an earlier run applied it"
                );
                ChangeOutcome::Tolerated(plan)
            }
            RenamePlan::AssumeCreated => {
                tracing::warn!(
                    from = %old.display(),
                    to = %new.display(),
                    "folder rename destination already exists; redirecting without moving"
                );
                ChangeOutcome::Tolerated(plan)
            }
        };

        if item.kind.is_folder() && plan != RenamePlan::Noop {
            state.redirects.record(&old, &new);
        }

        Ok(AppliedChange {
            path: new,
            old_path: Some(old),
            outcome,
        })
    }

    /// The item was renamed and deleted in the same changeset: delete it
    /// wherever it currently is.
    fn rename_then_delete(
        &self,
        changeset: ChangesetId,
        item: &Item,
        path: PathBuf,
        state: &ChangesetState,
    ) -> Result<AppliedChange, ReplayError> {
        if path.exists() {
            let outcome = self.delete(changeset, item.kind, &path)?;
            return Ok(AppliedChange::at(path, outcome));
        }
        let old = match self.previous_local_path(changeset, item, state) {
            Ok(old) => old,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "renamed-then-deleted item not found");
                return Ok(AppliedChange::at(path, ChangeOutcome::Skipped));
            }
        };
        let outcome = self.delete(changeset, item.kind, &old)?;
        Ok(AppliedChange {
            path,
            old_path: Some(old),
            outcome,
        })
    }
}
