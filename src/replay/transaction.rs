//! One changeset, start to commit.
//!
//! Per-changeset state (swap backups, folder redirects) lives in a
//! [`ChangesetState`] created fresh for every changeset and dropped after the
//! commit, so nothing leaks between changesets.

use histport_svn::Revision;

use crate::error::ReplayError;
use crate::model::{Changeset, ChangesetId};
use crate::progress::{ReplayEvent, ReplayObserver};

use super::executor::{ChangeOutcome, Executor};
use super::metadata::{MessageEncoding, commit_message};
use super::order::order_changes;
use super::paths::RedirectMap;
use super::swap::SwapBackups;

/// Bookkeeping scoped to a single changeset.
#[derive(Debug, Default)]
pub struct ChangesetState {
    /// Staged file swaps.
    pub swaps: SwapBackups,
    /// Folder renames already applied, old path to new path.
    pub redirects: RedirectMap,
}

impl ChangesetState {
    /// Empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of replaying one changeset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitOutcome {
    /// The source changeset.
    pub changeset: ChangesetId,
    /// The committed revision, `None` if the working copy had no changes.
    pub revision: Option<Revision>,
}

/// Replay `changeset` into the working copy and commit it.
///
/// Changes are applied in bucket order. On the first error the changeset is
/// abandoned uncommitted; the working copy is left as it is.
///
/// # Errors
/// Any [`ReplayError`] raised while ordering, applying, verifying swaps or
/// committing.
pub fn replay_changeset(
    executor: &Executor<'_>,
    changeset: &Changeset,
    encoding: MessageEncoding,
    observer: &mut dyn ReplayObserver,
) -> Result<CommitOutcome, ReplayError> {
    let span = tracing::info_span!("changeset", id = %changeset.id);
    let _entered = span.enter();

    let ordered = order_changes(changeset)?;
    tracing::info!(
        committer = %changeset.committer,
        created_at = %changeset.created_at,
        changes = ordered.len(),
        "replaying changeset"
    );
    observer.on_event(&ReplayEvent::ChangesetStarted {
        changeset: changeset.id,
        committer: changeset.committer.clone(),
        created_at: changeset.created_at,
        changes: ordered.len(),
    });

    let mut state = ChangesetState::new();
    for (index, planned) in ordered.iter().enumerate() {
        let later = &ordered[index + 1..];
        let applied = executor.apply(changeset, planned, later, &mut state)?;

        match (applied.outcome, &applied.old_path) {
            (ChangeOutcome::Swapped, Some(old)) => observer.on_event(&ReplayEvent::SwapDetected {
                changeset: changeset.id,
                old_path: old.clone(),
                new_path: applied.path.clone(),
            }),
            (ChangeOutcome::Tolerated(plan), Some(old)) => {
                observer.on_event(&ReplayEvent::ToleratedConflict {
                    changeset: changeset.id,
                    old_path: old.clone(),
                    new_path: applied.path.clone(),
                    plan,
                });
            }
            _ => {}
        }
        observer.on_event(&ReplayEvent::ChangeApplied {
            changeset: changeset.id,
            kind: planned.change.item.kind,
            action: planned.action,
            path: applied.path,
            old_path: applied.old_path,
            outcome: applied.outcome,
        });
    }

    let revision = finish(executor, changeset, encoding, &state)?;
    observer.on_event(&ReplayEvent::ChangesetCommitted {
        changeset: changeset.id,
        revision,
    });
    Ok(CommitOutcome {
        changeset: changeset.id,
        revision,
    })
}

fn finish(
    executor: &Executor<'_>,
    changeset: &Changeset,
    encoding: MessageEncoding,
    state: &ChangesetState,
) -> Result<Option<Revision>, ReplayError> {
    state.swaps.verify(changeset.id)?;
    let removed = state.swaps.remove_backups()?;
    if removed > 0 {
        tracing::debug!(removed, "removed swap backups");
    }

    let message = commit_message(changeset.id, &changeset.comment, encoding);
    let revision = executor
        .target()
        .commit(&message)
        .map_err(|e| ReplayError::target_failed("commit", None, Some(changeset.id), e))?;

    match revision {
        Some(revision) => {
            executor.stamp_revision(
                changeset.id,
                revision,
                &changeset.committer,
                changeset.created_at,
            )?;
            tracing::info!(%revision, "committed");
        }
        None => tracing::info!("nothing to commit"),
    }
    Ok(revision)
}
