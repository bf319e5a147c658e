//! The outer replication loop.
//!
//! Optionally creates the target repository and checks out a fresh working
//! copy, then replays every changeset from the starting id onwards, one
//! transaction at a time. A run can be stopped between changesets through a
//! [`StopHandle`]; it is never interrupted inside one.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use histport_svn::{ReplicaTarget, Revision};

use crate::error::ReplayError;
use crate::model::ChangesetId;
use crate::progress::{ProgressEstimator, ReplayEvent, ReplayObserver};
use crate::source::HistorySource;
use crate::users::UsernameMap;

use super::executor::Executor;
use super::metadata::MessageEncoding;
use super::paths::PathMapper;
use super::transaction::replay_changeset;

// ---------------------------------------------------------------------------
// Options and handles
// ---------------------------------------------------------------------------

/// How a run starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicationOptions {
    /// First changeset to replay.
    pub from: ChangesetId,
    /// Create a fresh repository at this local path before starting.
    pub create_repository: Option<PathBuf>,
    /// Wipe the working copy and check it out again before starting.
    pub initial_checkout: bool,
    /// Commit message encoding.
    pub message_encoding: MessageEncoding,
}

impl Default for ReplicationOptions {
    fn default() -> Self {
        Self {
            from: ChangesetId::new(1),
            create_repository: None,
            initial_checkout: false,
            message_encoding: MessageEncoding::default(),
        }
    }
}

/// Requests a run to stop at the next changeset boundary.
///
/// Clones share the same flag.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// A handle that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop after the current changeset.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// `true` once [`stop`](Self::stop) was called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a run that did not fail.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Changesets committed in this run.
    pub replayed: usize,
    /// The last changeset committed.
    pub last_committed: Option<ChangesetId>,
    /// The revision of the last commit that produced one.
    pub last_revision: Option<Revision>,
    /// The run was stopped before reaching the end of history.
    pub stopped: bool,
}

/// A failed run, with the point to resume from.
#[derive(Debug)]
pub struct RunError {
    /// Changeset to pass as the starting id of the next run.
    pub resume_from: Option<ChangesetId>,
    /// Changesets committed before the failure.
    pub replayed: usize,
    /// What went wrong.
    pub error: ReplayError,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(id) = self.resume_from {
            write!(f, "\n  Resume with: histport run --from {}", id.get())?;
        }
        Ok(())
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

// ---------------------------------------------------------------------------
// Replicator
// ---------------------------------------------------------------------------

/// Drives a whole replication run.
pub struct Replicator<'a> {
    source: &'a dyn HistorySource,
    target: &'a dyn ReplicaTarget,
    paths: PathMapper,
    users: UsernameMap,
    options: ReplicationOptions,
    stop: StopHandle,
}

impl<'a> Replicator<'a> {
    /// Build a replicator. `remote_root` is the source path mapped onto the
    /// target's working copy root.
    #[must_use]
    pub fn new(
        source: &'a dyn HistorySource,
        target: &'a dyn ReplicaTarget,
        remote_root: &str,
        users: UsernameMap,
        options: ReplicationOptions,
    ) -> Self {
        let paths = PathMapper::new(remote_root, target.working_copy());
        Self {
            source,
            target,
            paths,
            users,
            options,
            stop: StopHandle::new(),
        }
    }

    /// A handle that stops this run between changesets.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Run to the end of history, or until stopped.
    ///
    /// # Errors
    /// The first fatal [`ReplayError`], wrapped with the changeset to resume
    /// from. Changesets committed before it stay committed.
    pub fn run(&self, observer: &mut dyn ReplayObserver) -> Result<RunSummary, RunError> {
        let from = self.options.from;
        let fail_at = |resume_from, replayed, error| RunError {
            resume_from: Some(resume_from),
            replayed,
            error,
        };

        self.prepare().map_err(|e| fail_at(from, 0, e))?;

        let ids = self
            .source
            .list_changeset_ids(from)
            .map_err(|e| fail_at(from, 0, ReplayError::source_failed("list changesets", None, None, e)))?;
        tracing::info!(count = ids.len(), %from, "changesets to replay");
        observer.on_event(&ReplayEvent::ChangesetsFound { count: ids.len() });

        let executor = Executor::new(self.source, self.target, &self.paths, &self.users);
        let mut estimator = ProgressEstimator::new(ids.len());
        let mut summary = RunSummary::default();

        for (index, &id) in ids.iter().enumerate() {
            if self.stop.is_stopped() {
                tracing::info!(next = %id, "stop requested");
                summary.stopped = true;
                break;
            }

            let changeset = self.source.fetch_changeset(id).map_err(|e| {
                fail_at(
                    id,
                    summary.replayed,
                    ReplayError::source_failed("fetch changeset", None, Some(id), e),
                )
            })?;
            let outcome =
                replay_changeset(&executor, &changeset, self.options.message_encoding, observer)
                    .map_err(|e| fail_at(id, summary.replayed, e))?;

            summary.replayed += 1;
            summary.last_committed = Some(outcome.changeset);
            if outcome.revision.is_some() {
                summary.last_revision = outcome.revision;
            }
            estimator.update();
            tracing::info!(
                done = index + 1,
                total = ids.len(),
                remaining = %estimator.remaining(),
                "progress"
            );
        }

        observer.on_event(&ReplayEvent::RunFinished {
            replayed: summary.replayed,
            stopped: summary.stopped,
        });
        Ok(summary)
    }

    fn prepare(&self) -> Result<(), ReplayError> {
        if let Some(repository) = &self.options.create_repository {
            tracing::info!(path = %repository.display(), "creating repository");
            wipe_dir(repository)?;
            self.target.create_repository(repository).map_err(|e| {
                ReplayError::target_failed(
                    "create repository",
                    Some(repository.as_path()),
                    None,
                    e,
                )
            })?;
        }
        if self.options.initial_checkout {
            let wc = self.target.working_copy();
            tracing::info!(path = %wc.display(), "checking out fresh working copy");
            wipe_dir(wc)?;
            self.target
                .checkout()
                .map_err(|e| ReplayError::target_failed("checkout", Some(wc), None, e))?;
        }
        Ok(())
    }
}

/// Remove `dir` if present and recreate it empty.
fn wipe_dir(dir: &Path) -> Result<(), ReplayError> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(ReplayError::io("wipe directory", dir, e)),
    }
    std::fs::create_dir_all(dir).map_err(|e| ReplayError::io("create directory", dir, e))
}
