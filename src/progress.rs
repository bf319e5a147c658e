//! Replay progress reporting.
//!
//! The replay engine reports what it does as typed [`ReplayEvent`]s handed
//! to a [`ReplayObserver`] the caller passes in. There is no global listener
//! registry; a run without an observer uses [`NoopObserver`].
//!
//! Observers:
//! - any `FnMut(&ReplayEvent)` closure,
//! - [`ChannelObserver`], forwarding into an `mpsc` channel,
//! - [`NoopObserver`].

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use histport_svn::Revision;

use crate::model::{CanonicalAction, ChangesetId, ItemKind};
use crate::replay::executor::ChangeOutcome;
use crate::replay::recovery::RenamePlan;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something the replay engine did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayEvent {
    /// The changeset list is known.
    ChangesetsFound {
        /// How many changesets will be replayed.
        count: usize,
    },

    /// Replay of a changeset began.
    ChangesetStarted {
        /// The changeset.
        changeset: ChangesetId,
        /// Source committer.
        committer: String,
        /// Source timestamp.
        created_at: DateTime<Utc>,
        /// Number of changes in the ordered sequence.
        changes: usize,
    },

    /// One change was applied to the working copy.
    ChangeApplied {
        /// The changeset.
        changeset: ChangesetId,
        /// File or folder.
        kind: ItemKind,
        /// The canonical action.
        action: CanonicalAction,
        /// Local path after the change.
        path: PathBuf,
        /// Local path before the change, for renames.
        old_path: Option<PathBuf>,
        /// What the executor actually did.
        outcome: ChangeOutcome,
    },

    /// A rename onto an occupied file was staged as a swap.
    SwapDetected {
        /// The changeset.
        changeset: ChangesetId,
        /// Path renamed from.
        old_path: PathBuf,
        /// Occupied path renamed onto.
        new_path: PathBuf,
    },

    /// A folder rename conflict was tolerated instead of failing.
    ToleratedConflict {
        /// The changeset.
        changeset: ChangesetId,
        /// Path renamed from.
        old_path: PathBuf,
        /// Path renamed to.
        new_path: PathBuf,
        /// Which tolerated shape applied.
        plan: RenamePlan,
    },

    /// A changeset was committed.
    ChangesetCommitted {
        /// The changeset.
        changeset: ChangesetId,
        /// The resulting revision, `None` if there was nothing to commit.
        revision: Option<Revision>,
    },

    /// The run ended.
    RunFinished {
        /// Changesets committed in this run.
        replayed: usize,
        /// `true` if the run was stopped before the last changeset.
        stopped: bool,
    },
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Receives [`ReplayEvent`]s in the order they happen.
pub trait ReplayObserver {
    /// Called once per event.
    fn on_event(&mut self, event: &ReplayEvent);
}

impl<F: FnMut(&ReplayEvent)> ReplayObserver for F {
    fn on_event(&mut self, event: &ReplayEvent) {
        self(event);
    }
}

/// Ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl ReplayObserver for NoopObserver {
    fn on_event(&mut self, _event: &ReplayEvent) {}
}

/// Forwards events into an `mpsc` channel.
///
/// A disconnected receiver is not an error; events are then dropped.
#[derive(Clone, Debug)]
pub struct ChannelObserver(pub Sender<ReplayEvent>);

impl From<Sender<ReplayEvent>> for ChannelObserver {
    fn from(sender: Sender<ReplayEvent>) -> Self {
        Self(sender)
    }
}

impl ReplayObserver for ChannelObserver {
    fn on_event(&mut self, event: &ReplayEvent) {
        let _ = self.0.send(event.clone());
    }
}

// ---------------------------------------------------------------------------
// ProgressEstimator
// ---------------------------------------------------------------------------

/// Average-rate estimate of the time left in a run.
#[derive(Clone, Debug)]
pub struct ProgressEstimator {
    started: Instant,
    total: usize,
    done: usize,
}

impl ProgressEstimator {
    /// Start estimating a run of `total` steps now.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            started: Instant::now(),
            total,
            done: 0,
        }
    }

    /// Record one finished step.
    pub const fn update(&mut self) {
        self.done += 1;
    }

    /// Steps finished so far.
    #[must_use]
    pub const fn done(&self) -> usize {
        self.done
    }

    /// Human-readable estimate based on wall time since [`new`](Self::new).
    #[must_use]
    pub fn remaining(&self) -> String {
        self.remaining_after(self.started.elapsed())
    }

    /// Human-readable estimate given `elapsed` time so far.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn remaining_after(&self, elapsed: Duration) -> String {
        if self.done == 0 {
            return "Calculating...".to_owned();
        }
        if self.done >= self.total {
            return "Done.".to_owned();
        }

        let per_step = elapsed.as_secs_f64() / self.done as f64;
        let seconds = per_step * (self.total - self.done) as f64;
        let minutes = (seconds / 60.0).round();
        let hours = (seconds / 3600.0).round();
        let days = (seconds / 86_400.0).round();

        for (count, unit) in [(days, "day"), (hours, "hour"), (minutes, "minute")] {
            if count > 0.0 {
                let plural = if count > 1.0 { "s" } else { "" };
                return format!("About {count} {unit}{plural} remaining.");
            }
        }
        "Less than a minute remaining.".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn closures_are_observers() {
        let mut seen = Vec::new();
        {
            let mut observer = |e: &ReplayEvent| seen.push(e.clone());
            observer.on_event(&ReplayEvent::ChangesetsFound { count: 3 });
        }
        assert_eq!(seen, vec![ReplayEvent::ChangesetsFound { count: 3 }]);
    }

    #[test]
    fn channel_observer_forwards_and_tolerates_hangup() {
        let (tx, rx) = mpsc::channel();
        let mut observer = ChannelObserver::from(tx);
        observer.on_event(&ReplayEvent::RunFinished {
            replayed: 2,
            stopped: false,
        });
        assert_eq!(
            rx.recv().unwrap(),
            ReplayEvent::RunFinished {
                replayed: 2,
                stopped: false
            }
        );
        drop(rx);
        observer.on_event(&ReplayEvent::ChangesetsFound { count: 0 });
    }

    #[test]
    fn estimator_edges() {
        let mut est = ProgressEstimator::new(2);
        assert_eq!(est.remaining_after(Duration::from_secs(5)), "Calculating...");
        est.update();
        est.update();
        assert_eq!(est.remaining_after(Duration::from_secs(5)), "Done.");
    }

    #[test]
    fn estimator_units() {
        let mut est = ProgressEstimator::new(10);
        est.update();
        // 1 step in 10s, 9 left: 90s
        assert_eq!(
            est.remaining_after(Duration::from_secs(10)),
            "About 2 minutes remaining."
        );
        // 1 step in 20s, 9 left: 3 minutes
        assert_eq!(
            est.remaining_after(Duration::from_secs(20)),
            "About 3 minutes remaining."
        );
        // 1 step in 400s, 9 left: 1 hour
        assert_eq!(
            est.remaining_after(Duration::from_secs(400)),
            "About 1 hour remaining."
        );
        // 1 step in 1s, 9 left
        assert_eq!(
            est.remaining_after(Duration::from_secs(1)),
            "Less than a minute remaining."
        );
        // 1 step in 3h, 9 left: 27h rounds to 1 day
        assert_eq!(
            est.remaining_after(Duration::from_secs(3 * 3600)),
            "About 1 day remaining."
        );
    }
}
