//! The changeset replay engine.
//!
//! ```text
//! driver ── per changeset ──► transaction ──► order ──► executor ──► ReplicaTarget
//!                                  │                       │
//!                                  └── swap / paths ◄──────┴── recovery
//! ```
//!
//! - [`order`]: buckets the changes of one changeset into a replayable sequence.
//! - [`executor`]: applies one change to the working copy.
//! - [`recovery`]: decides how a rename is replayed given what is on disk.
//! - [`swap`]: stages renames onto occupied files and checks the cycles close.
//! - [`paths`]: server path to local path mapping and folder redirects.
//! - [`transaction`]: one changeset from first change to commit.
//! - [`driver`]: the run over all changesets.
//! - [`metadata`]: commit messages and revision dates.

pub mod driver;
pub mod executor;
pub mod metadata;
pub mod order;
pub mod paths;
pub mod recovery;
pub mod swap;
pub mod transaction;

pub use driver::{ReplicationOptions, Replicator, RunError, RunSummary, StopHandle};
pub use executor::{AppliedChange, ChangeOutcome, Executor};
pub use metadata::MessageEncoding;
pub use order::{Bucket, PlannedChange, order_changes};
pub use recovery::RenamePlan;
pub use transaction::{ChangesetState, CommitOutcome, replay_changeset};
