//! Replay error types for histport.
//!
//! Defines [`ReplayError`], the error type of every replay operation. Each
//! variant is self-contained: the message says what went wrong, where, and
//! what to do next.
//!
//! Every variant aborts the changeset being replayed without committing it.
//! Already-committed changesets are never affected.

use std::fmt;
use std::path::PathBuf;

use histport_svn::SvnError;

use crate::model::{ChangeFlags, ChangesetId, ItemKind};
use crate::source::SourceError;

// ---------------------------------------------------------------------------
// ReplayError
// ---------------------------------------------------------------------------

/// Unified error type for replay operations.
#[derive(Debug)]
pub enum ReplayError {
    /// The classifier does not accept this flag combination.
    UnmanagedChange {
        /// The changeset being replayed.
        changeset: ChangesetId,
        /// Server path of the item.
        path: String,
        /// Flags as reported.
        raw: ChangeFlags,
        /// Flags after the core mask.
        masked: ChangeFlags,
    },

    /// The orderer has no bucket for this flag combination.
    UnorderableChange {
        /// The changeset being replayed.
        changeset: ChangesetId,
        /// Server path of the item.
        path: String,
        /// Flags as reported.
        raw: ChangeFlags,
        /// Flags after the full mask (including `SourceRename`).
        masked: ChangeFlags,
    },

    /// A server path is not under the configured remote root.
    PathNotContained {
        /// The offending server path.
        path: String,
        /// The configured remote root.
        root: String,
    },

    /// An edit was reported for a folder.
    EditOnFolder {
        /// The changeset being replayed.
        changeset: ChangesetId,
        /// Server path of the folder.
        path: String,
    },

    /// A rename whose source is missing from the working copy, in a shape
    /// that cannot be explained by an earlier partial run.
    RenameSourceMissing {
        /// The changeset being replayed.
        changeset: ChangesetId,
        /// File or folder.
        kind: ItemKind,
        /// Local path the item should be moved from.
        old_path: PathBuf,
        /// Local path the item should be moved to.
        new_path: PathBuf,
    },

    /// A second rename targeted a path another swap already wrote to.
    SwapTargetTaken {
        /// The changeset being replayed.
        changeset: ChangesetId,
        /// The path being renamed.
        old_path: PathBuf,
        /// The contested destination.
        new_path: PathBuf,
    },

    /// At changeset end, a swap was only half recorded.
    IncompleteSwap {
        /// The changeset being replayed.
        changeset: ChangesetId,
        /// `(destination, source)` pairs whose source never became a
        /// destination itself.
        unpaired: Vec<(PathBuf, PathBuf)>,
    },

    /// The history source failed.
    Source {
        /// What was being asked of the source.
        operation: &'static str,
        /// The server path involved, if any.
        path: Option<String>,
        /// The changeset being replayed, if any.
        changeset: Option<ChangesetId>,
        /// The underlying error.
        source: SourceError,
    },

    /// The replication target failed.
    Target {
        /// Which primitive failed.
        operation: &'static str,
        /// The path the primitive was applied to, if any.
        path: Option<PathBuf>,
        /// The changeset being replayed, if any.
        changeset: Option<ChangesetId>,
        /// The underlying error.
        source: SvnError,
    },

    /// A local filesystem operation on the working copy failed.
    Io {
        /// What was being done.
        operation: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The configuration could not be loaded.
    Config(crate::config::ConfigError),
}

impl ReplayError {
    /// Wrap a history-source failure.
    #[must_use]
    pub fn source_failed(
        operation: &'static str,
        path: Option<&str>,
        changeset: Option<ChangesetId>,
        source: SourceError,
    ) -> Self {
        Self::Source {
            operation,
            path: path.map(str::to_owned),
            changeset,
            source,
        }
    }

    /// Wrap a replication-target failure.
    #[must_use]
    pub fn target_failed(
        operation: &'static str,
        path: Option<&std::path::Path>,
        changeset: Option<ChangesetId>,
        source: SvnError,
    ) -> Self {
        Self::Target {
            operation,
            path: path.map(std::path::Path::to_path_buf),
            changeset,
            source,
        }
    }

    /// Wrap a working-copy filesystem failure.
    #[must_use]
    pub fn io(operation: &'static str, path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }

    /// The changeset this error is attributed to, when it carries one.
    #[must_use]
    pub const fn changeset(&self) -> Option<ChangesetId> {
        match self {
            Self::UnmanagedChange { changeset, .. }
            | Self::UnorderableChange { changeset, .. }
            | Self::EditOnFolder { changeset, .. }
            | Self::RenameSourceMissing { changeset, .. }
            | Self::SwapTargetTaken { changeset, .. }
            | Self::IncompleteSwap { changeset, .. } => Some(*changeset),
            Self::Source { changeset, .. } | Self::Target { changeset, .. } => *changeset,
            Self::PathNotContained { .. } | Self::Io { .. } | Self::Config(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

fn write_changeset(f: &mut fmt::Formatter<'_>, changeset: Option<ChangesetId>) -> fmt::Result {
    match changeset {
        Some(id) => write!(f, " (changeset {id})"),
        None => Ok(()),
    }
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnmanagedChange {
                changeset,
                path,
                raw,
                masked,
            } => {
                write!(
                    f,
                    "unmanaged change in changeset {changeset}: {path} has flags [{raw}] (masked: [{masked}])\n  To fix: this flag combination cannot be replayed; inspect the changeset in the source history."
                )
            }
            Self::UnorderableChange {
                changeset,
                path,
                raw,
                masked,
            } => {
                write!(
                    f,
                    "unmanaged change to order in changeset {changeset}: {path} has flags [{raw}] (masked with source-rename: [{masked}])\n  To fix: this flag combination cannot be replayed; inspect the changeset in the source history."
                )
            }
            Self::PathNotContained { path, root } => {
                write!(
                    f,
                    "{path} is not contained in {root}\n  To fix: set [source] root to a folder that contains every replayed item."
                )
            }
            Self::EditOnFolder { changeset, path } => {
                write!(
                    f,
                    "edit reported on folder {path} in changeset {changeset}\n  To fix: folders have no content; the source history is inconsistent at this changeset."
                )
            }
            Self::RenameSourceMissing {
                changeset,
                kind,
                old_path,
                new_path,
            } => {
                write!(
                    f,
                    "cannot rename {kind} {} to {} in changeset {changeset}: source does not exist in the working copy\n  To fix: the working copy has diverged from the replicated history; check it out fresh and resume from this changeset.",
                    old_path.display(),
                    new_path.display()
                )
            }
            Self::SwapTargetTaken {
                changeset,
                old_path,
                new_path,
            } => {
                write!(
                    f,
                    "cannot rename {} to {} in changeset {changeset}: another file was already renamed to that target\n  To fix: inspect the renames in this changeset in the source history.",
                    old_path.display(),
                    new_path.display()
                )
            }
            Self::IncompleteSwap {
                changeset,
                unpaired,
            } => {
                write!(
                    f,
                    "incomplete file swap in changeset {changeset}; cannot continue:"
                )?;
                for (dest, src) in unpaired {
                    write!(
                        f,
                        "\n  - {} was renamed onto {} but nothing was renamed onto it",
                        src.display(),
                        dest.display()
                    )?;
                }
                write!(
                    f,
                    "\n  To fix: nothing was committed; revert the working copy and inspect the renames in this changeset."
                )
            }
            Self::Source {
                operation,
                path,
                changeset,
                source,
            } => {
                write!(f, "history source failed to {operation}")?;
                if let Some(path) = path {
                    write!(f, " for {path}")?;
                }
                write_changeset(f, *changeset)?;
                write!(
                    f,
                    ": {source}\n  To fix: check the history export, then resume from the failing changeset."
                )
            }
            Self::Target {
                operation,
                path,
                changeset,
                source,
            } => {
                write!(f, "replication target failed to {operation}")?;
                if let Some(path) = path {
                    write!(f, " {}", path.display())?;
                }
                write_changeset(f, *changeset)?;
                write!(
                    f,
                    ": {source}\n  To fix: run `svn status` in the working copy, fix the problem, then resume from the failing changeset."
                )
            }
            Self::Io {
                operation,
                path,
                source,
            } => {
                write!(
                    f,
                    "failed to {operation} {}: {source}\n  To fix: check file permissions and disk space.",
                    path.display()
                )
            }
            Self::Config(err) => {
                write!(
                    f,
                    "{err}\n  To fix: edit the config file and correct the issue."
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for ReplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Source { source, .. } => Some(source),
            Self::Target { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<crate::config::ConfigError> for ReplayError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
