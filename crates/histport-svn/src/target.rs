//! The [`ReplicaTarget`] trait: the boundary between the replay engine and
//! the downstream repository.
//!
//! Every method is a single primitive. None of them retries; the one place a
//! failure is recovered automatically (remove → cleanup → force-remove of a
//! folder) is driven by the caller, not by implementations.
//!
//! | Group          | Methods                                              |
//! |----------------|------------------------------------------------------|
//! | Scheduling     | `add`, `add_empty`, `remove`, `force_remove`, `move_path` |
//! | Remote         | `server_side_move`, `set_revision_metadata`          |
//! | Working copy   | `checkout`, `update`, `cleanup`                      |
//! | Repository     | `create_repository`, `commit`                        |

use std::path::Path;

use crate::error::SvnError;
use crate::types::Revision;

/// The replication-target abstraction used by the replay engine.
///
/// Implementations may be backed by the `svn` command line ([`SvnCli`]), a
/// library binding, or a test double that records calls.
///
/// All paths are absolute paths inside [`working_copy`](Self::working_copy).
///
/// # Object safety
///
/// This trait is object-safe. Callers may use `&dyn ReplicaTarget`.
///
/// [`SvnCli`]: crate::SvnCli
pub trait ReplicaTarget {
    /// Root of the local working copy.
    fn working_copy(&self) -> &Path;

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Schedule a file (or a directory with its contents) for addition.
    ///
    /// Missing unversioned parent directories are created and scheduled too.
    /// Re-adding an already versioned file is not an error.
    fn add(&self, path: &Path) -> Result<(), SvnError>;

    /// Schedule a single directory node for addition, non-recursively.
    ///
    /// Already-versioned directories are not an error.
    fn add_empty(&self, path: &Path) -> Result<(), SvnError>;

    /// Schedule a path for deletion.
    fn remove(&self, path: &Path) -> Result<(), SvnError>;

    /// Schedule a path for deletion even if it holds local modifications.
    fn force_remove(&self, path: &Path) -> Result<(), SvnError>;

    /// Move a path inside the working copy, keeping its history.
    fn move_path(&self, from: &Path, to: &Path) -> Result<(), SvnError>;

    // -----------------------------------------------------------------------
    // Remote
    // -----------------------------------------------------------------------

    /// Move a path directly in the repository, committing immediately.
    ///
    /// Needed when `from` and `to` differ only by letter case, which a
    /// case-insensitive working copy cannot represent as a local move.
    fn server_side_move(&self, from: &Path, to: &Path, message: &str)
    -> Result<Revision, SvnError>;

    /// Overwrite the author and date of a committed revision.
    ///
    /// `timestamp` is already formatted the way the repository stores it
    /// (`yyyy-MM-ddTHH:mm:ss.fffffffZ`).
    fn set_revision_metadata(
        &self,
        revision: Revision,
        author: &str,
        timestamp: &str,
    ) -> Result<(), SvnError>;

    // -----------------------------------------------------------------------
    // Working copy
    // -----------------------------------------------------------------------

    /// Check out the repository into the working copy root.
    fn checkout(&self) -> Result<(), SvnError>;

    /// Bring the whole working copy up to date with the repository.
    fn update(&self) -> Result<(), SvnError>;

    /// Release stale locks and finish interrupted operations under `path`.
    fn cleanup(&self, path: &Path) -> Result<(), SvnError>;

    // -----------------------------------------------------------------------
    // Repository
    // -----------------------------------------------------------------------

    /// Create an empty repository at a local filesystem path.
    fn create_repository(&self, path: &Path) -> Result<(), SvnError>;

    /// Commit every scheduled change in the working copy as one revision.
    ///
    /// Returns `None` when there was nothing to commit.
    fn commit(&self, message: &str) -> Result<Option<Revision>, SvnError>;
}
