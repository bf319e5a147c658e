//! Error types for replication-target operations.
//!
//! [`SvnError`] is the single error type returned by all
//! [`ReplicaTarget`](crate::ReplicaTarget) methods. Variants are specific
//! enough that callers can tell a tool failure from a missing binary or a
//! path outside the working copy without parsing messages.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by [`ReplicaTarget`](crate::ReplicaTarget) operations.
#[derive(Debug, Error)]
pub enum SvnError {
    /// An `svn`/`svnadmin` invocation exited unsuccessfully.
    #[error("`{command}` failed (exit code {}): {stderr}", exit_code.map_or_else(|| "none".to_owned(), |c| c.to_string()))]
    CommandFailed {
        /// The command line that was run.
        command: String,
        /// Process exit code, `None` if killed by a signal.
        exit_code: Option<i32>,
        /// Captured stderr, trimmed.
        stderr: String,
    },

    /// The tool binary could not be launched at all.
    #[error("could not launch `{program}`: {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying launch failure.
        #[source]
        source: std::io::Error,
    },

    /// The tool succeeded but printed something we could not interpret.
    #[error("unexpected output from `{command}`: {output}")]
    UnexpectedOutput {
        /// The command line that was run.
        command: String,
        /// The output that failed to parse.
        output: String,
    },

    /// A path handed to the target does not live under its working copy.
    #[error("{} is not inside the working copy {}", path.display(), working_copy.display())]
    OutsideWorkingCopy {
        /// The offending path.
        path: PathBuf,
        /// The working copy root.
        working_copy: PathBuf,
    },

    /// An I/O error occurred while preparing the working copy or repository.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
