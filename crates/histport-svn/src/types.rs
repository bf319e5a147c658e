//! Value types shared between the [`ReplicaTarget`](crate::ReplicaTarget)
//! trait and its callers.

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Revision
// ---------------------------------------------------------------------------

/// A committed revision number in the target repository.
///
/// Displays as `r<N>`, the way `svn log` prints it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Revision(u64);

impl Revision {
    /// Wrap a raw revision number.
    #[must_use]
    pub const fn new(number: u64) -> Self {
        Self(number)
    }

    /// The raw revision number.
    #[must_use]
    pub const fn number(self) -> u64 {
        self.0
    }

    /// Extract the revision from `svn commit` / `svn move URL URL` output.
    ///
    /// Both print a trailing `Committed revision N.` line. Returns `None`
    /// when no such line is present (e.g. nothing was committed).
    #[must_use]
    pub fn from_commit_output(output: &str) -> Option<Self> {
        output.lines().rev().find_map(|line| {
            let rest = line.trim().strip_prefix("Committed revision ")?;
            rest.trim_end_matches('.').parse().ok()
        })
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

impl FromStr for Revision {
    type Err = RevisionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('r').unwrap_or(s);
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|e| RevisionParseError {
                value: s.to_owned(),
                reason: e.to_string(),
            })
    }
}

/// Error from parsing a string into a [`Revision`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionParseError {
    /// The raw value that failed.
    pub value: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for RevisionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid revision {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for RevisionParseError {}
