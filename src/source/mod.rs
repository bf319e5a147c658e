//! History sources: where changesets come from.
//!
//! [`HistorySource`] is the capability the replay engine consumes. The engine
//! never depends on which provider supplied a [`Changeset`]; two providers
//! ship with the crate:
//!
//! - [`MemorySource`]: built in code, for library callers and tests.
//! - [`DumpSource`]: reads a JSON history export from disk.

use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::{Changeset, ChangesetId, Item};

pub mod dump;
pub mod memory;

pub use dump::DumpSource;
pub use memory::MemorySource;

// ---------------------------------------------------------------------------
// SourceError
// ---------------------------------------------------------------------------

/// Errors returned by [`HistorySource`] operations.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The requested changeset is not in the history.
    #[error("changeset {0} not found in history")]
    ChangesetNotFound(ChangesetId),

    /// No earlier version of an item could be found.
    #[error("no version of item {item_id} before changeset {changeset}")]
    NoPreviousVersion {
        /// Identity of the item.
        item_id: u64,
        /// The changeset the lookup started from.
        changeset: ChangesetId,
    },

    /// No content was recorded for an item version.
    #[error("no content for {path} at changeset {changeset}")]
    ContentNotFound {
        /// Server path of the item.
        path: String,
        /// The version that was requested.
        changeset: ChangesetId,
    },

    /// A history export is structurally invalid.
    #[error("malformed history export {}: {message}", path.display())]
    Malformed {
        /// The offending file.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// Reading from the source failed.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// HistorySource
// ---------------------------------------------------------------------------

/// A provider of changesets and item content.
///
/// # Object safety
///
/// This trait is object-safe. The replay engine takes `&dyn HistorySource`.
pub trait HistorySource {
    /// Ids of every changeset at or after `from`, ascending, without
    /// duplicates.
    ///
    /// # Errors
    /// Returns an error if the history cannot be queried.
    fn list_changeset_ids(&self, from: ChangesetId) -> Result<Vec<ChangesetId>, SourceError>;

    /// Fetch one changeset with its raw change records.
    ///
    /// # Errors
    /// Returns [`SourceError::ChangesetNotFound`] for an unknown id.
    fn fetch_changeset(&self, id: ChangesetId) -> Result<Changeset, SourceError>;

    /// The same item (by identity) as it was before `item.changeset_id`.
    ///
    /// Used only to find the old path of a renamed item. Providers first
    /// search the item's own history; failing that they fall back to the
    /// item's state at `changeset - 1`. The fallback is an approximation: an
    /// item moved several times before may resolve to a stale path.
    ///
    /// # Errors
    /// Returns [`SourceError::NoPreviousVersion`] if neither lookup succeeds.
    fn previous_version(&self, item: &Item) -> Result<Item, SourceError>;

    /// Stream the content of a file version.
    ///
    /// # Errors
    /// Returns [`SourceError::ContentNotFound`] if the version has no content.
    fn fetch_content(&self, item: &Item) -> Result<Box<dyn Read + '_>, SourceError>;
}

// ---------------------------------------------------------------------------
// ItemHistory
// ---------------------------------------------------------------------------

/// Per-item version index shared by the bundled providers.
#[derive(Clone, Debug, Default)]
pub(crate) struct ItemHistory {
    /// item id -> versions, ascending by changeset.
    versions: HashMap<u64, Vec<Item>>,
    /// item id -> state before the first recorded changeset.
    baseline: HashMap<u64, Item>,
}

impl ItemHistory {
    /// Index one item version. Re-recording a version replaces it.
    pub(crate) fn record(&mut self, item: &Item) {
        let versions = self.versions.entry(item.item_id).or_default();
        match versions.binary_search_by_key(&item.changeset_id, |v| v.changeset_id) {
            Ok(i) => versions[i] = item.clone(),
            Err(i) => versions.insert(i, item.clone()),
        }
    }

    pub(crate) fn set_baseline(&mut self, item: Item) {
        self.baseline.insert(item.item_id, item);
    }

    pub(crate) fn previous_version(&self, item: &Item) -> Result<Item, SourceError> {
        let earlier = self.versions.get(&item.item_id).and_then(|versions| {
            versions
                .iter()
                .rev()
                .find(|v| v.changeset_id < item.changeset_id)
        });
        if let Some(found) = earlier {
            return Ok(found.clone());
        }

        let not_found = || SourceError::NoPreviousVersion {
            item_id: item.item_id,
            changeset: item.changeset_id,
        };
        let previous = item.changeset_id.previous().ok_or_else(not_found)?;
        let base = self.baseline.get(&item.item_id).ok_or_else(not_found)?;
        tracing::debug!(
            item_id = item.item_id,
            path = %base.server_path,
            changeset = %previous,
            "no earlier version in history, using baseline state"
        );
        Ok(Item {
            changeset_id: previous,
            ..base.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ItemKind;

    fn item(path: &str, id: u64, cs: u32) -> Item {
        Item::new(path, ItemKind::File, id, ChangesetId::new(cs))
    }

    #[test]
    fn previous_version_prefers_history() {
        let mut h = ItemHistory::default();
        h.set_baseline(item("$/P/base.txt", 1, 0));
        h.record(&item("$/P/a.txt", 1, 3));
        h.record(&item("$/P/b.txt", 1, 5));
        h.record(&item("$/P/c.txt", 1, 9));

        let prev = h.previous_version(&item("$/P/c.txt", 1, 9)).unwrap();
        assert_eq!(prev.server_path, "$/P/b.txt");
        assert_eq!(prev.changeset_id, ChangesetId::new(5));
    }

    #[test]
    fn previous_version_falls_back_to_baseline() {
        let mut h = ItemHistory::default();
        h.set_baseline(item("$/P/old.txt", 4, 0));
        h.record(&item("$/P/new.txt", 4, 12));

        let prev = h.previous_version(&item("$/P/new.txt", 4, 12)).unwrap();
        assert_eq!(prev.server_path, "$/P/old.txt");
        assert_eq!(prev.changeset_id, ChangesetId::new(11));
    }

    #[test]
    fn previous_version_missing_everywhere() {
        let h = ItemHistory::default();
        let err = h.previous_version(&item("$/P/x.txt", 8, 2)).unwrap_err();
        assert!(matches!(
            err,
            SourceError::NoPreviousVersion { item_id: 8, .. }
        ));
    }

    #[test]
    fn record_keeps_versions_sorted() {
        let mut h = ItemHistory::default();
        h.record(&item("$/P/c.txt", 2, 9));
        h.record(&item("$/P/a.txt", 2, 1));
        h.record(&item("$/P/b.txt", 2, 5));
        let prev = h.previous_version(&item("$/P/c.txt", 2, 9)).unwrap();
        assert_eq!(prev.server_path, "$/P/b.txt");
    }
}
