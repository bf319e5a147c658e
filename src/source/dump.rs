//! History source backed by a JSON export on disk.
//!
//! Layout of an export directory:
//!
//! ```text
//! export/
//!   history.json          # baseline items + changesets
//!   blobs/...             # file contents, referenced by relative path
//! ```
//!
//! `history.json`:
//!
//! ```json
//! {
//!   "baseline": [
//!     { "server_path": "$/P/a.txt", "kind": "file", "item_id": 1, "changeset_id": 0 }
//!   ],
//!   "changesets": [
//!     {
//!       "id": 1,
//!       "committer": "CORP\\jdoe",
//!       "comment": "initial import",
//!       "created_at": "2009-03-01T12:00:00Z",
//!       "changes": [
//!         {
//!           "item": { "server_path": "$/P/b.txt", "kind": "file", "item_id": 2, "changeset_id": 1 },
//!           "flags": ["add", "edit"],
//!           "content": "blobs/1/b.txt"
//!         }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Paged exports can repeat a changeset. Only the first occurrence of each id
//! is kept.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{HistorySource, ItemHistory, SourceError};
use crate::model::{Change, ChangeFlags, Changeset, ChangesetId, Item};

/// File name of the history index inside an export directory.
pub const HISTORY_FILE: &str = "history.json";

// ---------------------------------------------------------------------------
// On-disk shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DumpFile {
    #[serde(default)]
    baseline: Vec<Item>,
    #[serde(default)]
    changesets: Vec<DumpChangeset>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DumpChangeset {
    id: ChangesetId,
    committer: String,
    #[serde(default)]
    comment: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    changes: Vec<DumpChange>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DumpChange {
    item: Item,
    flags: ChangeFlags,
    #[serde(default)]
    content: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// DumpSource
// ---------------------------------------------------------------------------

/// A [`HistorySource`] reading a JSON export directory.
#[derive(Clone, Debug)]
pub struct DumpSource {
    root: PathBuf,
    changesets: BTreeMap<ChangesetId, Changeset>,
    blobs: HashMap<(u64, ChangesetId), PathBuf>,
    history: ItemHistory,
    duplicates: usize,
}

impl DumpSource {
    /// Load the export in `dir`.
    ///
    /// # Errors
    /// Returns [`SourceError::Io`] if `history.json` cannot be read and
    /// [`SourceError::Malformed`] if it does not parse or references content
    /// outside the export directory.
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        let index = dir.join(HISTORY_FILE);
        let file = File::open(&index).map_err(|source| SourceError::Io {
            path: index.clone(),
            source,
        })?;
        let dump: DumpFile =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| SourceError::Malformed {
                path: index.clone(),
                message: e.to_string(),
            })?;

        let mut source = Self {
            root: dir.to_path_buf(),
            changesets: BTreeMap::new(),
            blobs: HashMap::new(),
            history: ItemHistory::default(),
            duplicates: 0,
        };
        for item in dump.baseline {
            source.history.set_baseline(item);
        }
        for cs in dump.changesets {
            source.insert(cs, &index)?;
        }

        tracing::info!(
            dir = %dir.display(),
            changesets = source.changesets.len(),
            duplicates = source.duplicates,
            "loaded history export"
        );
        Ok(source)
    }

    /// How many repeated changeset entries were dropped while loading.
    #[must_use]
    pub const fn duplicates_dropped(&self) -> usize {
        self.duplicates
    }

    fn insert(&mut self, cs: DumpChangeset, index: &Path) -> Result<(), SourceError> {
        if self.changesets.contains_key(&cs.id) {
            tracing::debug!(changeset = %cs.id, "skipping repeated changeset");
            self.duplicates += 1;
            return Ok(());
        }

        let mut changes = Vec::with_capacity(cs.changes.len());
        for change in cs.changes {
            if let Some(blob) = change.content {
                if !is_plain_relative(&blob) {
                    return Err(SourceError::Malformed {
                        path: index.to_path_buf(),
                        message: format!(
                            "changeset {}: content path {} must be relative to the export",
                            cs.id,
                            blob.display()
                        ),
                    });
                }
                self.blobs
                    .insert((change.item.item_id, change.item.changeset_id), blob);
            }
            self.history.record(&change.item);
            changes.push(Change::new(change.item, change.flags));
        }

        self.changesets.insert(
            cs.id,
            Changeset {
                id: cs.id,
                committer: cs.committer,
                comment: cs.comment,
                created_at: cs.created_at,
                changes,
            },
        );
        Ok(())
    }
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
        && path.components().next().is_some()
}

impl HistorySource for DumpSource {
    fn list_changeset_ids(&self, from: ChangesetId) -> Result<Vec<ChangesetId>, SourceError> {
        Ok(self.changesets.range(from..).map(|(id, _)| *id).collect())
    }

    fn fetch_changeset(&self, id: ChangesetId) -> Result<Changeset, SourceError> {
        self.changesets
            .get(&id)
            .cloned()
            .ok_or(SourceError::ChangesetNotFound(id))
    }

    fn previous_version(&self, item: &Item) -> Result<Item, SourceError> {
        self.history.previous_version(item)
    }

    fn fetch_content(&self, item: &Item) -> Result<Box<dyn Read + '_>, SourceError> {
        let blob = self
            .blobs
            .get(&(item.item_id, item.changeset_id))
            .ok_or_else(|| SourceError::ContentNotFound {
                path: item.server_path.clone(),
                changeset: item.changeset_id,
            })?;
        let path = self.root.join(blob);
        let file = File::open(&path).map_err(|source| SourceError::Io { path, source })?;
        Ok(Box::new(BufReader::new(file)))
    }
}
