//! In-memory history source.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};

use super::{HistorySource, ItemHistory, SourceError};
use crate::model::{Changeset, ChangesetId, Item};

/// A [`HistorySource`] assembled in code.
///
/// ```
/// use chrono::Utc;
/// use histport::model::{Change, ChangeFlags, Changeset, ChangesetId, Item, ItemKind};
/// use histport::source::{HistorySource, MemorySource};
///
/// let item = Item::new("$/P/a.txt", ItemKind::File, 1, ChangesetId::new(1));
/// let mut source = MemorySource::new();
/// source.set_content(&item, "hello\n");
/// source.push(Changeset {
///     id: ChangesetId::new(1),
///     committer: "jdoe".into(),
///     comment: "first".into(),
///     created_at: Utc::now(),
///     changes: vec![Change::new(item, ChangeFlags::ADD)],
/// });
/// assert_eq!(source.list_changeset_ids(ChangesetId::new(0)).unwrap().len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    changesets: BTreeMap<ChangesetId, Changeset>,
    contents: HashMap<(u64, ChangesetId), Vec<u8>>,
    history: ItemHistory,
}

impl MemorySource {
    /// An empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a changeset, replacing any earlier one with the same id.
    pub fn push(&mut self, changeset: Changeset) -> &mut Self {
        for change in &changeset.changes {
            self.history.record(&change.item);
        }
        self.changesets.insert(changeset.id, changeset);
        self
    }

    /// Set the content of one file version.
    pub fn set_content(&mut self, item: &Item, content: impl Into<Vec<u8>>) -> &mut Self {
        self.contents
            .insert((item.item_id, item.changeset_id), content.into());
        self
    }

    /// Record where an item lived before the first changeset in this source.
    pub fn add_baseline(&mut self, item: Item) -> &mut Self {
        self.history.set_baseline(item);
        self
    }
}

impl HistorySource for MemorySource {
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
        let bytes = self
            .contents
            .get(&(item.item_id, item.changeset_id))
            .ok_or_else(|| SourceError::ContentNotFound {
                path: item.server_path.clone(),
                changeset: item.changeset_id,
            })?;
        Ok(Box::new(Cursor::new(bytes.as_slice())))
    }
}
