//! Shared helpers for histport integration tests.
//!
//! Every test works in its own temp directory. [`FakeTarget`] stands in for
//! a Subversion working copy: it records each call and applies the
//! filesystem effect the real tool would have, so the replay engine sees the
//! same on-disk state it would in production.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use histport::model::{Change, ChangeFlags, Changeset, ChangesetId, Item, ItemKind};
use histport::source::MemorySource;
use histport_svn::{ReplicaTarget, Revision, SvnError};

/// Remote root every test item lives under.
pub const ROOT: &str = "$/Proj/Main";

// ---------------------------------------------------------------------------
// Model builders
// ---------------------------------------------------------------------------

/// A file version at `ROOT/<rel>`.
pub fn file(rel: &str, item_id: u64, changeset: u32) -> Item {
    Item::new(
        format!("{ROOT}/{rel}"),
        ItemKind::File,
        item_id,
        ChangesetId::new(changeset),
    )
}

/// A folder version at `ROOT/<rel>`.
pub fn folder(rel: &str, item_id: u64, changeset: u32) -> Item {
    Item::new(
        format!("{ROOT}/{rel}"),
        ItemKind::Folder,
        item_id,
        ChangesetId::new(changeset),
    )
}

/// Deterministic timestamp for changeset `id`.
pub fn stamp(id: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(1_262_304_000 + i64::from(id) * 3600, 0).unwrap()
}

/// A changeset by `alice` with the given changes.
pub fn changeset(id: u32, comment: &str, changes: Vec<(Item, ChangeFlags)>) -> Changeset {
    Changeset {
        id: ChangesetId::new(id),
        committer: "CORP\\alice".to_owned(),
        comment: comment.to_owned(),
        created_at: stamp(id),
        changes: changes
            .into_iter()
            .map(|(item, flags)| Change::new(item, flags))
            .collect(),
    }
}

/// Push `cs`, giving every file version in it the content
/// `"<server path>@<changeset>"`.
pub fn push_with_content(source: &mut MemorySource, cs: Changeset) {
    for change in &cs.changes {
        if change.item.kind == ItemKind::File {
            let body = format!("{}@{}", change.item.server_path, cs.id);
            source.set_content(&change.item, body);
        }
    }
    source.push(cs);
}

// ---------------------------------------------------------------------------
// Working copy helpers
// ---------------------------------------------------------------------------

/// Write `content` at `wc/<rel>`, creating parents.
pub fn seed(wc: &Path, rel: &str, content: &str) {
    let path = wc.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Read `wc/<rel>` as a string.
pub fn read(wc: &Path, rel: &str) -> String {
    fs::read_to_string(wc.join(rel)).unwrap()
}

/// Sorted relative paths of every file under `wc` (directories excluded).
pub fn tree(wc: &Path) -> Vec<String> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                let rel = path.strip_prefix(base).unwrap();
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    let mut out = Vec::new();
    walk(wc, wc, &mut out);
    out.sort();
    out
}

// ---------------------------------------------------------------------------
// FakeTarget
// ---------------------------------------------------------------------------

/// One recorded [`ReplicaTarget`] call. Paths are relative to the working
/// copy and use `/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Add(String),
    AddEmpty(String),
    Remove(String),
    ForceRemove(String),
    Move(String, String),
    ServerSideMove {
        from: String,
        to: String,
        message: String,
    },
    SetMetadata {
        revision: u64,
        author: String,
        timestamp: String,
    },
    Checkout,
    Update,
    Cleanup(String),
    CreateRepository(PathBuf),
    Commit {
        message: String,
        revision: Option<u64>,
    },
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    last_revision: u64,
    pending_remote: Vec<(PathBuf, PathBuf)>,
    uncommitted_moves: Vec<PathBuf>,
    stubborn: HashSet<PathBuf>,
    nothing_to_commit: bool,
}

/// A recording [`ReplicaTarget`] over a temp directory.
pub struct FakeTarget {
    dir: TempDir,
    wc: PathBuf,
    state: RefCell<State>,
}

impl FakeTarget {
    /// A fake working copy in a fresh temp directory.
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let wc = dir.path().join("wc");
        fs::create_dir_all(&wc).unwrap();
        Self {
            dir,
            wc,
            state: RefCell::new(State::default()),
        }
    }

    /// The temp directory holding the working copy (and anything else a
    /// test wants to put next to it).
    pub fn scratch(&self) -> &Path {
        self.dir.path()
    }

    /// Owned copy of the working copy root.
    pub fn working_copy_path(&self) -> PathBuf {
        self.wc.clone()
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Commit messages in order.
    pub fn commit_messages(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Commit { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// Make plain `remove` of `rel` fail, the way a folder with a stale
    /// lock or unversioned leftovers does.
    pub fn make_stubborn(&self, rel: &str) {
        self.state.borrow_mut().stubborn.insert(self.wc.join(rel));
    }

    /// The next commit reports nothing to commit.
    pub fn commit_nothing_next(&self) {
        self.state.borrow_mut().nothing_to_commit = true;
    }

    fn rel(&self, path: &Path) -> String {
        path.strip_prefix(&self.wc)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }

    fn check_inside(&self, path: &Path) -> Result<(), SvnError> {
        if path.starts_with(&self.wc) {
            Ok(())
        } else {
            Err(SvnError::OutsideWorkingCopy {
                path: path.to_owned(),
                working_copy: self.wc.clone(),
            })
        }
    }

    fn failed(command: &str, stderr: &str) -> SvnError {
        SvnError::CommandFailed {
            command: command.to_owned(),
            exit_code: Some(1),
            stderr: stderr.to_owned(),
        }
    }

    fn delete(path: &Path) -> Result<(), SvnError> {
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn next_revision(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        state.last_revision += 1;
        state.last_revision
    }
}

impl ReplicaTarget for FakeTarget {
    fn working_copy(&self) -> &Path {
        &self.wc
    }

    fn add(&self, path: &Path) -> Result<(), SvnError> {
        self.check_inside(path)?;
        self.record(Call::Add(self.rel(path)));
        if path.exists() {
            Ok(())
        } else {
            Err(Self::failed("svn add", "path not found"))
        }
    }

    fn add_empty(&self, path: &Path) -> Result<(), SvnError> {
        self.check_inside(path)?;
        self.record(Call::AddEmpty(self.rel(path)));
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), SvnError> {
        self.check_inside(path)?;
        self.record(Call::Remove(self.rel(path)));
        if self.state.borrow().stubborn.contains(path) {
            return Err(Self::failed("svn delete", "working copy locked"));
        }
        Self::delete(path)
    }

    fn force_remove(&self, path: &Path) -> Result<(), SvnError> {
        self.check_inside(path)?;
        self.record(Call::ForceRemove(self.rel(path)));
        Self::delete(path)
    }

    fn move_path(&self, from: &Path, to: &Path) -> Result<(), SvnError> {
        self.check_inside(from)?;
        self.check_inside(to)?;
        self.record(Call::Move(self.rel(from), self.rel(to)));
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(from, to)?;
        self.state
            .borrow_mut()
            .uncommitted_moves
            .push(to.to_owned());
        Ok(())
    }

    fn server_side_move(
        &self,
        from: &Path,
        to: &Path,
        message: &str,
    ) -> Result<Revision, SvnError> {
        self.check_inside(from)?;
        self.check_inside(to)?;
        self.record(Call::ServerSideMove {
            from: self.rel(from),
            to: self.rel(to),
            message: message.to_owned(),
        });
        // The repository only knows committed paths.
        if self
            .state
            .borrow()
            .uncommitted_moves
            .iter()
            .any(|moved| from.starts_with(moved))
        {
            return Err(Self::failed("svn move", "path not found in repository"));
        }
        self.state
            .borrow_mut()
            .pending_remote
            .push((from.to_owned(), to.to_owned()));
        Ok(Revision::new(self.next_revision()))
    }

    fn set_revision_metadata(
        &self,
        revision: Revision,
        author: &str,
        timestamp: &str,
    ) -> Result<(), SvnError> {
        self.record(Call::SetMetadata {
            revision: revision.number(),
            author: author.to_owned(),
            timestamp: timestamp.to_owned(),
        });
        Ok(())
    }

    fn checkout(&self) -> Result<(), SvnError> {
        self.record(Call::Checkout);
        Ok(())
    }

    fn update(&self) -> Result<(), SvnError> {
        self.record(Call::Update);
        let pending = std::mem::take(&mut self.state.borrow_mut().pending_remote);
        for (from, to) in pending {
            fs::rename(from, to)?;
        }
        Ok(())
    }

    fn cleanup(&self, path: &Path) -> Result<(), SvnError> {
        self.check_inside(path)?;
        self.record(Call::Cleanup(self.rel(path)));
        Ok(())
    }

    fn create_repository(&self, path: &Path) -> Result<(), SvnError> {
        self.record(Call::CreateRepository(path.to_owned()));
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<Option<Revision>, SvnError> {
        self.state.borrow_mut().uncommitted_moves.clear();
        let nothing = std::mem::take(&mut self.state.borrow_mut().nothing_to_commit);
        let revision = if nothing {
            None
        } else {
            Some(self.next_revision())
        };
        self.record(Call::Commit {
            message: message.to_owned(),
            revision,
        });
        Ok(revision.map(Revision::new))
    }
}
