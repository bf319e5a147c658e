//! File-swap bookkeeping.
//!
//! When a rename lands on a path that is already occupied by a different
//! file, two (or more) files are exchanging paths within one changeset. The
//! swap is staged without deleting anything:
//!
//! 1. the occupant of `new` is copied to its backup sibling,
//! 2. the content of `old` (or of `old`'s backup, if `old` was itself
//!    overwritten by an earlier swap) is copied onto `new`,
//! 3. `new -> old` is recorded.
//!
//! At changeset end every recorded source must also be a recorded
//! destination; otherwise the cycle is incomplete and the changeset aborts.
//! For complete cycles the backups are deleted before committing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ReplayError;
use crate::model::ChangesetId;

use super::paths::backup_path;

/// Destination -> source pairs staged during one changeset.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SwapBackups {
    pairs: BTreeMap<PathBuf, PathBuf>,
}

impl SwapBackups {
    /// An empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if an earlier swap already wrote to `path`.
    #[must_use]
    pub fn is_destination(&self, path: &Path) -> bool {
        self.pairs.contains_key(path)
    }

    /// Stage a swap of `old` onto the occupied path `new`.
    ///
    /// # Errors
    /// Returns [`ReplayError::SwapTargetTaken`] if another swap already
    /// wrote to `new`, and [`ReplayError::Io`] if a copy fails.
    pub fn stage(
        &mut self,
        changeset: ChangesetId,
        old: &Path,
        new: &Path,
    ) -> Result<(), ReplayError> {
        if self.is_destination(new) {
            return Err(ReplayError::SwapTargetTaken {
                changeset,
                old_path: old.to_path_buf(),
                new_path: new.to_path_buf(),
            });
        }

        let new_backup = backup_path(new);
        std::fs::copy(new, &new_backup)
            .map_err(|e| ReplayError::io("back up swap target", new, e))?;

        let content = if self.is_destination(old) {
            backup_path(old)
        } else {
            old.to_path_buf()
        };
        std::fs::copy(&content, new)
            .map_err(|e| ReplayError::io("copy swapped content from", &content, e))?;

        self.pairs.insert(new.to_path_buf(), old.to_path_buf());
        Ok(())
    }

    /// Record a pair without touching the filesystem.
    pub fn record(&mut self, destination: &Path, source: &Path) {
        self.pairs
            .insert(destination.to_path_buf(), source.to_path_buf());
    }

    /// `(destination, source)` pairs whose source is not itself a
    /// destination.
    #[must_use]
    pub fn unpaired(&self) -> Vec<(PathBuf, PathBuf)> {
        self.pairs
            .iter()
            .filter(|(_, source)| !self.pairs.contains_key(*source))
            .map(|(d, s)| (d.clone(), s.clone()))
            .collect()
    }

    /// Check that every swap cycle is complete.
    ///
    /// # Errors
    /// Returns [`ReplayError::IncompleteSwap`] listing the unpaired entries.
    pub fn verify(&self, changeset: ChangesetId) -> Result<(), ReplayError> {
        let unpaired = self.unpaired();
        if unpaired.is_empty() {
            Ok(())
        } else {
            Err(ReplayError::IncompleteSwap {
                changeset,
                unpaired,
            })
        }
    }

    /// Delete the backups of every source side. Missing backups are ignored.
    ///
    /// # Errors
    /// Returns [`ReplayError::Io`] if a backup exists but cannot be removed.
    pub fn remove_backups(&self) -> Result<usize, ReplayError> {
        let mut removed = 0;
        for source in self.pairs.values() {
            let backup = backup_path(source);
            match std::fs::remove_file(&backup) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ReplayError::io("remove swap backup", &backup, e)),
            }
        }
        Ok(removed)
    }

    /// Number of staged pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// `true` if nothing was staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Forget every pair.
    pub fn clear(&mut self) {
        self.pairs.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    const CS: ChangesetId = ChangesetId::new(1);

    #[test]
    fn two_way_swap_exchanges_content() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "A").unwrap();
        fs::write(&b, "B").unwrap();

        let mut swaps = SwapBackups::new();
        swaps.stage(CS, &a, &b).unwrap();
        swaps.stage(CS, &b, &a).unwrap();

        assert_eq!(fs::read_to_string(&a).unwrap(), "B");
        assert_eq!(fs::read_to_string(&b).unwrap(), "A");
        swaps.verify(CS).unwrap();
        assert_eq!(swaps.remove_backups().unwrap(), 2);
        assert!(!backup_path(&a).exists());
        assert!(!backup_path(&b).exists());
    }

    #[test]
    fn three_way_rotation_chains_backups() {
        let dir = tempfile::tempdir().unwrap();
        let [a, b, c] = ["a", "b", "c"].map(|n| dir.path().join(n));
        fs::write(&a, "A").unwrap();
        fs::write(&b, "B").unwrap();
        fs::write(&c, "C").unwrap();

        // a -> b, b -> c, c -> a
        let mut swaps = SwapBackups::new();
        swaps.stage(CS, &a, &b).unwrap();
        swaps.stage(CS, &b, &c).unwrap();
        swaps.stage(CS, &c, &a).unwrap();

        assert_eq!(fs::read_to_string(&b).unwrap(), "A");
        assert_eq!(fs::read_to_string(&c).unwrap(), "B");
        assert_eq!(fs::read_to_string(&a).unwrap(), "C");
        swaps.verify(CS).unwrap();
        swaps.remove_backups().unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 3);
    }

    #[test]
    fn one_sided_swap_fails_verification() {
        let mut swaps = SwapBackups::new();
        swaps.record(Path::new("/wc/y"), Path::new("/wc/x"));
        let err = swaps.verify(CS).unwrap_err();
        match err {
            ReplayError::IncompleteSwap { unpaired, .. } => {
                assert_eq!(unpaired, vec![(PathBuf::from("/wc/y"), PathBuf::from("/wc/x"))]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn second_swap_onto_same_target_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let [a, b, c] = ["a", "b", "c"].map(|n| dir.path().join(n));
        for p in [&a, &b, &c] {
            fs::write(p, "x").unwrap();
        }
        let mut swaps = SwapBackups::new();
        swaps.stage(CS, &a, &b).unwrap();
        let err = swaps.stage(CS, &c, &b).unwrap_err();
        assert!(matches!(err, ReplayError::SwapTargetTaken { .. }));
    }

    #[test]
    fn empty_map_verifies() {
        let swaps = SwapBackups::new();
        swaps.verify(CS).unwrap();
        assert_eq!(swaps.remove_backups().unwrap(), 0);
    }
}
