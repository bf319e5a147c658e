//! Path resolution between server paths and the working copy.
//!
//! - [`PathMapper`] turns a server path under the remote root into a local
//!   working-copy path. Containment is checked ignoring case, on component
//!   boundaries.
//! - [`RedirectMap`] rewrites local paths after a folder rename earlier in
//!   the same changeset moved them.
//! - [`backup_path`] names the temporary sibling a file swap copies into.

use std::path::{Component, Path, PathBuf};

use crate::error::ReplayError;

/// Prefix of the temporary sibling files created during a file swap.
pub const BACKUP_PREFIX: &str = "___temp";

// ---------------------------------------------------------------------------
// PathMapper
// ---------------------------------------------------------------------------

/// Maps server paths under `remote_root` to paths under `working_copy`.
#[derive(Clone, Debug)]
pub struct PathMapper {
    remote_root: String,
    working_copy: PathBuf,
}

impl PathMapper {
    /// A mapper for `remote_root` (e.g. `$/Project/Main`) onto `working_copy`.
    pub fn new(remote_root: &str, working_copy: &Path) -> Self {
        Self {
            remote_root: remote_root.trim_end_matches('/').to_owned(),
            working_copy: working_copy.to_path_buf(),
        }
    }

    /// The configured remote root, without a trailing `/`.
    #[must_use]
    pub fn remote_root(&self) -> &str {
        &self.remote_root
    }

    /// Root of the working copy.
    #[must_use]
    pub fn working_copy(&self) -> &Path {
        &self.working_copy
    }

    /// Local path for `server_path`.
    ///
    /// # Errors
    /// Returns [`ReplayError::PathNotContained`] if `server_path` is not the
    /// remote root or below it, or contains `.`/`..` segments.
    pub fn local_path(&self, server_path: &str) -> Result<PathBuf, ReplayError> {
        let not_contained = || ReplayError::PathNotContained {
            path: server_path.to_owned(),
            root: self.remote_root.clone(),
        };

        let rest = strip_prefix_ignore_case(server_path, &self.remote_root)
            .ok_or_else(not_contained)?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return Err(not_contained());
        }

        let mut local = self.working_copy.clone();
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(not_contained());
            }
            local.push(segment);
        }
        Ok(local)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = s.char_indices();
    for p in prefix.chars() {
        let (_, c) = rest.next()?;
        if !c.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }
    Some(&s[rest.offset()..])
}

// ---------------------------------------------------------------------------
// Case comparison
// ---------------------------------------------------------------------------

fn component_eq_ignore_case(a: Component<'_>, b: Component<'_>) -> bool {
    let a = a.as_os_str().to_string_lossy();
    let b = b.as_os_str().to_string_lossy();
    a.to_lowercase() == b.to_lowercase()
}

/// `true` if `a` and `b` differ, but only by letter case.
#[must_use]
pub fn is_case_only_change(a: &Path, b: &Path) -> bool {
    a != b && a.components().count() == b.components().count()
        && a
            .components()
            .zip(b.components())
            .all(|(x, y)| component_eq_ignore_case(x, y))
}

/// If `path` is `prefix` or lies below it (ignoring case), the remaining
/// components.
fn strip_path_prefix_ignore_case<'a>(path: &'a Path, prefix: &Path) -> Option<Vec<Component<'a>>> {
    let mut components = path.components();
    for p in prefix.components() {
        let c = components.next()?;
        if !component_eq_ignore_case(c, p) {
            return None;
        }
    }
    Some(components.collect())
}

// ---------------------------------------------------------------------------
// Backups
// ---------------------------------------------------------------------------

/// The temporary sibling a swap copies `path`'s content into:
/// `dir/name` becomes `dir/___tempname`.
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let backup = format!("{BACKUP_PREFIX}{name}");
    match path.parent() {
        Some(parent) => parent.join(backup),
        None => PathBuf::from(backup),
    }
}

// ---------------------------------------------------------------------------
// RedirectMap
// ---------------------------------------------------------------------------

/// Old-prefix to new-prefix rewrites recorded by folder renames.
///
/// Lives for one changeset. Lookups ignore case and match whole components
/// only, so a redirect for `/wc/src` does not touch `/wc/src2`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RedirectMap {
    entries: Vec<(PathBuf, PathBuf)>,
}

impl RedirectMap {
    /// An empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that everything under `from` now lives under `to`.
    ///
    /// Recording the same `from` again replaces the earlier target.
    pub fn record(&mut self, from: &Path, to: &Path) {
        if let Some(entry) = self.entries.iter_mut().find(|(f, _)| f == from) {
            entry.1 = to.to_path_buf();
        } else {
            self.entries.push((from.to_path_buf(), to.to_path_buf()));
        }
    }

    /// Rewrite `path` through every recorded redirect, in recording order.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        let mut current = path.to_path_buf();
        for (from, to) in &self.entries {
            if let Some(rest) = strip_path_prefix_ignore_case(&current, from) {
                let mut rewritten = to.clone();
                rewritten.extend(rest);
                current = rewritten;
            }
        }
        current
    }

    /// Number of recorded redirects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every redirect.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Recorded `(from, to)` pairs in recording order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.entries.iter().map(|(f, t)| (f.as_path(), t.as_path()))
    }
}
