//! Committer name mapping.
//!
//! Source identities are often domain-qualified (`CORP\jdoe`) while the
//! target expects bare names. A [`UsernameMap`] rewrites them: the first
//! entry whose `source` occurs anywhere in the committer name, ignoring case,
//! supplies the target name. Unmatched names pass through unchanged.

use serde::Deserialize;

/// One mapping entry.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserMapping {
    /// Substring to look for in the source committer name.
    pub source: String,
    /// Name to use on the target.
    pub target: String,
}

/// Ordered committer name mappings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsernameMap {
    entries: Vec<UserMapping>,
}

impl UsernameMap {
    /// An empty map: every name passes through.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping. Re-adding a `source` (ignoring case) replaces its
    /// target in place; empty sources are ignored.
    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        let source = source.into();
        if source.is_empty() {
            return;
        }
        let target = target.into();
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|e| e.source.to_lowercase() == source.to_lowercase())
        {
            existing.target = target;
        } else {
            self.entries.push(UserMapping { source, target });
        }
    }

    /// Map a source committer to a target author.
    #[must_use]
    pub fn map<'a>(&'a self, committer: &'a str) -> &'a str {
        let lowered = committer.to_lowercase();
        self.entries
            .iter()
            .find(|e| lowered.contains(&e.source.to_lowercase()))
            .map_or(committer, |e| e.target.as_str())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<UserMapping> for UsernameMap {
    fn from_iter<I: IntoIterator<Item = UserMapping>>(iter: I) -> Self {
        let mut map = Self::new();
        for m in iter {
            map.insert(m.source, m.target);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unmapped_names_pass_through() {
        let map = UsernameMap::new();
        assert_eq!(map.map("CORP\\jdoe"), "CORP\\jdoe");
    }

    #[test]
    fn substring_match_ignores_case() {
        let mut map = UsernameMap::new();
        map.insert("jdoe", "john");
        assert_eq!(map.map("CORP\\JDoe"), "john");
    }

    #[test]
    fn first_match_wins() {
        let mut map = UsernameMap::new();
        map.insert("corp\\", "someone");
        map.insert("jdoe", "john");
        assert_eq!(map.map("CORP\\jdoe"), "someone");
    }

    #[test]
    fn reinsert_replaces_in_place() {
        let mut map = UsernameMap::new();
        map.insert("jdoe", "john");
        map.insert("smith", "alice");
        map.insert("JDOE", "johnny");
        assert_eq!(map.len(), 2);
        assert_eq!(map.map("jdoe"), "johnny");
    }

    #[test]
    fn empty_source_is_ignored() {
        let mut map = UsernameMap::new();
        map.insert("", "everyone");
        assert!(map.is_empty());
        assert_eq!(map.map("jdoe"), "jdoe");
    }

    #[test]
    fn collects_from_config_entries() {
        let map: UsernameMap = vec![
            UserMapping {
                source: "a".to_owned(),
                target: "x".to_owned(),
            },
            UserMapping {
                source: "b".to_owned(),
                target: "y".to_owned(),
            },
        ]
        .into_iter()
        .collect();
        assert_eq!(map.len(), 2);
        assert_eq!(map.map("bob"), "y");
    }
}
