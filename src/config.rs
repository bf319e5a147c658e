//! histport run configuration (`histport.toml`).
//!
//! ```toml
//! [source]
//! dump = "export"
//! root = "$/Project/Main"
//! from_changeset = 1
//!
//! [target]
//! repository_url = "file:///srv/svn/project"
//! working_copy = "/var/tmp/histport-wc"
//! create_repository = false
//! initial_checkout = true
//! svn_bin = ""
//! message_encoding = "utf-8"
//!
//! [[users]]
//! source = "CORP\\jdoe"
//! target = "jdoe"
//!
//! [log]
//! level = "info"
//! format = "text"
//! ```
//!
//! `[source]` and `[target]` are required; everything else has defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::model::ChangesetId;
use crate::replay::metadata::MessageEncoding;
use crate::users::UserMapping;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level histport configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayConfig {
    /// Where history comes from.
    pub source: SourceConfig,

    /// Where history is replayed to.
    pub target: TargetConfig,

    /// Committer name mappings, first match wins.
    #[serde(default)]
    pub users: Vec<UserMapping>,

    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,
}

// ---------------------------------------------------------------------------
// SourceConfig
// ---------------------------------------------------------------------------

/// History source settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Export directory holding `history.json`.
    pub dump: PathBuf,

    /// Remote root folder. Every replayed item must live under it.
    pub root: String,

    /// First changeset to replay (default: 1).
    #[serde(default = "default_from_changeset")]
    pub from_changeset: ChangesetId,
}

const fn default_from_changeset() -> ChangesetId {
    ChangesetId::new(1)
}

// ---------------------------------------------------------------------------
// TargetConfig
// ---------------------------------------------------------------------------

/// Replication target settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Repository URL commits land in.
    pub repository_url: String,

    /// Local working copy directory.
    pub working_copy: PathBuf,

    /// Create the repository before replaying. Only for `file://` URLs.
    #[serde(default)]
    pub create_repository: bool,

    /// Wipe the working copy and check it out fresh before replaying.
    #[serde(default)]
    pub initial_checkout: bool,

    /// Directory holding `svn`/`svnadmin`. Empty means `PATH`.
    #[serde(default)]
    pub svn_bin: PathBuf,

    /// How commit messages are encoded.
    #[serde(default)]
    pub message_encoding: MessageEncoding,
}

impl TargetConfig {
    /// Local filesystem path of a `file://` repository URL.
    ///
    /// `file:///srv/repo` becomes `/srv/repo`; `file:///C:/repo` becomes
    /// `C:/repo`. Returns `None` for any other scheme.
    #[must_use]
    pub fn local_repository_path(&self) -> Option<PathBuf> {
        let rest = self.repository_url.strip_prefix("file://")?;
        let bytes = rest.as_bytes();
        let is_drive = bytes.len() >= 3
            && bytes[0] == b'/'
            && bytes[1].is_ascii_alphabetic()
            && bytes[2] == b':';
        let path = if is_drive { &rest[1..] } else { rest };
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }
}

// ---------------------------------------------------------------------------
// LogConfig
// ---------------------------------------------------------------------------

/// Logging settings. `RUST_LOG` overrides `level`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Default filter directive (default: `"info"`).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

/// Log line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from loading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl ReplayConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read (including when it
    /// does not exist), does not parse, or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError {
            path: Some(path.to_owned()),
            message: format!("could not read file: {e}"),
        })?;
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields, missing required
    /// sections, or inconsistent settings.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: &str| {
            Err(ConfigError {
                path: None,
                message: message.to_owned(),
            })
        };
        if self.source.root.trim().is_empty() {
            return fail("[source] root must not be empty");
        }
        if self.target.repository_url.trim().is_empty() {
            return fail("[target] repository_url must not be empty");
        }
        if self.target.working_copy.as_os_str().is_empty() {
            return fail("[target] working_copy must not be empty");
        }
        if self.target.create_repository && self.target.local_repository_path().is_none() {
            return fail("[target] create_repository requires a file:// repository_url");
        }
        if self.users.iter().any(|u| u.source.is_empty()) {
            return fail("[[users]] source must not be empty");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
