//! The `svn` command-line implementation of [`ReplicaTarget`].

use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use crate::error::SvnError;
use crate::target::ReplicaTarget;
use crate::types::Revision;

/// A [`ReplicaTarget`] that drives the `svn` and `svnadmin` binaries.
///
/// Construct via [`SvnCli::new`]; point at a non-`PATH` installation with
/// [`SvnCli::with_bin_dir`].
#[derive(Clone, Debug)]
pub struct SvnCli {
    repository_url: String,
    working_copy: PathBuf,
    svn: PathBuf,
    svnadmin: PathBuf,
}

impl SvnCli {
    /// Target `repository_url`, with its working copy at `working_copy`.
    pub fn new(repository_url: &str, working_copy: &Path) -> Self {
        Self {
            repository_url: repository_url.trim_end_matches('/').replace('\\', "/"),
            working_copy: working_copy.to_path_buf(),
            svn: PathBuf::from("svn"),
            svnadmin: PathBuf::from("svnadmin"),
        }
    }

    /// Resolve `svn`/`svnadmin` inside `dir` instead of via `PATH`.
    ///
    /// An empty `dir` keeps `PATH` lookup.
    #[must_use]
    pub fn with_bin_dir(mut self, dir: &Path) -> Self {
        if !dir.as_os_str().is_empty() {
            self.svn = dir.join("svn");
            self.svnadmin = dir.join("svnadmin");
        }
        self
    }

    /// The repository URL commits land in.
    #[must_use]
    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    /// Map a working-copy path to its repository URL.
    fn url_for(&self, path: &Path) -> Result<String, SvnError> {
        let relative = path
            .strip_prefix(&self.working_copy)
            .map_err(|_| SvnError::OutsideWorkingCopy {
                path: path.to_path_buf(),
                working_copy: self.working_copy.clone(),
            })?;
        let mut url = self.repository_url.clone();
        for component in relative.components() {
            if let Component::Normal(part) = component {
                url.push('/');
                url.push_str(&part.to_string_lossy());
            }
        }
        Ok(url)
    }

    fn svn(&self, args: &[&OsStr]) -> Result<String, SvnError> {
        let mut full: Vec<&OsStr> = Vec::with_capacity(args.len() + 1);
        full.push(OsStr::new("--non-interactive"));
        full.extend_from_slice(args);
        run_tool(&self.svn, &full)
    }

    /// Create and schedule any unversioned parent directories of `path`.
    fn add_missing_parents(&self, path: &Path) -> Result<(), SvnError> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        if parent.exists() || !parent.starts_with(&self.working_copy) {
            return Ok(());
        }
        tracing::info!(dir = %parent.display(), "creating missing parent directory");
        std::fs::create_dir_all(parent)?;
        self.svn(&[
            OsStr::new("add"),
            OsStr::new("--depth=empty"),
            OsStr::new("--force"),
            OsStr::new("--parents"),
            parent.as_os_str(),
        ])?;
        Ok(())
    }

    /// `svn update <path>` after deleting a directory, so the deletion is
    /// reflected in the parent's entries before the next operation.
    fn update_if_dir(&self, path: &Path, was_dir: bool) -> Result<(), SvnError> {
        if was_dir {
            self.svn(&[OsStr::new("update"), path.as_os_str()])?;
        }
        Ok(())
    }
}

impl ReplicaTarget for SvnCli {
    fn working_copy(&self) -> &Path {
        &self.working_copy
    }

    fn add(&self, path: &Path) -> Result<(), SvnError> {
        if path == self.working_copy {
            return Ok(());
        }
        self.add_missing_parents(path)?;
        self.svn(&[
            OsStr::new("add"),
            OsStr::new("--force"),
            OsStr::new("--parents"),
            path.as_os_str(),
        ])?;
        Ok(())
    }

    fn add_empty(&self, path: &Path) -> Result<(), SvnError> {
        if path == self.working_copy {
            return Ok(());
        }
        self.add_missing_parents(path)?;
        self.svn(&[
            OsStr::new("add"),
            OsStr::new("--depth=empty"),
            OsStr::new("--force"),
            path.as_os_str(),
        ])?;
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<(), SvnError> {
        let was_dir = path.is_dir();
        self.svn(&[OsStr::new("delete"), path.as_os_str()])?;
        self.update_if_dir(path, was_dir)
    }

    fn force_remove(&self, path: &Path) -> Result<(), SvnError> {
        let was_dir = path.is_dir();
        self.svn(&[OsStr::new("delete"), OsStr::new("--force"), path.as_os_str()])?;
        self.update_if_dir(path, was_dir)
    }

    fn move_path(&self, from: &Path, to: &Path) -> Result<(), SvnError> {
        self.add_missing_parents(to)?;
        self.svn(&[OsStr::new("move"), from.as_os_str(), to.as_os_str()])?;
        Ok(())
    }

    fn server_side_move(
        &self,
        from: &Path,
        to: &Path,
        message: &str,
    ) -> Result<Revision, SvnError> {
        let from_url = self.url_for(from)?;
        let to_url = self.url_for(to)?;
        let output = self.svn(&[
            OsStr::new("move"),
            OsStr::new("--parents"),
            OsStr::new("-m"),
            OsStr::new(message),
            OsStr::new(&from_url),
            OsStr::new(&to_url),
        ])?;
        Revision::from_commit_output(&output).ok_or_else(|| SvnError::UnexpectedOutput {
            command: format!("svn move {from_url} {to_url}"),
            output,
        })
    }

    fn set_revision_metadata(
        &self,
        revision: Revision,
        author: &str,
        timestamp: &str,
    ) -> Result<(), SvnError> {
        let rev = revision.number().to_string();
        for (prop, value) in [("svn:date", timestamp), ("svn:author", author)] {
            self.svn(&[
                OsStr::new("propset"),
                OsStr::new("--revprop"),
                OsStr::new("-r"),
                OsStr::new(&rev),
                OsStr::new(prop),
                OsStr::new(value),
                OsStr::new(&self.repository_url),
            ])?;
        }
        Ok(())
    }

    fn checkout(&self) -> Result<(), SvnError> {
        self.svn(&[
            OsStr::new("checkout"),
            OsStr::new(&self.repository_url),
            self.working_copy.as_os_str(),
        ])?;
        Ok(())
    }

    fn update(&self) -> Result<(), SvnError> {
        self.svn(&[OsStr::new("update"), self.working_copy.as_os_str()])?;
        Ok(())
    }

    fn cleanup(&self, path: &Path) -> Result<(), SvnError> {
        self.svn(&[OsStr::new("cleanup"), path.as_os_str()])?;
        Ok(())
    }

    fn create_repository(&self, path: &Path) -> Result<(), SvnError> {
        run_tool(&self.svnadmin, &[OsStr::new("create"), path.as_os_str()])?;
        install_revprop_hook(path)?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<Option<Revision>, SvnError> {
        let output = self.svn(&[
            OsStr::new("commit"),
            OsStr::new("-m"),
            OsStr::new(message),
            self.working_copy.as_os_str(),
        ])?;
        Ok(Revision::from_commit_output(&output))
    }
}

/// Install a `pre-revprop-change` hook that accepts every change.
///
/// Without it the repository refuses `svn:author`/`svn:date` rewrites.
fn install_revprop_hook(repository: &Path) -> Result<(), SvnError> {
    let hooks = repository.join("hooks");
    std::fs::create_dir_all(&hooks)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;

        let hook = hooks.join("pre-revprop-change");
        if !hook.exists() {
            std::fs::write(&hook, "#!/bin/sh\nexit 0\n")?;
            std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755))?;
        }
    }
    #[cfg(not(unix))]
    {
        let hook = hooks.join("pre-revprop-change.cmd");
        if !hook.exists() {
            std::fs::write(&hook, "")?;
        }
    }
    Ok(())
}

/// Run `program args...`, returning stdout on success.
fn run_tool(program: &Path, args: &[&OsStr]) -> Result<String, SvnError> {
    let command_line = || {
        let mut line = OsString::from(program.as_os_str());
        for arg in args {
            line.push(" ");
            line.push(arg);
        }
        line.to_string_lossy().into_owned()
    };

    tracing::debug!(command = %command_line(), "running");
    let out = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| SvnError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

    if out.status.success() {
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    } else {
        Err(SvnError::CommandFailed {
            command: command_line(),
            exit_code: out.status.code(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_owned(),
        })
    }
}
