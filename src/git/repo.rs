use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TetherError};
use crate::git::ops;
use crate::remote::{normalize_remote_url, CanonicalRemote};

#[derive(Debug, Clone)]
pub struct Head {
    pub commit: String,
    /// Short branch name; `None` when HEAD is detached.
    pub branch: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Remote {
    pub name: String,
    pub canonical: Option<CanonicalRemote>,
}

/// A local working copy: its root, current HEAD, and configured remotes.
#[derive(Debug, Clone)]
pub struct Repository {
    pub root: PathBuf,
    pub head: Head,
    pub remotes: Vec<Remote>,
}

impl Repository {
    /// Opens the working copy rooted exactly at `path`. Fails when `path`
    /// is not a repository or names something other than the actual root
    /// (case-insensitive filesystem mismatches included).
    pub fn open(path: &Path) -> Result<Self> {
        let toplevel = ops::toplevel(path).ok_or_else(|| {
            TetherError::Git(anyhow::anyhow!(
                "{} is not a git repository",
                path.display()
            ))
        })?;
        let requested = fs::canonicalize(path)?;
        let actual = fs::canonicalize(&toplevel)?;
        if requested != actual {
            return Err(TetherError::Git(anyhow::anyhow!(
                "{} is not the root of a repository (root is {})",
                path.display(),
                actual.display()
            )));
        }

        let commit = ops::head_commit(&actual)?;
        let branch = ops::current_branch(&actual);
        let remotes = ops::list_remotes(&actual)?
            .into_iter()
            .map(|(name, url)| Remote {
                canonical: normalize_remote_url(&url),
                name,
            })
            .collect();

        Ok(Self {
            root: actual,
            head: Head { commit, branch },
            remotes,
        })
    }

    pub fn remote_matching(&self, canonical: &CanonicalRemote) -> Option<&Remote> {
        self.remotes
            .iter()
            .find(|remote| remote.canonical.as_ref() == Some(canonical))
    }

    pub fn has_remote(&self, canonical: &CanonicalRemote) -> bool {
        self.remote_matching(canonical).is_some()
    }

    /// Directory base name, used as the disambiguation label.
    pub fn label(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.root.display().to_string())
    }
}
