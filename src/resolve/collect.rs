use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ConfigError, TetherConfig};
use crate::error::Result;
use crate::git::repo::Repository;
use crate::index::RemoteIndex;
use crate::remote::RemoteLocator;
use crate::util::{output, template};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateSource {
    OpenRepository,
    WellKnownPath,
    RemoteIndex,
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CandidateSource::OpenRepository => "open repository",
            CandidateSource::WellKnownPath => "well-known clone path",
            CandidateSource::RemoteIndex => "remote index",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub repo: Repository,
    pub source: CandidateSource,
}

/// The deterministic location a fresh clone of this remote would land in.
pub fn clone_destination(config: &TetherConfig, locator: &RemoteLocator) -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
    template::render_clone_path(
        &config.clone.path_template,
        &home,
        locator.canonical.relative_path(),
    )
}

/// Gathers every plausibly relevant local repository for the locator:
/// open repositories configured with the remote, the well-known clone
/// location (even before anything exists there), and index lookups.
/// Deduplicated by resolved real path; candidates that fail to open are
/// silently dropped.
pub fn find_candidates(
    config: &TetherConfig,
    indexes: &[Arc<RemoteIndex>],
    open_repositories: &[PathBuf],
    locator: &RemoteLocator,
) -> Result<Vec<Candidate>> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut candidates: Vec<Candidate> = Vec::new();

    for path in open_repositories {
        consider(
            path,
            CandidateSource::OpenRepository,
            true,
            locator,
            &mut seen,
            &mut candidates,
        );
    }

    let well_known = clone_destination(config, locator)?;
    consider(
        &well_known,
        CandidateSource::WellKnownPath,
        false,
        locator,
        &mut seen,
        &mut candidates,
    );

    for index in indexes {
        if let Some(path) = index.resolve_remote(&locator.canonical) {
            consider(
                &path,
                CandidateSource::RemoteIndex,
                false,
                locator,
                &mut seen,
                &mut candidates,
            );
        }
    }

    output::info(&format!(
        "found {} candidate repositories for {}",
        candidates.len(),
        locator.canonical
    ));
    for candidate in &candidates {
        output::info(&format!(
            "  {} ({})",
            candidate.repo.root.display(),
            candidate.source
        ));
    }
    Ok(candidates)
}

fn consider(
    path: &Path,
    source: CandidateSource,
    require_remote: bool,
    locator: &RemoteLocator,
    seen: &mut HashSet<PathBuf>,
    candidates: &mut Vec<Candidate>,
) {
    let real = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !seen.insert(real) {
        return;
    }
    match Repository::open(path) {
        Ok(repo) => {
            if require_remote && !repo.has_remote(&locator.canonical) {
                return;
            }
            candidates.push(Candidate { repo, source });
        }
        Err(_) => {
            // not a repository (or not its root): dropped, never surfaced
        }
    }
}
