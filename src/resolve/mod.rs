pub mod classify;
pub mod collect;
pub mod prompt;
pub mod strategy;
pub mod sync;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::TetherConfig;
use crate::error::{Result, TetherError};
use crate::index::RemoteIndex;
use crate::remote::RemoteLocator;
use crate::util::output;

use self::classify::Forwardable;
use self::collect::{clone_destination, find_candidates, Candidate};
use self::prompt::{PickItem, RepositoryPicker};
use self::strategy::Strategy;

/// What the calling environment currently has open, used for candidate
/// collection and for the prompter's auto-select rule.
#[derive(Debug, Clone, Default)]
pub struct WorkspaceView {
    pub open_repositories: Vec<PathBuf>,
    pub workspace_roots: Vec<PathBuf>,
}

/// Resolves remote repository locators to local working copies,
/// discovering, cloning and synchronizing as needed.
pub struct Resolver {
    config: TetherConfig,
    indexes: Vec<Arc<RemoteIndex>>,
    workspace: WorkspaceView,
    picker: Box<dyn RepositoryPicker>,
}

impl Resolver {
    pub fn new(
        config: TetherConfig,
        indexes: Vec<Arc<RemoteIndex>>,
        workspace: WorkspaceView,
        picker: Box<dyn RepositoryPicker>,
    ) -> Self {
        Self {
            config,
            indexes,
            workspace,
            picker,
        }
    }

    /// Returns the path of a working copy satisfying the locator.
    pub fn resolve(&self, locator: &RemoteLocator) -> Result<PathBuf> {
        let candidates = find_candidates(
            &self.config,
            &self.indexes,
            &self.workspace.open_repositories,
            locator,
        )?;

        let Some(revision) = &locator.revision else {
            return match strategy::select(false, candidates.len(), 0) {
                Strategy::Clone => self.clone_fresh(locator),
                _ => {
                    let chosen = self.pick(
                        &candidates.iter().collect::<Vec<_>>(),
                        &format!("select a repository for {}", locator.canonical),
                    )?;
                    let repo = &candidates[chosen].repo;
                    output::info(&format!("reusing {}", repo.root.display()));
                    Ok(repo.root.clone())
                }
            };
        };

        let classifications = if candidates.is_empty() {
            Vec::new()
        } else {
            classify::classify_all(&candidates, locator, revision)
        };
        let forwardable: Vec<(usize, &Forwardable)> = classifications
            .iter()
            .enumerate()
            .filter_map(|(index, class)| class.as_ref().map(|fwd| (index, fwd)))
            .collect();

        match strategy::select(true, candidates.len(), forwardable.len()) {
            Strategy::Clone => self.clone_fresh(locator),
            Strategy::PickAndFastForward => {
                let subset: Vec<&Candidate> = forwardable
                    .iter()
                    .map(|(index, _)| &candidates[*index])
                    .collect();
                let within = self.pick(
                    &subset,
                    &format!("select a repository to update to '{}'", revision.as_str()),
                )?;
                let (index, fwd) = forwardable[within];
                let repo = &candidates[index].repo;
                sync::fast_forward(repo, fwd)?;
                Ok(repo.root.clone())
            }
            _ => {
                let all: Vec<&Candidate> = candidates.iter().collect();
                let chosen = self.pick(
                    &all,
                    &format!("select a repository to check out '{}'", revision.as_str()),
                )?;
                let repo = &candidates[chosen].repo;
                sync::stash_and_checkout(repo, locator, revision, self.picker.as_ref())?;
                Ok(repo.root.clone())
            }
        }
    }

    fn clone_fresh(&self, locator: &RemoteLocator) -> Result<PathBuf> {
        let dest = clone_destination(&self.config, locator)?;
        sync::clone_fresh(locator, &dest)
    }

    /// Disambiguates among candidates. A single candidate is returned
    /// without prompting; with auto-select enabled, a unique workspace-root
    /// candidate short-circuits the prompt as well. The returned value is
    /// an index into `candidates`.
    fn pick(&self, candidates: &[&Candidate], placeholder: &str) -> Result<usize> {
        if candidates.len() == 1 {
            return Ok(0);
        }

        let mut pool: Vec<usize> = Vec::new();
        if self.config.prompt.auto_select_workspace_roots {
            pool = (0..candidates.len())
                .filter(|&index| self.is_workspace_root(&candidates[index].repo.root))
                .collect();
            if pool.len() == 1 {
                output::info(&format!(
                    "auto-selected workspace repository {}",
                    candidates[pool[0]].repo.root.display()
                ));
                return Ok(pool[0]);
            }
        }
        if pool.is_empty() {
            pool = (0..candidates.len()).collect();
        }

        let items: Vec<PickItem> = pool
            .iter()
            .map(|&index| {
                let repo = &candidates[index].repo;
                PickItem::new(repo.label(), repo.root.display().to_string())
            })
            .collect();
        match self.picker.pick(&items, placeholder) {
            Some(choice) if choice < pool.len() => Ok(pool[choice]),
            _ => Err(TetherError::NoSelection),
        }
    }

    fn is_workspace_root(&self, root: &Path) -> bool {
        self.workspace.workspace_roots.iter().any(|candidate| {
            fs::canonicalize(candidate)
                .map(|real| real.as_path() == root)
                .unwrap_or_else(|_| candidate.as_path() == root)
        })
    }
}
