use crate::error::Result;
use crate::git::{ops, repo::Repository};
use crate::remote::{RemoteLocator, Revision};
use crate::resolve::collect::Candidate;
use crate::util::{output, parallel};

/// A candidate whose HEAD can reach the requested revision without losing
/// local commits.
#[derive(Debug, Clone)]
pub struct Forwardable {
    pub target: String,
    pub already_current: bool,
}

/// Classifies every candidate against the revision, in parallel; the result
/// is index-aligned with the input. A classification failure excludes that
/// candidate rather than aborting the resolution.
pub fn classify_all(
    candidates: &[Candidate],
    locator: &RemoteLocator,
    revision: &Revision,
) -> Vec<Option<Forwardable>> {
    let repos: Vec<&Repository> = candidates.iter().map(|candidate| &candidate.repo).collect();
    parallel::run_in_parallel(repos, |repo| match classify(repo, locator, revision) {
        Ok(result) => result,
        Err(err) => {
            output::warn(&format!("skipping {}: {err}", repo.root.display()));
            None
        }
    })
}

fn classify(
    repo: &Repository,
    locator: &RemoteLocator,
    revision: &Revision,
) -> Result<Option<Forwardable>> {
    // detached HEAD has no upstream relationship to violate
    if let Some(branch) = &repo.head.branch {
        if !branch_may_advance(repo, branch, revision) {
            return Ok(None);
        }
    }

    let Some(target) = resolve_target(repo, locator, revision)? else {
        return Ok(None);
    };
    if repo.head.commit == target {
        return Ok(Some(Forwardable {
            target,
            already_current: true,
        }));
    }
    if ops::is_ancestor(&repo.root, &repo.head.commit, &target)? {
        Ok(Some(Forwardable {
            target,
            already_current: false,
        }))
    } else {
        Ok(None)
    }
}

/// A checked-out branch only qualifies when it already names the revision:
/// by branch name, by configured upstream, or by current commit id.
/// Anything else would need a checkout, not a fast-forward.
fn branch_may_advance(repo: &Repository, branch: &str, revision: &Revision) -> bool {
    if branch == revision.as_str() || repo.head.commit == revision.as_str() {
        return true;
    }
    if let Some(upstream) = ops::upstream_of(&repo.root, branch) {
        if upstream == revision.as_str() {
            return true;
        }
        if let Some((_, short)) = upstream.split_once('/') {
            if short == revision.as_str() {
                return true;
            }
        }
    }
    false
}

/// Name of the configured remote matching the locator, falling back to the
/// clone URL itself when the candidate has no such remote.
pub fn fetch_source(repo: &Repository, locator: &RemoteLocator) -> String {
    repo.remote_matching(&locator.canonical)
        .map(|remote| remote.name.clone())
        .unwrap_or_else(|| locator.clone_url.clone())
}

/// Resolves the revision to a concrete commit id in this candidate,
/// fetching from the remote as needed. Commit ids already present need no
/// fetch; missing ones get one unscoped fetch and a recheck. Ref names are
/// always fetched because refs move.
pub fn resolve_target(
    repo: &Repository,
    locator: &RemoteLocator,
    revision: &Revision,
) -> Result<Option<String>> {
    let source = fetch_source(repo, locator);
    match revision {
        Revision::Commit(oid) => {
            if ops::has_object(&repo.root, oid) {
                return Ok(Some(oid.clone()));
            }
            output::git_op(&format!("fetch {source} in {}", repo.root.display()));
            ops::fetch_all(&repo.root, &source)?;
            if ops::has_object(&repo.root, oid) {
                Ok(Some(oid.clone()))
            } else {
                Ok(None)
            }
        }
        Revision::Ref(name) => {
            output::git_op(&format!("fetch {source} {name} in {}", repo.root.display()));
            Ok(Some(ops::fetch_ref(&repo.root, &source, name)?))
        }
    }
}
