use std::path::{Path, PathBuf};

use crate::error::{Result, TetherError};
use crate::git::{ops, repo::Repository};
use crate::remote::{self, RemoteLocator, Revision};
use crate::resolve::classify::{self, Forwardable};
use crate::resolve::prompt::{PickItem, RepositoryPicker};
use crate::resolve::strategy::CheckoutMode;
use crate::util::output;

/// Clones the locator's remote to `dest` and leaves it on the requested
/// revision. When the clone fails because another process created the
/// directory first, the existing directory is opened and re-verified
/// instead of failing outright.
pub fn clone_fresh(locator: &RemoteLocator, dest: &Path) -> Result<PathBuf> {
    output::git_op(&format!("clone {} {}", locator.clone_url, dest.display()));
    if let Err(err) = ops::clone(&locator.clone_url, dest) {
        if !dest.is_dir() {
            return Err(clone_failure(&locator.clone_url, err));
        }
        output::warn(&format!(
            "clone target {} already exists, reusing it",
            dest.display()
        ));
    }

    let repo = Repository::open(dest)?;
    if let Some(revision) = &locator.revision {
        // the revision must resolve in the fresh clone before any checkout,
        // so a ref missing on the remote is named instead of surfacing as a
        // pathspec failure
        let target = classify::resolve_target(&repo, locator, revision)?.ok_or_else(|| {
            TetherError::RemoteRefNotFound {
                revision: revision.as_str().to_string(),
                remote: locator.canonical.to_string(),
            }
        })?;
        match revision {
            Revision::Commit(_) => {
                output::git_op(&format!("checkout --detach {target}"));
                ops::checkout_detached(&repo.root, &target)?;
            }
            Revision::Ref(name) => {
                output::git_op(&format!("checkout {name}"));
                ops::checkout(&repo.root, name)?;
            }
        }
    }
    Ok(repo.root)
}

fn clone_failure(url: &str, err: TetherError) -> TetherError {
    let mut detail = err.to_string();
    if let Some(hint) = remote::clone_protocol_hint(url) {
        detail = format!("{detail} ({hint})");
    }
    TetherError::CloneFailed {
        url: url.to_string(),
        detail,
    }
}

/// Advances the candidate to the classified target with fast-forward-only
/// semantics; a no-op when it is already there.
pub fn fast_forward(repo: &Repository, forwardable: &Forwardable) -> Result<()> {
    if forwardable.already_current {
        output::info(&format!(
            "{} is already at the requested revision",
            repo.root.display()
        ));
        return Ok(());
    }
    output::git_op(&format!(
        "merge --ff-only {} in {}",
        forwardable.target,
        repo.root.display()
    ));
    ops::merge_ff_only(&repo.root, &forwardable.target)
}

/// Forces the candidate onto the revision: resolve the target commit,
/// decide the sub-strategy, stash uncommitted work, then move HEAD.
pub fn stash_and_checkout(
    repo: &Repository,
    locator: &RemoteLocator,
    revision: &Revision,
    picker: &dyn RepositoryPicker,
) -> Result<()> {
    let target = match classify::resolve_target(repo, locator, revision)? {
        Some(target) => target,
        None => {
            return Err(TetherError::RemoteRefNotFound {
                revision: revision.as_str().to_string(),
                remote: locator.canonical.to_string(),
            })
        }
    };

    let mode = choose_checkout_mode(repo, revision, &target, picker)?;
    output::git_op(&format!("stash push in {}", repo.root.display()));
    ops::stash_push(&repo.root)?;

    match mode {
        CheckoutMode::Detached => {
            output::git_op(&format!("checkout --detach {target}"));
            ops::checkout_detached(&repo.root, &target)
        }
        CheckoutMode::FastForward => {
            output::git_op(&format!("checkout {} + merge --ff-only {target}", revision.as_str()));
            ops::checkout_branch(&repo.root, revision.as_str())?;
            ops::merge_ff_only(&repo.root, &target)
        }
        CheckoutMode::Reset => {
            output::git_op(&format!("checkout {} + reset --hard {target}", revision.as_str()));
            ops::checkout_branch(&repo.root, revision.as_str())?;
            ops::reset_hard(&repo.root, &target)
        }
    }
}

/// Absolute commit ids always check out detached. Ref revisions get a
/// local branch (created from the fetched target when absent); when that
/// branch can fast-forward to the target we do so, otherwise the user
/// chooses between abandoning the branch pointer (detached) and rewriting
/// it (reset).
fn choose_checkout_mode(
    repo: &Repository,
    revision: &Revision,
    target: &str,
    picker: &dyn RepositoryPicker,
) -> Result<CheckoutMode> {
    let Revision::Ref(name) = revision else {
        return Ok(CheckoutMode::Detached);
    };

    if !ops::branch_exists(&repo.root, name) {
        ops::create_branch(&repo.root, name, target)?;
    }
    if let Some(tip) = ops::local_branch_commit(&repo.root, name) {
        if ops::is_ancestor(&repo.root, &tip, target)? {
            return Ok(CheckoutMode::FastForward);
        }
    }

    let items = [
        PickItem::new(
            "checkout (detached)",
            format!("leave branch '{name}' untouched and check out the fetched commit"),
        ),
        PickItem::new(
            "reset",
            format!("hard-reset branch '{name}' to the fetched commit, discarding local-only history"),
        ),
    ];
    match picker.pick(
        &items,
        &format!("local branch '{name}' has diverged from the remote"),
    ) {
        Some(0) => Ok(CheckoutMode::Detached),
        Some(_) => Ok(CheckoutMode::Reset),
        None => Err(TetherError::NoSelection),
    }
}
