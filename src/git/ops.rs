use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::{Result, TetherError};

fn git_output(workdir: Option<&Path>, args: &[&str]) -> Result<Output> {
    let mut command = Command::new("git");
    if let Some(workdir) = workdir {
        command.current_dir(workdir);
    }
    command
        .args(args)
        .output()
        .map_err(|err| TetherError::Git(anyhow::Error::new(err)))
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

pub fn run_git(workdir: &Path, args: &[&str], context: &str) -> Result<()> {
    let output = git_output(Some(workdir), args)?;
    if output.status.success() {
        return Ok(());
    }
    Err(TetherError::Git(anyhow::anyhow!(
        "git {context} failed in {}: {}",
        workdir.display(),
        stderr_of(&output)
    )))
}

pub fn run_git_output(workdir: &Path, args: &[&str], context: &str) -> Result<String> {
    let output = git_output(Some(workdir), args)?;
    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string());
    }
    Err(TetherError::Git(anyhow::anyhow!(
        "git {context} failed in {}: {}",
        workdir.display(),
        stderr_of(&output)
    )))
}

/// Like `run_git_output` but swallows failures, for probes where a non-zero
/// exit is an answer rather than an error.
fn try_git_output(workdir: &Path, args: &[&str]) -> Option<String> {
    let output = git_output(Some(workdir), args).ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

pub fn clone(url: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut command = Command::new("git");
    command.args(["clone", "--", url]).arg(dest);
    let output = command
        .output()
        .map_err(|err| TetherError::Git(anyhow::Error::new(err)))?;
    if output.status.success() {
        return Ok(());
    }
    Err(TetherError::Git(anyhow::anyhow!("{}", stderr_of(&output))))
}

/// Fetches one ref from `source` and returns the commit id it resolved to.
/// A ref missing on the remote is reported as `RemoteRefNotFound`.
pub fn fetch_ref(workdir: &Path, source: &str, ref_name: &str) -> Result<String> {
    let output = git_output(Some(workdir), &["fetch", "--", source, ref_name])?;
    if !output.status.success() {
        let stderr = stderr_of(&output);
        if stderr.to_ascii_lowercase().contains("couldn't find remote ref") {
            return Err(TetherError::RemoteRefNotFound {
                revision: ref_name.to_string(),
                remote: source.to_string(),
            });
        }
        return Err(TetherError::Git(anyhow::anyhow!(
            "git fetch failed in {}: {stderr}",
            workdir.display()
        )));
    }
    rev_parse(workdir, "FETCH_HEAD")
}

pub fn fetch_all(workdir: &Path, source: &str) -> Result<()> {
    run_git(workdir, &["fetch", "--", source], "fetch")
}

pub fn rev_parse(workdir: &Path, rev: &str) -> Result<String> {
    run_git_output(workdir, &["rev-parse", "--verify", rev], "rev-parse")
}

pub fn head_commit(workdir: &Path) -> Result<String> {
    rev_parse(workdir, "HEAD")
}

/// Current branch short name, `None` when HEAD is detached.
pub fn current_branch(workdir: &Path) -> Option<String> {
    try_git_output(workdir, &["symbolic-ref", "--short", "-q", "HEAD"])
        .filter(|name| !name.is_empty())
}

/// Short name of the branch's configured upstream (`origin/main` form).
pub fn upstream_of(workdir: &Path, branch: &str) -> Option<String> {
    let spec = format!("{branch}@{{upstream}}");
    try_git_output(workdir, &["rev-parse", "--abbrev-ref", &spec]).filter(|name| !name.is_empty())
}

pub fn local_branch_commit(workdir: &Path, branch: &str) -> Option<String> {
    let spec = format!("refs/heads/{branch}");
    try_git_output(workdir, &["rev-parse", "--verify", &spec])
}

pub fn has_object(workdir: &Path, oid: &str) -> bool {
    let spec = format!("{oid}^{{commit}}");
    git_output(Some(workdir), &["cat-file", "-e", &spec])
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Ancestry check; equality counts as ancestry.
pub fn is_ancestor(workdir: &Path, ancestor: &str, descendant: &str) -> Result<bool> {
    let output = git_output(
        Some(workdir),
        &["merge-base", "--is-ancestor", ancestor, descendant],
    )?;
    match output.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        _ => Err(TetherError::Git(anyhow::anyhow!(
            "git merge-base failed in {}: {}",
            workdir.display(),
            stderr_of(&output)
        ))),
    }
}

pub fn merge_ff_only(workdir: &Path, commit: &str) -> Result<()> {
    let output = git_output(Some(workdir), &["merge", "--ff-only", commit])?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = stderr_of(&output);
    if stderr.to_ascii_lowercase().contains("not possible to fast-forward") {
        return Err(TetherError::NonFastForward(workdir.to_path_buf()));
    }
    Err(TetherError::Git(anyhow::anyhow!(
        "git merge --ff-only failed in {}: {stderr}",
        workdir.display()
    )))
}

pub fn checkout(workdir: &Path, rev: &str) -> Result<()> {
    run_git(workdir, &["checkout", rev], "checkout")
}

pub fn checkout_branch(workdir: &Path, name: &str) -> Result<()> {
    run_git(workdir, &["checkout", name], "checkout branch")
}

pub fn checkout_detached(workdir: &Path, commit: &str) -> Result<()> {
    run_git(workdir, &["checkout", "--detach", commit], "detached checkout")
}

pub fn branch_exists(workdir: &Path, name: &str) -> bool {
    let spec = format!("refs/heads/{name}");
    git_output(Some(workdir), &["show-ref", "--verify", "--quiet", &spec])
        .map(|output| output.status.success())
        .unwrap_or(false)
}

pub fn create_branch(workdir: &Path, name: &str, commit: &str) -> Result<()> {
    run_git(workdir, &["branch", "--", name, commit], "create branch")
}

pub fn reset_hard(workdir: &Path, commit: &str) -> Result<()> {
    run_git(workdir, &["reset", "--hard", commit], "hard reset")
}

/// Stashes uncommitted changes. "Nothing to stash" exits zero and is not an
/// error; any real failure is fatal.
pub fn stash_push(workdir: &Path) -> Result<()> {
    let output = git_output(
        Some(workdir),
        &["stash", "push", "--include-untracked", "--message", "tether-sync"],
    )?;
    if output.status.success() {
        return Ok(());
    }
    Err(TetherError::StashFailed(stderr_of(&output)))
}

/// Repository root as reported by git, `None` when `path` is not inside a
/// working copy.
pub fn toplevel(path: &Path) -> Option<PathBuf> {
    try_git_output(path, &["rev-parse", "--show-toplevel"])
        .filter(|root| !root.is_empty())
        .map(PathBuf::from)
}

/// Configured remotes as `(name, url)` pairs, fetch entries only.
pub fn list_remotes(workdir: &Path) -> Result<Vec<(String, String)>> {
    let listing = run_git_output(workdir, &["remote", "-v"], "remote listing")?;
    let mut remotes = Vec::new();
    for line in listing.lines() {
        let mut fields = line.split_whitespace();
        let (Some(name), Some(url)) = (fields.next(), fields.next()) else {
            continue;
        };
        if fields.next() == Some("(push)") {
            continue;
        }
        remotes.push((name.to_string(), url.to_string()));
    }
    Ok(remotes)
}
