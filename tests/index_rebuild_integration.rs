use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tether::index::RemoteIndex;
use tether::remote::normalize_remote_url;

#[test]
fn rebuild_discovers_repositories_and_persists_them() {
    let root = unique_temp_dir("discover");
    let store = root.join("state").join("remotes.json");

    make_repo(&root.join("work/one"), "https://github.com/acme/one.git");
    make_repo(
        &root.join("work/nested/deeper/two"),
        "git@github.com:acme/two.git",
    );
    // pruned locations must stay invisible
    make_repo(
        &root.join("work/node_modules/three"),
        "https://github.com/acme/three.git",
    );
    make_repo(&root.join(".hidden/four"), "https://github.com/acme/four.git");

    let index = Arc::new(RemoteIndex::load(store.clone()));
    index.rebuild(vec![root.join("work")]).join().expect("rebuild worker");

    let entries = index.entries();
    let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
    assert_eq!(keys, vec!["github.com/acme/one", "github.com/acme/two"]);

    let one = normalize_remote_url("ssh://git@github.com/acme/one.git").expect("normalize");
    assert_eq!(
        index.resolve_remote(&one),
        Some(root.join("work/one")),
        "lookup must work for any spelling of the remote"
    );

    let reloaded = RemoteIndex::load(store);
    assert_eq!(reloaded.entries(), entries, "entries must survive a restart");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn rebuild_evicts_remotes_it_can_no_longer_confirm() {
    let root = unique_temp_dir("evict");
    let store = root.join("remotes.json");

    let keeper = root.join("work/keeper");
    let goner = root.join("work/goner");
    make_repo(&keeper, "https://github.com/acme/keeper.git");
    make_repo(&goner, "https://github.com/acme/goner.git");

    let index = Arc::new(RemoteIndex::load(store));
    index.rebuild(vec![root.join("work")]).join().expect("first rebuild");
    assert_eq!(index.entries().len(), 2);

    fs::remove_dir_all(&goner).expect("remove repository");
    make_repo(
        &root.join("work/newcomer"),
        "https://github.com/acme/newcomer.git",
    );
    index.rebuild(vec![root.join("work")]).join().expect("second rebuild");

    let keys: Vec<String> = index.entries().into_iter().map(|(key, _)| key).collect();
    assert_eq!(
        keys,
        vec![
            "github.com/acme/keeper".to_string(),
            "github.com/acme/newcomer".to_string()
        ]
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn repositories_without_remotes_are_not_indexed() {
    let root = unique_temp_dir("no-remote");

    let silent = root.join("work/silent");
    fs::create_dir_all(&silent).expect("create repo dir");
    run_git(&silent, &["init", "--quiet"]);
    make_repo(&root.join("work/loud"), "https://github.com/acme/loud.git");

    let index = Arc::new(RemoteIndex::load(root.join("remotes.json")));
    index.rebuild(vec![root.join("work")]).join().expect("rebuild worker");

    let keys: Vec<String> = index.entries().into_iter().map(|(key, _)| key).collect();
    assert_eq!(keys, vec!["github.com/acme/loud".to_string()]);

    let _ = fs::remove_dir_all(&root);
}

fn make_repo(path: &Path, remote_url: &str) {
    fs::create_dir_all(path).expect("create repo dir");
    run_git(path, &["init", "--quiet"]);
    run_git(path, &["remote", "add", "origin", remote_url]);
}

fn run_git(repo_path: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(repo_path)
        .args(args)
        .output()
        .expect("run git command");
    assert!(
        output.status.success(),
        "git command failed in {}: git {}\nstderr:\n{}",
        repo_path.display(),
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_nanos();
    let pid = std::process::id();
    let dir = std::env::temp_dir().join(format!("tether-index-{prefix}-{pid}-{nanos}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}
