use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crate::crawl::{self, CancelToken, CrawlOutcome};
use crate::git::ops;
use crate::remote::{normalize_remote_url, CanonicalRemote};
use crate::util::output;

#[derive(Default)]
struct IndexState {
    generation: u64,
    entries: BTreeMap<String, PathBuf>,
    active_crawl: Option<Arc<CancelToken>>,
}

/// Persisted mapping from canonical remote identity to a local repository
/// path. Entries are confirmed at rebuild time by listing the repository's
/// remotes; staleness between rebuilds is tolerated and corrected lazily by
/// callers.
pub struct RemoteIndex {
    state: Mutex<IndexState>,
    store_path: PathBuf,
}

impl RemoteIndex {
    pub fn load(store_path: PathBuf) -> Self {
        let entries = read_entries(&store_path).unwrap_or_default();
        Self {
            state: Mutex::new(IndexState {
                generation: 0,
                entries,
                active_crawl: None,
            }),
            store_path,
        }
    }

    /// Pure lookup; never validates that the path still exists or still has
    /// the remote configured.
    pub fn resolve_remote(&self, canonical: &CanonicalRemote) -> Option<PathBuf> {
        self.lock().entries.get(canonical.as_str()).cloned()
    }

    pub fn entries(&self) -> Vec<(String, PathBuf)> {
        self.lock()
            .entries
            .iter()
            .map(|(canonical, path)| (canonical.clone(), path.clone()))
            .collect()
    }

    /// Starts a background rebuild over `roots`. Supersedes any in-flight
    /// rebuild: the previous crawl is cancelled and its eventual result is
    /// invalidated by the generation counter.
    pub fn rebuild(self: &Arc<Self>, roots: Vec<PathBuf>) -> JoinHandle<()> {
        let my_generation = {
            let mut state = self.lock();
            state.generation += 1;
            if let Some(previous) = state.active_crawl.take() {
                previous.cancel();
            }
            state.generation
        };
        let index = Arc::clone(self);
        thread::spawn(move || index.run_rebuild(&roots, my_generation))
    }

    fn run_rebuild(&self, roots: &[PathBuf], my_generation: u64) {
        let previously_known: BTreeSet<String> = self.lock().entries.keys().cloned().collect();
        let provisional = Mutex::new(BTreeMap::new());

        for root in roots {
            match self.crawl_root(root, my_generation, &provisional) {
                RootOutcome::Done => {}
                RootOutcome::Superseded | RootOutcome::Abandoned => return,
            }
        }

        let provisional = provisional
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let confirmed = provisional.len();
        if self.commit(my_generation, provisional, &previously_known) {
            output::info(&format!("remote index rebuilt, {confirmed} remotes confirmed"));
        } else {
            output::info("remote index rebuild superseded, discarding results");
        }
    }

    fn crawl_root(
        &self,
        root: &Path,
        my_generation: u64,
        provisional: &Mutex<BTreeMap<String, PathBuf>>,
    ) -> RootOutcome {
        let (candidates, crawl) = match crawl::search(root) {
            Ok(started) => started,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // no search utility on this platform: same as finding nothing
                output::warn("directory search utility unavailable, crawl found nothing");
                return RootOutcome::Done;
            }
            Err(err) => {
                output::warn(&format!(
                    "repository crawl failed to start under {}: {err}",
                    root.display()
                ));
                return RootOutcome::Abandoned;
            }
        };

        {
            let mut state = self.lock();
            if state.generation != my_generation {
                drop(state);
                crawl.cancel();
                return RootOutcome::Superseded;
            }
            state.active_crawl = Some(crawl.cancel_token());
        }

        // the receiver moves into the scope; the crawl handle stays out for wait()
        rayon::scope(move |scope| {
            for candidate in candidates {
                scope.spawn(move |_| {
                    for canonical in probe_remotes(&candidate) {
                        lock_map(provisional).insert(canonical, candidate.clone());
                    }
                });
            }
        });

        let outcome = crawl.wait();
        {
            let mut state = self.lock();
            if state.generation == my_generation {
                state.active_crawl = None;
            }
        }

        match outcome {
            CrawlOutcome::Finished => RootOutcome::Done,
            CrawlOutcome::Cancelled => RootOutcome::Superseded,
            CrawlOutcome::Failed(reason) => {
                output::warn(&format!(
                    "repository crawl under {} failed: {reason}",
                    root.display()
                ));
                RootOutcome::Abandoned
            }
        }
    }

    /// Commits a completed rebuild, but only while its generation is still
    /// current; a late-finishing superseded rebuild must not touch the map.
    fn commit(
        &self,
        my_generation: u64,
        provisional: BTreeMap<String, PathBuf>,
        previously_known: &BTreeSet<String>,
    ) -> bool {
        let mut state = self.lock();
        if state.generation != my_generation {
            return false;
        }
        merge_confirmed(&mut state.entries, provisional, previously_known);
        let entries = state.entries.clone();
        drop(state);

        if let Err(err) = write_entries(&self.store_path, &entries) {
            output::warn(&format!(
                "failed to persist remote index to {}: {err}",
                self.store_path.display()
            ));
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, IndexState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

enum RootOutcome {
    Done,
    Superseded,
    Abandoned,
}

/// Merges freshly confirmed entries and evicts previously known keys that
/// the rebuild did not reconfirm. Last write wins when two repositories
/// share a remote.
fn merge_confirmed(
    entries: &mut BTreeMap<String, PathBuf>,
    provisional: BTreeMap<String, PathBuf>,
    previously_known: &BTreeSet<String>,
) {
    let confirmed: BTreeSet<String> = provisional.keys().cloned().collect();
    for (canonical, path) in provisional {
        entries.insert(canonical, path);
    }
    entries.retain(|canonical, _| {
        !previously_known.contains(canonical) || confirmed.contains(canonical)
    });
}

fn probe_remotes(path: &Path) -> Vec<String> {
    match ops::list_remotes(path) {
        Ok(remotes) => {
            let canonical: BTreeSet<String> = remotes
                .into_iter()
                .filter_map(|(_, url)| normalize_remote_url(&url))
                .map(|canonical| canonical.as_str().to_string())
                .collect();
            canonical.into_iter().collect()
        }
        Err(_) => Vec::new(),
    }
}

fn lock_map(map: &Mutex<BTreeMap<String, PathBuf>>) -> MutexGuard<'_, BTreeMap<String, PathBuf>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_entries(path: &Path) -> Option<BTreeMap<String, PathBuf>> {
    let contents = fs::read_to_string(path).ok()?;
    let pairs: Vec<(String, PathBuf)> = serde_json::from_str(&contents).ok()?;
    Some(pairs.into_iter().collect())
}

fn write_entries(path: &Path, entries: &BTreeMap<String, PathBuf>) -> crate::error::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let pairs: Vec<(&String, &PathBuf)> = entries.iter().collect();
    let serialized = serde_json::to_string_pretty(&pairs)
        .map_err(|err| crate::error::TetherError::Other(anyhow::Error::new(err)))?;
    fs::write(path, serialized)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    use crate::index::{merge_confirmed, read_entries, write_entries, RemoteIndex};

    #[test]
    fn merge_evicts_unconfirmed_known_entries() {
        let mut entries: BTreeMap<String, PathBuf> = [
            ("r1".to_string(), PathBuf::from("/p1")),
            ("r2".to_string(), PathBuf::from("/p2")),
        ]
        .into_iter()
        .collect();
        let previously_known: BTreeSet<String> = entries.keys().cloned().collect();
        let provisional: BTreeMap<String, PathBuf> = [
            ("r1".to_string(), PathBuf::from("/p1")),
            ("r3".to_string(), PathBuf::from("/p3")),
        ]
        .into_iter()
        .collect();

        merge_confirmed(&mut entries, provisional, &previously_known);

        let expected: BTreeMap<String, PathBuf> = [
            ("r1".to_string(), PathBuf::from("/p1")),
            ("r3".to_string(), PathBuf::from("/p3")),
        ]
        .into_iter()
        .collect();
        assert_eq!(entries, expected);
    }

    #[test]
    fn superseded_commit_leaves_the_map_untouched() {
        let store = unique_temp_path("superseded");
        let index = RemoteIndex::load(store.clone());
        {
            let mut state = index.lock();
            state.entries.insert("r1".to_string(), PathBuf::from("/p1"));
            state.generation = 2;
        }

        let provisional: BTreeMap<String, PathBuf> =
            [("r9".to_string(), PathBuf::from("/p9"))].into_iter().collect();
        let previously_known: BTreeSet<String> = ["r1".to_string()].into_iter().collect();
        let committed = index.commit(1, provisional, &previously_known);

        assert!(!committed);
        assert_eq!(
            index.entries(),
            vec![("r1".to_string(), PathBuf::from("/p1"))]
        );
        assert!(!store.exists(), "a superseded rebuild must not persist");
        let _ = fs::remove_file(&store);
    }

    #[test]
    fn persisted_entries_round_trip_as_pairs() {
        let store = unique_temp_path("roundtrip");
        let entries: BTreeMap<String, PathBuf> = [
            ("github.com/acme/widgets".to_string(), PathBuf::from("/src/widgets")),
            ("gitlab.com/acme/other".to_string(), PathBuf::from("/src/other")),
        ]
        .into_iter()
        .collect();
        write_entries(&store, &entries).expect("write entries");

        let loaded = read_entries(&store).expect("read entries");
        assert_eq!(loaded, entries);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&store).expect("read store"))
                .expect("parse store");
        assert!(raw.as_array().expect("list layout").len() == 2);
        let _ = fs::remove_file(&store);
    }

    #[test]
    fn missing_store_means_empty_map() {
        let index = RemoteIndex::load(unique_temp_path("missing"));
        assert!(index.entries().is_empty());
    }

    fn unique_temp_path(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_nanos();
        let pid = std::process::id();
        std::env::temp_dir().join(format!("tether-index-{prefix}-{pid}-{nanos}.json"))
    }
}
