use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

pub const MAX_DEPTH: u32 = 10;
const METADATA_DIR: &str = ".git";
const PRUNED_DIR: &str = "node_modules";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlOutcome {
    Finished,
    Cancelled,
    Failed(String),
}

/// Cancels the crawl: flips the token and kills the search subprocess.
/// Whoever observes completion afterwards must report `Cancelled`, never
/// `Finished`.
pub struct CancelToken {
    cancelled: AtomicBool,
    child: Mutex<Option<Child>>,
}

impl CancelToken {
    fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            child: Mutex::new(None),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(child) = self.lock_child().as_mut() {
            let _ = child.kill();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn lock_child(&self) -> MutexGuard<'_, Option<Child>> {
        self.child.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to an in-flight directory crawl. The candidate stream is handed
/// back separately by `search` so consumers can move it into worker scopes;
/// the handle stays behind for cancellation and completion.
pub struct Crawl {
    token: Arc<CancelToken>,
    worker: JoinHandle<CrawlOutcome>,
}

impl Crawl {
    pub fn cancel_token(&self) -> Arc<CancelToken> {
        Arc::clone(&self.token)
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Blocks until the crawl is done. Checks the cancellation token after
    /// the worker reports, so a cancel that raced with a natural finish
    /// still comes back as `Cancelled`.
    pub fn wait(self) -> CrawlOutcome {
        let outcome = self
            .worker
            .join()
            .unwrap_or_else(|_| CrawlOutcome::Failed("crawl worker panicked".to_string()));
        if self.token.is_cancelled() {
            return CrawlOutcome::Cancelled;
        }
        outcome
    }
}

/// Starts a depth-bounded walk under `root` looking for repository metadata
/// directories, driven by the external `find` utility. Returns the stream
/// of candidate roots and the control handle. An `ErrorKind::NotFound`
/// spawn failure means no search utility exists on this platform; callers
/// treat that the same as a crawl that found nothing.
pub fn search(root: &Path) -> io::Result<(Receiver<PathBuf>, Crawl)> {
    let mut child = Command::new("find")
        .args(find_arguments(root))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("search subprocess stdout was not captured"))?;

    let token = Arc::new(CancelToken::new());
    *token.lock_child() = Some(child);

    let (sender, receiver) = mpsc::channel();
    let worker_token = Arc::clone(&token);
    let worker = thread::spawn(move || run_crawl(stdout, sender, &worker_token));

    Ok((receiver, Crawl { token, worker }))
}

fn find_arguments(root: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![root.as_os_str().to_os_string()];
    let depth = MAX_DEPTH.to_string();
    for arg in [
        "-mindepth",
        "1",
        "-maxdepth",
        depth.as_str(),
        "-type",
        "d",
        "(",
        "-name",
        METADATA_DIR,
        "-print",
        "-prune",
        ")",
        "-o",
        "-type",
        "d",
        "(",
        "-name",
        ".*",
        "-o",
        "-name",
        PRUNED_DIR,
        ")",
        "-prune",
    ] {
        args.push(OsString::from(arg));
    }
    args
}

fn run_crawl(
    mut stdout: impl Read,
    sender: Sender<PathBuf>,
    token: &CancelToken,
) -> CrawlOutcome {
    let mut buffer = LineBuffer::new();
    let mut chunk = [0u8; 8192];
    loop {
        match stdout.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => {
                for line in buffer.push(&chunk[..read]) {
                    emit_candidate(&line, &sender);
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    if let Some(line) = buffer.flush() {
        emit_candidate(&line, &sender);
    }
    drop(sender);

    let status = token.lock_child().take().map(|mut child| child.wait());
    if token.is_cancelled() {
        return CrawlOutcome::Cancelled;
    }
    match status {
        Some(Ok(status)) if status.success() => CrawlOutcome::Finished,
        Some(Ok(status)) => CrawlOutcome::Failed(format!("search exited with {status}")),
        Some(Err(err)) => CrawlOutcome::Failed(format!("failed to reap search process: {err}")),
        None => CrawlOutcome::Cancelled,
    }
}

fn emit_candidate(line: &str, sender: &Sender<PathBuf>) {
    // each line names a metadata directory; the candidate is its parent
    if let Some(parent) = Path::new(line).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = sender.send(parent.to_path_buf());
        }
    }
}

/// Reassembles line-oriented subprocess output that arrives in
/// arbitrary-sized chunks. A trailing partial line is held back until the
/// next chunk, or until `flush` on stream close.
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(position) = self.pending.iter().position(|&byte| byte == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=position).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.is_empty() {
                lines.push(String::from_utf8_lossy(&line).into_owned());
            }
        }
        lines
    }

    pub fn flush(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
