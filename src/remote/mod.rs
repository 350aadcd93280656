use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Normalized identity of a git remote. Two differently spelled clone URLs
/// that name the same remote compare equal in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalRemote(String);

impl CanonicalRemote {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Host component, absent for local-path remotes.
    pub fn host(&self) -> Option<&str> {
        if self.0.starts_with('/') {
            return None;
        }
        self.0.split('/').next()
    }

    /// `host/owner/name` form with no leading separator, suitable for the
    /// clone-path template's `remote_path` slot.
    pub fn relative_path(&self) -> &str {
        self.0.trim_start_matches('/')
    }
}

impl fmt::Display for CanonicalRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    /// Exactly 40 hex characters: an absolute commit id.
    Commit(String),
    /// Anything else: a branch or tag name to be fetched from the remote.
    Ref(String),
}

impl Revision {
    pub fn parse(raw: &str) -> Revision {
        if raw.len() == 40 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            Revision::Commit(raw.to_ascii_lowercase())
        } else {
            Revision::Ref(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Revision::Commit(oid) => oid,
            Revision::Ref(name) => name,
        }
    }

}

#[derive(Debug, Clone)]
pub struct RemoteLocator {
    pub clone_url: String,
    pub canonical: CanonicalRemote,
    pub revision: Option<Revision>,
}

impl RemoteLocator {
    /// Returns `None` when the clone URL cannot be reduced to a canonical
    /// remote identity.
    pub fn parse(clone_url: &str, revision: Option<&str>) -> Option<Self> {
        let canonical = normalize_remote_url(clone_url)?;
        Some(Self {
            clone_url: clone_url.trim().to_string(),
            canonical,
            revision: revision.map(Revision::parse),
        })
    }
}

/// Collapses scheme family (ssh / https / git protocol), a trailing `.git`,
/// a trailing slash, and host case into one comparison key.
pub fn normalize_remote_url(raw: &str) -> Option<CanonicalRemote> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.to_ascii_lowercase().starts_with("file://") {
        return canonical_local(&trimmed["file://".len()..]);
    }
    if trimmed.starts_with('/') {
        return canonical_local(trimmed);
    }
    if trimmed.contains("://") {
        return parse_with_scheme(trimmed);
    }
    parse_scp_like(trimmed)
}

fn parse_with_scheme(raw: &str) -> Option<CanonicalRemote> {
    let (scheme, rest) = raw.split_once("://")?;
    let scheme = scheme.to_ascii_lowercase();
    let scheme = scheme.strip_prefix("git+").unwrap_or(&scheme);
    if !matches!(scheme, "http" | "https" | "ssh" | "git") {
        return None;
    }

    let url = Url::parse(&format!("{scheme}://{rest}")).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let path = clean_path(url.path());
    if path.is_empty() {
        return None;
    }
    Some(CanonicalRemote(format!("{host}/{path}")))
}

fn parse_scp_like(raw: &str) -> Option<CanonicalRemote> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[^@\s]+@)?([A-Za-z0-9][A-Za-z0-9._-]*):(.+)$")
            .expect("scp-style remote pattern is valid")
    });

    let captures = pattern.captures(raw)?;
    let host = captures.get(1)?.as_str();
    if host.len() < 2 {
        return None;
    }
    let path = clean_path(captures.get(2)?.as_str().trim_start_matches("~/"));
    if path.is_empty() {
        return None;
    }
    Some(CanonicalRemote(format!(
        "{}/{}",
        host.to_ascii_lowercase(),
        path
    )))
}

fn canonical_local(path: &str) -> Option<CanonicalRemote> {
    let cleaned = path
        .trim_end_matches('/')
        .trim_end_matches(".git")
        .trim_end_matches('/');
    if cleaned.is_empty() || !cleaned.starts_with('/') {
        return None;
    }
    Some(CanonicalRemote(cleaned.to_string()))
}

fn clean_path(path: &str) -> &str {
    path.trim_matches('/')
        .trim_end_matches(".git")
        .trim_end_matches('/')
}

/// Remediation hint for clone failures against a recognized forge host.
pub fn clone_protocol_hint(url: &str) -> Option<String> {
    let canonical = normalize_remote_url(url)?;
    let host = canonical.host()?;
    if host != "github.com" && host != "gitlab.com" {
        return None;
    }

    let (_, path) = canonical.as_str().split_once('/')?;
    let lowered = url.trim().to_ascii_lowercase();
    if lowered.starts_with("http") || lowered.starts_with("git+http") {
        Some(format!(
            "if https cloning is blocked, try ssh: git@{host}:{path}.git"
        ))
    } else {
        Some(format!(
            "if ssh cloning is blocked, try https: https://{host}/{path}"
        ))
    }
}
