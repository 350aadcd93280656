use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum TetherError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("git error: {0}")]
    Git(#[source] anyhow::Error),
    #[error("revision '{revision}' was not found on remote '{remote}'")]
    RemoteRefNotFound { revision: String, remote: String },
    #[error("no repository selected")]
    NoSelection,
    #[error("failed to stash local changes: {0}")]
    StashFailed(String),
    #[error("failed to clone {url}: {detail}")]
    CloneFailed { url: String, detail: String },
    #[error("fast-forward merge unexpectedly failed in {0}; the repository was misclassified as forwardable")]
    NonFastForward(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TetherError>;
