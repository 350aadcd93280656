use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::util::template::DEFAULT_CLONE_TEMPLATE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),
    #[error("could not locate the user home directory")]
    NoHomeDirectory,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config at {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TetherConfig {
    #[serde(default)]
    pub clone: CloneSettings,
    #[serde(default)]
    pub crawl: CrawlSettings,
    #[serde(default)]
    pub index: IndexSettings,
    #[serde(default)]
    pub prompt: PromptSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CloneSettings {
    /// Template for the deterministic clone location; may reference `home`,
    /// `sep`, and `remote_path`.
    #[serde(default = "default_clone_template")]
    pub path_template: String,
}

impl Default for CloneSettings {
    fn default() -> Self {
        Self {
            path_template: default_clone_template(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlSettings {
    /// Directories the index rebuild walks; the home directory when empty.
    #[serde(default)]
    pub roots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexSettings {
    #[serde(default)]
    pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptSettings {
    /// Prefer candidates that are already workspace roots, skipping the
    /// prompt when exactly one matches.
    #[serde(default)]
    pub auto_select_workspace_roots: bool,
}

impl TetherConfig {
    pub fn crawl_roots(&self) -> Result<Vec<PathBuf>> {
        if !self.crawl.roots.is_empty() {
            return Ok(self.crawl.roots.clone());
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(vec![home])
    }

    pub fn index_store_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.index.store_path {
            return Ok(path.clone());
        }
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or(ConfigError::NoHomeDirectory)?;
        Ok(base.join("tether").join("remotes.json"))
    }
}

pub fn load(overridden: Option<PathBuf>) -> Result<TetherConfig> {
    let path = match overridden.or_else(|| env::var("TETHER_CONFIG").ok().map(PathBuf::from)) {
        Some(path) => {
            if !path.is_file() {
                return Err(ConfigError::ConfigNotFound(path));
            }
            Some(path)
        }
        None => default_config_path().filter(|path| path.is_file()),
    };

    let mut config = match path {
        Some(path) => parse(&path)?,
        None => TetherConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tether").join("config.toml"))
}

fn parse(path: &Path) -> Result<TetherConfig> {
    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env_overrides(config: &mut TetherConfig) {
    if let Ok(template) = env::var("TETHER_CLONE_TEMPLATE") {
        config.clone.path_template = template;
    }
    if let Ok(root) = env::var("TETHER_CRAWL_ROOT") {
        config.crawl.roots = vec![PathBuf::from(root)];
    }
    if let Ok(store) = env::var("TETHER_INDEX_STORE") {
        config.index.store_path = Some(PathBuf::from(store));
    }
}

fn default_clone_template() -> String {
    DEFAULT_CLONE_TEMPLATE.to_string()
}
