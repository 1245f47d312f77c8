use serde::{Deserialize, Serialize};
use sprawl_scanner::error::{Result, ScanError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/sprawl/sprawl.toml";
pub const DEFAULT_STORE_PATH: &str = "~/.config/sprawl/graph.db";
pub const DEFAULT_SEED: &str = "https://www.wikipedia.org/";

/// Runtime settings read from `sprawl.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub store: StoreSettings,
    pub crawl: CrawlSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// SQLite file the graph store connects to; `~` is expanded.
    pub path: String,
    /// Wipe the graph when the store closes, so each benchmark starts clean.
    pub clear_on_close: bool,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: DEFAULT_STORE_PATH.to_string(),
            clear_on_close: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlSettings {
    pub seeds: Vec<String>,
    pub workers: Option<usize>,
    pub max_depth: Option<usize>,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            seeds: vec![DEFAULT_SEED.to_string()],
            workers: None,
            max_depth: None,
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        expand_path(DEFAULT_CONFIG_PATH)
    }

    /// Load settings from `path`, or from the default location when `None`.
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);

        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)?;
        toml::from_str(&raw)
            .map_err(|e| ScanError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| ScanError::ConfigError(e.to_string()))
    }

    pub fn store_path(&self) -> PathBuf {
        expand_path(&self.store.path)
    }
}

/// Expand a leading `~` and environment variables the way a shell would.
pub fn expand_path(raw: &str) -> PathBuf {
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(raw).as_ref()),
    }
}
