//! Project configuration
//!
//! Looked up at the project root as `.strata.yaml`, `.strata.yml` or
//! `.strata.toml` (first found wins). Every field is optional.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strata_core::partition::DEFAULT_NODE_THRESHOLD;

pub const CONFIG_FILES: &[&str] = &[".strata.yaml", ".strata.yml", ".strata.toml"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexConfig {
    /// Files per partition before it is split.
    pub node_threshold: usize,
    /// Extra exclusion patterns, merged with the defaults.
    pub exclude: Vec<String>,
    /// Also read exclusion patterns from the root `.gitignore`.
    pub use_gitignore: bool,
    /// Re-extract only changed files when the cache allows it.
    pub incremental: bool,
    /// Changed-file ratio above which a full scan is forced.
    pub full_scan_ratio: f64,
    /// Where graph output is written, relative to the project root.
    pub output_dir: PathBuf,
    /// Put files of unrecognised languages into the dependency graph.
    pub include_other: bool,
    /// Worker threads for extraction. `None` uses available parallelism.
    pub workers: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            node_threshold: DEFAULT_NODE_THRESHOLD,
            exclude: Vec::new(),
            use_gitignore: true,
            incremental: true,
            full_scan_ratio: strata_core::cache::DEFAULT_FULL_SCAN_RATIO,
            output_dir: PathBuf::from("docs/architecture"),
            include_other: false,
            workers: None,
        }
    }
}

impl IndexConfig {
    /// Find the config file under `root`, if any.
    pub fn locate(root: &Path) -> Option<PathBuf> {
        CONFIG_FILES
            .iter()
            .map(|name| root.join(name))
            .find(|path| path.is_file())
    }

    /// Load from the project root. No config file means defaults.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        match Self::locate(root) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Like [`IndexConfig::load`], but an unreadable or invalid file is
    /// logged and replaced by defaults.
    pub fn load_or_default(root: &Path) -> Self {
        match Self::load(root) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}; using default configuration", e);
                Self::default()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: IndexConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&text).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?,
            _ if text.trim().is_empty() => IndexConfig::default(),
            _ => serde_yaml::from_str(&text).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?,
        };
        config.validate()?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "node_threshold",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.full_scan_ratio) {
            return Err(ConfigError::Invalid {
                field: "full_scan_ratio",
                reason: format!("{} is not between 0 and 1", self.full_scan_ratio),
            });
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid {
                field: "workers",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
        })
    }
}
