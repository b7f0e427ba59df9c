//! On-disk cache layout and fingerprint-based change detection

use crate::model::SourceFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Cache directory: .strata/
pub const CACHE_DIR: &str = ".strata";

/// Fingerprint cache file
pub const SCAN_CACHE: &str = "scan_cache.json";

/// Symbol database file
pub const SYMBOL_DB: &str = "symbols.db";

/// Changed-file ratio above which an incremental scan is abandoned for a full one.
pub const DEFAULT_FULL_SCAN_RATIO: f64 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize scan cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Get cache directory path
pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

/// Get scan cache file path
pub fn scan_cache_path(root: &Path) -> PathBuf {
    cache_dir(root).join(SCAN_CACHE)
}

/// Get symbol database path
pub fn symbol_db_path(root: &Path) -> PathBuf {
    cache_dir(root).join(SYMBOL_DB)
}

/// Ensure cache directory exists
pub fn ensure_cache_dir(root: &Path) -> Result<PathBuf, CacheError> {
    let cache = cache_dir(root);
    std::fs::create_dir_all(&cache).map_err(|source| CacheError::Io {
        path: cache.clone(),
        source,
    })?;
    Ok(cache)
}

/// Clear cache directory
pub fn clear_cache(root: &Path) -> Result<(), CacheError> {
    let cache = cache_dir(root);
    if cache.exists() {
        std::fs::remove_dir_all(&cache).map_err(|source| CacheError::Io {
            path: cache.clone(),
            source,
        })?;
    }
    Ok(())
}

/// SHA-256 hex digest of `"{modified}:{size}:{path}"`.
pub fn fingerprint(path: &str, size: u64, modified_ns: u64) -> String {
    let digest = Sha256::digest(format!("{modified_ns}:{size}:{path}").as_bytes());
    format!("{digest:x}")
}

/// Persisted fingerprints from the last completed scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanCache {
    pub last_scan_time: Option<DateTime<Utc>>,
    pub file_hashes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub cached_files: usize,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub cache_path: PathBuf,
}

/// Compares the current file set against the last completed scan.
#[derive(Debug)]
pub struct ChangeDetector {
    path: PathBuf,
    cache: ScanCache,
    full_scan_ratio: f64,
}

impl ChangeDetector {
    /// Load the cache under `root`. A missing, unreadable or corrupt cache
    /// yields an empty one, which forces a full scan.
    pub fn open(root: &Path) -> Self {
        Self::load_from(scan_cache_path(root))
    }

    pub fn load_from(path: PathBuf) -> Self {
        let cache = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<ScanCache>(&text) {
                Ok(cache) => cache,
                Err(e) => {
                    tracing::warn!("Ignoring corrupt scan cache {}: {}", path.display(), e);
                    ScanCache::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ScanCache::default(),
            Err(e) => {
                tracing::warn!("Cannot read scan cache {}: {}", path.display(), e);
                ScanCache::default()
            }
        };
        ChangeDetector {
            path,
            cache,
            full_scan_ratio: DEFAULT_FULL_SCAN_RATIO,
        }
    }

    pub fn with_full_scan_ratio(mut self, ratio: f64) -> Self {
        self.full_scan_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn cache(&self) -> &ScanCache {
        &self.cache
    }

    /// Files whose fingerprint differs from the cache or is absent from it.
    pub fn changed<'a>(&self, files: &'a [SourceFile]) -> Vec<&'a SourceFile> {
        files
            .iter()
            .filter(|f| self.cache.file_hashes.get(&f.path) != Some(&f.fingerprint))
            .collect()
    }

    /// Cached paths that are no longer in the current file set.
    pub fn deleted(&self, files: &[SourceFile]) -> Vec<String> {
        let current: BTreeSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
        self.cache
            .file_hashes
            .keys()
            .filter(|path| !current.contains(path.as_str()))
            .cloned()
            .collect()
    }

    /// True when the cache is empty or more than the configured share of files changed.
    pub fn needs_full_scan(&self, files: &[SourceFile]) -> bool {
        if self.cache.file_hashes.is_empty() {
            return true;
        }
        if files.is_empty() {
            return false;
        }
        let ratio = self.changed(files).len() as f64 / files.len() as f64;
        ratio > self.full_scan_ratio
    }

    /// Replace the fingerprint map with the current file set.
    pub fn update(&mut self, files: &[SourceFile]) {
        self.update_except(files, &BTreeSet::new());
    }

    /// Replace the fingerprint map with the current file set, except that
    /// paths in `retry` keep their previous fingerprint, or stay absent when
    /// they had none. The next scan then sees them as changed again.
    pub fn update_except(&mut self, files: &[SourceFile], retry: &BTreeSet<String>) {
        let previous = std::mem::take(&mut self.cache.file_hashes);
        self.cache.file_hashes = files
            .iter()
            .filter_map(|f| {
                if retry.contains(&f.path) {
                    previous.get(&f.path).map(|old| (f.path.clone(), old.clone()))
                } else {
                    Some((f.path.clone(), f.fingerprint.clone()))
                }
            })
            .collect();
        self.cache.last_scan_time = Some(Utc::now());
    }

    pub fn save(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(&self.cache)?;
        std::fs::write(&self.path, json).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::debug!("Scan cache saved: {}", self.path.display());
        Ok(())
    }

    /// Forget all fingerprints and remove the cache file.
    pub fn clear(&mut self) -> Result<(), CacheError> {
        self.cache = ScanCache::default();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            cached_files: self.cache.file_hashes.len(),
            last_scan_time: self.cache.last_scan_time,
            cache_path: self.path.clone(),
        }
    }
}
