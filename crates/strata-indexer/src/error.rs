//! Indexer error types

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("project root {0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("invalid exclusion pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Cache(#[from] strata_core::CacheError),

    #[error(transparent)]
    Store(#[from] strata_store::StoreError),

    #[error("cannot write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize graph output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("scan cancelled")]
    Cancelled,
}
