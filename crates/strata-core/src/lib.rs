//! Strata core: data model, layered dependency graph and scan cache

pub mod graph;
pub mod model;
pub mod partition;
pub mod cache;

#[cfg(test)]
pub mod tests;

#[cfg(test)]
pub mod test_utils;

pub use model::{
    Dependency, DependencyKind, GraphEdge, GraphNode, Language, NodeKind, SourceFile, Symbol,
    SymbolKind,
};
pub use graph::DependencyGraph;
pub use partition::{DependencyMap, GraphStats, LayeredGraph, Partition, PartitionConfig};
pub use cache::{
    CACHE_DIR, SCAN_CACHE, SYMBOL_DB, CacheError, CacheStats, ChangeDetector, ScanCache,
    cache_dir, clear_cache, ensure_cache_dir, fingerprint, scan_cache_path, symbol_db_path,
};
