//! Test utilities for strata-core

use crate::model::SourceFile;
use crate::partition::DependencyMap;
use tempfile::TempDir;

/// Build a `SourceFile` with a fixed size and modification time.
pub fn source_file(path: &str, size: u64, modified_ns: u64) -> SourceFile {
    SourceFile::new(path, size, modified_ns)
}

/// Build a dependency map from `(path, [names])` pairs.
pub fn dependency_map(entries: &[(&str, &[&str])]) -> DependencyMap {
    entries
        .iter()
        .map(|(path, names)| {
            (
                path.to_string(),
                names.iter().map(|n| n.to_string()).collect(),
            )
        })
        .collect()
}

/// Empty temporary project root.
pub fn temp_root() -> TempDir {
    TempDir::new().unwrap()
}
