//! Graph output writer
//!
//! Writes `dependency_graph.json` (the flattened level view plus the full
//! partition tree) and one Mermaid `.mmd` file per partition. Markup files
//! from earlier scans that no longer match a partition are removed. Any write
//! failure is fatal for the scan: partial output is not useful.

use crate::error::IndexError;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use strata_core::graph::mermaid_id;
use strata_core::{LayeredGraph, Partition};

pub const GRAPH_FILE: &str = "dependency_graph.json";

#[derive(Serialize)]
struct GraphDocument<'a> {
    threshold: usize,
    file_count: usize,
    depth: usize,
    levels: serde_json::Value,
    tree: &'a Partition,
}

/// Paths written by [`write_graph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphOutput {
    pub graph_file: PathBuf,
    pub markup_files: Vec<PathBuf>,
}

/// File name for a partition's markup: `level_0.mmd`, `level_1_src.mmd`, ...
/// The key is encoded with [`mermaid_id`], so distinct keys never share a file.
pub fn markup_file_name(partition: &Partition) -> String {
    if partition.level == 0 {
        "level_0.mmd".to_string()
    } else {
        format!("level_{}_{}.mmd", partition.level, mermaid_id(&partition.key))
    }
}

pub fn write_graph(dir: &Path, graph: &LayeredGraph) -> Result<GraphOutput, IndexError> {
    fs::create_dir_all(dir).map_err(|source| IndexError::Output {
        path: dir.to_path_buf(),
        source,
    })?;

    let document = GraphDocument {
        threshold: graph.threshold,
        file_count: graph.file_count,
        depth: graph.depth(),
        levels: graph.levels(),
        tree: &graph.root,
    };
    let graph_file = dir.join(GRAPH_FILE);
    write(&graph_file, serde_json::to_string_pretty(&document)?)?;

    let mut markup_files = Vec::new();
    for partition in graph.partitions() {
        let path = dir.join(markup_file_name(partition));
        write(&path, format!("{}\n", partition.markup))?;
        markup_files.push(path);
    }
    remove_stale_markup(dir, &markup_files)?;

    tracing::info!(
        "Wrote {} and {} markup files to {}",
        GRAPH_FILE,
        markup_files.len(),
        dir.display()
    );
    Ok(GraphOutput {
        graph_file,
        markup_files,
    })
}

fn is_markup_file(name: &str) -> bool {
    name.starts_with("level_") && name.ends_with(".mmd")
}

/// Delete `level_*.mmd` files in `dir` that this scan did not write.
fn remove_stale_markup(dir: &Path, current: &[PathBuf]) -> Result<(), IndexError> {
    let output_error = |path: &Path, source| IndexError::Output {
        path: path.to_path_buf(),
        source,
    };
    let current: HashSet<&Path> = current.iter().map(PathBuf::as_path).collect();
    let entries = fs::read_dir(dir).map_err(|e| output_error(dir, e))?;

    let mut removed = 0;
    for entry in entries {
        let path = entry.map_err(|e| output_error(dir, e))?.path();
        let stale = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(is_markup_file)
            && path.is_file()
            && !current.contains(path.as_path());
        if stale {
            fs::remove_file(&path).map_err(|e| output_error(&path, e))?;
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::debug!("Removed {} stale markup files from {}", removed, dir.display());
    }
    Ok(())
}

fn write(path: &Path, contents: String) -> Result<(), IndexError> {
    fs::write(path, contents).map_err(|source| IndexError::Output {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use strata_core::PartitionConfig;
    use tempfile::TempDir;

    fn graph() -> LayeredGraph {
        let mut deps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for path in ["a/alpha.py", "a/beta.py", "a/gamma.py", "b/delta.py"] {
            deps.insert(path.to_string(), BTreeSet::new());
        }
        deps.get_mut("b/delta.py")
            .unwrap()
            .insert("alpha".to_string());
        LayeredGraph::build(&deps, &PartitionConfig::new(2))
    }

    #[test]
    fn test_write_graph() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("docs/architecture");
        let written = write_graph(&out, &graph()).unwrap();

        assert_eq!(written.graph_file, out.join(GRAPH_FILE));
        let names: Vec<String> = written
            .markup_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["level_0.mmd", "level_1_a.mmd"]);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written.graph_file).unwrap()).unwrap();
        assert_eq!(json["file_count"], 4);
        assert_eq!(json["levels"]["level_0"]["stats"]["node_count"], 2);
        assert!(json["levels"]["level_1"]["a"].is_object());
        assert_eq!(json["tree"]["children"][0]["key"], "a");

        let root_markup = fs::read_to_string(out.join("level_0.mmd")).unwrap();
        assert!(root_markup.starts_with("graph TD"));
    }

    #[test]
    fn test_lookalike_keys_get_separate_files() {
        let mut deps: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for path in ["a-b/x.py", "a-b/z.py", "a_b/y.py", "a_b/w.py"] {
            deps.insert(path.to_string(), BTreeSet::new());
        }
        let graph = LayeredGraph::build(&deps, &PartitionConfig::new(1));
        let dir = TempDir::new().unwrap();
        let written = write_graph(dir.path(), &graph).unwrap();

        let names: Vec<String> = written
            .markup_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["level_0.mmd", "level_1_a_x2Db.mmd", "level_1_a__b.mmd"]);
        assert!(written.markup_files.iter().all(|p| p.is_file()));
        let first = fs::read_to_string(dir.path().join("level_1_a_x2Db.mmd")).unwrap();
        assert!(first.contains("x.py"));
        assert!(!first.contains("y.py"));
    }

    #[test]
    fn test_stale_markup_is_removed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("level_1_gone.mmd"), "graph TD
").unwrap();
        fs::write(dir.path().join("level_3_old_x2Fpath.mmd"), "graph TD
").unwrap();
        fs::write(dir.path().join("overview.md"), "# kept
").unwrap();
        fs::write(dir.path().join("level_notes.txt"), "kept
").unwrap();

        let written = write_graph(dir.path(), &graph()).unwrap();

        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                GRAPH_FILE,
                "level_0.mmd",
                "level_1_a.mmd",
                "level_notes.txt",
                "overview.md"
            ]
        );
        assert_eq!(written.markup_files.len(), 2);
    }

    #[test]
    fn test_unwritable_output_is_an_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "not a directory").unwrap();
        let result = write_graph(&blocker.join("out"), &graph());
        assert!(matches!(result, Err(IndexError::Output { .. })));
    }
}
