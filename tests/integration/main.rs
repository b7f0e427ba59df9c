//! Integration tests for Strata
//!
//! These tests verify that discovery, extraction, the symbol store and the
//! graph output work together, both through the library and the CLI.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use strata_core::{SymbolKind, symbol_db_path};
use strata_indexer::{IndexConfig, Indexer, ScanMode};
use strata_store::SymbolIndex;
use tempfile::TempDir;

const SERVICE_TS: &str = r#"import { Store } from "./store";

export class UserService {
  constructor(private store: Store) {}

  find(id: string): string {
    return id;
  }
}
"#;

const STORE_TS: &str = "export interface Store {\n  get(id: string): string;\n}\n";

const CONFIG_RS: &str = r#"use std::path::PathBuf;

pub struct Config {
    pub root: PathBuf,
}

impl Config {
    pub fn new(root: PathBuf) -> Self {
        Config { root }
    }
}
"#;

const SETTINGS_PY: &str = r#"import os


def load_settings(path):
    return os.path.exists(path)
"#;

const MAIN_GO: &str = "package main\n\nimport \"fmt\"\n\nfunc main() {\n\tfmt.Println(\"hi\")\n}\n";

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn mixed_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "web/service.ts", SERVICE_TS);
    write(root, "web/store.ts", STORE_TS);
    write(root, "core/config.rs", CONFIG_RS);
    write(root, "scripts/settings.py", SETTINGS_PY);
    write(root, "cmd/main.go", MAIN_GO);
    write(root, "node_modules/left-pad/index.js", "module.exports = 1;\n");
    dir
}

fn strata(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_strata"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("Failed to execute strata")
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "strata failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_invocation() {
    let output = Command::new(env!("CARGO_BIN_EXE_strata"))
        .arg("--help")
        .output()
        .expect("Failed to execute strata");

    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("strata"));
    assert!(text.contains("Layered dependency graphs"));
}

/// Scan through the library the way the CLI does: on a blocking task
#[tokio::test]
async fn test_multi_language_scan() {
    let dir = mixed_project();
    let root = dir.path().to_path_buf();

    let report = tokio::task::spawn_blocking(move || {
        let config = IndexConfig {
            workers: Some(2),
            ..IndexConfig::default()
        };
        Indexer::new(root, config)?.run(ScanMode::Incremental)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.mode, ScanMode::Full);
    assert_eq!(report.files_discovered, 5);
    assert_eq!(report.files_failed, 0);
    // Go contributes dependencies but no symbols.
    assert_eq!(report.files_extracted, 4);

    let index = SymbolIndex::open(&symbol_db_path(dir.path())).unwrap();
    let service = index.find("UserService", Some(SymbolKind::Class)).unwrap();
    assert_eq!(service.len(), 1);
    assert_eq!(service[0].file_path, "web/service.ts");

    let config = index.find("Config", Some(SymbolKind::Class)).unwrap();
    assert_eq!(config.len(), 1);
    assert_eq!(config[0].file_path, "core/config.rs");
    let new = index.find("new", Some(SymbolKind::Function)).unwrap();
    assert_eq!(new.len(), 1);
    assert_eq!(new[0].parent_id, Some(config[0].id));

    assert_eq!(index.find("load_settings", None).unwrap().len(), 1);
    assert!(index.file("cmd/main.go").unwrap().is_empty());
    assert!(index.file("node_modules/left-pad/index.js").unwrap().is_empty());
}

/// Three files in `a/` and one in `b/` with a threshold of two
#[test]
fn test_layered_output_subdivides_large_folders() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "a/one.py", "import two\n");
    write(root, "a/two.py", "X = 2\n");
    write(root, "a/three.py", "Y = 3\n");
    write(root, "b/four.py", "import one\n");

    let config = IndexConfig {
        node_threshold: 2,
        workers: Some(1),
        ..IndexConfig::default()
    };
    let indexer = Indexer::new(root, config).unwrap();
    let report = indexer.run(ScanMode::Full).unwrap();
    let first = fs::read_to_string(&report.graph_file).unwrap();

    let json: serde_json::Value = serde_json::from_str(&first).unwrap();
    let level_0 = &json["levels"]["level_0"];
    assert_eq!(level_0["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(level_0["edges"][0]["from"], "b");
    assert_eq!(level_0["edges"][0]["to"], "a");

    let level_1 = json["levels"]["level_1"].as_object().unwrap();
    assert_eq!(level_1.keys().collect::<Vec<_>>(), vec!["a"]);
    assert_eq!(level_1["a"]["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(level_1["a"]["edges"][0]["label"], "two");

    // Same input, same output.
    indexer.run(ScanMode::Full).unwrap();
    assert_eq!(fs::read_to_string(&report.graph_file).unwrap(), first);
}

#[test]
fn test_cli_scan_query_and_graph() {
    let dir = mixed_project();
    let root = dir.path();

    let report: serde_json::Value =
        serde_json::from_str(&stdout(&strata(root, &["scan", "--json"]))).unwrap();
    assert_eq!(report["mode"], "full");
    assert_eq!(report["files_discovered"], 5);

    let found = stdout(&strata(root, &["query", "find", "UserService"]));
    assert!(found.contains("web/service.ts"));

    let searched: serde_json::Value = serde_json::from_str(&stdout(&strata(
        root,
        &["query", "search", "settings", "--kind", "function", "--json"],
    )))
    .unwrap();
    assert_eq!(searched[0]["name"], "load_settings");

    let fuzzy = stdout(&strata(root, &["query", "fuzzy", "usrsvc"]));
    assert!(fuzzy.lines().next().unwrap().contains("UserService"));

    let markup = stdout(&strata(root, &["graph"]));
    assert!(markup.starts_with("graph TD"));

    let rescan: serde_json::Value =
        serde_json::from_str(&stdout(&strata(root, &["scan", "--json"]))).unwrap();
    assert_eq!(rescan["mode"], "incremental");
    assert_eq!(rescan["files_extracted"], 0);
}

#[test]
fn test_cli_rejects_unknown_kind() {
    let dir = mixed_project();
    let root = dir.path();
    stdout(&strata(root, &["scan"]));

    let output = strata(root, &["query", "find", "Config", "--kind", "struct"]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_query_before_scan_fails() {
    let dir = mixed_project();
    let output = strata(dir.path(), &["query", "stats"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("run a scan first"));
}

#[test]
fn test_cli_tree_and_stats() {
    let dir = mixed_project();
    let root = dir.path();

    let tree = stdout(&strata(root, &["tree"]));
    assert!(tree.contains("service.ts"));
    assert!(!tree.contains("node_modules"));

    let stats = stdout(&strata(root, &["stats"]));
    assert!(stats.contains("Files: 5"));
    assert!(stats.contains("Last scan: never"));
}

#[test]
fn test_cli_clear_removes_cache() {
    let dir = mixed_project();
    let root = dir.path();
    stdout(&strata(root, &["scan"]));
    assert!(symbol_db_path(root).exists());

    stdout(&strata(root, &["clear"]));
    assert!(!root.join(".strata").exists());

    let report: serde_json::Value =
        serde_json::from_str(&stdout(&strata(root, &["scan", "--json"]))).unwrap();
    assert_eq!(report["mode"], "full");
}
