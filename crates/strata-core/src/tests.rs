//! Unit tests for strata-core module

use crate::cache::{ChangeDetector, SCAN_CACHE, fingerprint, scan_cache_path};
use crate::model::{Language, NodeKind, SymbolKind};
use crate::partition::{LayeredGraph, PartitionConfig};
use crate::test_utils::{dependency_map, source_file, temp_root};
use std::collections::BTreeSet;
use std::path::Path;

fn generated_map() -> crate::partition::DependencyMap {
    let mut map = crate::partition::DependencyMap::new();
    for pkg in ["api", "core", "db", "web"] {
        for sub in ["handlers", "models", "utils"] {
            for i in 0..4 {
                let path = format!("{pkg}/{sub}/{pkg}_{sub}_{i}.py");
                let mut names = BTreeSet::new();
                names.insert(format!("{sub}_{}", (i + 1) % 4));
                names.insert("core_models".to_string());
                names.insert("requests".to_string());
                map.insert(path, names);
            }
        }
    }
    map.insert("setup.py".to_string(), BTreeSet::from(["api_handlers".to_string()]));
    map
}

#[test]
fn test_two_folder_scenario() {
    let map = dependency_map(&[
        ("a/alpha.py", &["beta"]),
        ("a/beta.py", &[]),
        ("a/gamma.py", &["delta"]),
        ("b/delta.py", &[]),
    ]);
    let graph = LayeredGraph::build(&map, &PartitionConfig::new(2));

    assert_eq!(graph.root.level, 0);
    assert_eq!(graph.root.nodes.len(), 2);
    assert!(graph.root.nodes.iter().all(|n| n.kind == NodeKind::Folder));
    assert_eq!(graph.root.edges.len(), 1);
    assert_eq!(graph.root.edges[0].from, "a");
    assert_eq!(graph.root.edges[0].to, "b");

    assert_eq!(graph.root.children.len(), 1);
    let a = graph.root.child("a").expect("a is split");
    assert_eq!(a.level, 1);
    assert_eq!(a.nodes.len(), 3);
    assert!(a.nodes.iter().all(|n| n.kind == NodeKind::File));
    assert!(a.is_terminal());
    assert!(graph.root.child("b").is_none());
}

#[test]
fn test_within_threshold_yields_single_partition() {
    let map = dependency_map(&[
        ("a/alpha.py", &["beta"]),
        ("a/beta.py", &[]),
        ("b/delta.py", &[]),
    ]);
    let graph = LayeredGraph::build(&map, &PartitionConfig::new(3));
    assert_eq!(graph.partitions().len(), 1);
    assert!(graph.root.is_terminal());
}

#[test]
fn test_no_dangling_edges() {
    let map = generated_map();
    for threshold in [1, 2, 5, 12, 100] {
        let graph = LayeredGraph::build(&map, &PartitionConfig::new(threshold));
        for partition in graph.partitions() {
            let ids: BTreeSet<&str> = partition.nodes.iter().map(|n| n.id.as_str()).collect();
            assert_eq!(ids.len(), partition.nodes.len(), "duplicate node in {}", partition.key);
            for edge in &partition.edges {
                assert!(ids.contains(edge.from.as_str()), "dangling from in {}", partition.key);
                assert!(ids.contains(edge.to.as_str()), "dangling to in {}", partition.key);
                assert_ne!(edge.from, edge.to);
            }
            assert_eq!(partition.stats.node_count, partition.nodes.len());
            assert_eq!(partition.stats.edge_count, partition.edges.len());
        }
    }
}

#[test]
fn test_partitioning_is_deterministic() {
    let map = generated_map();
    let config = PartitionConfig::new(5);
    let first = serde_json::to_string(&LayeredGraph::build(&map, &config)).unwrap();
    let second = serde_json::to_string(&LayeredGraph::build(&map, &config)).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_child_partitions_respect_threshold_or_are_split() {
    let map = generated_map();
    let graph = LayeredGraph::build(&map, &PartitionConfig::new(5));
    for partition in graph.partitions().into_iter().skip(1) {
        let all_files = partition.nodes.iter().all(|n| n.kind == NodeKind::File);
        if partition.file_count <= 5 {
            assert!(all_files);
            assert!(partition.is_terminal());
        }
    }
    assert_eq!(graph.depth(), 2);
}

#[test]
fn test_fingerprint_is_stable_and_sensitive() {
    let base = fingerprint("src/main.py", 120, 1_700_000_000);
    assert_eq!(base, fingerprint("src/main.py", 120, 1_700_000_000));
    assert_eq!(base.len(), 64);
    assert_ne!(base, fingerprint("src/main.py", 121, 1_700_000_000));
    assert_ne!(base, fingerprint("src/main.py", 120, 1_700_000_001));
    assert_ne!(base, fingerprint("src/other.py", 120, 1_700_000_000));
}

#[test]
fn test_change_detection_round_trip() {
    let dir = temp_root();
    let files = vec![
        source_file("a.py", 10, 1),
        source_file("b/c.py", 20, 2),
    ];

    let mut detector = ChangeDetector::open(dir.path());
    assert!(detector.needs_full_scan(&files));
    assert_eq!(detector.changed(&files).len(), 2);

    detector.update(&files);
    assert!(detector.changed(&files).is_empty());
    detector.save().unwrap();

    let reloaded = ChangeDetector::open(dir.path());
    assert!(reloaded.changed(&files).is_empty());
    assert!(!reloaded.needs_full_scan(&files));
    assert!(reloaded.cache().last_scan_time.is_some());
}

#[test]
fn test_retried_files_keep_their_old_fingerprint() {
    let dir = temp_root();
    let mut detector = ChangeDetector::open(dir.path());
    detector.update(&[source_file("a.py", 10, 1), source_file("b.py", 10, 1)]);

    let after = vec![
        source_file("a.py", 20, 2),
        source_file("b.py", 20, 2),
        source_file("c.py", 5, 1),
    ];
    let retry = BTreeSet::from(["a.py".to_string(), "c.py".to_string()]);
    detector.update_except(&after, &retry);

    let hashes = &detector.cache().file_hashes;
    assert_eq!(hashes["a.py"], source_file("a.py", 10, 1).fingerprint);
    assert_eq!(hashes["b.py"], after[1].fingerprint);
    assert!(!hashes.contains_key("c.py"));

    let changed: Vec<&str> = detector.changed(&after).iter().map(|f| f.path.as_str()).collect();
    assert_eq!(changed, vec!["a.py", "c.py"]);
    assert!(detector.deleted(&after).is_empty());
}

#[test]
fn test_deleted_and_modified_files() {
    let dir = temp_root();
    let before = vec![
        source_file("a.py", 10, 1),
        source_file("b.py", 10, 1),
        source_file("c.py", 10, 1),
        source_file("d.py", 10, 1),
    ];
    let mut detector = ChangeDetector::open(dir.path());
    detector.update(&before);

    let after = vec![
        source_file("a.py", 11, 5),
        source_file("b.py", 10, 1),
        source_file("c.py", 10, 1),
    ];
    let changed: Vec<&str> = detector.changed(&after).iter().map(|f| f.path.as_str()).collect();
    assert_eq!(changed, vec!["a.py"]);
    assert_eq!(detector.deleted(&after), vec!["d.py".to_string()]);
    assert!(!detector.needs_full_scan(&after));

    let mostly_new = vec![
        source_file("a.py", 99, 9),
        source_file("b.py", 99, 9),
        source_file("e.py", 1, 1),
    ];
    assert!(detector.needs_full_scan(&mostly_new));
}

#[test]
fn test_corrupt_cache_is_treated_as_empty() {
    let dir = temp_root();
    let path = scan_cache_path(dir.path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    let detector = ChangeDetector::open(dir.path());
    assert!(detector.cache().file_hashes.is_empty());
    assert!(detector.needs_full_scan(&[source_file("a.py", 1, 1)]));
    assert!(path.ends_with(SCAN_CACHE));
}

#[test]
fn test_clear_removes_cache_file() {
    let dir = temp_root();
    let mut detector = ChangeDetector::open(dir.path());
    detector.update(&[source_file("a.py", 1, 1)]);
    detector.save().unwrap();
    assert!(scan_cache_path(dir.path()).exists());

    detector.clear().unwrap();
    assert!(!scan_cache_path(dir.path()).exists());
    assert_eq!(detector.stats().cached_files, 0);
    detector.clear().unwrap();
}

#[test]
fn test_language_detection() {
    assert_eq!(Language::from_path(Path::new("a/b.py")), Language::Python);
    assert_eq!(Language::from_path(Path::new("x.tsx")), Language::TypeScript);
    assert_eq!(Language::from_path(Path::new("x.mjs")), Language::JavaScript);
    assert_eq!(Language::from_path(Path::new("X.RS")), Language::Rust);
    assert_eq!(Language::from_path(Path::new("Main.kt")), Language::Java);
    assert_eq!(Language::from_path(Path::new("vec.hpp")), Language::C);
    assert_eq!(Language::from_path(Path::new("Program.cs")), Language::CSharp);
    assert_eq!(Language::from_path(Path::new("Makefile")), Language::Other);
    assert_eq!(serde_json::to_string(&Language::CSharp).unwrap(), "\"csharp\"");
}

#[test]
fn test_symbol_kind_round_trips_through_str() {
    for kind in [SymbolKind::File, SymbolKind::Class, SymbolKind::Function, SymbolKind::Variable] {
        assert_eq!(kind.as_str().parse::<SymbolKind>(), Ok(kind));
    }
    assert!("module".parse::<SymbolKind>().is_err());
}
