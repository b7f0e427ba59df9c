//! Layered graph partitioner
//!
//! Turns a per-file dependency map into a tree of bounded-size graphs. The
//! root partition is always folder-granularity; any group holding more files
//! than the threshold is split again by its next path segment.
//!
//! Dependencies are resolved to files by a case-insensitive substring match of
//! the dependency name against the partition's file paths (first match in
//! sorted order). This is a naming heuristic: short or common names can
//! produce false-positive edges.

use crate::graph::DependencyGraph;
use crate::model::{GraphEdge, GraphNode, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// File path → names it depends on.
pub type DependencyMap = BTreeMap<String, BTreeSet<String>>;

pub const DEFAULT_NODE_THRESHOLD: usize = 25;

/// Key of the level-0 partition.
pub const ROOT_KEY: &str = "/";

/// Group holding files that sit directly in the scan root.
pub const ROOT_GROUP: &str = ".";

const FOLDER_EDGE_LABEL: &str = "depends";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Maximum number of files a partition may hold before it is split.
    pub threshold: usize,
}

impl PartitionConfig {
    pub fn new(threshold: usize) -> Self {
        PartitionConfig {
            threshold: threshold.max(1),
        }
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_THRESHOLD)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}

/// One bounded-size graph in the layered tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub key: String,
    pub level: usize,
    pub file_count: usize,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    /// Mermaid flowchart text.
    pub markup: String,
    pub stats: GraphStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Partition>,
}

impl Partition {
    fn from_graph(key: &str, level: usize, file_count: usize, graph: &DependencyGraph) -> Self {
        Partition {
            key: key.to_string(),
            level,
            file_count,
            nodes: graph.nodes(),
            edges: graph.edges(),
            markup: graph.to_mermaid(),
            stats: GraphStats {
                node_count: graph.node_count(),
                edge_count: graph.edge_count(),
            },
            children: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, key: &str) -> Option<&Partition> {
        self.children.iter().find(|c| c.key == key)
    }

    fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "nodes": self.nodes,
            "edges": self.edges,
            "markup": self.markup,
            "stats": self.stats,
        })
    }
}

/// The full partition tree for one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayeredGraph {
    pub threshold: usize,
    pub file_count: usize,
    pub root: Partition,
}

impl LayeredGraph {
    pub fn build(deps: &DependencyMap, config: &PartitionConfig) -> Self {
        let threshold = config.threshold.max(1);
        let files: Vec<&str> = deps.keys().map(String::as_str).collect();

        let mut graph = DependencyGraph::new();
        connect(&mut graph, deps, &files, |path| GraphNode::folder(top_group(path)));
        let mut root = Partition::from_graph(ROOT_KEY, 0, files.len(), &graph);

        if files.len() > threshold {
            for (group, members) in group_by(&files, top_group) {
                if let Some(child) = build_child(deps, &group, &members, 1, threshold) {
                    root.children.push(child);
                }
            }
        }

        tracing::debug!(
            "Partitioned {} files into {} partitions (threshold {})",
            files.len(),
            count_partitions(&root),
            threshold
        );

        LayeredGraph {
            threshold,
            file_count: files.len(),
            root,
        }
    }

    /// All partitions in pre-order (root first, children in key order).
    pub fn partitions(&self) -> Vec<&Partition> {
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(partition) = stack.pop() {
            out.push(partition);
            stack.extend(partition.children.iter().rev());
        }
        out
    }

    /// Find a partition by key.
    pub fn find(&self, key: &str) -> Option<&Partition> {
        self.partitions().into_iter().find(|p| p.key == key)
    }

    /// Deepest level present in the tree.
    pub fn depth(&self) -> usize {
        self.partitions().iter().map(|p| p.level).max().unwrap_or(0)
    }

    /// Flattened `{level_0: {...}, level_1: {key: {...}}, ...}` view.
    pub fn levels(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        out.insert("level_0".to_string(), self.root.summary());
        for partition in self.partitions().into_iter().skip(1) {
            let level = out
                .entry(format!("level_{}", partition.level))
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            if let serde_json::Value::Object(map) = level {
                map.insert(partition.key.clone(), partition.summary());
            }
        }
        serde_json::Value::Object(out)
    }
}

fn build_child(
    deps: &DependencyMap,
    key: &str,
    members: &[&str],
    level: usize,
    threshold: usize,
) -> Option<Partition> {
    if members.len() <= 1 {
        return None;
    }

    let mut graph = DependencyGraph::new();
    if members.len() <= threshold {
        connect(&mut graph, deps, members, |path| GraphNode::file(path));
        return Some(Partition::from_graph(key, level, members.len(), &graph));
    }

    connect(&mut graph, deps, members, |path| entry_node(key, path));
    let mut partition = Partition::from_graph(key, level, members.len(), &graph);

    let sub_groups = group_by(members, |path| {
        let node = entry_node(key, path);
        match node.kind {
            NodeKind::Folder => node.id,
            NodeKind::File => String::new(),
        }
    });
    for (sub_key, sub_members) in sub_groups {
        if sub_key.is_empty() {
            continue;
        }
        if let Some(child) = build_child(deps, &sub_key, &sub_members, level + 1, threshold) {
            partition.children.push(child);
        }
    }
    Some(partition)
}

/// Add one node per member and the edges its dependencies resolve to.
/// Edges between two files carry the dependency name; any edge touching a
/// folder is labelled `depends`.
fn connect<F>(graph: &mut DependencyGraph, deps: &DependencyMap, members: &[&str], node_of: F)
where
    F: Fn(&str) -> GraphNode,
{
    let lowered: Vec<(String, &str)> = members
        .iter()
        .map(|path| (path.to_lowercase(), *path))
        .collect();

    for &path in members {
        graph.add_node(node_of(path));
    }

    for &path in members {
        let Some(names) = deps.get(path) else {
            continue;
        };
        let from = node_of(path);
        for name in names {
            let Some(target) = resolve(name, &lowered) else {
                continue;
            };
            let to = node_of(target);
            let label = if from.kind == NodeKind::File && to.kind == NodeKind::File {
                name.clone()
            } else {
                FOLDER_EDGE_LABEL.to_string()
            };
            graph.add_edge(GraphEdge {
                from: from.id.clone(),
                to: to.id,
                label,
            });
        }
    }
}

fn resolve<'a>(name: &str, lowered: &[(String, &'a str)]) -> Option<&'a str> {
    let needle = name.to_lowercase();
    if needle.is_empty() {
        return None;
    }
    lowered
        .iter()
        .find(|(lower, _)| lower.contains(&needle))
        .map(|(_, path)| *path)
}

fn top_group(path: &str) -> String {
    match path.split_once('/') {
        Some((first, _)) => first.to_string(),
        None => ROOT_GROUP.to_string(),
    }
}

/// Node for `path` one segment below `prefix`: a sub-folder or a direct file.
fn entry_node(prefix: &str, path: &str) -> GraphNode {
    let rest = if prefix == ROOT_GROUP {
        path
    } else {
        path.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(path)
    };
    match rest.split_once('/') {
        Some((segment, _)) if prefix == ROOT_GROUP => GraphNode::folder(segment),
        Some((segment, _)) => GraphNode::folder(format!("{prefix}/{segment}")),
        None => GraphNode::file(path),
    }
}

fn group_by<'a, F>(files: &[&'a str], key_of: F) -> BTreeMap<String, Vec<&'a str>>
where
    F: Fn(&str) -> String,
{
    let mut groups: BTreeMap<String, Vec<&'a str>> = BTreeMap::new();
    for &path in files {
        groups.entry(key_of(path)).or_default().push(path);
    }
    groups
}

fn count_partitions(partition: &Partition) -> usize {
    1 + partition.children.iter().map(count_partitions).sum::<usize>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(entries: &[(&str, &[&str])]) -> DependencyMap {
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

    #[test]
    fn test_root_markup() {
        let map = deps(&[
            ("a/one.py", &["two"]),
            ("a/two.py", &[]),
            ("b/three.py", &["one"]),
        ]);
        let graph = LayeredGraph::build(&map, &PartitionConfig::default());

        insta::assert_snapshot!(graph.root.markup, @r#"
        graph TD
            a["a/"]
            b["b/"]
            b -->|depends| a
        "#);
    }

    #[test]
    fn test_lookalike_folders_stay_distinct() {
        let map = deps(&[("a-b/x.py", &[]), ("a_b/y.py", &["x"])]);
        let graph = LayeredGraph::build(&map, &PartitionConfig::default());

        insta::assert_snapshot!(graph.root.markup, @r#"
        graph TD
            a_x2Db["a-b/"]
            a__b["a_b/"]
            a__b -->|depends| a_x2Db
        "#);
    }

    #[test]
    fn test_root_level_files_group_under_dot() {
        let map = deps(&[("main.py", &["util"]), ("lib/util.py", &[])]);
        let graph = LayeredGraph::build(&map, &PartitionConfig::default());

        let ids: Vec<&str> = graph.root.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![".", "lib"]);
        assert_eq!(graph.root.edges.len(), 1);
        assert_eq!(graph.root.edges[0].from, ".");
        assert_eq!(graph.root.edges[0].to, "lib");
    }

    #[test]
    fn test_deep_folder_is_subdivided_by_next_segment() {
        let map = deps(&[
            ("src/api/routes.py", &["models"]),
            ("src/api/views.py", &[]),
            ("src/db/models.py", &[]),
            ("src/db/session.py", &[]),
            ("src/main.py", &["routes"]),
            ("docs/conf.py", &[]),
        ]);
        let graph = LayeredGraph::build(&map, &PartitionConfig::new(2));

        let src = graph.root.child("src").expect("src partition");
        assert_eq!(src.level, 1);
        let ids: Vec<&str> = src.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["src/api", "src/db", "src/main.py"]);
        assert!(src.edges.contains(&GraphEdge {
            from: "src/api".into(),
            to: "src/db".into(),
            label: "depends".into(),
        }));
        assert!(src.edges.contains(&GraphEdge {
            from: "src/main.py".into(),
            to: "src/api".into(),
            label: "depends".into(),
        }));

        let api = src.child("src/api").expect("src/api partition");
        assert_eq!(api.level, 2);
        assert_eq!(api.nodes.len(), 2);
        assert!(api.nodes.iter().all(|n| n.kind == NodeKind::File));
        assert_eq!(graph.depth(), 2);
        assert!(graph.root.child("docs").is_none());
    }

    #[test]
    fn test_levels_view() {
        let map = deps(&[
            ("a/alpha.rs", &["beta"]),
            ("a/beta.rs", &[]),
            ("a/gamma.rs", &[]),
            ("b/delta.rs", &[]),
        ]);
        let graph = LayeredGraph::build(&map, &PartitionConfig::new(2));
        let levels = graph.levels();

        assert_eq!(levels["level_0"]["stats"]["node_count"], 2);
        assert_eq!(levels["level_1"]["a"]["stats"]["node_count"], 3);
        assert_eq!(levels["level_1"]["a"]["edges"][0]["label"], "beta");
        assert!(levels.get("level_2").is_none());
    }

    #[test]
    fn test_zero_threshold_is_clamped() {
        assert_eq!(PartitionConfig::new(0).threshold, 1);
    }
}
