//! Python imports via tree-sitter

use crate::parser_pool::{self, Grammar};
use std::collections::BTreeSet;
use tree_sitter::Node;

/// Top-level modules imported anywhere in the file. A file with syntax
/// errors is treated as unparsable and contributes nothing.
pub(super) fn extract(source: &str) -> BTreeSet<String> {
    let tree = match parser_pool::parse(Grammar::Python, source) {
        Ok(tree) => tree,
        Err(e) => {
            tracing::debug!("Python parse failed: {}", e);
            return BTreeSet::new();
        }
    };
    let root = tree.root_node();
    if root.has_error() {
        tracing::debug!("Python source has syntax errors; skipping imports");
        return BTreeSet::new();
    }

    let mut modules = BTreeSet::new();
    let src = source.as_bytes();
    let mut cursor = root.walk();
    loop {
        if record(cursor.node(), src, &mut modules) && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return modules;
            }
        }
    }
}

/// Record the modules an import statement names. Returns whether the node's
/// children still need visiting.
fn record(node: Node, source: &[u8], modules: &mut BTreeSet<String>) -> bool {
    match node.kind() {
        "import_statement" => {
            let mut cursor = node.walk();
            for name in node.children_by_field_name("name", &mut cursor) {
                let dotted = if name.kind() == "aliased_import" {
                    name.child_by_field_name("name")
                } else {
                    Some(name)
                };
                if let Some(module) = dotted.and_then(|n| top_segment(n, source)) {
                    modules.insert(module);
                }
            }
            false
        }
        "import_from_statement" => {
            if let Some(module) = node.child_by_field_name("module_name") {
                let dotted = if module.kind() == "relative_import" {
                    let mut cursor = module.walk();
                    let found = module
                        .children(&mut cursor)
                        .find(|c| c.kind() == "dotted_name");
                    found
                } else {
                    Some(module)
                };
                if let Some(name) = dotted.and_then(|n| top_segment(n, source)) {
                    modules.insert(name);
                }
            }
            false
        }
        "future_import_statement" => {
            modules.insert("__future__".to_string());
            false
        }
        _ => true,
    }
}

fn top_segment(node: Node, source: &[u8]) -> Option<String> {
    let text = node.utf8_text(source).ok()?;
    let first = text.split('.').next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}
