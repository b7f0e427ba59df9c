//! Symbol extractors for structurally parsed languages

pub mod javascript;
pub mod python;
pub mod rust;

use crate::extractor::SymbolExtractor;
use crate::parser_pool::Grammar;
use std::path::Path;
use strata_core::Language;
use tree_sitter::Node;

/// Get the extractor for a file, or `None` when its language has no
/// structural support.
pub fn get_extractor(language: Language, path: &Path) -> Option<Box<dyn SymbolExtractor>> {
    if !language.supports_symbols() {
        return None;
    }
    match Grammar::for_file(language, path)? {
        Grammar::Python => Some(Box::new(python::PythonExtractor)),
        grammar @ (Grammar::JavaScript | Grammar::TypeScript | Grammar::Tsx) => {
            Some(Box::new(javascript::JavaScriptExtractor::new(grammar)))
        }
        Grammar::Rust => Some(Box::new(rust::RustExtractor)),
    }
}

// ── Shared tree helpers ─────────────────────────────────

/// Declarations nested deeper than this (functions in functions, classes in
/// classes, modules in modules) are not recorded.
pub(crate) const MAX_NESTING: usize = 64;

/// 1-based start line.
pub(crate) fn start_line(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based end line.
pub(crate) fn end_line(node: Node) -> u32 {
    node.end_position().row as u32 + 1
}

pub(crate) fn text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or_default()
}

pub(crate) fn field_text(node: Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| text(n, source).to_string())
}

pub(crate) fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

pub(crate) fn has_child_kind(node: Node, kind: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == kind)
}

/// Pre-order walk over `node` and its named descendants on an explicit
/// stack, so nesting depth is bounded by the heap rather than the thread
/// stack. `visit` returns `false` to skip a node's subtree.
pub(crate) fn walk<'t>(node: Node<'t>, mut visit: impl FnMut(Node<'t>) -> bool) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if visit(current) {
            stack.extend(named_children(current).into_iter().rev());
        }
    }
}

/// Count named descendants of `kinds` without descending into `barriers`.
pub(crate) fn count_within(node: Node, kinds: &[&str], barriers: &[&str]) -> usize {
    let mut count = 0;
    walk(node, |current| {
        if current == node {
            return true;
        }
        if barriers.contains(&current.kind()) {
            return false;
        }
        if kinds.contains(&current.kind()) {
            count += 1;
        }
        true
    });
    count
}

/// Strip quotes and string prefixes, then dedent the way docstrings are
/// conventionally cleaned.
pub(crate) fn clean_docstring(raw: &str) -> Option<String> {
    let body = raw.trim_start_matches(|c: char| "rRbBuUfF".contains(c));
    let body = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| body.strip_prefix(q).and_then(|b| b.strip_suffix(q)))
        .unwrap_or(body);

    let mut lines = body.lines();
    let first = lines.next().unwrap_or_default().trim().to_string();
    let rest: Vec<&str> = lines.collect();
    let indent = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned = vec![first];
    cleaned.extend(rest.iter().map(|l| l.get(indent..).unwrap_or("").trim_end().to_string()));
    let doc = cleaned.join("\n").trim().to_string();
    if doc.is_empty() { None } else { Some(doc) }
}

/// Identifiers bound by a pattern (`a`, `(a, b)`, `[a, *rest]`).
pub(crate) fn bound_names(node: Node, source: &[u8], names: &mut Vec<String>) {
    walk(node, |current| {
        if current.kind() == "identifier" {
            names.push(text(current, source).to_string());
            return false;
        }
        true
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_extractor() {
        assert!(get_extractor(Language::Python, Path::new("a.py")).is_some());
        assert_eq!(
            get_extractor(Language::TypeScript, Path::new("App.tsx"))
                .map(|e| e.language()),
            Some(Language::TypeScript)
        );
        assert!(get_extractor(Language::Go, Path::new("main.go")).is_none());
        assert!(get_extractor(Language::Other, Path::new("README.md")).is_none());
    }

    #[test]
    fn test_extractor_exists_exactly_for_symbol_languages() {
        for language in [
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Rust,
            Language::Go,
            Language::Java,
            Language::Ruby,
            Language::Other,
        ] {
            let path = Path::new("file");
            assert_eq!(
                get_extractor(language, path).is_some(),
                language.supports_symbols(),
                "{language}"
            );
        }
    }

    #[test]
    fn test_clean_docstring() {
        assert_eq!(
            clean_docstring("\"\"\"Load users.\n\n    Reads the table.\n    \"\"\"").as_deref(),
            Some("Load users.\n\nReads the table.")
        );
        assert_eq!(clean_docstring("'one line'").as_deref(), Some("one line"));
        assert_eq!(clean_docstring("r\"\"\"raw\"\"\"").as_deref(), Some("raw"));
        assert_eq!(clean_docstring("\"\"\"   \"\"\""), None);
    }
}
