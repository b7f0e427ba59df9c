//! Per-thread tree-sitter parsers
//!
//! Tree-sitter parsers are `Send` but not `Sync`, and creating one per file
//! is wasteful. Each worker thread keeps one parser per grammar and reuses it
//! for every file it handles.

use anyhow::{Result, anyhow};
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use strata_core::Language;
use tree_sitter::{Parser, Tree};

/// Grammars available for structural parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Rust,
}

impl Grammar {
    /// Pick the grammar for a file. TypeScript files ending in `.tsx` use the TSX grammar.
    pub fn for_file(language: Language, path: &Path) -> Option<Self> {
        match language {
            Language::Python => Some(Grammar::Python),
            Language::JavaScript => Some(Grammar::JavaScript),
            Language::TypeScript => {
                let is_tsx = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("tsx"));
                Some(if is_tsx { Grammar::Tsx } else { Grammar::TypeScript })
            }
            Language::Rust => Some(Grammar::Rust),
            _ => None,
        }
    }

    /// Get the tree-sitter language for this grammar
    pub fn language(&self) -> tree_sitter::Language {
        match self {
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }
}

thread_local! {
    static PARSERS: RefCell<HashMap<Grammar, Parser>> = RefCell::new(HashMap::new());
}

/// Parse `source` with this thread's parser for `grammar`.
pub fn parse(grammar: Grammar, source: &str) -> Result<Tree> {
    PARSERS.with(|cell| {
        let mut parsers = cell.borrow_mut();
        let parser = match parsers.entry(grammar) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut parser = Parser::new();
                parser.set_language(&grammar.language())?;
                tracing::debug!("Created {:?} parser on {:?}", grammar, std::thread::current().id());
                entry.insert(parser)
            }
        };
        parser
            .parse(source, None)
            .ok_or_else(|| anyhow!("{:?} parser produced no tree", grammar))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_python() {
        let tree = parse(Grammar::Python, "def main():\n    pass\n").unwrap();
        assert_eq!(tree.root_node().kind(), "module");
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_parse_typescript() {
        let content = r#"
class MyClass {
    method(): void {
        console.log("Hello");
    }
}
"#;
        let tree = parse(Grammar::TypeScript, content).unwrap();
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn test_parser_is_reused_across_grammars() {
        let rust = parse(Grammar::Rust, "fn main() {}").unwrap();
        let python = parse(Grammar::Python, "x = 1").unwrap();
        let rust_again = parse(Grammar::Rust, "struct A;").unwrap();
        assert_eq!(rust.root_node().kind(), "source_file");
        assert_eq!(python.root_node().kind(), "module");
        assert_eq!(rust_again.root_node().kind(), "source_file");
    }

    #[test]
    fn test_tsx_detection() {
        assert_eq!(
            Grammar::for_file(Language::TypeScript, Path::new("App.tsx")),
            Some(Grammar::Tsx)
        );
        assert_eq!(
            Grammar::for_file(Language::TypeScript, Path::new("app.ts")),
            Some(Grammar::TypeScript)
        );
        assert_eq!(Grammar::for_file(Language::Go, Path::new("main.go")), None);
    }
}
