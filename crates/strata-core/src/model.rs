//! Core data structures shared by discovery, extraction, partitioning and storage

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Source languages recognised by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Rust,
    Java,
    C,
    CSharp,
    Ruby,
    Php,
    Swift,
    Other,
}

impl Language {
    /// Detect language from file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_ascii_lowercase(),
            None => return Language::Other,
        };
        match ext.as_str() {
            "py" | "pyi" => Language::Python,
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "go" => Language::Go,
            "rs" => Language::Rust,
            "java" | "kt" | "kts" | "scala" => Language::Java,
            "c" | "h" | "cpp" | "cc" | "cxx" | "hpp" | "hh" => Language::C,
            "cs" => Language::CSharp,
            "rb" => Language::Ruby,
            "php" => Language::Php,
            "swift" => Language::Swift,
            _ => Language::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
            Language::C => "c",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Other => "other",
        }
    }

    /// Whether a structural symbol extractor exists for this language.
    pub fn supports_symbols(&self) -> bool {
        matches!(
            self,
            Language::Python | Language::JavaScript | Language::TypeScript | Language::Rust
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file found by discovery. Immutable for the duration of one scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path relative to the scan root, `/`-separated.
    pub path: String,
    pub language: Language,
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch.
    pub modified_ns: u64,
    pub fingerprint: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, size: u64, modified_ns: u64) -> Self {
        let path = path.into();
        let language = Language::from_path(Path::new(&path));
        let fingerprint = crate::cache::fingerprint(&path, size, modified_ns);
        SourceFile {
            path,
            language,
            size,
            modified_ns,
            fingerprint,
        }
    }
}

/// How a file refers to another module or name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyKind {
    Import,
    Call,
    Instantiation,
    TypeReference,
}

impl DependencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyKind::Import => "import",
            DependencyKind::Call => "call",
            DependencyKind::Instantiation => "instantiation",
            DependencyKind::TypeReference => "type-reference",
        }
    }
}

impl FromStr for DependencyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "import" => Ok(DependencyKind::Import),
            "call" => Ok(DependencyKind::Call),
            "instantiation" => Ok(DependencyKind::Instantiation),
            "type-reference" => Ok(DependencyKind::TypeReference),
            other => Err(format!("unknown dependency kind: {other}")),
        }
    }
}

/// A reference from one file to a name. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub source_file: String,
    pub name: String,
    /// Module the name was imported from, when known.
    pub module: Option<String>,
    pub kind: DependencyKind,
    pub line: u32,
    /// True when the name resolves to a known standard/builtin module.
    pub is_external: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

/// A node in one partition of the layered graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
}

impl GraphNode {
    /// Folder node labelled with its last path segment and a trailing `/`.
    pub fn folder(id: impl Into<String>) -> Self {
        let id = id.into();
        let label = format!("{}/", id.rsplit('/').next().unwrap_or(&id));
        GraphNode {
            id,
            label,
            kind: NodeKind::Folder,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        let id = path.into();
        let label = id.rsplit('/').next().unwrap_or(&id).to_string();
        GraphNode {
            id,
            label,
            kind: NodeKind::File,
        }
    }
}

/// A directed `depends` relation between two nodes of the same partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    File,
    Class,
    Function,
    Variable,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::File => "file",
            SymbolKind::Class => "class",
            SymbolKind::Function => "function",
            SymbolKind::Variable => "variable",
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(SymbolKind::File),
            "class" => Ok(SymbolKind::Class),
            "function" => Ok(SymbolKind::Function),
            "variable" => Ok(SymbolKind::Variable),
            other => Err(format!("unknown symbol kind: {other}")),
        }
    }
}

/// A symbol ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub line: u32,
    pub end_line: u32,
    /// Index of the enclosing symbol within the same file's symbol list.
    pub parent: Option<usize>,
    pub metadata: serde_json::Value,
}
