//! Structured facts extracted from one source file
//!
//! Everything here is plain data: extractors walk a syntax tree once and
//! produce these records, nothing keeps a reference back into the tree.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strata_core::{Dependency, Language, Symbol, SymbolKind};

/// Initializer and body snapshots are cut to this many characters.
pub const SNAPSHOT_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    PositionalOnly,
    Positional,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Option<String>,
    pub default: Option<String>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Parameter {
            name: name.into(),
            kind,
            annotation: None,
            default: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub line: u32,
    pub end_line: u32,
    pub decorators: Vec<String>,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<String>,
    pub docstring: Option<String>,
    pub is_async: bool,
    pub is_method: bool,
    pub is_static: bool,
    pub is_classmethod: bool,
    pub is_property: bool,
    pub is_generator: bool,
    pub is_async_generator: bool,
    /// Suspension points in the function's own body.
    pub await_count: usize,
    pub nested: Vec<FunctionDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableScope {
    Module,
    Class,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    pub annotation: Option<String>,
    pub value: Option<String>,
    pub scope: VariableScope,
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub name: String,
    pub line: u32,
    pub end_line: u32,
    pub decorators: Vec<String>,
    pub bases: Vec<String>,
    pub methods: Vec<FunctionDecl>,
    pub variables: Vec<VariableDecl>,
    pub nested: Vec<ClassDecl>,
    pub docstring: Option<String>,
    pub is_abstract: bool,
    /// Plain data shape: dataclass, record struct.
    pub is_record: bool,
    pub is_exception: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    pub types: Vec<String>,
    pub binding: Option<String>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceBlock {
    pub expr: String,
    pub bindings: Vec<String>,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymousFunction {
    pub params: Vec<String>,
    pub body: String,
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patterns {
    pub exception_handlers: Vec<ExceptionHandler>,
    pub resource_blocks: Vec<ResourceBlock>,
    pub anonymous_functions: Vec<AnonymousFunction>,
}

impl Patterns {
    pub fn is_empty(&self) -> bool {
        self.exception_handlers.is_empty()
            && self.resource_blocks.is_empty()
            && self.anonymous_functions.is_empty()
    }
}

/// Everything extracted from one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFacts {
    pub language: Language,
    pub line_count: u32,
    pub classes: Vec<ClassDecl>,
    pub functions: Vec<FunctionDecl>,
    /// Module-scoped variables. Class-scoped ones live on their class.
    pub variables: Vec<VariableDecl>,
    pub patterns: Patterns,
    pub dependencies: Vec<Dependency>,
}

impl FileFacts {
    pub fn new(language: Language, source: &str) -> Self {
        FileFacts {
            language,
            line_count: source.lines().count() as u32,
            classes: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            patterns: Patterns::default(),
            dependencies: Vec::new(),
        }
    }

    /// Flatten into store rows. The file symbol comes first; every other
    /// symbol's `parent` points at an earlier entry of the returned list.
    pub fn to_symbols(&self, path: &str) -> Vec<Symbol> {
        let mut symbols = vec![Symbol {
            name: path.to_string(),
            kind: SymbolKind::File,
            file_path: path.to_string(),
            line: 1,
            end_line: self.line_count.max(1),
            parent: None,
            metadata: json!({
                "language": self.language,
                "line_count": self.line_count,
                "patterns": self.patterns,
            }),
        }];

        for variable in &self.variables {
            push_variable(&mut symbols, path, variable, 0);
        }
        for class in &self.classes {
            push_class(&mut symbols, path, class, 0);
        }
        for function in &self.functions {
            push_function(&mut symbols, path, function, 0);
        }
        symbols
    }
}

fn push_class(symbols: &mut Vec<Symbol>, path: &str, class: &ClassDecl, parent: usize) {
    let index = symbols.len();
    symbols.push(Symbol {
        name: class.name.clone(),
        kind: SymbolKind::Class,
        file_path: path.to_string(),
        line: class.line,
        end_line: class.end_line,
        parent: Some(parent),
        metadata: json!({
            "decorators": class.decorators,
            "bases": class.bases,
            "docstring": class.docstring,
            "is_abstract": class.is_abstract,
            "is_record": class.is_record,
            "is_exception": class.is_exception,
            "method_count": class.methods.len(),
        }),
    });
    for variable in &class.variables {
        push_variable(symbols, path, variable, index);
    }
    for method in &class.methods {
        push_function(symbols, path, method, index);
    }
    for nested in &class.nested {
        push_class(symbols, path, nested, index);
    }
}

fn push_function(symbols: &mut Vec<Symbol>, path: &str, function: &FunctionDecl, parent: usize) {
    let index = symbols.len();
    symbols.push(Symbol {
        name: function.name.clone(),
        kind: SymbolKind::Function,
        file_path: path.to_string(),
        line: function.line,
        end_line: function.end_line,
        parent: Some(parent),
        metadata: function_metadata(function),
    });
    for nested in &function.nested {
        push_function(symbols, path, nested, index);
    }
}

fn push_variable(symbols: &mut Vec<Symbol>, path: &str, variable: &VariableDecl, parent: usize) {
    symbols.push(Symbol {
        name: variable.name.clone(),
        kind: SymbolKind::Variable,
        file_path: path.to_string(),
        line: variable.line,
        end_line: variable.line,
        parent: Some(parent),
        metadata: json!({
            "annotation": variable.annotation,
            "value": variable.value,
            "scope": variable.scope,
        }),
    });
}

fn function_metadata(function: &FunctionDecl) -> Value {
    json!({
        "decorators": function.decorators,
        "parameters": function.parameters,
        "return_type": function.return_type,
        "docstring": function.docstring,
        "is_async": function.is_async,
        "is_method": function.is_method,
        "is_static": function.is_static,
        "is_classmethod": function.is_classmethod,
        "is_property": function.is_property,
        "is_generator": function.is_generator,
        "is_async_generator": function.is_async_generator,
        "await_count": function.await_count,
    })
}

/// Cut `text` to [`SNAPSHOT_LIMIT`] characters, marking the cut with `...`.
pub fn snapshot(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(SNAPSHOT_LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
