//! JavaScript and TypeScript symbol extractor using tree-sitter
//!
//! Both grammars recover from syntax errors. `ERROR` subtrees are skipped and
//! everything around them is still extracted.

use super::{
    MAX_NESTING, count_within, end_line, field_text, has_child_kind, named_children, start_line, text, walk,
};
use crate::extractor::SymbolExtractor;
use crate::facts::{
    AnonymousFunction, ClassDecl, ExceptionHandler, FileFacts, FunctionDecl, ParamKind, Parameter,
    VariableDecl, VariableScope, snapshot,
};
use crate::parser_pool::{self, Grammar};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use strata_core::{Dependency, DependencyKind, Language};
use tree_sitter::Node;

const NODE_BUILTINS: &[&str] = &[
    "assert", "buffer", "child_process", "cluster", "crypto", "dgram", "dns", "events", "fs",
    "http", "http2", "https", "net", "os", "path", "perf_hooks", "process", "querystring",
    "readline", "stream", "string_decoder", "timers", "tls", "url", "util", "v8", "vm",
    "worker_threads", "zlib",
];

const FUNCTION_KINDS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "arrow_function",
    "method_definition",
];

const SCOPE_BARRIERS: &[&str] = &[
    "function_declaration",
    "generator_function_declaration",
    "function_expression",
    "function",
    "generator_function",
    "arrow_function",
    "method_definition",
    "class_declaration",
    "class",
];

pub struct JavaScriptExtractor {
    grammar: Grammar,
}

impl JavaScriptExtractor {
    pub fn new(grammar: Grammar) -> Self {
        Self { grammar }
    }
}

impl SymbolExtractor for JavaScriptExtractor {
    fn language(&self) -> Language {
        match self.grammar {
            Grammar::JavaScript => Language::JavaScript,
            _ => Language::TypeScript,
        }
    }

    fn extract(&self, path: &Path, source: &str) -> Result<FileFacts> {
        let tree = parser_pool::parse(self.grammar, source)?;
        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!("{} has syntax errors; extracting what parsed", path.display());
        }

        let src = source.as_bytes();
        let mut facts = FileFacts::new(self.language(), source);
        for statement in named_children(root) {
            top_level(statement, &mut facts, src);
        }

        let path_str = path.to_string_lossy().replace('\\', "/");
        let mut deps = DependencyCollector::new(&path_str, src);
        deps.collect_imports(root);
        deps.collect_usages(root);
        facts.dependencies = deps.deps;

        collect_patterns(root, src, &mut facts);
        Ok(facts)
    }
}

fn top_level(statement: Node, facts: &mut FileFacts, src: &[u8]) {
    let node = match statement.kind() {
        "export_statement" => match statement.child_by_field_name("declaration") {
            Some(declaration) => declaration,
            None => return,
        },
        _ => statement,
    };
    match node.kind() {
        "function_declaration" | "generator_function_declaration" => {
            if let Some(name) = field_text(node, "name", src) {
                facts.functions.push(function(node, node, name, false, 0, src));
            }
        }
        "class_declaration" | "abstract_class_declaration" => facts.classes.push(class(node, src)),
        "interface_declaration" => facts.classes.push(interface(node, src)),
        "enum_declaration" => facts.classes.push(enumeration(node, src)),
        "lexical_declaration" | "variable_declaration" => {
            for declarator in named_children(node)
                .into_iter()
                .filter(|d| d.kind() == "variable_declarator")
            {
                let Some(name) = declarator
                    .child_by_field_name("name")
                    .filter(|n| n.kind() == "identifier")
                    .map(|n| text(n, src).to_string())
                else {
                    continue;
                };
                match declarator.child_by_field_name("value") {
                    Some(value) if FUNCTION_KINDS.contains(&value.kind()) => {
                        facts.functions.push(function(value, node, name, false, 0, src));
                    }
                    value => facts.variables.push(VariableDecl {
                        name,
                        annotation: annotation(declarator, src),
                        value: value.map(|v| snapshot(text(v, src))),
                        scope: VariableScope::Module,
                        line: start_line(declarator),
                    }),
                }
            }
        }
        _ => {}
    }
}

/// Text of a `: Type` annotation field, without the colon.
fn annotation(node: Node, src: &[u8]) -> Option<String> {
    field_text(node, "type", src).map(|t| t.trim_start_matches(':').trim().to_string())
}

fn decorators(node: Node, src: &[u8]) -> Vec<String> {
    named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .filter_map(|d| named_children(d).into_iter().next())
        .map(|expr| text(expr, src).to_string())
        .collect()
}

/// The `/** ... */` comment right before a declaration, or before the export
/// statement wrapping it.
fn jsdoc(node: Node, src: &[u8]) -> Option<String> {
    let anchor = match node.parent() {
        Some(parent) if parent.kind() == "export_statement" => parent,
        _ => node,
    };
    let comment = anchor.prev_named_sibling().filter(|c| c.kind() == "comment")?;
    let body = text(comment, src).strip_prefix("/**")?.strip_suffix("*/")?;
    let lines: Vec<&str> = body
        .lines()
        .map(|l| {
            let l = l.trim();
            l.strip_prefix('*').unwrap_or(l).trim()
        })
        .collect();
    let doc = lines.join("\n").trim().to_string();
    if doc.is_empty() { None } else { Some(doc) }
}

/// `node` is the function itself, `span` the statement whose lines it owns.
fn function(
    node: Node,
    span: Node,
    name: String,
    is_method: bool,
    depth: usize,
    src: &[u8],
) -> FunctionDecl {
    let body = node.child_by_field_name("body");
    let is_async = has_child_kind(node, "async");
    let is_generator = node.kind().contains("generator") || has_child_kind(node, "*");
    let is_static = has_child_kind(node, "static");
    let is_property = has_child_kind(node, "get") || has_child_kind(node, "set");

    let nested = body
        .filter(|b| b.kind() == "statement_block" && depth < MAX_NESTING)
        .map(|b| {
            named_children(b)
                .into_iter()
                .filter(|c| matches!(c.kind(), "function_declaration" | "generator_function_declaration"))
                .filter_map(|c| {
                    let name = field_text(c, "name", src)?;
                    Some(function(c, c, name, false, depth + 1, src))
                })
                .collect()
        })
        .unwrap_or_default();

    FunctionDecl {
        name,
        line: start_line(span),
        end_line: end_line(span),
        decorators: decorators(node, src),
        parameters: parameters(node, src),
        return_type: annotation_field(node, "return_type", src),
        docstring: jsdoc(span, src),
        is_async,
        is_method,
        is_static,
        is_classmethod: false,
        is_property,
        is_generator,
        is_async_generator: is_async && is_generator,
        await_count: body.map_or(0, |b| count_within(b, &["await_expression"], SCOPE_BARRIERS)),
        nested,
    }
}

fn annotation_field(node: Node, field: &str, src: &[u8]) -> Option<String> {
    field_text(node, field, src).map(|t| t.trim_start_matches(':').trim().to_string())
}

fn parameters(node: Node, src: &[u8]) -> Vec<Parameter> {
    if let Some(single) = node.child_by_field_name("parameter") {
        return vec![Parameter::new(text(single, src), ParamKind::Positional)];
    }
    let Some(list) = node.child_by_field_name("parameters") else {
        return Vec::new();
    };
    named_children(list)
        .into_iter()
        .filter_map(|p| parameter(p, src))
        .collect()
}

fn parameter(node: Node, src: &[u8]) -> Option<Parameter> {
    match node.kind() {
        "identifier" | "object_pattern" | "array_pattern" => {
            Some(Parameter::new(snapshot(text(node, src)), ParamKind::Positional))
        }
        "assignment_pattern" => {
            let mut param = Parameter::new(
                field_text(node, "left", src).unwrap_or_default(),
                ParamKind::Positional,
            );
            param.default = field_text(node, "right", src);
            Some(param)
        }
        "rest_pattern" => {
            let name = named_children(node).into_iter().next()?;
            Some(Parameter::new(text(name, src), ParamKind::VarPositional))
        }
        "required_parameter" | "optional_parameter" => {
            let pattern = node.child_by_field_name("pattern")?;
            let mut param = if pattern.kind() == "rest_pattern" {
                parameter(pattern, src)?
            } else {
                Parameter::new(text(pattern, src), ParamKind::Positional)
            };
            param.annotation = annotation(node, src);
            param.default = field_text(node, "value", src);
            Some(param)
        }
        _ => None,
    }
}

fn heritage(node: Node, src: &[u8]) -> Vec<String> {
    let mut bases = Vec::new();
    for clause in named_children(node)
        .into_iter()
        .filter(|c| matches!(c.kind(), "class_heritage" | "extends_type_clause"))
    {
        for part in named_children(clause) {
            match part.kind() {
                "extends_clause" | "implements_clause" | "extends_type_clause" => {
                    bases.extend(
                        named_children(part)
                            .into_iter()
                            .filter(|t| t.kind() != "type_arguments")
                            .map(|t| text(t, src).to_string()),
                    );
                }
                "comment" => {}
                _ => bases.push(text(part, src).to_string()),
            }
        }
    }
    bases
}

fn class(node: Node, src: &[u8]) -> ClassDecl {
    let bases = heritage(node, src);
    let mut decl = ClassDecl {
        name: field_text(node, "name", src).unwrap_or_default(),
        line: start_line(node),
        end_line: end_line(node),
        decorators: decorators(node, src),
        docstring: jsdoc(node, src),
        is_abstract: node.kind() == "abstract_class_declaration",
        is_exception: bases.iter().any(|b| {
            let b = b.rsplit('.').next().unwrap_or(b);
            b.ends_with("Error") || b.ends_with("Exception")
        }),
        bases,
        ..Default::default()
    };

    let members = node
        .child_by_field_name("body")
        .map(named_children)
        .unwrap_or_default();
    for member in members {
        match member.kind() {
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                decl.is_abstract |= member.kind() == "abstract_method_signature";
                let name = field_text(member, "name", src).unwrap_or_default();
                decl.methods.push(function(member, member, name, true, 0, src));
            }
            "field_definition" | "public_field_definition" => {
                let Some(name) = field_text(member, "property", src)
                    .or_else(|| field_text(member, "name", src))
                else {
                    continue;
                };
                match member.child_by_field_name("value") {
                    Some(value) if FUNCTION_KINDS.contains(&value.kind()) => {
                        let mut method = function(value, member, name, true, 0, src);
                        method.is_static = has_child_kind(member, "static");
                        decl.methods.push(method);
                    }
                    value => decl.variables.push(VariableDecl {
                        name,
                        annotation: annotation(member, src),
                        value: value.map(|v| snapshot(text(v, src))),
                        scope: VariableScope::Class,
                        line: start_line(member),
                    }),
                }
            }
            _ => {}
        }
    }
    decl
}

fn interface(node: Node, src: &[u8]) -> ClassDecl {
    let mut decl = ClassDecl {
        name: field_text(node, "name", src).unwrap_or_default(),
        line: start_line(node),
        end_line: end_line(node),
        bases: heritage(node, src),
        docstring: jsdoc(node, src),
        is_abstract: true,
        ..Default::default()
    };
    let members = node
        .child_by_field_name("body")
        .map(named_children)
        .unwrap_or_default();
    for member in members {
        match member.kind() {
            "method_signature" => {
                let name = field_text(member, "name", src).unwrap_or_default();
                decl.methods.push(function(member, member, name, true, 0, src));
            }
            "property_signature" => decl.variables.push(VariableDecl {
                name: field_text(member, "name", src).unwrap_or_default(),
                annotation: annotation(member, src),
                value: None,
                scope: VariableScope::Class,
                line: start_line(member),
            }),
            _ => {}
        }
    }
    decl
}

fn enumeration(node: Node, src: &[u8]) -> ClassDecl {
    let variables = node
        .child_by_field_name("body")
        .map(named_children)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|member| {
            let (name, value) = match member.kind() {
                "property_identifier" => (text(member, src).to_string(), None),
                "enum_assignment" => (
                    field_text(member, "name", src).or_else(|| {
                        named_children(member)
                            .first()
                            .map(|n| text(*n, src).to_string())
                    })?,
                    field_text(member, "value", src).map(|v| snapshot(&v)),
                ),
                _ => return None,
            };
            Some(VariableDecl {
                name,
                annotation: None,
                value,
                scope: VariableScope::Class,
                line: start_line(member),
            })
        })
        .collect();
    ClassDecl {
        name: field_text(node, "name", src).unwrap_or_default(),
        line: start_line(node),
        end_line: end_line(node),
        docstring: jsdoc(node, src),
        variables,
        ..Default::default()
    }
}

// ── Dependencies ────────────────────────────────────────

fn unquote(node: Node, src: &[u8]) -> String {
    text(node, src).trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

fn is_builtin(module: &str) -> bool {
    module.starts_with("node:") || NODE_BUILTINS.contains(&module.split('/').next().unwrap_or(module))
}

struct DependencyCollector<'a> {
    path: &'a str,
    src: &'a [u8],
    imported: HashMap<String, String>,
    deps: Vec<Dependency>,
}

impl<'a> DependencyCollector<'a> {
    fn new(path: &'a str, src: &'a [u8]) -> Self {
        DependencyCollector {
            path,
            src,
            imported: HashMap::new(),
            deps: Vec::new(),
        }
    }

    fn push(&mut self, name: String, module: Option<String>, kind: DependencyKind, line: u32) {
        let is_external = match &module {
            Some(module) => is_builtin(module),
            None => self.imported.get(&name).is_some_and(|m| is_builtin(m)),
        };
        self.deps.push(Dependency {
            source_file: self.path.to_string(),
            name,
            module,
            kind,
            line,
            is_external,
        });
    }

    fn bind(&mut self, name: String, alias: Option<String>, module: &str, line: u32) {
        self.imported.insert(name.clone(), module.to_string());
        if let Some(alias) = alias {
            self.imported.insert(alias, module.to_string());
        }
        self.push(name, Some(module.to_string()), DependencyKind::Import, line);
    }

    fn collect_imports(&mut self, root: Node) {
        walk(root, |node| self.import(node));
    }

    /// Record what `node` imports. Returns whether its children may hold more.
    fn import(&mut self, node: Node) -> bool {
        if node.is_error() {
            return false;
        }
        let line = start_line(node);
        match node.kind() {
            "import_statement" => {
                let Some(module) = node.child_by_field_name("source").map(|s| unquote(s, self.src))
                else {
                    return false;
                };
                let clause = named_children(node)
                    .into_iter()
                    .find(|c| c.kind() == "import_clause");
                let Some(clause) = clause else {
                    self.bind(module.clone(), None, &module, line);
                    return false;
                };
                for part in named_children(clause) {
                    match part.kind() {
                        "identifier" => self.bind(text(part, self.src).to_string(), None, &module, line),
                        "namespace_import" => {
                            for id in named_children(part) {
                                self.bind(text(id, self.src).to_string(), None, &module, line);
                            }
                        }
                        "named_imports" => {
                            for spec in named_children(part)
                                .into_iter()
                                .filter(|s| s.kind() == "import_specifier")
                            {
                                let Some(name) = field_text(spec, "name", self.src) else {
                                    continue;
                                };
                                let alias = field_text(spec, "alias", self.src);
                                self.bind(name, alias, &module, line);
                            }
                        }
                        _ => {}
                    }
                }
                return false;
            }
            "export_statement" => {
                if let Some(module) = node.child_by_field_name("source").map(|s| unquote(s, self.src)) {
                    self.bind(module.clone(), None, &module, line);
                }
            }
            "call_expression" => {
                if let Some(module) = required_module(node, self.src) {
                    let binding = node
                        .parent()
                        .filter(|p| p.kind() == "variable_declarator")
                        .and_then(|p| p.child_by_field_name("name"))
                        .filter(|n| n.kind() == "identifier")
                        .map(|n| text(n, self.src).to_string());
                    self.bind(module.clone(), binding, &module, line);
                }
            }
            _ => {}
        }
        true
    }

    fn collect_usages(&mut self, root: Node) {
        walk(root, |node| self.usage(node));
    }

    fn usage(&mut self, node: Node) -> bool {
        if node.is_error() {
            return false;
        }
        match node.kind() {
            "call_expression" => {
                if let Some(name) = node
                    .child_by_field_name("function")
                    .and_then(|f| callee_name(f, self.src))
                {
                    if self.imported.contains_key(&name) {
                        self.push(name, None, DependencyKind::Call, start_line(node));
                    }
                }
            }
            "new_expression" => {
                if let Some(name) = node
                    .child_by_field_name("constructor")
                    .and_then(|f| callee_name(f, self.src))
                {
                    self.push(name, None, DependencyKind::Instantiation, start_line(node));
                }
            }
            "type_identifier" => {
                let is_declared_name = node
                    .parent()
                    .and_then(|p| p.child_by_field_name("name"))
                    .is_some_and(|n| n.id() == node.id());
                let name = text(node, self.src).to_string();
                if !is_declared_name && self.imported.contains_key(&name) {
                    self.push(name, None, DependencyKind::TypeReference, start_line(node));
                }
            }
            _ => {}
        }
        true
    }
}

/// Module named by `require('x')` or `import('x')`.
fn required_module(call: Node, src: &[u8]) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    let is_loader = function.kind() == "import"
        || (function.kind() == "identifier" && text(function, src) == "require");
    if !is_loader {
        return None;
    }
    let arguments = call.child_by_field_name("arguments")?;
    let first = named_children(arguments).into_iter().next()?;
    (first.kind() == "string").then(|| unquote(first, src))
}

fn callee_name(function: Node, src: &[u8]) -> Option<String> {
    match function.kind() {
        "identifier" => Some(text(function, src).to_string()),
        "member_expression" => field_text(function, "property", src),
        _ => None,
    }
}

// ── Patterns ────────────────────────────────────────────

fn collect_patterns(root: Node, src: &[u8], facts: &mut FileFacts) {
    walk(root, |node| {
        if node.is_error() {
            return false;
        }
        pattern(node, src, facts);
        true
    });
}

fn pattern(node: Node, src: &[u8], facts: &mut FileFacts) {
    match node.kind() {
        "catch_clause" => facts.patterns.exception_handlers.push(ExceptionHandler {
            types: annotation(node, src).into_iter().collect(),
            binding: field_text(node, "parameter", src),
            line: start_line(node),
        }),
        "arrow_function" | "function_expression" | "function" | "generator_function" => {
            let named = node.parent().is_some_and(|p| {
                matches!(
                    p.kind(),
                    "variable_declarator" | "field_definition" | "public_field_definition"
                )
            });
            if !named {
                facts.patterns.anonymous_functions.push(AnonymousFunction {
                    params: parameters(node, src).into_iter().map(|p| p.name).collect(),
                    body: field_text(node, "body", src)
                        .map(|b| snapshot(&b))
                        .unwrap_or_default(),
                    line: start_line(node),
                });
            }
        }
        _ => {}
    }
}
