//! Python symbol extractor using tree-sitter
//!
//! Python is extracted strictly: a tree containing syntax errors is rejected
//! as a whole, so a broken file contributes no symbols at all.

use super::{
    MAX_NESTING, bound_names, clean_docstring, count_within, end_line, field_text, named_children,
    start_line, text, walk,
};
use crate::extractor::SymbolExtractor;
use crate::facts::{
    AnonymousFunction, ClassDecl, ExceptionHandler, FileFacts, FunctionDecl, ParamKind, Parameter,
    ResourceBlock, VariableDecl, VariableScope, snapshot,
};
use crate::parser_pool::{self, Grammar};
use anyhow::{Result, bail};
use std::collections::HashMap;
use std::path::Path;
use strata_core::{Dependency, DependencyKind, Language};
use tree_sitter::Node;

/// Modules treated as standard library when flagging external references.
const STDLIB_MODULES: &[&str] = &[
    "__future__", "abc", "argparse", "array", "asyncio", "base64", "bisect", "collections",
    "concurrent", "contextlib", "copy", "csv", "dataclasses", "datetime", "decimal", "email",
    "enum", "fnmatch", "fractions", "functools", "glob", "gzip", "hashlib", "heapq", "hmac",
    "html", "http", "inspect", "io", "itertools", "json", "logging", "math", "multiprocessing",
    "operator", "os", "pathlib", "pickle", "platform", "queue", "random", "re", "secrets",
    "shutil", "signal", "socket", "sqlite3", "statistics", "string", "struct", "subprocess",
    "sys", "tarfile", "tempfile", "textwrap", "threading", "time", "traceback", "types",
    "typing", "unittest", "urllib", "uuid", "warnings", "weakref", "xml", "zipfile",
];

/// Scopes that own their own yields and awaits.
const SCOPE_BARRIERS: &[&str] = &["function_definition", "class_definition", "lambda"];

/// Compound statements whose blocks still belong to the enclosing module or
/// class scope.
const SCOPE_BLOCKS: &[&str] = &[
    "block",
    "if_statement",
    "elif_clause",
    "else_clause",
    "try_statement",
    "except_clause",
    "except_group_clause",
    "finally_clause",
    "with_statement",
    "for_statement",
    "while_statement",
];

pub struct PythonExtractor;

impl SymbolExtractor for PythonExtractor {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extract(&self, path: &Path, source: &str) -> Result<FileFacts> {
        let tree = parser_pool::parse(Grammar::Python, source)?;
        let root = tree.root_node();
        if root.has_error() {
            bail!("{} has syntax errors", path.display());
        }

        let src = source.as_bytes();
        let mut facts = FileFacts::new(Language::Python, source);

        for node in scope_statements(root) {
            let (definition, decorators) = unwrap_decorated(node, src);
            match definition.kind() {
                "function_definition" => {
                    facts.functions.push(function(definition, decorators, false, 0, src));
                }
                "class_definition" => facts.classes.push(class(definition, decorators, 0, src)),
                "expression_statement" => {
                    facts.variables.extend(variables(definition, VariableScope::Module, src));
                }
                _ => {}
            }
        }

        let path_str = path.to_string_lossy().replace('\\', "/");
        let mut deps = DependencyCollector::new(&path_str, src);
        deps.collect_imports(root);
        deps.collect_usages(root);
        facts.dependencies = deps.finish();

        collect_patterns(root, src, &mut facts);
        Ok(facts)
    }
}

/// Statements of a module or class body in source order, including those
/// inside conditional, `try`, `with` and loop blocks.
fn scope_statements(body: Node) -> Vec<Node> {
    let mut statements = Vec::new();
    walk(body, |node| {
        if node == body || SCOPE_BLOCKS.contains(&node.kind()) {
            return true;
        }
        statements.push(node);
        false
    });
    statements
}

/// Split a `decorated_definition` into its definition and decorator texts.
fn unwrap_decorated<'t>(node: Node<'t>, src: &[u8]) -> (Node<'t>, Vec<String>) {
    if node.kind() != "decorated_definition" {
        return (node, Vec::new());
    }
    let decorators = named_children(node)
        .into_iter()
        .filter(|c| c.kind() == "decorator")
        .filter_map(|d| named_children(d).into_iter().next())
        .map(|expr| text(expr, src).to_string())
        .collect();
    match node.child_by_field_name("definition") {
        Some(definition) => (definition, decorators),
        None => (node, decorators),
    }
}

/// Decorator name without call arguments or module qualifier.
fn decorator_name(decorator: &str) -> &str {
    let bare = decorator.split('(').next().unwrap_or(decorator).trim();
    bare.rsplit('.').next().unwrap_or(bare)
}

fn docstring(body: Option<Node>, src: &[u8]) -> Option<String> {
    let first = named_children(body?)
        .into_iter()
        .find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let string = named_children(first).into_iter().next()?;
    if string.kind() != "string" {
        return None;
    }
    clean_docstring(text(string, src))
}

fn function(
    node: Node,
    decorators: Vec<String>,
    is_method: bool,
    depth: usize,
    src: &[u8],
) -> FunctionDecl {
    let body = node.child_by_field_name("body");
    let is_async = node.child(0).is_some_and(|c| c.kind() == "async");
    let is_generator = body.is_some_and(|b| count_within(b, &["yield"], SCOPE_BARRIERS) > 0);
    let names: Vec<&str> = decorators.iter().map(|d| decorator_name(d)).collect();

    let nested = body
        .filter(|_| depth < MAX_NESTING)
        .map(|b| {
            named_children(b)
                .into_iter()
                .map(|child| unwrap_decorated(child, src))
                .filter(|(def, _)| def.kind() == "function_definition")
                .map(|(def, decorators)| function(def, decorators, false, depth + 1, src))
                .collect()
        })
        .unwrap_or_default();

    FunctionDecl {
        name: field_text(node, "name", src).unwrap_or_default(),
        line: start_line(node),
        end_line: end_line(node),
        parameters: node
            .child_by_field_name("parameters")
            .map(|p| parameters(p, src))
            .unwrap_or_default(),
        return_type: field_text(node, "return_type", src),
        docstring: docstring(body, src),
        is_async,
        is_method,
        is_static: names.contains(&"staticmethod"),
        is_classmethod: names.contains(&"classmethod"),
        is_property: decorators.iter().any(|d| {
            matches!(decorator_name(d), "property" | "cached_property")
                || d.ends_with(".setter")
                || d.ends_with(".getter")
                || d.ends_with(".deleter")
        }),
        is_generator,
        is_async_generator: is_async && is_generator,
        await_count: body.map_or(0, |b| count_within(b, &["await"], SCOPE_BARRIERS)),
        nested,
        decorators,
    }
}

fn parameters(node: Node, src: &[u8]) -> Vec<Parameter> {
    let mut params = Vec::new();
    let mut keyword_only = false;

    for child in named_children(node) {
        let plain = if keyword_only {
            ParamKind::KeywordOnly
        } else {
            ParamKind::Positional
        };
        match child.kind() {
            "identifier" => params.push(Parameter::new(text(child, src), plain)),
            "default_parameter" | "typed_default_parameter" => {
                let mut param = Parameter::new(field_text(child, "name", src).unwrap_or_default(), plain);
                param.annotation = field_text(child, "type", src);
                param.default = field_text(child, "value", src);
                params.push(param);
            }
            "typed_parameter" => {
                let Some(target) = named_children(child).into_iter().next() else {
                    continue;
                };
                let mut param = splat(target, src)
                    .unwrap_or_else(|| Parameter::new(text(target, src), plain));
                param.annotation = field_text(child, "type", src);
                if param.kind == ParamKind::VarPositional {
                    keyword_only = true;
                }
                params.push(param);
            }
            "list_splat_pattern" | "dictionary_splat_pattern" => {
                if let Some(param) = splat(child, src) {
                    if param.kind == ParamKind::VarPositional {
                        keyword_only = true;
                    }
                    params.push(param);
                }
            }
            "keyword_separator" => keyword_only = true,
            "positional_separator" => {
                for param in params.iter_mut() {
                    param.kind = ParamKind::PositionalOnly;
                }
            }
            _ => {}
        }
    }
    params
}

fn splat(node: Node, src: &[u8]) -> Option<Parameter> {
    let kind = match node.kind() {
        "list_splat_pattern" => ParamKind::VarPositional,
        "dictionary_splat_pattern" => ParamKind::VarKeyword,
        _ => return None,
    };
    let name = named_children(node).into_iter().next()?;
    Some(Parameter::new(text(name, src), kind))
}

fn class(node: Node, decorators: Vec<String>, depth: usize, src: &[u8]) -> ClassDecl {
    let body = node.child_by_field_name("body");
    let mut bases = Vec::new();
    let mut abstract_meta = false;
    if let Some(superclasses) = node.child_by_field_name("superclasses") {
        for arg in named_children(superclasses) {
            if arg.kind() == "keyword_argument" {
                abstract_meta |= field_text(arg, "name", src).as_deref() == Some("metaclass")
                    && field_text(arg, "value", src)
                        .is_some_and(|v| v.rsplit('.').next() == Some("ABCMeta"));
            } else if arg.kind() != "comment" {
                bases.push(text(arg, src).to_string());
            }
        }
    }

    let mut decl = ClassDecl {
        name: field_text(node, "name", src).unwrap_or_default(),
        line: start_line(node),
        end_line: end_line(node),
        docstring: docstring(body, src),
        ..Default::default()
    };

    for child in body.map(scope_statements).unwrap_or_default() {
        let (definition, member_decorators) = unwrap_decorated(child, src);
        match definition.kind() {
            "function_definition" => {
                decl.methods.push(function(definition, member_decorators, true, depth, src));
            }
            "class_definition" if depth < MAX_NESTING => {
                decl.nested.push(class(definition, member_decorators, depth + 1, src));
            }
            "expression_statement" => {
                decl.variables.extend(variables(definition, VariableScope::Class, src));
            }
            _ => {}
        }
    }

    let base_name = |b: &String| b.rsplit('.').next().unwrap_or(b).to_string();
    decl.is_abstract = abstract_meta
        || bases.iter().any(|b| base_name(b) == "ABC")
        || decl
            .methods
            .iter()
            .any(|m| m.decorators.iter().any(|d| decorator_name(d) == "abstractmethod"));
    decl.is_record = decorators.iter().any(|d| decorator_name(d) == "dataclass");
    decl.is_exception = bases.iter().map(base_name).any(|b| {
        b == "Exception" || b == "BaseException" || b.ends_with("Error") || b.ends_with("Exception")
    });
    decl.bases = bases;
    decl.decorators = decorators;
    decl
}

/// Simple-name assignments in an expression statement. Chained assignments
/// (`a = b = 0`) yield one variable per name.
fn variables(statement: Node, scope: VariableScope, src: &[u8]) -> Vec<VariableDecl> {
    let Some(mut assignment) = named_children(statement)
        .into_iter()
        .next()
        .filter(|n| n.kind() == "assignment")
    else {
        return Vec::new();
    };

    let mut names = Vec::new();
    let annotation = field_text(assignment, "type", src);
    let value = loop {
        if let Some(left) = assignment.child_by_field_name("left") {
            if left.kind() == "identifier" {
                names.push((text(left, src).to_string(), start_line(left)));
            }
        }
        match assignment.child_by_field_name("right") {
            Some(right) if right.kind() == "assignment" => assignment = right,
            Some(right) => break Some(snapshot(text(right, src))),
            None => break None,
        }
    };

    names
        .into_iter()
        .map(|(name, line)| VariableDecl {
            name,
            annotation: annotation.clone(),
            value: value.clone(),
            scope,
            line,
        })
        .collect()
}

// ── Dependencies ────────────────────────────────────────

fn is_stdlib(module: &str) -> bool {
    let top = module.split('.').next().unwrap_or(module);
    STDLIB_MODULES.contains(&top)
}

struct DependencyCollector<'a> {
    path: &'a str,
    src: &'a [u8],
    /// Imported name or alias → module it came from.
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
            Some(module) => is_stdlib(module),
            None => self.imported.get(&name).is_some_and(|m| is_stdlib(m)),
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

    fn collect_imports(&mut self, root: Node) {
        walk(root, |node| self.import(node));
    }

    /// Record what `node` imports. Returns whether its children may hold more.
    fn import(&mut self, node: Node) -> bool {
        match node.kind() {
            "import_statement" => {
                let line = start_line(node);
                let mut cursor = node.walk();
                let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
                for name in names {
                    let (dotted, alias) = split_alias(name, self.src);
                    self.imported.insert(dotted.clone(), dotted.clone());
                    if let Some(alias) = alias {
                        self.imported.insert(alias, dotted.clone());
                    }
                    self.push(dotted.clone(), Some(dotted), DependencyKind::Import, line);
                }
                false
            }
            "import_from_statement" => {
                let line = start_line(node);
                let module = field_text(node, "module_name", self.src).unwrap_or_default();
                let mut cursor = node.walk();
                let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
                for name in names {
                    let (imported, alias) = split_alias(name, self.src);
                    self.imported.insert(imported.clone(), module.clone());
                    if let Some(alias) = alias {
                        self.imported.insert(alias, module.clone());
                    }
                    self.push(imported, Some(module.clone()), DependencyKind::Import, line);
                }
                false
            }
            _ => true,
        }
    }

    fn collect_usages(&mut self, root: Node) {
        walk(root, |node| {
            self.usage(node);
            true
        });
    }

    fn usage(&mut self, node: Node) {
        match node.kind() {
            "call" => {
                if let Some(name) = node
                    .child_by_field_name("function")
                    .and_then(|f| callee_name(f, self.src))
                {
                    let line = start_line(node);
                    if self.imported.contains_key(&name) {
                        self.push(name.clone(), None, DependencyKind::Call, line);
                    }
                    if name.starts_with(|c: char| c.is_uppercase()) {
                        self.push(name, None, DependencyKind::Instantiation, line);
                    }
                }
            }
            "function_definition" => {
                if let Some(returns) = node.child_by_field_name("return_type") {
                    self.type_references(returns, start_line(node));
                }
            }
            "typed_parameter" | "typed_default_parameter" | "assignment" => {
                if let Some(annotation) = node.child_by_field_name("type") {
                    self.type_references(annotation, start_line(node));
                }
            }
            _ => {}
        }
    }

    fn type_references(&mut self, annotation: Node, line: u32) {
        let mut names = Vec::new();
        type_names(annotation, self.src, &mut names);
        for name in names {
            if self.imported.contains_key(&name) {
                self.push(name, None, DependencyKind::TypeReference, line);
            }
        }
    }

    fn finish(self) -> Vec<Dependency> {
        self.deps
    }
}

/// `a.b as c` → (`a.b`, Some(`c`)); `a.b` → (`a.b`, None).
fn split_alias(node: Node, src: &[u8]) -> (String, Option<String>) {
    if node.kind() == "aliased_import" {
        (
            field_text(node, "name", src).unwrap_or_default(),
            field_text(node, "alias", src),
        )
    } else {
        (text(node, src).to_string(), None)
    }
}

fn callee_name(mut function: Node, src: &[u8]) -> Option<String> {
    loop {
        match function.kind() {
            "identifier" => return Some(text(function, src).to_string()),
            "attribute" => return field_text(function, "attribute", src),
            "subscript" => function = function.child_by_field_name("value")?,
            _ => return None,
        }
    }
}

fn type_names(node: Node, src: &[u8], names: &mut Vec<String>) {
    walk(node, |current| match current.kind() {
        "identifier" => {
            names.push(text(current, src).to_string());
            false
        }
        "attribute" => {
            names.extend(field_text(current, "attribute", src));
            false
        }
        "string" => false,
        _ => true,
    });
}

// ── Patterns ────────────────────────────────────────────

fn collect_patterns(root: Node, src: &[u8], facts: &mut FileFacts) {
    walk(root, |node| {
        pattern(node, src, facts);
        true
    });
}

fn pattern(node: Node, src: &[u8], facts: &mut FileFacts) {
    match node.kind() {
        "except_clause" | "except_group_clause" => {
            facts.patterns.exception_handlers.push(exception_handler(node, src));
        }
        "with_statement" => {
            let line = start_line(node);
            let items = named_children(node)
                .into_iter()
                .filter(|c| c.kind() == "with_clause")
                .flat_map(named_children)
                .filter(|c| c.kind() == "with_item");
            for item in items {
                if let Some(block) = resource_block(item, line, src) {
                    facts.patterns.resource_blocks.push(block);
                }
            }
        }
        "lambda" => {
            let params = node
                .child_by_field_name("parameters")
                .map(|p| {
                    named_children(p)
                        .into_iter()
                        .filter_map(|param| match param.kind() {
                            "identifier" => Some(text(param, src).to_string()),
                            "default_parameter" => field_text(param, "name", src),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default();
            facts.patterns.anonymous_functions.push(AnonymousFunction {
                params,
                body: field_text(node, "body", src)
                    .map(|b| snapshot(&b))
                    .unwrap_or_default(),
                line: start_line(node),
            });
        }
        _ => {}
    }
}

fn exception_handler(node: Node, src: &[u8]) -> ExceptionHandler {
    let parts: Vec<Node> = named_children(node)
        .into_iter()
        .filter(|c| !matches!(c.kind(), "block" | "comment"))
        .collect();

    let (caught, binding) = match parts.first() {
        Some(first) if first.kind() == "as_pattern" => {
            let target = first
                .child_by_field_name("alias")
                .or_else(|| named_children(*first).into_iter().last());
            (
                named_children(*first).into_iter().next(),
                target.map(|t| text(t, src).to_string()),
            )
        }
        Some(first) => (Some(*first), parts.get(1).map(|b| text(*b, src).to_string())),
        None => (None, None),
    };

    let types = match caught {
        Some(expr) if matches!(expr.kind(), "tuple" | "parenthesized_expression") => {
            let inner: Vec<Node> = named_children(expr)
                .into_iter()
                .flat_map(|c| if c.kind() == "tuple" { named_children(c) } else { vec![c] })
                .collect();
            inner.iter().map(|t| text(*t, src).to_string()).collect()
        }
        Some(expr) => vec![text(expr, src).to_string()],
        None => Vec::new(),
    };

    ExceptionHandler {
        types,
        binding,
        line: start_line(node),
    }
}

fn resource_block(item: Node, line: u32, src: &[u8]) -> Option<ResourceBlock> {
    let value = item.child_by_field_name("value")?;
    if value.kind() != "as_pattern" {
        let mut bindings = Vec::new();
        if let Some(alias) = item.child_by_field_name("alias") {
            bound_names(alias, src, &mut bindings);
        }
        return Some(ResourceBlock {
            expr: snapshot(text(value, src)),
            bindings,
            line,
        });
    }
    let expr = named_children(value).into_iter().next()?;
    let mut bindings = Vec::new();
    if let Some(target) = value
        .child_by_field_name("alias")
        .or_else(|| named_children(value).into_iter().last())
    {
        bound_names(target, src, &mut bindings);
    }
    Some(ResourceBlock {
        expr: snapshot(text(expr, src)),
        bindings,
        line,
    })
}
