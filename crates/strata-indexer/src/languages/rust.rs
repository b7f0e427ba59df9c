//! Rust symbol extractor using tree-sitter
//!
//! Structs, enums and traits become classes; methods from `impl` blocks are
//! attached to the type they implement when that type is declared in the
//! same file.

use super::{
    MAX_NESTING, count_within, end_line, field_text, has_child_kind, named_children, start_line,
    text, walk,
};
use crate::extractor::SymbolExtractor;
use crate::facts::{
    AnonymousFunction, ClassDecl, FileFacts, FunctionDecl, ParamKind, Parameter, VariableDecl,
    VariableScope, snapshot,
};
use crate::parser_pool::{self, Grammar};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use strata_core::{Dependency, DependencyKind, Language};
use tree_sitter::Node;

const BUILTIN_CRATES: &[&str] = &["std", "core", "alloc"];

const SCOPE_BARRIERS: &[&str] = &["function_item", "closure_expression", "async_block"];

pub struct RustExtractor;

impl SymbolExtractor for RustExtractor {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn extract(&self, path: &Path, source: &str) -> Result<FileFacts> {
        let tree = parser_pool::parse(Grammar::Rust, source)?;
        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!("{} has syntax errors; extracting what parsed", path.display());
        }

        let src = source.as_bytes();
        let mut facts = FileFacts::new(Language::Rust, source);
        let mut impls = Vec::new();
        items(root, 0, src, &mut facts, &mut impls);
        attach_impls(&mut facts, impls);

        let path_str = path.to_string_lossy().replace('\\', "/");
        let mut deps = DependencyCollector::new(&path_str, src);
        deps.collect_imports(root);
        deps.collect_usages(root);
        facts.dependencies = deps.deps;

        collect_closures(root, src, &mut facts);
        Ok(facts)
    }
}

/// Members of one `impl` block, waiting to be attached to their type.
struct ImplBlock {
    type_name: String,
    trait_name: Option<String>,
    methods: Vec<FunctionDecl>,
    constants: Vec<VariableDecl>,
}

fn items(
    container: Node,
    depth: usize,
    src: &[u8],
    facts: &mut FileFacts,
    impls: &mut Vec<ImplBlock>,
) {
    for item in named_children(container) {
        match item.kind() {
            "function_item" => {
                facts.functions.push(function(item, false, 0, src));
            }
            "struct_item" | "enum_item" | "union_item" | "trait_item" => {
                facts.classes.push(type_decl(item, src));
            }
            "const_item" | "static_item" => {
                facts.variables.push(constant(item, VariableScope::Module, src));
            }
            "impl_item" => {
                if let Some(block) = impl_block(item, src) {
                    impls.push(block);
                }
            }
            "mod_item" if depth < MAX_NESTING => {
                if let Some(body) = item.child_by_field_name("body") {
                    items(body, depth + 1, src, facts, impls);
                }
            }
            _ => {}
        }
    }
}

fn attach_impls(facts: &mut FileFacts, impls: Vec<ImplBlock>) {
    for block in impls {
        match facts.classes.iter_mut().find(|c| c.name == block.type_name) {
            Some(class) => {
                if let Some(trait_name) = block.trait_name {
                    class.is_exception |= trait_name == "Error";
                    if !class.bases.contains(&trait_name) {
                        class.bases.push(trait_name);
                    }
                }
                class.methods.extend(block.methods);
                class.variables.extend(block.constants);
            }
            None => {
                facts.functions.extend(block.methods);
                facts.variables.extend(block.constants);
            }
        }
    }
}

/// Path or generic type without its arguments: `fmt::Display<T>` → `Display`.
fn simple_type_name(raw: &str) -> String {
    let base = raw.split('<').next().unwrap_or(raw).trim();
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Attributes and doc comment directly above an item.
fn leading(node: Node, src: &[u8]) -> (Vec<String>, Option<String>) {
    let mut attributes = Vec::new();
    let mut doc_lines = Vec::new();
    let mut current = node.prev_sibling();
    while let Some(sibling) = current {
        match sibling.kind() {
            "attribute_item" => {
                let attribute = named_children(sibling)
                    .into_iter()
                    .find(|c| c.kind() == "attribute")
                    .map(|a| text(a, src).to_string())
                    .unwrap_or_else(|| text(sibling, src).to_string());
                attributes.push(attribute);
            }
            "line_comment" => {
                let comment = text(sibling, src);
                match comment.strip_prefix("///") {
                    Some(line) => doc_lines.push(line.trim().to_string()),
                    None => break,
                }
            }
            _ => break,
        }
        current = sibling.prev_sibling();
    }
    attributes.reverse();
    doc_lines.reverse();
    let doc = doc_lines.join("\n").trim().to_string();
    (attributes, if doc.is_empty() { None } else { Some(doc) })
}

/// Names listed in `derive(...)` attributes.
fn derives(attributes: &[String]) -> Vec<String> {
    attributes
        .iter()
        .filter_map(|a| a.strip_prefix("derive("))
        .flat_map(|list| list.trim_end_matches(')').split(','))
        .map(simple_type_name)
        .filter(|name| !name.is_empty())
        .collect()
}

fn function(node: Node, is_method: bool, depth: usize, src: &[u8]) -> FunctionDecl {
    let (attributes, docstring) = leading(node, src);
    let body = node.child_by_field_name("body");
    let is_async = named_children(node)
        .into_iter()
        .find(|c| c.kind() == "function_modifiers")
        .is_some_and(|m| has_child_kind(m, "async"));

    let mut parameters = Vec::new();
    let mut has_receiver = false;
    if let Some(list) = node.child_by_field_name("parameters") {
        for param in named_children(list) {
            match param.kind() {
                "self_parameter" => {
                    has_receiver = true;
                    let mut receiver = Parameter::new("self", ParamKind::Positional);
                    receiver.annotation = Some(text(param, src).to_string());
                    parameters.push(receiver);
                }
                "parameter" => {
                    let mut p = Parameter::new(
                        field_text(param, "pattern", src).unwrap_or_default(),
                        ParamKind::Positional,
                    );
                    p.annotation = field_text(param, "type", src);
                    parameters.push(p);
                }
                "variadic_parameter" => {
                    parameters.push(Parameter::new("...", ParamKind::VarPositional));
                }
                _ => {}
            }
        }
    }

    let nested = body
        .filter(|_| depth < MAX_NESTING)
        .map(|b| {
            named_children(b)
                .into_iter()
                .filter(|c| c.kind() == "function_item")
                .map(|c| function(c, false, depth + 1, src))
                .collect()
        })
        .unwrap_or_default();

    FunctionDecl {
        name: field_text(node, "name", src).unwrap_or_default(),
        line: start_line(node),
        end_line: end_line(node),
        parameters,
        return_type: field_text(node, "return_type", src),
        docstring,
        is_async,
        is_method,
        is_static: is_method && !has_receiver,
        is_classmethod: false,
        is_property: false,
        is_generator: false,
        is_async_generator: false,
        await_count: body.map_or(0, |b| count_within(b, &["await_expression"], SCOPE_BARRIERS)),
        nested,
        decorators: attributes,
    }
}

fn constant(node: Node, scope: VariableScope, src: &[u8]) -> VariableDecl {
    VariableDecl {
        name: field_text(node, "name", src).unwrap_or_default(),
        annotation: field_text(node, "type", src),
        value: field_text(node, "value", src).map(|v| snapshot(&v)),
        scope,
        line: start_line(node),
    }
}

fn type_decl(node: Node, src: &[u8]) -> ClassDecl {
    let (attributes, docstring) = leading(node, src);
    let derived = derives(&attributes);
    let mut decl = ClassDecl {
        name: field_text(node, "name", src).unwrap_or_default(),
        line: start_line(node),
        end_line: end_line(node),
        docstring,
        is_abstract: node.kind() == "trait_item",
        is_record: node.kind() == "struct_item",
        is_exception: derived.iter().any(|d| d == "Error"),
        ..Default::default()
    };

    if let Some(bounds) = node.child_by_field_name("bounds") {
        decl.bases = named_children(bounds)
            .into_iter()
            .map(|b| simple_type_name(text(b, src)))
            .collect();
    }

    let body = node.child_by_field_name("body");
    for member in body.map(named_children).unwrap_or_default() {
        match member.kind() {
            "function_item" | "function_signature_item" => {
                decl.methods.push(function(member, true, 0, src));
            }
            "const_item" => decl.variables.push(constant(member, VariableScope::Class, src)),
            "enum_variant" | "field_declaration" => decl.variables.push(VariableDecl {
                name: field_text(member, "name", src).unwrap_or_default(),
                annotation: field_text(member, "type", src),
                value: field_text(member, "value", src),
                scope: VariableScope::Class,
                line: start_line(member),
            }),
            _ => {}
        }
    }
    decl.decorators = attributes;
    decl
}

fn impl_block(node: Node, src: &[u8]) -> Option<ImplBlock> {
    let type_name = simple_type_name(&field_text(node, "type", src)?);
    let trait_name = field_text(node, "trait", src).map(|t| simple_type_name(&t));
    let mut block = ImplBlock {
        type_name,
        trait_name,
        methods: Vec::new(),
        constants: Vec::new(),
    };
    let body = node.child_by_field_name("body");
    for member in body.map(named_children).unwrap_or_default() {
        match member.kind() {
            "function_item" => block.methods.push(function(member, true, 0, src)),
            "const_item" => block.constants.push(constant(member, VariableScope::Class, src)),
            _ => {}
        }
    }
    Some(block)
}

// ── Dependencies ────────────────────────────────────────

fn is_builtin(module: &str) -> bool {
    BUILTIN_CRATES.contains(&module.split("::").next().unwrap_or(module))
}

fn join_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else {
        format!("{prefix}::{path}")
    }
}

/// `a::b::C` → (`a::b`, `C`).
fn split_path(path: &str) -> (String, String) {
    match path.rsplit_once("::") {
        Some((module, leaf)) => (module.to_string(), leaf.to_string()),
        None => (String::new(), path.to_string()),
    }
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

    fn import(&mut self, full_path: &str, alias: Option<String>, line: u32) {
        let (mut module, mut name) = split_path(full_path);
        if name == "self" {
            (module, name) = split_path(&module);
            module = join_path(&module, &name);
        }
        if name.is_empty() {
            return;
        }
        let module = if module.is_empty() { name.clone() } else { module };
        self.imported.insert(name.clone(), module.clone());
        if let Some(alias) = alias {
            self.imported.insert(alias, module.clone());
        }
        self.push(name, Some(module), DependencyKind::Import, line);
    }

    fn use_tree(&mut self, tree: Node, line: u32) {
        let mut pending = vec![(tree, String::new())];
        while let Some((node, prefix)) = pending.pop() {
            match node.kind() {
                "identifier" | "crate" | "self" | "super" | "scoped_identifier" => {
                    let path = join_path(&prefix, text(node, self.src));
                    self.import(&path, None, line);
                }
                "use_as_clause" => {
                    let Some(path) = field_text(node, "path", self.src) else {
                        continue;
                    };
                    let alias = field_text(node, "alias", self.src);
                    self.import(&join_path(&prefix, &path), alias, line);
                }
                "use_list" => {
                    for child in named_children(node).into_iter().rev() {
                        pending.push((child, prefix.clone()));
                    }
                }
                "scoped_use_list" => {
                    let prefix = match field_text(node, "path", self.src) {
                        Some(path) => join_path(&prefix, &path),
                        None => prefix,
                    };
                    if let Some(list) = node.child_by_field_name("list") {
                        pending.push((list, prefix));
                    }
                }
                "use_wildcard" => {
                    let path = text(node, self.src).trim_end_matches('*').trim_end_matches("::");
                    let module = join_path(&prefix, path);
                    if !module.is_empty() {
                        self.push(module.clone(), Some(module), DependencyKind::Import, line);
                    }
                }
                _ => {}
            }
        }
    }

    fn collect_imports(&mut self, root: Node) {
        walk(root, |node| {
            if node.is_error() {
                return false;
            }
            match node.kind() {
                "use_declaration" => {
                    if let Some(argument) = node.child_by_field_name("argument") {
                        self.use_tree(argument, start_line(node));
                    }
                    false
                }
                "extern_crate_declaration" => {
                    if let Some(name) = field_text(node, "name", self.src) {
                        let alias = field_text(node, "alias", self.src);
                        self.import(&name, alias, start_line(node));
                    }
                    false
                }
                _ => true,
            }
        });
    }

    fn collect_usages(&mut self, root: Node) {
        walk(root, |node| self.usage(node));
    }

    fn usage(&mut self, node: Node) -> bool {
        if node.is_error() || node.kind() == "use_declaration" {
            return false;
        }
        let line = start_line(node);
        match node.kind() {
            "call_expression" => {
                if let Some(function) = node.child_by_field_name("function") {
                    self.call(function, line);
                }
            }
            "struct_expression" => {
                if let Some(name) = field_text(node, "name", self.src) {
                    self.push(simple_type_name(&name), None, DependencyKind::Instantiation, line);
                }
            }
            "type_identifier" => {
                let is_declared_name = node
                    .parent()
                    .and_then(|p| p.child_by_field_name("name"))
                    .is_some_and(|n| n.id() == node.id());
                let name = text(node, self.src).to_string();
                if !is_declared_name && self.imported.contains_key(&name) {
                    self.push(name, None, DependencyKind::TypeReference, line);
                }
            }
            _ => {}
        }
        true
    }

    fn call(&mut self, function: Node, line: u32) {
        match function.kind() {
            "identifier" => {
                let name = text(function, self.src).to_string();
                if self.imported.contains_key(&name) {
                    self.push(name, None, DependencyKind::Call, line);
                }
            }
            "scoped_identifier" => {
                let owner = field_text(function, "path", self.src).map(|p| simple_type_name(&p));
                let name = field_text(function, "name", self.src).unwrap_or_default();
                match owner {
                    Some(owner) if owner.starts_with(|c: char| c.is_uppercase()) && name == "new" => {
                        self.push(owner, None, DependencyKind::Instantiation, line);
                    }
                    Some(owner) if self.imported.contains_key(&owner) => {
                        self.push(owner, None, DependencyKind::Call, line);
                    }
                    _ if self.imported.contains_key(&name) => {
                        self.push(name, None, DependencyKind::Call, line);
                    }
                    _ => {}
                }
            }
            "field_expression" => {
                if let Some(field) = field_text(function, "field", self.src) {
                    if self.imported.contains_key(&field) {
                        self.push(field, None, DependencyKind::Call, line);
                    }
                }
            }
            "generic_function" => {
                if let Some(inner) = function.child_by_field_name("function") {
                    self.call(inner, line);
                }
            }
            _ => {}
        }
    }
}

// ── Patterns ────────────────────────────────────────────

fn collect_closures(root: Node, src: &[u8], facts: &mut FileFacts) {
    walk(root, |node| {
        if node.is_error() {
            return false;
        }
        if node.kind() == "closure_expression" {
            facts.patterns.anonymous_functions.push(closure(node, src));
        }
        true
    });
}

fn closure(node: Node, src: &[u8]) -> AnonymousFunction {
    let params = node
        .child_by_field_name("parameters")
        .map(|p| {
            named_children(p)
                .into_iter()
                .map(|param| {
                    field_text(param, "pattern", src)
                        .unwrap_or_else(|| text(param, src).to_string())
                })
                .collect()
        })
        .unwrap_or_default();
    AnonymousFunction {
        params,
        body: field_text(node, "body", src)
            .map(|b| snapshot(&b))
            .unwrap_or_default(),
        line: start_line(node),
    }
}
