//! Regex-based dependency strategies

use super::package_name;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

// ── JavaScript / TypeScript ─────────────────────────────

static JS_IMPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\bimport\s+(?:type\s+)?(?:[\w$]+\s*,\s*)?(?:[\w$]+|\{[^}]*\}|\*\s*as\s+[\w$]+)\s*from\s*['"]([^'"]+)['"]"#,
    )
    .expect("valid regex")
});
static JS_IMPORT_BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bimport\s*['"]([^'"]+)['"]"#).expect("valid regex"));
static JS_IMPORT_DYNAMIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid regex")
});
static JS_REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\s*\(\s*['"]([^'"]+)['"]\s*\)"#).expect("valid regex")
});
static JS_EXPORT_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\bexport\s+(?:type\s+)?(?:\*(?:\s*as\s+[\w$]+)?|\{[^}]*\})\s*from\s*['"]([^'"]+)['"]"#,
    )
    .expect("valid regex")
});

// ── Go ──────────────────────────────────────────────────

static GO_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)\bimport\s+(?:[\w.]+\s+)?"([^"]+)""#).expect("valid regex")
});
static GO_IMPORT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\bimport\s*\((.*?)\)").expect("valid regex"));
static GO_BLOCK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(?:[\w.]+\s+)?"([^"]+)""#).expect("valid regex")
});

// ── Rust ────────────────────────────────────────────────

static RUST_USE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+(?:::)?([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid regex")
});
static RUST_EXTERN_CRATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bextern\s+crate\s+([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex")
});
const RUST_BUILTIN: &[&str] = &["std", "core", "alloc", "crate", "self", "super"];

// ── JVM, Ruby, C family, C#, PHP ────────────────────────

static JAVA_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*import\s+(static\s+)?([\w.]+\*?)").expect("valid regex")
});
static RUBY_REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\s*\(?\s*['"]([^'"]+)['"]"#).expect("valid regex")
});
static C_INCLUDE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*#\s*include\s*[<"]([^>"]+)[>"]"#).expect("valid regex")
});
static CSHARP_USING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:global\s+)?using\s+(?:static\s+)?([A-Za-z_][\w.]*)\s*;")
        .expect("valid regex")
});
static PHP_USE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*use\s+(?:function\s+|const\s+)?\\?([A-Za-z_][\w\\]*)").expect("valid regex")
});
static PHP_REQUIRE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:require|include)(?:_once)?\s*\(?\s*['"]([^'"]+)['"]"#).expect("valid regex")
});

// ── Generic fallback ────────────────────────────────────

static GENERIC: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"(?i)(?:import|from|include)\s+["']([^"']+)["']"#,
        r#"(?i)#include\s*[<"]([^>"]+)[>"]"#,
        r#"(?i)@import\s+["']([^"']+)["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Generic matches this short are discarded as noise.
const GENERIC_MIN_LEN: usize = 3;

fn captures<'a>(re: &Regex, source: &'a str, group: usize) -> impl Iterator<Item = &'a str> {
    re.captures_iter(source)
        .filter_map(move |c| c.get(group).map(|m| m.as_str()))
}

pub(super) fn javascript(source: &str) -> BTreeSet<String> {
    [&JS_IMPORT_FROM, &JS_IMPORT_BARE, &JS_IMPORT_DYNAMIC, &JS_REQUIRE, &JS_EXPORT_FROM]
        .into_iter()
        .flat_map(|re| captures(re, source, 1))
        .filter_map(package_name)
        .collect()
}

pub(super) fn go(source: &str) -> BTreeSet<String> {
    let mut deps: BTreeSet<String> = captures(&GO_IMPORT, source, 1)
        .filter_map(package_name)
        .collect();
    for block in captures(&GO_IMPORT_BLOCK, source, 1) {
        deps.extend(captures(&GO_BLOCK_LINE, block, 1).filter_map(package_name));
    }
    deps
}

pub(super) fn rust(source: &str) -> BTreeSet<String> {
    captures(&RUST_USE, source, 1)
        .chain(captures(&RUST_EXTERN_CRATE, source, 1))
        .filter(|name| !RUST_BUILTIN.contains(name))
        .map(str::to_string)
        .collect()
}

/// JVM imports resolve to the imported type's simple name, which is what
/// file names are built from. Static member imports resolve to their owning
/// type; package wildcards to the last package segment.
pub(super) fn java(source: &str) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    for caps in JAVA_IMPORT.captures_iter(source) {
        let is_static = caps.get(1).is_some();
        let Some(path) = caps.get(2).map(|m| m.as_str()) else {
            continue;
        };
        if path.starts_with("java.lang.") {
            continue;
        }
        let wildcard = path.ends_with('*');
        let path = path.trim_end_matches('*').trim_end_matches('.');
        let mut segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        if is_static && !wildcard {
            segments.pop();
        }
        if let Some(name) = segments.last() {
            deps.insert(name.to_string());
        }
    }
    deps
}

pub(super) fn ruby(source: &str) -> BTreeSet<String> {
    captures(&RUBY_REQUIRE, source, 1)
        .filter_map(package_name)
        .collect()
}

pub(super) fn c(source: &str) -> BTreeSet<String> {
    captures(&C_INCLUDE, source, 1)
        .filter_map(package_name)
        .collect()
}

pub(super) fn csharp(source: &str) -> BTreeSet<String> {
    captures(&CSHARP_USING, source, 1)
        .filter_map(|ns| ns.split('.').next())
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .collect()
}

pub(super) fn php(source: &str) -> BTreeSet<String> {
    let mut deps: BTreeSet<String> = captures(&PHP_USE, source, 1)
        .filter_map(|ns| ns.split('\\').next())
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .collect();
    deps.extend(captures(&PHP_REQUIRE, source, 1).filter_map(package_name));
    deps
}

pub(super) fn generic(source: &str) -> BTreeSet<String> {
    GENERIC
        .iter()
        .flat_map(|re| captures(re, source, 1))
        .filter_map(|spec| spec.split(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| name.len() >= GENERIC_MIN_LEN)
        .map(str::to_string)
        .collect()
}
