//! Module-level dependency extraction
//!
//! Each language maps to one [`DependencyStrategy`]. Strategies return the set
//! of top-level package names a file refers to. Relative specifiers are
//! dropped. Extraction never fails: undecodable or unparsable input yields an
//! empty set.

mod patterns;
mod python;

use std::collections::BTreeSet;
use strata_core::{Language, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyStrategy {
    Python,
    JavaScript,
    Go,
    Rust,
    Java,
    Ruby,
    C,
    CSharp,
    Php,
    Generic,
}

impl DependencyStrategy {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::Python => DependencyStrategy::Python,
            Language::JavaScript | Language::TypeScript => DependencyStrategy::JavaScript,
            Language::Go => DependencyStrategy::Go,
            Language::Rust => DependencyStrategy::Rust,
            Language::Java => DependencyStrategy::Java,
            Language::Ruby => DependencyStrategy::Ruby,
            Language::C => DependencyStrategy::C,
            Language::CSharp => DependencyStrategy::CSharp,
            Language::Php => DependencyStrategy::Php,
            Language::Swift | Language::Other => DependencyStrategy::Generic,
        }
    }

    pub fn extract(&self, source: &str) -> BTreeSet<String> {
        match self {
            DependencyStrategy::Python => python::extract(source),
            DependencyStrategy::JavaScript => patterns::javascript(source),
            DependencyStrategy::Go => patterns::go(source),
            DependencyStrategy::Rust => patterns::rust(source),
            DependencyStrategy::Java => patterns::java(source),
            DependencyStrategy::Ruby => patterns::ruby(source),
            DependencyStrategy::C => patterns::c(source),
            DependencyStrategy::CSharp => patterns::csharp(source),
            DependencyStrategy::Php => patterns::php(source),
            DependencyStrategy::Generic => patterns::generic(source),
        }
    }
}

/// Extract dependencies from a file's raw bytes.
pub fn extract_dependencies(file: &SourceFile, bytes: &[u8]) -> BTreeSet<String> {
    let source = match std::str::from_utf8(bytes) {
        Ok(source) => source,
        Err(e) => {
            tracing::debug!("Skipping dependencies of {}: not UTF-8 ({})", file.path, e);
            return BTreeSet::new();
        }
    };
    DependencyStrategy::for_language(file.language).extract(source)
}

/// Top-level package of a path-like specifier: relative and absolute paths
/// are dropped, a leading `@` scope marker is removed, and anything after a
/// version `@` is cut (`@scope/pkg` → `scope`, `lodash@4` → `lodash`).
pub(crate) fn package_name(spec: &str) -> Option<String> {
    let spec = spec.trim();
    if spec.is_empty() || spec.starts_with('.') || spec.starts_with('/') {
        return None;
    }
    let spec = spec.strip_prefix('@').unwrap_or(spec);
    let first = spec.split(['/', '\\']).next()?;
    let name = first.split('@').next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(strategy: DependencyStrategy, source: &str) -> Vec<String> {
        strategy.extract(source).into_iter().collect()
    }

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("react-dom/client").as_deref(), Some("react-dom"));
        assert_eq!(package_name("@angular/core").as_deref(), Some("angular"));
        assert_eq!(package_name("lodash@4.17").as_deref(), Some("lodash"));
        assert_eq!(package_name("./utils"), None);
        assert_eq!(package_name("../lib"), None);
        assert_eq!(package_name("/abs/path"), None);
        assert_eq!(package_name(""), None);
    }

    #[test]
    fn test_python_imports() {
        let source = "import os\nimport numpy.linalg as la, json\nfrom app.models import User\nfrom .local import helper\nfrom . import sibling\nfrom __future__ import annotations\n\ndef f():\n    import requests\n";
        assert_eq!(
            names(DependencyStrategy::Python, source),
            vec!["__future__", "app", "json", "local", "numpy", "os", "requests"]
        );
    }

    #[test]
    fn test_python_deeply_nested_source() {
        let depth = 10_000;
        let source = format!(
            "import os\nTABLE = {}0{}\n\ndef load():\n    import json\n",
            "[".repeat(depth),
            "]".repeat(depth)
        );
        assert_eq!(names(DependencyStrategy::Python, &source), vec!["json", "os"]);
    }

    #[test]
    fn test_python_syntax_error_yields_nothing() {
        assert!(DependencyStrategy::Python.extract("import os\ndef broken(:\n").is_empty());
    }

    #[test]
    fn test_javascript_imports() {
        let source = r#"
import React, { useState } from 'react';
import * as path from "path";
import type { Props } from './types';
import './styles.css';
import 'zone.js';
const lazy = import('chart.js/auto');
const fs = require('fs-extra');
export { helper } from '@acme/utils';
export * from "rxjs/operators";
import {
  a,
  b,
} from 'multi-line';
"#;
        assert_eq!(
            names(DependencyStrategy::JavaScript, source),
            vec!["acme", "chart.js", "fs-extra", "multi-line", "path", "react", "rxjs", "zone.js"]
        );
    }

    #[test]
    fn test_go_imports() {
        let source = "package main\n\nimport \"fmt\"\nimport log \"github.com/sirupsen/logrus\"\n\nimport (\n\t\"os\"\n\tjson \"encoding/json\"\n\t_ \"net/http/pprof\"\n)\n";
        assert_eq!(
            names(DependencyStrategy::Go, source),
            vec!["encoding", "fmt", "github.com", "net", "os"]
        );
    }

    #[test]
    fn test_rust_uses() {
        let source = "use std::collections::HashMap;\nuse serde::{Deserialize, Serialize};\npub use crate::model::Node;\nuse super::x;\nuse ::tokio::sync;\nextern crate regex;\npub(crate) use anyhow::Result;\n";
        assert_eq!(
            names(DependencyStrategy::Rust, source),
            vec!["anyhow", "regex", "serde", "tokio"]
        );
    }

    #[test]
    fn test_java_imports() {
        let source = "package a.b;\nimport java.lang.String;\nimport java.util.List;\nimport com.acme.billing.Invoice;\nimport static org.junit.Assert.assertEquals;\nimport com.acme.util.*;\n";
        assert_eq!(
            names(DependencyStrategy::Java, source),
            vec!["Assert", "Invoice", "List", "util"]
        );
    }

    #[test]
    fn test_ruby_requires() {
        let source = "require 'json'\nrequire \"active_support/core_ext\"\nrequire_relative 'helper'\nrequire('net/http')\n";
        assert_eq!(
            names(DependencyStrategy::Ruby, source),
            vec!["active_support", "json", "net"]
        );
    }

    #[test]
    fn test_c_includes() {
        let source = "#include <stdio.h>\n#include \"config.h\"\n# include <boost/asio.hpp>\n#include \"../local.h\"\n";
        assert_eq!(
            names(DependencyStrategy::C, source),
            vec!["boost", "config.h", "stdio.h"]
        );
    }

    #[test]
    fn test_csharp_usings() {
        let source = "using System;\nusing static System.Math;\nglobal using Newtonsoft.Json;\nusing Alias = Foo.Bar;\nnamespace X { }\n";
        assert_eq!(
            names(DependencyStrategy::CSharp, source),
            vec!["Newtonsoft", "System"]
        );
    }

    #[test]
    fn test_php_uses_and_requires() {
        let source = "<?php\nuse App\\Models\\User;\nuse function Illuminate\\Support\\tap;\nrequire_once 'vendor/autoload.php';\ninclude './partials/header.php';\n";
        assert_eq!(
            names(DependencyStrategy::Php, source),
            vec!["App", "Illuminate", "vendor"]
        );
    }

    #[test]
    fn test_generic_fallback() {
        let source = "import \"Foundation\"\n@import 'theme/base';\n#include <io>\nINCLUDE \"macros/all\"\nimport \"ab\"\n";
        assert_eq!(
            names(DependencyStrategy::Generic, source),
            vec!["Foundation", "macros", "theme"]
        );
    }

    #[test]
    fn test_non_utf8_yields_nothing() {
        let file = SourceFile::new("bad.py", 3, 0);
        assert!(extract_dependencies(&file, &[0xff, 0xfe, 0x00]).is_empty());
    }

    #[test]
    fn test_strategy_lookup() {
        assert_eq!(
            DependencyStrategy::for_language(Language::TypeScript),
            DependencyStrategy::JavaScript
        );
        assert_eq!(
            DependencyStrategy::for_language(Language::Swift),
            DependencyStrategy::Generic
        );
    }
}
