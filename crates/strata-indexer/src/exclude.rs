//! Gitignore-style exclusion patterns compiled to glob sets
//!
//! - `name` matches that path and everything under it, at any depth
//! - `dir/` matches directories only
//! - `*` stays within one path segment, `**` spans any number
//! - `/name` and `a/b` are anchored at the scan root
//!
//! Negations (`!pattern`) are not supported and are skipped.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Always-excluded build output, caches and VCS metadata.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules/",
    "__pycache__/",
    "*.pyc",
    "*.pyo",
    ".git/",
    ".svn/",
    ".hg/",
    "venv/",
    "env/",
    ".venv/",
    "dist/",
    "build/",
    "target/",
    "*.egg-info/",
    ".tox/",
    ".mypy_cache/",
    ".pytest_cache/",
    "*.min.js",
    "*.min.css",
    "coverage/",
    ".cache/",
    "/.strata/",
];

#[derive(Debug, Clone)]
pub struct ExcludeSet {
    /// Matches files and directories.
    any: GlobSet,
    /// Matches directories only.
    dirs: GlobSet,
    patterns: Vec<String>,
}

impl ExcludeSet {
    /// Compile exactly the given patterns.
    pub fn new<I, S>(patterns: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut any = GlobSetBuilder::new();
        let mut dirs = GlobSetBuilder::new();
        let mut kept = Vec::new();

        for raw in patterns {
            let raw = raw.as_ref().trim();
            if raw.is_empty() || raw.starts_with('#') {
                continue;
            }
            if raw.starts_with('!') {
                tracing::debug!("Skipping unsupported negated pattern: {}", raw);
                continue;
            }

            let dir_only = raw.ends_with('/');
            let body = raw.trim_end_matches('/');
            let anchored = body.starts_with('/') || body.contains('/');
            let body = body.trim_start_matches('/');
            if body.is_empty() {
                continue;
            }
            let base = if anchored || body.starts_with("**/") {
                body.to_string()
            } else {
                format!("**/{body}")
            };

            let exact = GlobBuilder::new(&base).literal_separator(true).build()?;
            let nested = GlobBuilder::new(&format!("{base}/**"))
                .literal_separator(true)
                .build()?;
            if dir_only {
                dirs.add(exact);
            } else {
                any.add(exact);
            }
            any.add(nested);
            kept.push(raw.to_string());
        }

        Ok(ExcludeSet {
            any: any.build()?,
            dirs: dirs.build()?,
            patterns: kept,
        })
    }

    /// Defaults followed by `extra`.
    pub fn with_defaults<I, S>(extra: I) -> Result<Self, globset::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut all: Vec<String> = DEFAULT_EXCLUDES.iter().map(|p| p.to_string()).collect();
        all.extend(extra.into_iter().map(|p| p.as_ref().to_string()));
        Self::new(all)
    }

    /// Whether a root-relative, `/`-separated path is excluded.
    pub fn is_excluded(&self, rel_path: &str, is_dir: bool) -> bool {
        let rel_path = rel_path.trim_start_matches("./").trim_matches('/');
        if rel_path.is_empty() {
            return false;
        }
        self.any.is_match(rel_path) || (is_dir && self.dirs.is_match(rel_path))
    }

    /// Patterns that were compiled (comments, blanks and negations removed).
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Read patterns from a gitignore-style file. A missing file yields no patterns.
pub fn read_ignore_file(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            tracing::warn!("Cannot read ignore file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> ExcludeSet {
        ExcludeSet::new(patterns.iter().copied()).unwrap()
    }

    #[test]
    fn test_plain_name_matches_at_any_depth_and_below() {
        let s = set(&["logs"]);
        assert!(s.is_excluded("logs", true));
        assert!(s.is_excluded("logs", false));
        assert!(s.is_excluded("a/b/logs", true));
        assert!(s.is_excluded("logs/today.txt", false));
        assert!(!s.is_excluded("catalogs/x.txt", false));
    }

    #[test]
    fn test_trailing_slash_is_directory_only() {
        let s = set(&["build/"]);
        assert!(s.is_excluded("build", true));
        assert!(!s.is_excluded("build", false));
        assert!(s.is_excluded("build/out.js", false));
        assert!(s.is_excluded("pkg/build/out.js", false));
    }

    #[test]
    fn test_single_star_stays_in_one_segment() {
        let s = set(&["src/*.py"]);
        assert!(s.is_excluded("src/main.py", false));
        assert!(!s.is_excluded("src/pkg/main.py", false));
        assert!(!s.is_excluded("other/src/main.py", false));
    }

    #[test]
    fn test_double_star_spans_levels() {
        let s = set(&["docs/**/*.md"]);
        assert!(s.is_excluded("docs/a.md", false));
        assert!(s.is_excluded("docs/x/y/a.md", false));
        assert!(!s.is_excluded("src/a.md", false));
    }

    #[test]
    fn test_leading_slash_anchors_to_root() {
        let s = set(&["/config"]);
        assert!(s.is_excluded("config", true));
        assert!(s.is_excluded("config/app.yaml", false));
        assert!(!s.is_excluded("src/config", true));
    }

    #[test]
    fn test_extension_wildcard_and_defaults() {
        let s = ExcludeSet::with_defaults(Vec::<String>::new()).unwrap();
        assert!(s.is_excluded("pkg/__pycache__", true));
        assert!(s.is_excluded("a/b/mod.pyc", false));
        assert!(s.is_excluded("node_modules/react/index.js", false));
        assert!(s.is_excluded("static/app.min.js", false));
        assert!(s.is_excluded("lib.egg-info", true));
        assert!(!s.is_excluded("src/app.js", false));
    }

    #[test]
    fn test_comments_blanks_and_negations_are_skipped() {
        let s = set(&["# comment", "", "!keep.py", "*.log"]);
        assert_eq!(s.patterns(), &["*.log".to_string()]);
        assert!(!s.is_excluded("keep.py", false));
    }
}
