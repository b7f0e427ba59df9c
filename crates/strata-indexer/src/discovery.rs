//! File discovery and file-structure statistics

use crate::exclude::ExcludeSet;
use ignore::WalkBuilder;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use strata_core::{Language, SourceFile};

/// Hidden files that are still indexed.
pub const HIDDEN_ALLOW_LIST: &[&str] = &[".gitignore", ".env", ".eslintrc", ".prettierrc"];

/// Walk `root` and return every eligible regular file, sorted by relative path.
///
/// Hidden directories are pruned; hidden files are kept only when they are in
/// [`HIDDEN_ALLOW_LIST`]. Entries that cannot be read are skipped. Symlinks
/// are not followed.
pub fn discover(root: &Path, excludes: &ExcludeSet) -> Vec<SourceFile> {
    let excludes = Arc::new(excludes.clone());
    let filter_root = root.to_path_buf();
    let filter_excludes = Arc::clone(&excludes);

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if !is_dir {
                return true;
            }
            if is_hidden(&entry.file_name().to_string_lossy()) {
                return false;
            }
            match relative_path(&filter_root, entry.path()) {
                Some(rel) => !filter_excludes.is_excluded(&rel, true),
                None => true,
            }
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if is_hidden(&name) && !HIDDEN_ALLOW_LIST.iter().any(|allowed| name == *allowed) {
            continue;
        }
        let Some(rel) = relative_path(root, entry.path()) else {
            continue;
        };
        if excludes.is_excluded(&rel, false) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Cannot stat {}: {}", entry.path().display(), e);
                continue;
            }
        };
        let modified_ns = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        files.push(SourceFile::new(rel, metadata.len(), modified_ns));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!("Discovered {} files under {}", files.len(), root.display());
    files
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Counts over a discovered file set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub total_files: usize,
    pub total_bytes: u64,
    /// Keyed by lowercase extension with leading dot; files without one use `""`.
    pub by_extension: BTreeMap<String, usize>,
    pub by_language: BTreeMap<Language, usize>,
}

impl FileStats {
    pub fn from_files(files: &[SourceFile]) -> Self {
        let mut stats = FileStats::default();
        for file in files {
            stats.total_files += 1;
            stats.total_bytes += file.size;
            let ext = Path::new(&file.path)
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
                .unwrap_or_default();
            *stats.by_extension.entry(ext).or_default() += 1;
            *stats.by_language.entry(file.language).or_default() += 1;
        }
        stats
    }

    /// Extensions ordered by count (highest first), then name.
    pub fn top_extensions(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .by_extension
            .iter()
            .map(|(ext, count)| (ext.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

#[derive(Default)]
struct TreeDir {
    dirs: BTreeMap<String, TreeDir>,
    files: Vec<String>,
}

/// ASCII tree of the discovered files: directories first, then files, each
/// sorted by name. Entries deeper than `max_depth` directory levels are omitted.
pub fn render_tree(root_name: &str, files: &[SourceFile], max_depth: Option<usize>) -> String {
    let mut top = TreeDir::default();
    for file in files {
        let mut parts: Vec<&str> = file.path.split('/').collect();
        let Some(name) = parts.pop() else {
            continue;
        };
        let mut dir = &mut top;
        for part in parts {
            dir = dir.dirs.entry(part.to_string()).or_default();
        }
        dir.files.push(name.to_string());
    }

    let mut lines = vec![format!("{root_name}/")];
    write_tree(&top, "", 0, max_depth, &mut lines);
    lines.join("\n")
}

fn write_tree(dir: &TreeDir, prefix: &str, depth: usize, max_depth: Option<usize>, lines: &mut Vec<String>) {
    if max_depth.is_some_and(|max| depth > max) {
        return;
    }
    let mut files = dir.files.clone();
    files.sort();
    let total = dir.dirs.len() + files.len();

    for (i, (name, child)) in dir.dirs.iter().enumerate() {
        let last = i + 1 == total;
        lines.push(format!("{prefix}{}{name}/", if last { "└── " } else { "├── " }));
        let child_prefix = format!("{prefix}{}", if last { "    " } else { "│   " });
        write_tree(child, &child_prefix, depth + 1, max_depth, lines);
    }
    for (i, name) in files.iter().enumerate() {
        let last = dir.dirs.len() + i + 1 == total;
        lines.push(format!("{prefix}{}{name}", if last { "└── " } else { "├── " }));
    }
}
