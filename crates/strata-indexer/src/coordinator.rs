//! Scan pipeline
//!
//! One run discovers files, extracts module dependencies for every file,
//! re-extracts symbols for the files that changed since the last completed
//! scan, writes them to the symbol store, partitions the dependency map and
//! writes the graph output. The fingerprint cache is saved last, so a failed
//! or cancelled run is retried in full next time. Files that could not be
//! read keep their previous fingerprint and their previous store rows, so the
//! next scan retries them.

use crate::config::IndexConfig;
use crate::deps::extract_dependencies;
use crate::discovery::discover;
use crate::error::IndexError;
use crate::exclude::{ExcludeSet, read_ignore_file};
use crate::facts::FileFacts;
use crate::languages::get_extractor;
use crate::output::{GraphOutput, write_graph};
use dashmap::{DashMap, DashSet};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use strata_core::{
    ChangeDetector, DependencyMap, Language, LayeredGraph, PartitionConfig, SourceFile,
    ensure_cache_dir, symbol_db_path,
};
use strata_store::SymbolStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Re-extract every file.
    Full,
    /// Re-extract only files whose fingerprint changed, unless the change
    /// detector decides a full scan is needed.
    Incremental,
}

/// Outcome of one completed scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    /// Mode actually used, which may be `Full` when `Incremental` was asked for.
    pub mode: ScanMode,
    pub files_discovered: usize,
    /// Files that took part in the dependency graph.
    pub files_graphed: usize,
    /// Files whose symbols were re-extracted.
    pub files_extracted: usize,
    /// Re-extracted files the extractor rejected; stored with no symbols.
    pub files_failed: usize,
    /// Files that could not be read; retried by the next scan.
    pub files_unread: usize,
    /// Files dropped from the store because they no longer exist.
    pub files_removed: usize,
    pub symbols_written: usize,
    pub symbol_edges: usize,
    pub partitions: usize,
    pub graph_file: PathBuf,
    pub markup_files: usize,
    pub elapsed_ms: u128,
}

/// Per-file result of the parallel extraction phase.
enum Extraction {
    Facts(FileFacts),
    Failed,
}

/// Everything the parallel phase produced.
struct Extracted {
    dependencies: DependencyMap,
    extractions: DashMap<String, Extraction>,
    unread: BTreeSet<String>,
}

pub struct Indexer {
    root: PathBuf,
    config: IndexConfig,
    cancel: Arc<AtomicBool>,
}

impl Indexer {
    pub fn new(root: impl Into<PathBuf>, config: IndexConfig) -> Result<Self, IndexError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(IndexError::NotADirectory(root));
        }
        Ok(Indexer {
            root,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Indexer for `root` using its config file, or defaults when there is none.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let root = root.into();
        let config = IndexConfig::load_or_default(&root);
        Self::new(root, config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Shared flag; setting it stops a running scan between files.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn check_cancelled(&self) -> Result<(), IndexError> {
        if self.is_cancelled() {
            tracing::info!("Scan of {} cancelled", self.root.display());
            return Err(IndexError::Cancelled);
        }
        Ok(())
    }

    /// Exclusion set: defaults, config patterns, then the root `.gitignore`
    /// when enabled. The graph output directory is always excluded.
    pub fn excludes(&self) -> Result<ExcludeSet, IndexError> {
        let mut patterns = self.config.exclude.clone();
        if self.config.use_gitignore {
            patterns.extend(read_ignore_file(&self.root.join(".gitignore")));
        }
        if self.config.output_dir.is_relative() {
            let output = self.config.output_dir.to_string_lossy().replace('\\', "/");
            let output = output.trim_matches('/');
            if !output.is_empty() {
                patterns.push(format!("/{output}/"));
            }
        }
        Ok(ExcludeSet::with_defaults(patterns)?)
    }

    /// Discover the files a scan would see.
    pub fn discover(&self) -> Result<Vec<SourceFile>, IndexError> {
        Ok(discover(&self.root, &self.excludes()?))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.output_dir)
    }

    /// Whether a file takes part in the dependency graph.
    fn graphed(&self, file: &SourceFile) -> bool {
        self.config.include_other || file.language != Language::Other
    }

    pub fn run(&self, requested: ScanMode) -> Result<ScanReport, IndexError> {
        let started = Instant::now();
        self.check_cancelled()?;
        let files = self.discover()?;
        self.scan(&files, requested, started)
    }

    /// Scan an already discovered file set.
    pub(crate) fn scan(
        &self,
        files: &[SourceFile],
        requested: ScanMode,
        started: Instant,
    ) -> Result<ScanReport, IndexError> {
        ensure_cache_dir(&self.root)?;
        let output_dir = self.output_dir();
        std::fs::create_dir_all(&output_dir).map_err(|source| IndexError::Output {
            path: output_dir.clone(),
            source,
        })?;
        let mut detector =
            ChangeDetector::open(&self.root).with_full_scan_ratio(self.config.full_scan_ratio);

        let mode = if requested == ScanMode::Full
            || !self.config.incremental
            || detector.needs_full_scan(files)
        {
            ScanMode::Full
        } else {
            ScanMode::Incremental
        };
        let targets: BTreeSet<&str> = match mode {
            ScanMode::Full => files.iter().map(|f| f.path.as_str()).collect(),
            ScanMode::Incremental => detector
                .changed(files)
                .into_iter()
                .map(|f| f.path.as_str())
                .collect(),
        };
        tracing::info!(
            "Scanning {} ({} files, {:?}, {} to extract)",
            self.root.display(),
            files.len(),
            mode,
            targets.len()
        );

        let Extracted {
            dependencies,
            extractions,
            unread,
        } = self.extract(files, &targets)?;
        self.check_cancelled()?;

        let store = SymbolStore::open(&symbol_db_path(&self.root))?;
        let removed = self.remove_stale(&store, &detector, files, mode)?;

        let mut files_extracted = 0;
        let mut files_failed = 0;
        let mut symbols_written = 0;
        let mut paths: Vec<&str> = targets.iter().copied().collect();
        paths.sort_unstable();
        for path in paths {
            self.check_cancelled()?;
            let Some((_, extraction)) = extractions.remove(path) else {
                continue;
            };
            files_extracted += 1;
            match extraction {
                Extraction::Facts(facts) => {
                    let symbols = facts.to_symbols(path);
                    store.replace_file(path, &symbols, &facts.dependencies)?;
                    symbols_written += symbols.len();
                }
                Extraction::Failed => {
                    files_failed += 1;
                    store.replace_file(path, &[], &[])?;
                }
            }
        }
        let symbol_edges = store.link_dependencies()?;

        let graph = LayeredGraph::build(
            &dependencies,
            &PartitionConfig::new(self.config.node_threshold),
        );
        let GraphOutput {
            graph_file,
            markup_files,
        } = write_graph(&output_dir, &graph)?;

        self.check_cancelled()?;
        detector.update_except(files, &unread);
        detector.save()?;

        let report = ScanReport {
            mode,
            files_discovered: files.len(),
            files_graphed: graph.file_count,
            files_extracted,
            files_failed,
            files_unread: unread.len(),
            files_removed: removed,
            symbols_written,
            symbol_edges,
            partitions: graph.partitions().len(),
            graph_file,
            markup_files: markup_files.len(),
            elapsed_ms: started.elapsed().as_millis(),
        };
        tracing::info!(
            "Scan finished in {}ms: {} symbols from {} files, {} partitions",
            report.elapsed_ms,
            report.symbols_written,
            report.files_extracted,
            report.partitions
        );
        Ok(report)
    }

    /// Read every file once on the worker pool. Dependencies are collected
    /// for all graphed files; symbols only for `targets`.
    fn extract(
        &self,
        files: &[SourceFile],
        targets: &BTreeSet<&str>,
    ) -> Result<Extracted, IndexError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_count())
            .build()?;
        let dependencies: DashMap<String, BTreeSet<String>> = DashMap::new();
        let extractions: DashMap<String, Extraction> = DashMap::new();
        let unread: DashSet<String> = DashSet::new();

        pool.install(|| {
            files.par_iter().for_each(|file| {
                if self.is_cancelled() {
                    return;
                }
                let graphed = self.graphed(file);
                let extractor = if targets.contains(file.path.as_str()) {
                    get_extractor(file.language, Path::new(&file.path))
                } else {
                    None
                };
                if !graphed && extractor.is_none() {
                    return;
                }

                let bytes = match std::fs::read(self.root.join(&file.path)) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!("Cannot read {}: {}", file.path, e);
                        unread.insert(file.path.clone());
                        return;
                    }
                };
                if graphed {
                    dependencies.insert(file.path.clone(), extract_dependencies(file, &bytes));
                }
                if let Some(extractor) = extractor {
                    extractions.insert(file.path.clone(), extract_symbols(file, &*extractor, &bytes));
                }
            });
        });

        Ok(Extracted {
            dependencies: dependencies.into_iter().collect(),
            extractions,
            unread: unread.into_iter().collect(),
        })
    }

    /// Drop store rows for files that no longer exist. A full scan compares
    /// against the store itself, an incremental one against the cache.
    fn remove_stale(
        &self,
        store: &SymbolStore,
        detector: &ChangeDetector,
        files: &[SourceFile],
        mode: ScanMode,
    ) -> Result<usize, IndexError> {
        let stale: Vec<String> = match mode {
            ScanMode::Incremental => detector.deleted(files),
            ScanMode::Full => {
                let current: BTreeSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
                store
                    .file_paths()?
                    .into_iter()
                    .filter(|path| !current.contains(path.as_str()))
                    .collect()
            }
        };
        for path in &stale {
            store.remove_file(path)?;
            tracing::debug!("Removed deleted file from store: {}", path);
        }
        Ok(stale.len())
    }
}

fn extract_symbols(
    file: &SourceFile,
    extractor: &dyn crate::extractor::SymbolExtractor,
    bytes: &[u8],
) -> Extraction {
    let source = match std::str::from_utf8(bytes) {
        Ok(source) => source,
        Err(e) => {
            tracing::debug!("Skipping symbols of {}: not UTF-8 ({})", file.path, e);
            return Extraction::Failed;
        }
    };
    match extractor.extract(Path::new(&file.path), source) {
        Ok(facts) => Extraction::Facts(facts),
        Err(e) => {
            tracing::debug!("Skipping symbols of {}: {}", file.path, e);
            Extraction::Failed
        }
    }
}
