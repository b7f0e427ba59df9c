//! CLI command implementations

use crate::QueryCommand;
use anyhow::{Context, anyhow};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use strata_core::{ChangeDetector, LayeredGraph, Partition, SymbolKind, symbol_db_path};
use strata_indexer::output::GRAPH_FILE;
use strata_indexer::{FileStats, IndexConfig, Indexer, ScanMode, ScanReport, render_tree};
use strata_store::{SymbolIndex, SymbolRecord};

pub async fn scan(
    root: PathBuf,
    full: bool,
    threshold: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = IndexConfig::load_or_default(&root);
    if let Some(threshold) = threshold {
        config.node_threshold = threshold.max(1);
    }
    let indexer = Indexer::new(root, config)?;
    let cancel = indexer.cancel_flag();
    let mode = if full { ScanMode::Full } else { ScanMode::Incremental };

    let mut task = tokio::task::spawn_blocking(move || indexer.run(mode));
    let report = tokio::select! {
        joined = &mut task => joined??,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; stopping after the current file");
            cancel.store(true, Ordering::SeqCst);
            task.await??
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ScanReport) {
    println!("Scan mode:        {:?}", report.mode);
    println!("Files discovered: {}", report.files_discovered);
    println!("Files graphed:    {}", report.files_graphed);
    println!(
        "Files extracted:  {} ({} unparsable)",
        report.files_extracted, report.files_failed
    );
    if report.files_unread > 0 {
        println!("Files unreadable: {} (retried next scan)", report.files_unread);
    }
    println!("Files removed:    {}", report.files_removed);
    println!("Symbols written:  {}", report.symbols_written);
    println!("Symbol edges:     {}", report.symbol_edges);
    println!(
        "Partitions:       {} ({} markup files)",
        report.partitions, report.markup_files
    );
    println!("Graph:            {}", report.graph_file.display());
    println!("Elapsed:          {}ms", report.elapsed_ms);
}

/// Print one partition's markup from the last scan's graph file.
pub fn graph(root: PathBuf, key: &str) -> anyhow::Result<()> {
    let config = IndexConfig::load_or_default(&root);
    let path = root.join(&config.output_dir).join(GRAPH_FILE);
    let graph = load_graph(&path)?;

    let partition = graph.find(key).ok_or_else(|| {
        let keys: Vec<&str> = graph.partitions().iter().map(|p| p.key.as_str()).collect();
        anyhow!("no partition {:?}; available: {}", key, keys.join(", "))
    })?;
    println!("{}", partition.markup);
    Ok(())
}

fn load_graph(path: &Path) -> anyhow::Result<LayeredGraph> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}; run `strata scan` first", path.display()))?;
    let document: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let field = |name: &str| -> anyhow::Result<usize> {
        document[name]
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| anyhow!("{} has no {:?} field", path.display(), name))
    };
    let root: Partition = serde_json::from_value(document["tree"].clone())
        .with_context(|| format!("{} has no partition tree", path.display()))?;
    Ok(LayeredGraph {
        threshold: field("threshold")?,
        file_count: field("file_count")?,
        root,
    })
}

pub async fn query(root: PathBuf, query: QueryCommand, json: bool) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || run_query(&root, query, json)).await?
}

fn run_query(root: &Path, query: QueryCommand, json: bool) -> anyhow::Result<()> {
    let index = SymbolIndex::open(&symbol_db_path(root))?;
    match query {
        QueryCommand::Find { name, kind } => {
            let records = index.find(&name, parse_kind(kind.as_deref())?)?;
            print_records(&records, json)
        }
        QueryCommand::Search { keyword, kind } => {
            let records = index.search(&keyword, parse_kind(kind.as_deref())?)?;
            print_records(&records, json)
        }
        QueryCommand::Fuzzy { pattern, limit } => print_records(&index.fuzzy(&pattern, limit)?, json),
        QueryCommand::File { path } => print_records(&index.file(&path)?, json),
        QueryCommand::Deps { id } => {
            let deps = index
                .dependencies(id)?
                .ok_or_else(|| anyhow!("no symbol with id {}", id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&deps)?);
                return Ok(());
            }
            println!("{}", describe(&deps.symbol));
            println!("uses:");
            for (dep_type, record) in &deps.uses {
                println!("  {:<14} {}", dep_type, describe(record));
            }
            println!("used by:");
            for (dep_type, record) in &deps.used_by {
                println!("  {:<14} {}", dep_type, describe(record));
            }
            Ok(())
        }
        QueryCommand::Stats => {
            let stats = index.statistics()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }
            println!("Symbols: {} in {} files", stats.total_symbols, stats.total_files);
            for kind in &stats.by_kind {
                println!("  {:<10} {}", kind.kind, kind.count);
            }
            println!("Top files:");
            for file in &stats.top_files {
                println!("  {:>5}  {}", file.count, file.file_path);
            }
            Ok(())
        }
    }
}

fn parse_kind(kind: Option<&str>) -> anyhow::Result<Option<SymbolKind>> {
    kind.map(|k| k.parse::<SymbolKind>().map_err(anyhow::Error::msg))
        .transpose()
}

fn print_records(records: &[SymbolRecord], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else if records.is_empty() {
        println!("No symbols found");
    } else {
        for record in records {
            println!("{}", describe(record));
        }
    }
    Ok(())
}

fn describe(record: &SymbolRecord) -> String {
    format!(
        "[{}] {:<8} {}  {}:{}",
        record.id,
        record.kind.as_str(),
        record.name,
        record.file_path,
        record.line
    )
}

pub fn tree(root: PathBuf, depth: Option<usize>) -> anyhow::Result<()> {
    let indexer = Indexer::open(&root)?;
    let files = indexer.discover()?;
    println!("{}", render_tree(&project_name(&root), &files, depth));
    Ok(())
}

pub fn stats(root: PathBuf) -> anyhow::Result<()> {
    let indexer = Indexer::open(&root)?;
    let files = indexer.discover()?;
    let stats = FileStats::from_files(&files);

    println!("Files: {} ({} bytes)", stats.total_files, stats.total_bytes);
    println!("By language:");
    for (language, count) in &stats.by_language {
        println!("  {:<12} {}", language.as_str(), count);
    }
    println!("By extension:");
    for (ext, count) in stats.top_extensions() {
        let ext = if ext.is_empty() { "(none)" } else { ext };
        println!("  {:<12} {}", ext, count);
    }

    let cache = ChangeDetector::open(&root).stats();
    println!("Cache: {} files fingerprinted", cache.cached_files);
    match cache.last_scan_time {
        Some(time) => println!("Last scan: {}", time.to_rfc3339()),
        None => println!("Last scan: never"),
    }
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    tracing::info!("Clearing cache for: {}", root.display());

    strata_core::clear_cache(&root)?;

    tracing::info!("Cache cleared");
    Ok(())
}

fn project_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| root.display().to_string())
}
