//! Strata CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Layered dependency graphs and a symbol index for source trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project root path (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the project: dependency graph, symbol index and change cache
    Scan {
        /// Re-extract every file even when the cache allows an incremental scan
        #[arg(long)]
        full: bool,

        /// Files per partition before it is split (overrides the config file)
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Print the scan report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the Mermaid markup of one partition from the last scan
    Graph {
        /// Partition key, e.g. `src` or `src/api`
        #[arg(default_value = "/")]
        key: String,
    },
    /// Query the symbol index
    Query {
        #[command(subcommand)]
        query: QueryCommand,

        /// Print results as JSON
        #[arg(long, global = true)]
        json: bool,
    },
    /// Print the discovered file tree
    Tree {
        /// Maximum depth to print
        #[arg(short, long)]
        depth: Option<usize>,
    },
    /// Show file-structure and cache statistics
    Stats,
    /// Clear the cache and symbol index
    Clear,
    /// Show version
    Version,
}

#[derive(Subcommand)]
pub enum QueryCommand {
    /// Symbols with exactly this name
    Find {
        name: String,
        /// Restrict to one kind: file, class, function, variable
        #[arg(short, long)]
        kind: Option<String>,
    },
    /// Symbols whose name contains a keyword
    Search {
        keyword: String,
        #[arg(short, long)]
        kind: Option<String>,
    },
    /// Ranked fuzzy match over symbol names
    Fuzzy {
        pattern: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Every symbol declared in one file
    File { path: String },
    /// What a symbol uses and what uses it
    Deps { id: i64 },
    /// Symbol counts by kind and file
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("strata={}", log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Strata v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Project root: {}", cli.root.display());

    match cli.command {
        Commands::Scan {
            full,
            threshold,
            json,
        } => commands::scan(cli.root, full, threshold, json).await,
        Commands::Graph { key } => commands::graph(cli.root, &key),
        Commands::Query { query, json } => commands::query(cli.root, query, json).await,
        Commands::Tree { depth } => commands::tree(cli.root, depth),
        Commands::Stats => commands::stats(cli.root),
        Commands::Clear => commands::clear(cli.root),
        Commands::Version => {
            println!("Strata v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
