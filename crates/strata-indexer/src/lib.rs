//! File discovery, dependency and symbol extraction, and the scan pipeline

pub mod config;
pub mod coordinator;
pub mod deps;
pub mod discovery;
pub mod error;
pub mod exclude;
pub mod extractor;
pub mod facts;
pub mod languages;
pub mod output;
pub mod parser_pool;


pub use config::{ConfigError, IndexConfig};
pub use coordinator::{Indexer, ScanMode, ScanReport};
pub use deps::{DependencyStrategy, extract_dependencies};
pub use discovery::{FileStats, discover, render_tree};
pub use error::IndexError;
pub use exclude::{DEFAULT_EXCLUDES, ExcludeSet};
pub use extractor::SymbolExtractor;
pub use facts::FileFacts;
pub use languages::get_extractor;
pub use output::{GRAPH_FILE, GraphOutput, write_graph};
