//! Symbol store and query interface backed by SQLite

pub mod error;
pub mod store;
pub mod query;

#[cfg(test)]
pub mod tests;

pub use error::{Result, StoreError};
pub use store::{DependencyRecord, FileCount, KindCount, Statistics, SymbolRecord, SymbolStore};
pub use query::{SymbolDependencies, SymbolIndex};
