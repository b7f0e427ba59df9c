//! Symbol extractor trait definition

use crate::facts::FileFacts;
use std::path::Path;
use strata_core::Language;

/// Turns one file's source into [`FileFacts`].
///
/// Implementations are stateless and shared across worker threads. An `Err`
/// means the whole file could not be analysed; callers treat it as a file
/// with no symbols.
pub trait SymbolExtractor: Send + Sync {
    fn language(&self) -> Language;

    fn extract(&self, path: &Path, source: &str) -> anyhow::Result<FileFacts>;
}
