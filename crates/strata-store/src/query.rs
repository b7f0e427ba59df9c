//! Read-side query interface over a symbol store

use crate::error::Result;
use crate::store::{Statistics, SymbolRecord, SymbolStore};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::Serialize;
use std::path::Path;
use strata_core::SymbolKind;

/// Incoming and outgoing edges of one symbol, with the symbols on the other end.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolDependencies {
    pub symbol: SymbolRecord,
    pub uses: Vec<(String, SymbolRecord)>,
    pub used_by: Vec<(String, SymbolRecord)>,
}

pub struct SymbolIndex {
    store: SymbolStore,
}

impl SymbolIndex {
    /// Open an existing index read-only.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(SymbolIndex {
            store: SymbolStore::open_read_only(path)?,
        })
    }

    pub fn from_store(store: SymbolStore) -> Self {
        SymbolIndex { store }
    }

    pub fn find(&self, name: &str, kind: Option<SymbolKind>) -> Result<Vec<SymbolRecord>> {
        self.store.find_by_name(name, kind)
    }

    pub fn search(&self, keyword: &str, kind: Option<SymbolKind>) -> Result<Vec<SymbolRecord>> {
        self.store.search(keyword, kind)
    }

    pub fn file(&self, file_path: &str) -> Result<Vec<SymbolRecord>> {
        self.store.symbols_in_file(file_path)
    }

    pub fn statistics(&self) -> Result<Statistics> {
        self.store.statistics()
    }

    /// Ranked fuzzy search over symbol names. Best match first; ties keep
    /// name order.
    pub fn fuzzy(&self, pattern: &str, limit: usize) -> Result<Vec<SymbolRecord>> {
        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, String)> = self
            .store
            .symbol_names()?
            .into_iter()
            .filter_map(|name| matcher.fuzzy_match(&name, pattern).map(|score| (score, name)))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let mut results = Vec::new();
        for (_, name) in scored {
            for record in self.store.find_by_name(&name, None)? {
                if results.len() >= limit {
                    return Ok(results);
                }
                results.push(record);
            }
        }
        Ok(results)
    }

    pub fn dependencies(&self, symbol_id: i64) -> Result<Option<SymbolDependencies>> {
        let Some(symbol) = self.store.symbol(symbol_id)? else {
            return Ok(None);
        };
        let mut uses = Vec::new();
        for dep in self.store.dependencies_from(symbol_id)? {
            if let Some(target) = self.store.symbol(dep.to_symbol)? {
                uses.push((dep.dep_type, target));
            }
        }
        let mut used_by = Vec::new();
        for dep in self.store.dependencies_to(symbol_id)? {
            if let Some(source) = self.store.symbol(dep.from_symbol)? {
                used_by.push((dep.dep_type, source));
            }
        }
        Ok(Some(SymbolDependencies {
            symbol,
            uses,
            used_by,
        }))
    }
}
