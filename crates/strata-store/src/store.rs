//! SQLite symbol store
//!
//! Symbols are unique on `(name, kind, file_path, line_number)`; inserting
//! an existing symbol returns the stored id. Writes for one file happen in a
//! single transaction, so an interrupted scan never leaves a half-written file.

use crate::error::{Result, StoreError};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use strata_core::{Dependency, DependencyKind, Symbol, SymbolKind};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS symbols (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    kind TEXT NOT NULL,
    file_path TEXT NOT NULL,
    line_number INTEGER NOT NULL,
    end_line_number INTEGER NOT NULL,
    parent_id INTEGER,
    metadata TEXT,
    UNIQUE(name, kind, file_path, line_number)
);

CREATE TABLE IF NOT EXISTS dependencies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_symbol INTEGER NOT NULL,
    to_symbol INTEGER NOT NULL,
    dep_type TEXT NOT NULL,
    UNIQUE(from_symbol, to_symbol, dep_type)
);

CREATE TABLE IF NOT EXISTS file_references (
    file_path TEXT NOT NULL,
    name TEXT NOT NULL,
    module TEXT,
    kind TEXT NOT NULL,
    line_number INTEGER NOT NULL,
    is_external INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);
CREATE INDEX IF NOT EXISTS idx_symbols_kind ON symbols(kind);
CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_path);
CREATE INDEX IF NOT EXISTS idx_deps_from ON dependencies(from_symbol);
CREATE INDEX IF NOT EXISTS idx_deps_to ON dependencies(to_symbol);
CREATE INDEX IF NOT EXISTS idx_refs_file ON file_references(file_path);
"#;

const SYMBOL_COLUMNS: &str =
    "id, name, kind, file_path, line_number, end_line_number, parent_id, metadata";

/// A persisted symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub id: i64,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub line: u32,
    pub end_line: u32,
    pub parent_id: Option<i64>,
    pub metadata: serde_json::Value,
}

/// A symbol → symbol edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub id: i64,
    pub from_symbol: i64,
    pub to_symbol: i64,
    pub dep_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCount {
    pub kind: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCount {
    pub file_path: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_symbols: usize,
    pub total_files: usize,
    /// Ordered by count, highest first.
    pub by_kind: Vec<KindCount>,
    /// The ten files with the most symbols.
    pub top_files: Vec<FileCount>,
}

struct RawSymbol {
    id: i64,
    name: String,
    kind: String,
    file_path: String,
    line: u32,
    end_line: u32,
    parent_id: Option<i64>,
    metadata: Option<String>,
}

impl RawSymbol {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawSymbol {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            file_path: row.get(3)?,
            line: row.get(4)?,
            end_line: row.get(5)?,
            parent_id: row.get(6)?,
            metadata: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<SymbolRecord> {
        let kind = self.kind.parse::<SymbolKind>().map_err(StoreError::Corrupt)?;
        let metadata = match self.metadata.as_deref() {
            Some(text) if !text.is_empty() => serde_json::from_str(text)?,
            _ => serde_json::Value::Object(serde_json::Map::new()),
        };
        Ok(SymbolRecord {
            id: self.id,
            name: self.name,
            kind,
            file_path: self.file_path,
            line: self.line,
            end_line: self.end_line,
            parent_id: self.parent_id,
            metadata,
        })
    }
}

/// Storage service for symbols and their dependency edges.
#[derive(Clone)]
pub struct SymbolStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SymbolStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolStore").finish_non_exhaustive()
    }
}

impl SymbolStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let store = Self::from_connection(conn);
        store.initialize_schema()?;
        tracing::debug!("Symbol store opened: {}", path.display());
        Ok(store)
    }

    /// Open an existing database without write access.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StoreError::Missing(path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let store = Self::from_connection(Connection::open_in_memory()?);
        store.initialize_schema()?;
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Self {
        SymbolStore {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.lock()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ── Writes ──────────────────────────────────────────────

    /// Insert a symbol, or fetch the id of the identical symbol already stored.
    pub fn insert_symbol(&self, symbol: &Symbol, parent_id: Option<i64>) -> Result<i64> {
        let conn = self.lock()?;
        insert_symbol(&conn, symbol, parent_id)
    }

    /// Insert a dependency edge. Returns the existing id when already present.
    pub fn insert_dependency(&self, from: i64, to: i64, dep_type: &str) -> Result<i64> {
        let conn = self.lock()?;
        insert_dependency(&conn, from, to, dep_type)
    }

    /// Replace everything stored for one file. Returns the new symbol ids in
    /// the order of `symbols`.
    pub fn replace_file(
        &self,
        file_path: &str,
        symbols: &[Symbol],
        references: &[Dependency],
    ) -> Result<Vec<i64>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        delete_file(&tx, file_path)?;

        let mut ids: Vec<i64> = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let parent_id = symbol.parent.and_then(|idx| ids.get(idx).copied());
            ids.push(insert_symbol(&tx, symbol, parent_id)?);
        }
        for reference in references {
            tx.execute(
                "INSERT INTO file_references (file_path, name, module, kind, line_number, is_external)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    file_path,
                    reference.name,
                    reference.module,
                    reference.kind.as_str(),
                    reference.line,
                    reference.is_external,
                ],
            )?;
        }
        tx.commit()?;
        Ok(ids)
    }

    /// Remove a file's symbols, references and every edge touching them.
    pub fn remove_file(&self, file_path: &str) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let removed = delete_file(&tx, file_path)?;
        tx.commit()?;
        Ok(removed)
    }

    /// Rebuild all symbol → symbol edges from the stored file references.
    ///
    /// The source of an edge is the innermost class or function enclosing the
    /// reference line, falling back to the file symbol. The target is the first
    /// class or function with the referenced name. External references and
    /// unresolved names produce no edge.
    pub fn link_dependencies(&self) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM dependencies", [])?;

        let references: Vec<(String, String, String, u32)> = {
            let mut stmt = tx.prepare(
                "SELECT file_path, name, kind, line_number FROM file_references
                 WHERE is_external = 0 ORDER BY file_path, line_number, name",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let mut linked = 0;
        for (file_path, name, kind, line) in references {
            let Some(from) = enclosing_symbol(&tx, &file_path, line)? else {
                continue;
            };
            let Some(to) = named_target(&tx, &name, from)? else {
                continue;
            };
            let kind = kind.parse::<DependencyKind>().map_err(StoreError::Corrupt)?;
            let inserted = tx.execute(
                "INSERT INTO dependencies (from_symbol, to_symbol, dep_type) VALUES (?1, ?2, ?3)
                 ON CONFLICT(from_symbol, to_symbol, dep_type) DO NOTHING",
                params![from, to, kind.as_str()],
            )?;
            linked += inserted;
        }
        tx.commit()?;
        tracing::debug!("Linked {} symbol dependencies", linked);
        Ok(linked)
    }

    /// Delete every row.
    pub fn clear(&self) -> Result<()> {
        self.lock()?.execute_batch(
            "DELETE FROM dependencies; DELETE FROM file_references; DELETE FROM symbols;",
        )?;
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────

    pub fn symbol(&self, id: i64) -> Result<Option<SymbolRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {SYMBOL_COLUMNS} FROM symbols WHERE id = ?1"),
                params![id],
                RawSymbol::from_row,
            )
            .optional()?;
        raw.map(RawSymbol::into_record).transpose()
    }

    /// Exact-name lookup, ordered by file and line.
    pub fn find_by_name(&self, name: &str, kind: Option<SymbolKind>) -> Result<Vec<SymbolRecord>> {
        let conn = self.lock()?;
        match kind {
            Some(kind) => query_symbols(
                &conn,
                &format!(
                    "SELECT {SYMBOL_COLUMNS} FROM symbols WHERE name = ?1 AND kind = ?2
                     ORDER BY file_path, line_number"
                ),
                params![name, kind.as_str()],
            ),
            None => query_symbols(
                &conn,
                &format!(
                    "SELECT {SYMBOL_COLUMNS} FROM symbols WHERE name = ?1
                     ORDER BY file_path, line_number"
                ),
                params![name],
            ),
        }
    }

    /// Substring search on names, ordered by name, file and line.
    pub fn search(&self, keyword: &str, kind: Option<SymbolKind>) -> Result<Vec<SymbolRecord>> {
        let pattern = format!("%{}%", escape_like(keyword));
        let conn = self.lock()?;
        match kind {
            Some(kind) => query_symbols(
                &conn,
                &format!(
                    "SELECT {SYMBOL_COLUMNS} FROM symbols WHERE name LIKE ?1 ESCAPE '\\' AND kind = ?2
                     ORDER BY name, file_path, line_number"
                ),
                params![pattern, kind.as_str()],
            ),
            None => query_symbols(
                &conn,
                &format!(
                    "SELECT {SYMBOL_COLUMNS} FROM symbols WHERE name LIKE ?1 ESCAPE '\\'
                     ORDER BY name, file_path, line_number"
                ),
                params![pattern],
            ),
        }
    }

    /// All symbols of one file, ordered by line.
    pub fn symbols_in_file(&self, file_path: &str) -> Result<Vec<SymbolRecord>> {
        let conn = self.lock()?;
        query_symbols(
            &conn,
            &format!(
                "SELECT {SYMBOL_COLUMNS} FROM symbols WHERE file_path = ?1
                 ORDER BY line_number, id"
            ),
            params![file_path],
        )
    }

    /// Distinct symbol names, sorted.
    pub fn symbol_names(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT name FROM symbols ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Distinct file paths, sorted.
    pub fn file_paths(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT file_path FROM symbols ORDER BY file_path")?;
        let paths = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(paths)
    }

    pub fn dependencies_from(&self, symbol_id: i64) -> Result<Vec<DependencyRecord>> {
        let conn = self.lock()?;
        query_dependencies(
            &conn,
            "SELECT id, from_symbol, to_symbol, dep_type FROM dependencies
             WHERE from_symbol = ?1 ORDER BY to_symbol, dep_type",
            symbol_id,
        )
    }

    pub fn dependencies_to(&self, symbol_id: i64) -> Result<Vec<DependencyRecord>> {
        let conn = self.lock()?;
        query_dependencies(
            &conn,
            "SELECT id, from_symbol, to_symbol, dep_type FROM dependencies
             WHERE to_symbol = ?1 ORDER BY from_symbol, dep_type",
            symbol_id,
        )
    }

    pub fn statistics(&self) -> Result<Statistics> {
        let conn = self.lock()?;
        let total_symbols: i64 = conn.query_row("SELECT COUNT(*) FROM symbols", [], |r| r.get(0))?;
        let total_files: i64 =
            conn.query_row("SELECT COUNT(DISTINCT file_path) FROM symbols", [], |r| r.get(0))?;

        let by_kind = {
            let mut stmt = conn.prepare(
                "SELECT kind, COUNT(*) AS n FROM symbols GROUP BY kind ORDER BY n DESC, kind",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(KindCount {
                    kind: row.get(0)?,
                    count: row.get::<_, i64>(1)? as usize,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        let top_files = {
            let mut stmt = conn.prepare(
                "SELECT file_path, COUNT(*) AS n FROM symbols GROUP BY file_path
                 ORDER BY n DESC, file_path LIMIT 10",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(FileCount {
                    file_path: row.get(0)?,
                    count: row.get::<_, i64>(1)? as usize,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        Ok(Statistics {
            total_symbols: total_symbols as usize,
            total_files: total_files as usize,
            by_kind,
            top_files,
        })
    }
}

fn insert_symbol(conn: &Connection, symbol: &Symbol, parent_id: Option<i64>) -> Result<i64> {
    let metadata = serde_json::to_string(&symbol.metadata)?;
    let kind = symbol.kind.as_str();
    conn.execute(
        "INSERT INTO symbols (name, kind, file_path, line_number, end_line_number, parent_id, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(name, kind, file_path, line_number) DO NOTHING",
        params![
            symbol.name,
            kind,
            symbol.file_path,
            symbol.line,
            symbol.end_line,
            parent_id,
            metadata,
        ],
    )?;
    let id = conn.query_row(
        "SELECT id FROM symbols WHERE name = ?1 AND kind = ?2 AND file_path = ?3 AND line_number = ?4",
        params![symbol.name, kind, symbol.file_path, symbol.line],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn insert_dependency(conn: &Connection, from: i64, to: i64, dep_type: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO dependencies (from_symbol, to_symbol, dep_type) VALUES (?1, ?2, ?3)
         ON CONFLICT(from_symbol, to_symbol, dep_type) DO NOTHING",
        params![from, to, dep_type],
    )?;
    let id = conn.query_row(
        "SELECT id FROM dependencies WHERE from_symbol = ?1 AND to_symbol = ?2 AND dep_type = ?3",
        params![from, to, dep_type],
        |row| row.get(0),
    )?;
    Ok(id)
}

fn delete_file(conn: &Connection, file_path: &str) -> Result<usize> {
    conn.execute(
        "DELETE FROM dependencies
         WHERE from_symbol IN (SELECT id FROM symbols WHERE file_path = ?1)
            OR to_symbol IN (SELECT id FROM symbols WHERE file_path = ?1)",
        params![file_path],
    )?;
    conn.execute(
        "DELETE FROM file_references WHERE file_path = ?1",
        params![file_path],
    )?;
    let removed = conn.execute("DELETE FROM symbols WHERE file_path = ?1", params![file_path])?;
    Ok(removed)
}

fn enclosing_symbol(conn: &Connection, file_path: &str, line: u32) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM symbols
             WHERE file_path = ?1 AND kind != 'variable'
               AND line_number <= ?2 AND end_line_number >= ?2
             ORDER BY (end_line_number - line_number), line_number DESC
             LIMIT 1",
            params![file_path, line],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn named_target(conn: &Connection, name: &str, from: i64) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM symbols
             WHERE name = ?1 AND kind IN ('class', 'function') AND id != ?2
             ORDER BY file_path, line_number
             LIMIT 1",
            params![name, from],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn query_symbols(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<SymbolRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let raw = stmt
        .query_map(params, RawSymbol::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raw.into_iter().map(RawSymbol::into_record).collect()
}

fn query_dependencies(conn: &Connection, sql: &str, symbol_id: i64) -> Result<Vec<DependencyRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![symbol_id], |row| {
            Ok(DependencyRecord {
                id: row.get(0)?,
                from_symbol: row.get(1)?,
                to_symbol: row.get(2)?,
                dep_type: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn escape_like(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len());
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
