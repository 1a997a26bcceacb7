//! Persistent relational storage of files, symbols, imports, VCS churn, and a
//! content FTS table (§4.1). Backed by a bundled, vendored SQLite; the only writer
//! is the Indexer, everything else reads.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::types::{FileRecord, ImportEdge, StoreStats, Symbol, SymbolKind, VcsSignal};

const SCHEMA_VERSION: &str = "v1";

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens (creating if absent) the index database at `path`, typically
    /// `<root>/.context/index.db`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating store directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening store at {}", path.display()))?;
        let store = Store { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn: Mutex::new(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Locks the connection mutex. `rusqlite::Connection` isn't `Sync` on its
    /// own (internal statement cache uses interior mutability); Candidate
    /// Discovery reads the store from several rayon threads at once, so every
    /// access goes through this lock. Recovers from poisoning rather than
    /// panicking further, since a single panicked reader shouldn't wedge every
    /// other thread's store access.
    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_schema(&self) -> Result<()> {
        self.conn().execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                language TEXT NOT NULL,
                size INTEGER NOT NULL,
                mtime_ms INTEGER NOT NULL,
                content_hash TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS symbols (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                signature TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file);
            CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);

            CREATE TABLE IF NOT EXISTS imports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
                target TEXT NOT NULL REFERENCES files(path) ON DELETE CASCADE,
                symbol TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_imports_source ON imports(source);
            CREATE INDEX IF NOT EXISTS idx_imports_target ON imports(target);

            CREATE TABLE IF NOT EXISTS vcs_signals (
                file TEXT PRIMARY KEY REFERENCES files(path) ON DELETE CASCADE,
                last_modified TEXT,
                commit_count INTEGER NOT NULL,
                churn_score REAL NOT NULL
            );

            CREATE VIRTUAL TABLE IF NOT EXISTS fts_content USING fts5(
                path UNINDEXED,
                content
            );
            ",
        )?;
        self.conn().execute(
            "INSERT OR IGNORE INTO meta(key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    // -- files ---------------------------------------------------------

    pub fn upsert_file(&self, file: &FileRecord) -> Result<()> {
        self.conn().execute(
            "INSERT INTO files(path, language, size, mtime_ms, content_hash)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                language = excluded.language,
                size = excluded.size,
                mtime_ms = excluded.mtime_ms,
                content_hash = excluded.content_hash",
            params![file.path, file.language, file.size as i64, file.mtime_ms, file.content_hash],
        )?;
        Ok(())
    }

    pub fn get_file(&self, path: &str) -> Result<Option<FileRecord>> {
        self.conn()
            .query_row(
                "SELECT path, language, size, mtime_ms, content_hash FROM files WHERE path = ?1",
                params![path],
                row_to_file_record,
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn get_all_files(&self) -> Result<Vec<FileRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT path, language, size, mtime_ms, content_hash FROM files")?;
        let rows = stmt.query_map([], row_to_file_record)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Cascades to symbols, imports, the FTS row, and the VCS signal via `ON DELETE CASCADE`.
    pub fn delete_file(&self, path: &str) -> Result<()> {
        self.conn().execute("DELETE FROM files WHERE path = ?1", params![path])?;
        self.conn().execute("DELETE FROM fts_content WHERE path = ?1", params![path])?;
        Ok(())
    }

    // -- symbols ---------------------------------------------------------

    pub fn insert_symbol(&self, symbol: &Symbol) -> Result<()> {
        self.conn().execute(
            "INSERT INTO symbols(file, name, kind, start_line, end_line, signature)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                symbol.file,
                symbol.name,
                symbol.kind.as_str(),
                symbol.start_line as i64,
                symbol.end_line as i64,
                symbol.signature,
            ],
        )?;
        Ok(())
    }

    pub fn clear_symbols_for_file(&self, file: &str) -> Result<()> {
        self.conn().execute("DELETE FROM symbols WHERE file = ?1", params![file])?;
        Ok(())
    }

    pub fn get_symbols_by_file(&self, file: &str) -> Result<Vec<Symbol>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT file, name, kind, start_line, end_line, signature FROM symbols WHERE file = ?1",
        )?;
        let rows = stmt.query_map(params![file], row_to_symbol)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    /// Substring, case-insensitive.
    pub fn find_symbols_by_name(&self, needle: &str) -> Result<Vec<Symbol>> {
        let pattern = format!("%{}%", needle.to_lowercase());
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT file, name, kind, start_line, end_line, signature FROM symbols
             WHERE LOWER(name) LIKE ?1",
        )?;
        let rows = stmt.query_map(params![pattern], row_to_symbol)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    // -- imports ---------------------------------------------------------

    pub fn insert_import(&self, edge: &ImportEdge) -> Result<()> {
        self.conn().execute(
            "INSERT INTO imports(source, target, symbol) VALUES (?1, ?2, ?3)",
            params![edge.source, edge.target, edge.symbol],
        )?;
        Ok(())
    }

    pub fn clear_imports_for_file(&self, file: &str) -> Result<()> {
        self.conn().execute("DELETE FROM imports WHERE source = ?1", params![file])?;
        Ok(())
    }

    pub fn get_imports_from(&self, file: &str) -> Result<Vec<ImportEdge>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT source, target, symbol FROM imports WHERE source = ?1")?;
        let rows = stmt.query_map(params![file], row_to_import_edge)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    pub fn get_importers_of(&self, file: &str) -> Result<Vec<ImportEdge>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT source, target, symbol FROM imports WHERE target = ?1")?;
        let rows = stmt.query_map(params![file], row_to_import_edge)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
    }

    // -- vcs signals -------------------------------------------------------

    pub fn upsert_vcs_signal(&self, file: &str, signal: &VcsSignal) -> Result<()> {
        self.conn().execute(
            "INSERT INTO vcs_signals(file, last_modified, commit_count, churn_score)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(file) DO UPDATE SET
                last_modified = excluded.last_modified,
                commit_count = excluded.commit_count,
                churn_score = excluded.churn_score",
            params![file, signal.last_modified, signal.commit_count as i64, signal.churn_score],
        )?;
        Ok(())
    }

    pub fn get_vcs_signal(&self, file: &str) -> Result<Option<VcsSignal>> {
        self.conn()
            .query_row(
                "SELECT last_modified, commit_count, churn_score FROM vcs_signals WHERE file = ?1",
                params![file],
                |row| {
                    Ok(VcsSignal {
                        last_modified: row.get(0)?,
                        commit_count: row.get::<_, i64>(1)? as usize,
                        churn_score: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    // -- content / FTS -----------------------------------------------------

    pub fn index_file_content(&self, path: &str, content: &str) -> Result<()> {
        self.conn().execute("DELETE FROM fts_content WHERE path = ?1", params![path])?;
        self.conn().execute(
            "INSERT INTO fts_content(path, content) VALUES (?1, ?2)",
            params![path, content],
        )?;
        Ok(())
    }

    /// Raw stored content for `path`, if indexed.
    pub fn get_content(&self, path: &str) -> Result<Option<String>> {
        self.conn()
            .query_row("SELECT content FROM fts_content WHERE path = ?1", params![path], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    /// Best-first `(path, rank)` results. Tolerates punctuation in `query` (a raw
    /// FTS5 MATCH on unsanitized user text can fail to parse); malformed queries
    /// return an empty result rather than erroring, per §7.
    pub fn search_content(&self, query: &str, limit: usize) -> Result<Vec<(String, f64)>> {
        let sanitized = sanitize_fts_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let mut stmt = match conn
            .prepare("SELECT path, bm25(fts_content) FROM fts_content WHERE fts_content MATCH ?1 ORDER BY bm25(fts_content) LIMIT ?2")
        {
            Ok(s) => s,
            Err(_) => return Ok(Vec::new()),
        };
        let rows = stmt.query_map(params![sanitized, limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        });
        match rows {
            Ok(rows) => Ok(rows.filter_map(|r| r.ok()).collect()),
            Err(_) => Ok(Vec::new()),
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.conn().execute_batch(
            "DELETE FROM imports; DELETE FROM symbols; DELETE FROM vcs_signals;
             DELETE FROM fts_content; DELETE FROM files;",
        )?;
        Ok(())
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let files: i64 = self.conn().query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
        let symbols: i64 = self.conn().query_row("SELECT COUNT(*) FROM symbols", [], |r| r.get(0))?;
        let imports: i64 = self.conn().query_row("SELECT COUNT(*) FROM imports", [], |r| r.get(0))?;
        let vcs: i64 =
            self.conn().query_row("SELECT COUNT(*) FROM vcs_signals", [], |r| r.get(0))?;
        Ok(StoreStats {
            files: files as usize,
            symbols: symbols as usize,
            imports: imports as usize,
            vcs_signals: vcs as usize,
        })
    }
}

/// Quotes each token so punctuation (`test()`, quotes, colons) can't break FTS5's
/// query grammar, while keeping implicit-AND-of-tokens semantics.
fn sanitize_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|tok| {
            let cleaned: String = tok.chars().filter(|c| c.is_alphanumeric() || *c == '_').collect();
            cleaned
        })
        .filter(|tok| !tok.is_empty())
        .map(|tok| format!("\"{}\"", tok))
        .collect::<Vec<_>>()
        .join(" ")
}

fn row_to_file_record(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        path: row.get(0)?,
        language: row.get(1)?,
        size: row.get::<_, i64>(2)? as u64,
        mtime_ms: row.get(3)?,
        content_hash: row.get(4)?,
    })
}

fn row_to_symbol(row: &rusqlite::Row) -> rusqlite::Result<Symbol> {
    let kind_str: String = row.get(2)?;
    Ok(Symbol {
        file: row.get(0)?,
        name: row.get(1)?,
        kind: symbol_kind_from_str(&kind_str),
        start_line: row.get::<_, i64>(3)? as usize,
        end_line: row.get::<_, i64>(4)? as usize,
        signature: row.get(5)?,
    })
}

fn symbol_kind_from_str(s: &str) -> SymbolKind {
    match s {
        "class" => SymbolKind::Class,
        "interface" => SymbolKind::Interface,
        "function" => SymbolKind::Function,
        "method" => SymbolKind::Method,
        "constant" => SymbolKind::Constant,
        _ => SymbolKind::Variable,
    }
}

fn row_to_import_edge(row: &rusqlite::Row) -> rusqlite::Result<ImportEdge> {
    Ok(ImportEdge { source: row.get(0)?, target: row.get(1)?, symbol: row.get(2)? })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file(path: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            language: "rust".to_string(),
            size: 100,
            mtime_ms: 0,
            content_hash: "abc".to_string(),
        }
    }

    #[test]
    fn upsert_and_get_file_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let f = sample_file("src/lib.rs");
        store.upsert_file(&f).unwrap();
        let got = store.get_file("src/lib.rs").unwrap().unwrap();
        assert_eq!(got, f);
    }

    #[test]
    fn delete_file_cascades_to_symbols_and_imports() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_file(&sample_file("a.rs")).unwrap();
        store.upsert_file(&sample_file("b.rs")).unwrap();
        store
            .insert_symbol(&Symbol {
                file: "a.rs".into(),
                name: "Foo".into(),
                kind: SymbolKind::Class,
                start_line: 1,
                end_line: 2,
                signature: None,
            })
            .unwrap();
        store
            .insert_import(&ImportEdge { source: "a.rs".into(), target: "b.rs".into(), symbol: None })
            .unwrap();

        store.delete_file("a.rs").unwrap();

        assert!(store.get_symbols_by_file("a.rs").unwrap().is_empty());
        assert!(store.get_imports_from("a.rs").unwrap().is_empty());
    }

    #[test]
    fn search_content_tolerates_punctuation() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_file(&sample_file("a.rs")).unwrap();
        store.index_file_content("a.rs", "fn test() { assert!(true); }").unwrap();
        let results = store.search_content("test()", 10).unwrap();
        assert!(!results.is_empty());
    }

    #[test]
    fn stats_reflect_inserted_rows() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_file(&sample_file("a.rs")).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.files, 1);
    }
}
