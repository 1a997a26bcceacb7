//! Orchestrates Scanner → Store → Extractor → Graph → VCS, reporting progress (§4.7).
//! Idempotent: re-running with unchanged files leaves the store logically unchanged.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::ignore_matcher::IgnoreMatcher;
use crate::imports;
use crate::scanner;
use crate::store::Store;
use crate::symbols;
use crate::types::ScanConfig;
use crate::vcs;

pub struct Indexer<'a> {
    store: &'a Store,
    config: ScanConfig,
}

impl<'a> Indexer<'a> {
    pub fn new(store: &'a Store, config: ScanConfig) -> Self {
        Self { store, config }
    }

    /// Full index run. Fatal on store I/O failure (`upsert`/`clear` per §7); all
    /// other per-file failures are skipped individually.
    pub fn run(&self, ignore: &IgnoreMatcher) -> Result<()> {
        let records = scanner::scan(&self.config, ignore);
        let total = records.len();
        info!(total, "indexing started");

        let mut new_paths: HashSet<String> = HashSet::new();
        for (i, record) in records.iter().enumerate() {
            new_paths.insert(record.path.clone());
            debug!(current = i + 1, total, path = %record.path, "indexing file");

            let full_path = self.config.root.join(&record.path);
            let content = match std::fs::read_to_string(&full_path) {
                Ok(c) => c,
                Err(_) => continue,
            };

            self.store.upsert_file(record).context("upserting file record")?;
            self.store
                .index_file_content(&record.path, &content)
                .context("indexing file content")?;

            self.store.clear_symbols_for_file(&record.path).context("clearing stale symbols")?;
            for symbol in symbols::extract_symbols(&record.path, &record.language, &content) {
                let _ = self.store.insert_symbol(&symbol);
            }

            self.store.clear_imports_for_file(&record.path).context("clearing stale imports")?;
        }

        // Import resolution needs the full indexed path set, so it runs as a
        // second pass once every file is upserted.
        let indexed: HashSet<String> = new_paths.clone();
        for record in &records {
            let full_path = self.config.root.join(&record.path);
            let Ok(content) = std::fs::read_to_string(&full_path) else { continue };
            for edge in imports::build_edges(&record.path, &record.language, &content, &indexed) {
                let _ = self.store.insert_import(&edge);
            }
        }

        self.reconcile(&new_paths)?;

        let hotspots = vcs::hot_files(&self.config.root);
        for (path, signal) in hotspots {
            if new_paths.contains(&path) {
                let _ = self.store.upsert_vcs_signal(&path, &signal);
            }
        }

        info!(total, "indexing complete");
        Ok(())
    }

    /// Purges files absent from the new scan (cascades to their symbols, imports,
    /// FTS row, and VCS signal via the store's foreign keys).
    fn reconcile(&self, new_paths: &HashSet<String>) -> Result<()> {
        let existing = self.store.get_all_files().context("loading existing files for reconciliation")?;
        for file in existing {
            if !new_paths.contains(&file.path) {
                self.store.delete_file(&file.path).context("deleting stale file")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn index_run_is_idempotent() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();
        let store = Store::open_in_memory().unwrap();
        let config = ScanConfig::new(PathBuf::from(dir.path()));
        let ignore = IgnoreMatcher::build(dir.path(), &[]);
        let indexer = Indexer::new(&store, config.clone());

        indexer.run(&ignore).unwrap();
        let stats_first = store.stats().unwrap();
        indexer.run(&ignore).unwrap();
        let stats_second = store.stats().unwrap();

        assert_eq!(stats_first.files, stats_second.files);
        assert_eq!(stats_first.symbols, stats_second.symbols);
    }

    #[test]
    fn index_run_reconciles_deleted_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn a() {}\n").unwrap();
        std::fs::write(dir.path().join("b.rs"), "fn b() {}\n").unwrap();
        let store = Store::open_in_memory().unwrap();
        let config = ScanConfig::new(PathBuf::from(dir.path()));
        let ignore = IgnoreMatcher::build(dir.path(), &[]);
        Indexer::new(&store, config.clone()).run(&ignore).unwrap();
        assert_eq!(store.stats().unwrap().files, 2);

        std::fs::remove_file(dir.path().join("b.rs")).unwrap();
        Indexer::new(&store, config).run(&ignore).unwrap();
        assert_eq!(store.stats().unwrap().files, 1);
        assert!(store.get_file("b.rs").unwrap().is_none());
    }
}
