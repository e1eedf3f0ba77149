//! Startup Seeder - loads every CSV under the data folder at process start

use std::path::Path;
use ignore::WalkBuilder;
use tokio::task::JoinSet;
use crate::loader::{self, LoadFailure};
use crate::storage::SharedEngine;
use crate::dumper::SNAPSHOT_EXT;

/// Result of a single file load launched by [`seed`]
pub type SeedLoad = (String, Result<u64, LoadFailure>);

/// Totals of a finished seeding run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub loaded: usize,
    pub failed: usize,
    pub rows: u64,
}

impl std::fmt::Display for SeedSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} file(s) loaded, {} failed, {} rows", self.loaded, self.failed, self.rows)
    }
}

/// Walk `root` recursively and start a concurrent load for every `.csv`
/// file, named after the file stem. Other files are logged and skipped.
///
/// The returned set holds one task per launched load; each load succeeds or
/// fails on its own.
pub fn seed(engine: SharedEngine, root: &Path) -> JoinSet<SeedLoad> {
    let mut loads = JoinSet::new();
    if !root.is_dir() {
        tracing::warn!("Data folder {} does not exist - nothing to load", root.display());
        return loads;
    }

    let mut skipped = 0usize;
    let walker = WalkBuilder::new(root).standard_filters(false).build();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::error!("Cannot walk {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let path = entry.into_path();
        let is_csv = path.extension().and_then(|e| e.to_str()) == Some(SNAPSHOT_EXT);
        let table = path.file_stem().and_then(|s| s.to_str()).map(str::to_string);
        match table {
            Some(table) if is_csv => {
                let engine = engine.clone();
                loads.spawn(async move {
                    let result = loader::run_load(engine, table.clone(), path).await;
                    (table, result)
                });
            }
            _ => {
                tracing::info!("Ignoring file {} ... will not load.", path.display());
                skipped += 1;
            }
        }
    }

    tracing::info!("Seeding {} file(s) from {} ({} skipped)", loads.len(), root.display(), skipped);
    loads
}

/// Wait for every load of a seeding run and total the results
pub async fn collect(mut loads: JoinSet<SeedLoad>) -> SeedSummary {
    let mut summary = SeedSummary::default();
    while let Some(joined) = loads.join_next().await {
        match joined {
            Ok((_, Ok(rows))) => {
                summary.loaded += 1;
                summary.rows += rows;
            }
            Ok((_, Err(e))) => {
                summary.failed += 1;
                summary.rows += e.rows_written;
            }
            Err(e) => {
                tracing::error!("Load task did not finish: {}", e);
                summary.failed += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Engine, SqliteStore};
    use std::sync::Arc;

    fn store() -> Arc<SqliteStore> {
        let store = SqliteStore::open_in_memory().unwrap();
        store.execute("CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
        store.execute("CREATE TABLE events (id INTEGER PRIMARY KEY)").unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_seed_walks_recursively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("widgets.csv"), "id,name\n1,a\n2,b\n").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/events.csv"), "id\n10\n11\n12\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "not data").unwrap();
        std::fs::write(dir.path().join("events.partial"), "id\n99\n").unwrap();

        let store = store();
        let mut loads = seed(store.clone(), dir.path());

        let mut results = Vec::new();
        while let Some(joined) = loads.join_next().await {
            let (table, result) = joined.unwrap();
            results.push((table, result.unwrap()));
        }
        results.sort();
        assert_eq!(results, vec![("events".to_string(), 3), ("widgets".to_string(), 2)]);
        assert_eq!(store.count("widgets").unwrap(), 2);
        assert_eq!(store.count("events").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_one_failed_load_does_not_affect_others() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("widgets.csv"), "id,name\n1,a\n").unwrap();
        std::fs::write(dir.path().join("events.csv"), "id\n1,2\n").unwrap();

        let store = store();
        let mut loads = seed(store.clone(), dir.path());
        let mut failed = Vec::new();
        while let Some(joined) = loads.join_next().await {
            let (table, result) = joined.unwrap();
            if result.is_err() {
                failed.push(table);
            }
        }
        assert_eq!(failed, vec!["events"]);
        assert_eq!(store.count("widgets").unwrap(), 1);
        assert_eq!(store.count("events").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_table_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("gadgets.csv"), "id\n1\n").unwrap();

        let summary = collect(seed(store(), dir.path())).await;
        assert_eq!(summary, SeedSummary { loaded: 1, failed: 0, rows: 0 });
    }

    #[tokio::test]
    async fn test_collect_summary() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("widgets.csv"), "id,name\n1,a\n2,b\n").unwrap();
        std::fs::write(dir.path().join("events.csv"), "id\n1\nbad,row\n").unwrap();

        let summary = collect(seed(store(), dir.path())).await;
        assert_eq!(summary, SeedSummary { loaded: 1, failed: 1, rows: 3 });
    }

    #[tokio::test]
    async fn test_missing_root() {
        let loads = seed(store(), Path::new("/nonexistent/transientdb-data"));
        assert!(loads.is_empty());
    }
}
