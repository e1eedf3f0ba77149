//! Bulk Loader - streams a CSV file into a table one row at a time

use std::path::{Path, PathBuf};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use crate::storage::{Engine, Record, SharedEngine};
use crate::writer::{self, Payload};
use crate::Error;

/// A load that stopped early on an I/O or CSV error. Rows written before the
/// failure stay committed.
#[derive(Debug, thiserror::Error)]
#[error("load aborted after {rows_written} rows: {source}")]
pub struct LoadFailure {
    pub rows_written: u64,
    #[source]
    pub source: Error,
}

impl LoadFailure {
    fn new(rows_written: u64, source: impl Into<Error>) -> Self {
        Self { rows_written, source: source.into() }
    }
}

/// Stream `path` into `table`.
///
/// The first line names the columns; every following line becomes one
/// single-record upsert. A row the engine rejects is logged and counts as
/// zero rows; only reading the file can end the load early. Returns the
/// number of rows written.
pub async fn load(engine: &dyn Engine, table: &str, path: &Path) -> Result<u64, LoadFailure> {
    let file = tokio::fs::File::open(path).await.map_err(|e| LoadFailure::new(0, e))?;
    let mut reader = csv_async::AsyncReaderBuilder::new().create_reader(file);
    let headers = reader.headers().await.map_err(|e| LoadFailure::new(0, e))?.clone();
    tracing::debug!("{} headers={:?}", path.display(), headers);

    let mut rows_written = 0u64;
    let mut rows = reader.records();
    while let Some(row) = rows.next().await {
        let row = row.map_err(|e| LoadFailure::new(rows_written, e))?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();
        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(column, field)| (column.to_string(), Value::String(field.to_string())))
            .collect();
        match writer::try_upsert(engine, table, &Payload::Single(record)) {
            Ok(written) => rows_written += written as u64,
            Err(e) => tracing::warn!("{} line {}: {}", path.display(), line, e),
        }
    }
    Ok(rows_written)
}

/// [`load`] with its start, completion count or failure logged
pub async fn run_load(engine: SharedEngine, table: String, path: PathBuf) -> Result<u64, LoadFailure> {
    tracing::info!("Loading data from {} into {}", path.display(), table);
    let result = load(engine.as_ref(), &table, &path).await;
    match &result {
        Ok(count) => tracing::info!("Loading of {} completed with {} records", path.display(), count),
        Err(e) => tracing::error!("Loading of {} into {} failed: {}", path.display(), table, e),
    }
    result
}

/// Run [`run_load`] as a background task the caller can await or abort
pub fn spawn_load(engine: SharedEngine, table: String, path: PathBuf) -> JoinHandle<Result<u64, LoadFailure>> {
    tokio::spawn(run_load(engine, table, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStore;
    use crate::storage::testing::{Gate, GatedEngine};
    use std::sync::Arc;

    fn widgets_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute("CREATE TABLE widgets (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_load_two_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.csv");
        std::fs::write(&path, "id,name\n1,bolt\n2,\"nut, hex\"\n").unwrap();

        let store = widgets_store();
        let count = load(&store, "widgets", &path).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(store.count("widgets").unwrap(), 2);

        let rows = store.query("SELECT id, name FROM widgets ORDER BY id").unwrap();
        assert_eq!(rows[0]["id"], serde_json::json!(1));
        assert_eq!(rows[1]["name"], serde_json::json!("nut, hex"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let store = widgets_store();
        let err = load(&store, "widgets", Path::new("/nonexistent/widgets.csv")).await.unwrap_err();
        assert_eq!(err.rows_written, 0);
        assert!(matches!(err.source, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_malformed_row_stops_early() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.csv");
        std::fs::write(&path, "id,name\n1,bolt\n2\n3,gear\n").unwrap();

        let store = widgets_store();
        let err = load(&store, "widgets", &path).await.unwrap_err();
        assert_eq!(err.rows_written, 1);
        assert!(matches!(err.source, Error::Csv(_)));
        assert_eq!(store.count("widgets").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rejected_row_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.csv");
        std::fs::write(&path, "id,name\n1,a\nx,b\n3,c\n").unwrap();

        let store = widgets_store();
        let count = load(&store, "widgets", &path).await.unwrap();
        assert_eq!(count, 2);

        let rows = store.query("SELECT id FROM widgets ORDER BY id").unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![serde_json::json!(1), serde_json::json!(3)]);
    }

    #[tokio::test]
    async fn test_unknown_table_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gadgets.csv");
        std::fs::write(&path, "id\n1\n2\n").unwrap();

        let store = widgets_store();
        assert_eq!(load(&store, "gadgets", &path).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_spawn_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.csv");
        std::fs::write(&path, "id,name\n1,a\n2,b\n3,c\n").unwrap();

        let store = Arc::new(widgets_store());
        let handle = spawn_load(store.clone(), "widgets".to_string(), path);
        assert_eq!(handle.await.unwrap().unwrap(), 3);
        assert_eq!(store.count("widgets").unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_aborted_load_keeps_written_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widgets.csv");
        let mut content = String::from("id,name\n");
        for i in 1..=20_000 {
            content.push_str(&format!("{},widget-{}\n", i, i));
        }
        std::fs::write(&path, content).unwrap();

        let engine = Arc::new(GatedEngine::new(widgets_store(), Gate::Upsert(2)));
        let handle = spawn_load(engine.clone(), "widgets".to_string(), path.clone());

        // The load is parked on its second row
        engine.reached().await;
        handle.abort();
        engine.release().await;

        assert!(handle.await.unwrap_err().is_cancelled());
        let written = engine.store().count("widgets").unwrap();
        assert!((2..20_000).contains(&written), "written={}", written);

        let count = load(&*engine, "widgets", &path).await.unwrap();
        assert_eq!(count, 20_000);
        assert_eq!(engine.store().count("widgets").unwrap(), 20_000);
    }
}
