//! Bulk Dumper - pages a table out to `<table>.csv`
//!
//! Rows are written to `<table>.partial` first and the finished file is
//! renamed over the snapshot in one step, so a reader never sees a
//! half-written `<table>.csv`. A failed or cancelled dump leaves the partial
//! file behind and the previous snapshot untouched.

use std::path::{Path, PathBuf};
use csv_async::AsyncWriter;
use crate::storage::{Engine, value};
use crate::Result;

/// Extension of finished snapshots
pub const SNAPSHOT_EXT: &str = "csv";

/// Extension of in-progress dumps
pub const PARTIAL_EXT: &str = "partial";

/// Stable snapshot path of a table
pub fn snapshot_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{}.{}", table, SNAPSHOT_EXT))
}

/// Working file path of a table dump
pub fn partial_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{}.{}", table, PARTIAL_EXT))
}

/// What a completed dump produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpOutcome {
    /// The table had no rows; no file was written
    Empty,
    /// The snapshot at `path` now holds `rows` rows
    Written { rows: u64, path: PathBuf },
}

/// Dump `table` into `dir`, reading `page_size` rows per page.
///
/// Offsets advance by `page_size` regardless of how many rows a page
/// returned; rows inserted or deleted mid-dump may shift the window.
pub async fn dump(engine: &dyn Engine, table: &str, dir: &Path, page_size: u64) -> Result<DumpOutcome> {
    let page_size = page_size.max(1);
    let Some(first) = engine.first_row(table)? else {
        return Ok(DumpOutcome::Empty);
    };
    let header: Vec<String> = first.keys().cloned().collect();

    let partial = partial_path(dir, table);
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut rows = 0u64;
    {
        let mut writer = AsyncWriter::from_writer(&mut file);
        writer.write_record(&header).await?;

        let mut offset = 0u64;
        loop {
            let page = engine.fetch_page(table, offset, page_size)?;
            if page.is_empty() {
                break;
            }
            for record in &page {
                let fields: Vec<String> = header
                    .iter()
                    .map(|column| record.get(column).map(value::to_field).unwrap_or_default())
                    .collect();
                writer.write_record(fields).await?;
            }
            rows += page.len() as u64;
            offset += page_size;
            tracing::debug!("Dumped page of {} ({} rows so far)", table, rows);
        }
        writer.flush().await?;
    }
    file.sync_all().await?;
    drop(file);

    let snapshot = snapshot_path(dir, table);
    tokio::fs::rename(&partial, &snapshot).await?;
    Ok(DumpOutcome::Written { rows, path: snapshot })
}
