//! Schema bootstrap and catalog statements

use std::path::{Path, PathBuf};
use ignore::WalkBuilder;
use super::Engine;

/// SQL listing every user table, excluding SQLite's internal ones
pub const LIST_TABLES: &str = r#"
SELECT name FROM sqlite_schema
WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
ORDER BY name
"#;

/// Execute every file under `dir`, recursively, as a SQL batch. Files run
/// in path order, so `01_base.sql` runs before `app/widgets.sql`.
///
/// A file that fails is logged and skipped; the remaining files still run.
/// Returns the number of files applied successfully.
pub fn apply_schema_dir(engine: &dyn Engine, dir: &Path) -> usize {
    if !dir.is_dir() {
        tracing::warn!("Schema folder {} does not exist - no schema applied", dir.display());
        return 0;
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkBuilder::new(dir).standard_filters(false).build() {
        match entry {
            Ok(entry) if entry.file_type().is_some_and(|t| t.is_file()) => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => tracing::error!("Cannot walk schema folder {}: {}", dir.display(), e),
        }
    }
    files.sort();

    let mut applied = 0;
    for path in files {
        tracing::info!("Executing content of {}", path.display());
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("Cannot read {}: {}", path.display(), e);
                continue;
            }
        };
        match engine.execute(&content) {
            Ok(_) => applied += 1,
            Err(e) => tracing::error!("Schema file {} failed: {}", path.display(), e),
        }
    }
    applied
}
