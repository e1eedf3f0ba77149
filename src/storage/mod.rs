//! Storage Layer - the relational engine behind every table
//!
//! The engine is an in-memory SQLite database. Tables, their columns and
//! their conflict keys are owned entirely by SQLite; the rest of the crate
//! only talks to it through the [`Engine`] trait:
//! - table enumeration
//! - insert-or-replace of records
//! - first-row lookup and offset paging (used by dumps)
//! - raw pass-through statements

pub mod schema;
pub mod sqlite;
pub mod value;
#[cfg(test)]
pub(crate) mod testing;

pub use sqlite::SqliteStore;
pub use value::Record;

use std::sync::Arc;
use crate::Result;

/// An engine handle shared by background tasks
pub type SharedEngine = Arc<dyn Engine>;

/// The operations the load/dump/schedule core needs from the relational engine.
///
/// Implementations must serialize statement execution themselves; callers
/// share one engine across every background task without extra locking.
pub trait Engine: Send + Sync {
    /// Names of every user table currently known to the engine
    fn table_names(&self) -> Result<Vec<String>>;

    /// Insert-or-replace `records` into `table` as one atomic write.
    ///
    /// The column list comes from the first record. Returns the number of
    /// rows written.
    fn upsert(&self, table: &str, records: &[Record]) -> Result<usize>;

    /// First row of `table`, or `None` when the table is empty
    fn first_row(&self, table: &str) -> Result<Option<Record>>;

    /// Up to `limit` rows of `table` starting at `offset`
    fn fetch_page(&self, table: &str, offset: u64, limit: u64) -> Result<Vec<Record>>;

    /// Execute a statement (or `;`-separated batch) and return the rows changed
    fn execute(&self, statement: &str) -> Result<usize>;

    /// Run a read statement and return every row
    fn query(&self, statement: &str) -> Result<Vec<Record>>;
}

/// Quote an identifier for splicing into statement text
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
