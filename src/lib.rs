//! # TransientDB - memory-resident tables with flat-file snapshots
//!
//! TransientDB keeps its tables in an in-memory SQLite database and treats
//! CSV files as the only durable state:
//! - Startup seeding: every `<table>.csv` under the data folder is streamed in
//! - Upsert writes: single records or homogeneous batches, insert-or-replace
//! - Periodic snapshots: a maintenance loop dumps due tables to `<table>.csv`
//!   through a `<table>.partial` file and an atomic rename
//! - A small HTTP surface for writes, reads and pass-through SQL

pub mod config;
pub mod storage;
pub mod writer;
pub mod loader;
pub mod dumper;
pub mod scheduler;
pub mod seeder;
pub mod server;

// Re-exports for convenient access
pub use storage::{Engine, Record, SharedEngine, SqliteStore};
pub use writer::Payload;
pub use dumper::DumpOutcome;
pub use scheduler::{DumpScheduler, SchedulerConfig};

/// Result type alias for TransientDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for TransientDB operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv_async::Error),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Batch record {index} does not share the column set of the first record")]
    HeterogeneousBatch { index: usize },

    #[error("Unsupported value for column '{column}': {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("Statement failed: {statement} ({source})")]
    Statement {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },
}
