//! SQLite engine implementation

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use crate::{Error, Result};
use super::value::{self, Record};
use super::{Engine, quote_ident, schema};

/// DSN selecting a private in-memory database
pub const MEMORY_DSN: &str = ":memory:";

/// SQLite-backed table store
///
/// Every statement runs under the connection mutex, so concurrent tasks
/// see statement-level serialization and nothing more.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a database by DSN: `:memory:` or a file path
    pub fn open(dsn: &str) -> Result<Self> {
        if dsn == MEMORY_DSN {
            return Self::open_in_memory();
        }
        let conn = Connection::open(Path::new(dsn))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves the connection usable; SQLite rolls
        // back the failed statement on its own.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count the rows of a table
    pub fn count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = self.conn().query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Create an index on a single column if it does not already exist
    pub fn create_index(&self, table: &str, name: &str, field: &str) -> Result<()> {
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_ident(name),
            quote_ident(table),
            quote_ident(field)
        );
        self.conn().execute(&sql, [])?;
        tracing::info!("Created index {} on {}({})", name, table, field);
        Ok(())
    }

    /// Rebuild the database file, reclaiming free pages
    pub fn vacuum(&self) -> Result<()> {
        self.conn().execute_batch("VACUUM")?;
        Ok(())
    }

    fn select_records(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Record>> {
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let records = stmt
            .query_map(params, |row| value::row_to_record(row, &columns))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

impl Engine for SqliteStore {
    fn table_names(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(schema::LIST_TABLES)?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    fn upsert(&self, table: &str, records: &[Record]) -> Result<usize> {
        let Some(first) = records.first() else {
            return Err(Error::MalformedPayload("no records to write".to_string()));
        };
        let columns: Vec<&String> = first.keys().collect();
        let sql = format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(","),
            (1..=columns.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>().join(","),
        );
        let statement_err = |source| Error::Statement { statement: sql.clone(), source };

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(&sql).map_err(statement_err)?;
            for record in records {
                let mut values = Vec::with_capacity(columns.len());
                for column in &columns {
                    let value = record.get(column.as_str()).ok_or_else(|| Error::InvalidValue {
                        column: column.to_string(),
                        reason: "missing from record".to_string(),
                    })?;
                    values.push(value::to_sql(column, value)?);
                }
                written += stmt.execute(params_from_iter(values)).map_err(statement_err)?;
            }
        }
        tx.commit()?;
        Ok(written)
    }

    fn first_row(&self, table: &str) -> Result<Option<Record>> {
        let sql = format!("SELECT * FROM {} LIMIT 1", quote_ident(table));
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let record = stmt
            .query_row([], |row| value::row_to_record(row, &columns))
            .optional()?;
        Ok(record)
    }

    fn fetch_page(&self, table: &str, offset: u64, limit: u64) -> Result<Vec<Record>> {
        let sql = format!("SELECT * FROM {} LIMIT ?1 OFFSET ?2", quote_ident(table));
        Self::select_records(&self.conn(), &sql, params![limit as i64, offset as i64])
    }

    fn execute(&self, statement: &str) -> Result<usize> {
        let conn = self.conn();
        conn.execute_batch(statement).map_err(|source| Error::Statement {
            statement: statement.to_string(),
            source,
        })?;
        Ok(conn.changes() as usize)
    }

    fn query(&self, statement: &str) -> Result<Vec<Record>> {
        Self::select_records(&self.conn(), statement, [])
    }
}
