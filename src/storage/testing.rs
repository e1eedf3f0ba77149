//! Engine wrappers for exercising cancellation in tests

use std::sync::Barrier;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use super::{Engine, Record, SqliteStore};
use crate::Result;

/// Where a [`GatedEngine`] parks its caller
#[derive(Debug, Clone, Copy)]
pub enum Gate {
    /// The first `fetch_page` call at or past this offset
    Page(u64),
    /// The n-th `upsert` call, counting from 1
    Upsert(usize),
}

/// SQLite engine that blocks the calling thread once, at its [`Gate`], until
/// the test lets it go.
///
/// The blocked call waits on `reached` and then on `release`; the test calls
/// [`GatedEngine::reached`] to learn the gate was hit and
/// [`GatedEngine::release`] to let the call finish.
pub struct GatedEngine {
    inner: SqliteStore,
    gate: Gate,
    armed: AtomicBool,
    upserts: AtomicUsize,
    reached: Barrier,
    release: Barrier,
}

impl GatedEngine {
    pub fn new(inner: SqliteStore, gate: Gate) -> Self {
        Self {
            inner,
            gate,
            armed: AtomicBool::new(true),
            upserts: AtomicUsize::new(0),
            reached: Barrier::new(2),
            release: Barrier::new(2),
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.inner
    }

    /// Wait until a call is parked at the gate
    pub async fn reached(self: &Arc<Self>) {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || {
            engine.reached.wait();
        })
        .await
        .unwrap();
    }

    /// Let the parked call continue
    pub async fn release(self: &Arc<Self>) {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || {
            engine.release.wait();
        })
        .await
        .unwrap();
    }

    fn park(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.wait();
            self.release.wait();
        }
    }
}

impl Engine for GatedEngine {
    fn table_names(&self) -> Result<Vec<String>> {
        self.inner.table_names()
    }

    fn upsert(&self, table: &str, records: &[Record]) -> Result<usize> {
        let call = self.upserts.fetch_add(1, Ordering::SeqCst) + 1;
        if matches!(self.gate, Gate::Upsert(n) if n == call) {
            self.park();
        }
        self.inner.upsert(table, records)
    }

    fn first_row(&self, table: &str) -> Result<Option<Record>> {
        self.inner.first_row(table)
    }

    fn fetch_page(&self, table: &str, offset: u64, limit: u64) -> Result<Vec<Record>> {
        if matches!(self.gate, Gate::Page(at) if offset >= at) {
            self.park();
        }
        self.inner.fetch_page(table, offset, limit)
    }

    fn execute(&self, statement: &str) -> Result<usize> {
        self.inner.execute(statement)
    }

    fn query(&self, statement: &str) -> Result<Vec<Record>> {
        self.inner.query(statement)
    }
}
