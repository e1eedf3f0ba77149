//! Dump Scheduler - the maintenance loop that keeps snapshots fresh
//!
//! Once per tick the scheduler enumerates every table, gives tables it has
//! never seen a due time one interval out, and starts a dump for each table
//! whose due time has passed and which is not already being dumped. The
//! "already being dumped" check is an [`InFlight`] lease taken atomically
//! before the dump task starts and released when the task ends, however it
//! ends.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use crate::dumper::{self, DumpOutcome};
use crate::storage::SharedEngine;
use crate::Result;

/// Scheduler timing and output settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between two ticks
    pub tick: Duration,
    /// Time between two dumps of the same table
    pub interval: Duration,
    /// Rows fetched per page while dumping
    pub page_size: u64,
    /// Directory receiving `<table>.csv` snapshots
    pub data_dir: PathBuf,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(60),
            interval: Duration::from_secs(15 * 60),
            page_size: 1000,
            data_dir: PathBuf::from("."),
        }
    }
}

/// Set of tables with a dump in flight
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    tables: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    fn tables(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `table` for a dump. Returns `None` if a dump already holds it.
    pub fn try_acquire(&self, table: &str) -> Option<DumpLease> {
        if !self.tables().insert(table.to_string()) {
            return None;
        }
        Some(DumpLease {
            table: table.to_string(),
            registry: self.clone(),
        })
    }

    /// Names of the tables currently being dumped
    pub fn snapshot(&self) -> HashSet<String> {
        self.tables().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.tables().is_empty()
    }
}

/// Exclusive claim on one table's dump; released on drop
#[derive(Debug)]
pub struct DumpLease {
    table: String,
    registry: InFlight,
}

impl DumpLease {
    pub fn table(&self) -> &str {
        &self.table
    }
}

impl Drop for DumpLease {
    fn drop(&mut self) {
        self.registry.tables().remove(&self.table);
    }
}

/// What one tick decided
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tables seen for the first time; scheduled one interval out
    pub first_seen: Vec<String>,
    /// Tables whose dump was started
    pub started: Vec<String>,
    /// Tables that were due but still being dumped
    pub busy: Vec<String>,
}

/// The maintenance loop and the state it owns
pub struct DumpScheduler {
    engine: SharedEngine,
    config: SchedulerConfig,
    due: HashMap<String, Instant>,
    in_flight: InFlight,
    tasks: JoinSet<()>,
}

impl DumpScheduler {
    pub fn new(engine: SharedEngine, config: SchedulerConfig) -> Self {
        Self {
            engine,
            config,
            due: HashMap::new(),
            in_flight: InFlight::default(),
            tasks: JoinSet::new(),
        }
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// When `table` is next due, if it has been seen
    pub fn due_at(&self, table: &str) -> Option<Instant> {
        self.due.get(table).copied()
    }

    /// Run one scheduling cycle as of `now`.
    ///
    /// Fails only when the engine cannot enumerate tables; nothing is
    /// changed in that case.
    pub fn tick_at(&mut self, now: Instant) -> Result<TickReport> {
        self.prune();
        let running = self.in_flight.snapshot();
        let tables = self.engine.table_names()?;

        let mut report = TickReport::default();
        for table in tables {
            let Some(due) = self.due.get(&table).copied() else {
                self.due.insert(table.clone(), now + self.config.interval);
                report.first_seen.push(table);
                continue;
            };
            if now < due {
                continue;
            }
            if running.contains(&table) {
                report.busy.push(table);
                continue;
            }
            match self.in_flight.try_acquire(&table) {
                Some(lease) => {
                    self.start_dump(lease);
                    self.due.insert(table.clone(), now + self.config.interval);
                    report.started.push(table);
                }
                None => report.busy.push(table),
            }
        }

        self.prune();
        Ok(report)
    }

    fn start_dump(&mut self, lease: DumpLease) {
        let engine = self.engine.clone();
        let dir = self.config.data_dir.clone();
        let page_size = self.config.page_size;
        self.tasks.spawn(async move {
            let table = lease.table().to_string();
            tracing::info!("Dumping data from {}", table);
            match dumper::dump(engine.as_ref(), &table, &dir, page_size).await {
                Ok(DumpOutcome::Written { rows, path }) => {
                    tracing::info!("Completed dump of {} / records={} -> {}", table, rows, path.display())
                }
                Ok(DumpOutcome::Empty) => tracing::info!("Table {} is empty - not dumping", table),
                Err(e) => tracing::error!("Dump of {} failed: {}", table, e),
            }
            drop(lease);
        });
    }

    /// Reap finished dump tasks without waiting
    fn prune(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    tracing::error!("Dump task panicked: {}", e);
                }
            }
        }
    }

    /// Wait for every in-flight dump to finish
    pub async fn wait_idle(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    tracing::error!("Dump task panicked: {}", e);
                }
            }
        }
    }

    /// Abort every in-flight dump. Each aborted dump stops at its next
    /// suspension point, leaving its `.partial` file and the previous snapshot
    /// as they were; its lease is released once the task is gone.
    pub fn abort_dumps(&mut self) {
        self.tasks.abort_all();
    }

    /// Tick until `cancel` fires, then abort in-flight dumps.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("Maintenance routine started");
        tracing::info!("Dump interval is {:?}, tick {:?}", self.config.interval, self.config.tick);

        let mut ticker = tokio::time::interval(self.config.tick);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.tick_at(Instant::now()) {
                Ok(report) => {
                    if !report.started.is_empty() || !report.busy.is_empty() {
                        tracing::debug!("Tick: started={:?} busy={:?}", report.started, report.busy);
                    }
                }
                Err(e) => tracing::error!("Cannot enumerate tables, skipping tick: {}", e),
            }
        }

        tracing::info!("Maintenance routine stopping ({} dumps in flight)", self.tasks.len());
        self.abort_dumps();
        self.wait_idle().await;
    }

    /// Launch [`run`](Self::run) as the standing background task
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
