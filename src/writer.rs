//! Upsert Writer - insert-or-replace of one record or a homogeneous batch
//!
//! [`try_upsert`] reports failures as structured errors. [`upsert`] is the
//! best-effort form the request layer uses: it logs the failure and reports
//! zero rows written instead.

use std::collections::BTreeSet;
use serde_json::Value;
use crate::storage::{Engine, Record};
use crate::{Error, Result};

/// A write request: a single record or a non-empty batch
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Single(Record),
    Batch(Vec<Record>),
}

impl Payload {
    /// The records to write, in order
    pub fn records(&self) -> &[Record] {
        match self {
            Payload::Single(record) => std::slice::from_ref(record),
            Payload::Batch(records) => records,
        }
    }
}

impl TryFrom<Value> for Payload {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(record) => Ok(Payload::Single(record)),
            Value::Array(items) if items.is_empty() => {
                Err(Error::MalformedPayload("empty batch".to_string()))
            }
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| match item {
                    Value::Object(record) => Ok(record),
                    other => Err(Error::MalformedPayload(format!(
                        "batch element {} is not a record: {}",
                        idx, other
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Payload::Batch),
            other => Err(Error::MalformedPayload(format!("expected a record or a list of records, got {}", other))),
        }
    }
}

/// Write `payload` into `table` with insert-or-replace semantics.
///
/// Every record of a batch must carry the same column set as the first one;
/// a mismatching batch is rejected before anything is written.
pub fn try_upsert(engine: &dyn Engine, table: &str, payload: &Payload) -> Result<usize> {
    let records = payload.records();
    if let Some((first, rest)) = records.split_first() {
        let columns: BTreeSet<&String> = first.keys().collect();
        if let Some(pos) = rest.iter().position(|r| r.keys().collect::<BTreeSet<_>>() != columns) {
            return Err(Error::HeterogeneousBatch { index: pos + 1 });
        }
    }
    engine.upsert(table, records)
}

/// Best-effort upsert of a raw JSON payload. Failures are logged and
/// reported as zero rows written.
pub fn upsert(engine: &dyn Engine, table: &str, value: Value) -> usize {
    let result = Payload::try_from(value).and_then(|payload| try_upsert(engine, table, &payload));
    match result {
        Ok(written) => written,
        Err(e @ Error::MalformedPayload(_)) => {
            tracing::debug!("Ignoring write to {}: {}", table, e);
            0
        }
        Err(e) => {
            tracing::error!("Upsert into {} failed: {}", table, e);
            0
        }
    }
}
