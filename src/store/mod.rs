// src/store/mod.rs
//
// The contract the two backing stores honor. The convergence layer and the
// services only ever talk to these traits; which physical store sits behind
// them is decided once, in the composition root (config.rs).

use async_trait::async_trait;
use serde_json::{Map, Value};

pub mod sheet;
pub mod sql;

#[cfg(test)]
pub mod memory;

/// One raw row exactly as the backing store produced it. Field names are
/// heterogeneous (snake_case SQL columns, camelCase sheet headers, legacy
/// aliases); only the convergence layer may interpret them.
pub type RawRecord = Map<String, Value>;

/// How a mutation addresses its target. Which variant is valid depends on the
/// entity's current write-authority store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    /// Stable identifier (SQL write authority).
    Id(String),
    /// Positional row index (spreadsheet write authority). Only meaningful
    /// against the sheet's current physical layout.
    Row(u64),
    /// Row index within a category partition (partitioned sheets, e.g. one
    /// tab per event type).
    PartitionRow { partition: String, row: u64 },
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::Id(id) => write!(f, "{}", id),
            RecordKey::Row(row) => write!(f, "row {}", row),
            RecordKey::PartitionRow { partition, row } => {
                write!(f, "row {} of '{}'", row, partition)
            }
        }
    }
}

/// What a store hands back after a successful mutation.
#[derive(Debug, Clone, Default)]
pub struct WriteReceipt {
    /// Store-assigned identifier, when the store is the id authority.
    pub id: Option<String>,
    /// Row index assigned by a sheet-backed store on create.
    pub row: Option<u64>,
}

#[async_trait]
pub trait StoreReader: Send + Sync {
    async fn get_all(&self) -> anyhow::Result<Vec<RawRecord>>;

    /// Point lookup, where the store supports one. `Ok(None)` means "not
    /// found or not supported"; the convergent reader falls back to scanning
    /// `get_all` in either case.
    async fn get_by_id(&self, _id: &str) -> anyhow::Result<Option<RawRecord>> {
        Ok(None)
    }

    /// Best-effort read-cache invalidation. Never fatal; stores without a
    /// cache leave the default no-op in place.
    async fn invalidate(&self, _cache_key: &str) {}
}

#[async_trait]
pub trait StoreWriter: Send + Sync {
    async fn create(&self, data: &RawRecord, actor: &str) -> anyhow::Result<WriteReceipt>;
    async fn update(&self, key: &RecordKey, data: &RawRecord, actor: &str)
        -> anyhow::Result<WriteReceipt>;
    async fn delete(&self, key: &RecordKey, actor: &str) -> anyhow::Result<WriteReceipt>;
}
