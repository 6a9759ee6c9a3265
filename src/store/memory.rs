// src/store/memory.rs
//
// In-memory store double for tests: partitioned rows with sheet-style row
// indices, scripted failures, call counters and recorded invalidations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{RawRecord, RecordKey, StoreReader, StoreWriter, WriteReceipt};

const ID_FIELDS: &[&str] = &["id", "companyId", "contactId", "opportunityId", "eventId"];

/// Data rows on a sheet start at 2 (row 1 is the header).
const FIRST_DATA_ROW: u64 = 2;

#[derive(Default)]
pub struct MemoryStore {
    partitions: Mutex<HashMap<String, Vec<RawRecord>>>,
    pub get_all_calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_creates: AtomicBool,
    invalidations: Mutex<Vec<String>>,
    ops: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds rows into a partition, assigning sequential row indices to rows
    /// that do not carry one. Pass `""` for unpartitioned sheets.
    pub fn seed(&self, partition: &str, rows: Vec<Value>) {
        let mut partitions = self.partitions.lock().unwrap();
        let slot = partitions.entry(partition.to_string()).or_default();
        for row in rows {
            let Value::Object(mut map) = row else { continue };
            if !map.contains_key("rowIndex") {
                let next = next_row_index(slot);
                map.insert("rowIndex".into(), json!(next));
            }
            slot.push(map);
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn invalidations(&self) -> Vec<String> {
        self.invalidations.lock().unwrap().clone()
    }

    /// Mutation log, e.g. `"delete Meeting:5"`, for ordering assertions.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn rows_in(&self, partition: &str) -> Vec<RawRecord> {
        self.partitions
            .lock()
            .unwrap()
            .get(partition)
            .cloned()
            .unwrap_or_default()
    }

    fn log(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }
}

fn next_row_index(rows: &[RawRecord]) -> u64 {
    rows.iter()
        .filter_map(|r| r.get("rowIndex").and_then(Value::as_u64))
        .max()
        .map(|n| n + 1)
        .unwrap_or(FIRST_DATA_ROW)
}

fn key_label(key: &RecordKey) -> String {
    match key {
        RecordKey::Id(id) => id.clone(),
        RecordKey::Row(row) => row.to_string(),
        RecordKey::PartitionRow { row, .. } => row.to_string(),
    }
}

fn matches_key(row: &RawRecord, key: &RecordKey, partition: &str) -> bool {
    match key {
        RecordKey::Id(id) => ID_FIELDS
            .iter()
            .any(|f| row.get(*f).and_then(Value::as_str) == Some(id)),
        RecordKey::Row(row_index) => {
            partition.is_empty() && row.get("rowIndex").and_then(Value::as_u64) == Some(*row_index)
        }
        RecordKey::PartitionRow { partition: wanted, row: row_index } => {
            partition == wanted && row.get("rowIndex").and_then(Value::as_u64) == Some(*row_index)
        }
    }
}

#[async_trait]
impl StoreReader for MemoryStore {
    async fn get_all(&self) -> anyhow::Result<Vec<RawRecord>> {
        self.get_all_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("scripted read failure");
        }
        let partitions = self.partitions.lock().unwrap();
        let mut all: Vec<RawRecord> = partitions.values().flatten().cloned().collect();
        all.sort_by_key(|r| r.get("rowIndex").and_then(Value::as_u64).unwrap_or(0));
        Ok(all)
    }

    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<RawRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("scripted read failure");
        }
        let partitions = self.partitions.lock().unwrap();
        Ok(partitions.values().flatten().find_map(|row| {
            let matches = ID_FIELDS
                .iter()
                .any(|f| row.get(*f).and_then(Value::as_str) == Some(id));
            matches.then(|| row.clone())
        }))
    }

    async fn invalidate(&self, cache_key: &str) {
        self.invalidations.lock().unwrap().push(cache_key.to_string());
    }
}

#[async_trait]
impl StoreWriter for MemoryStore {
    async fn create(&self, data: &RawRecord, _actor: &str) -> anyhow::Result<WriteReceipt> {
        if self.fail_creates.load(Ordering::SeqCst) {
            anyhow::bail!("scripted create failure");
        }
        // Partitioned sheets place the row under the partition matching the
        // record's own category field.
        let partition = data
            .get("eventType")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let mut partitions = self.partitions.lock().unwrap();
        let slot = partitions.entry(partition.clone()).or_default();
        let row_index = next_row_index(slot);
        let mut row = data.clone();
        row.insert("rowIndex".into(), json!(row_index));
        slot.push(row);

        self.log(format!("create {}:{}", partition, row_index));
        Ok(WriteReceipt { id: None, row: Some(row_index) })
    }

    async fn update(
        &self,
        key: &RecordKey,
        data: &RawRecord,
        _actor: &str,
    ) -> anyhow::Result<WriteReceipt> {
        let mut partitions = self.partitions.lock().unwrap();
        for (partition, slot) in partitions.iter_mut() {
            if let Some(row) = slot.iter_mut().find(|r| matches_key(r, key, partition)) {
                for (k, v) in data {
                    row.insert(k.clone(), v.clone());
                }
                let row_index = row.get("rowIndex").and_then(Value::as_u64);
                self.log(format!("update {}:{}", partition, key_label(key)));
                return Ok(WriteReceipt { id: None, row: row_index });
            }
        }
        anyhow::bail!("no record matching {}", key)
    }

    async fn delete(&self, key: &RecordKey, _actor: &str) -> anyhow::Result<WriteReceipt> {
        let mut partitions = self.partitions.lock().unwrap();
        for (partition, slot) in partitions.iter_mut() {
            let before = slot.len();
            slot.retain(|r| !matches_key(r, key, partition));
            if slot.len() < before {
                self.log(format!("delete {}:{}", partition, key_label(key)));
                return Ok(WriteReceipt { id: None, row: None });
            }
        }
        anyhow::bail!("no record matching {}", key)
    }
}
