// src/store/sheet.rs
//
// Adapter for the spreadsheet web app (an Apps-Script-style endpoint speaking
// a small action/sheet/row JSON envelope). One instance per sheet. Carries a
// short-lived read cache; `invalidate` clears it so the next read hits the
// sheet again. The cache is a freshness hint only; the convergence layer
// re-invalidates before any row-index resolution.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use super::{RawRecord, RecordKey, StoreReader, StoreWriter, WriteReceipt};

const CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct SheetClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl SheetClient {
    pub fn new(endpoint: String, token: String) -> Self {
        Self { http: reqwest::Client::new(), endpoint, token }
    }

    async fn call(&self, request: &SheetRequest<'_>) -> anyhow::Result<SheetEnvelope> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "token": self.token, "request": request }))
            .send()
            .await?
            .error_for_status()?;

        let envelope: SheetEnvelope = response.json().await?;
        if !envelope.ok {
            anyhow::bail!(
                "sheet endpoint rejected '{}': {}",
                request.action,
                envelope.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(envelope)
    }
}

#[derive(Serialize)]
struct SheetRequest<'a> {
    action: &'a str,
    sheet: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    partition: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    row: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a RawRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actor: Option<&'a str>,
}

impl<'a> SheetRequest<'a> {
    fn new(action: &'a str, sheet: &'a str) -> Self {
        Self { action, sheet, partition: None, row: None, data: None, actor: None }
    }
}

#[derive(Deserialize)]
struct SheetEnvelope {
    ok: bool,
    error: Option<String>,
    rows: Option<Value>,
    id: Option<String>,
    row: Option<u64>,
}

pub struct SheetStore {
    client: SheetClient,
    sheet: &'static str,
    cache: RwLock<Option<(Instant, Vec<RawRecord>)>>,
}

impl SheetStore {
    pub fn new(client: SheetClient, sheet: &'static str) -> Self {
        Self { client, sheet, cache: RwLock::new(None) }
    }

    fn key_parts(key: &RecordKey) -> anyhow::Result<(Option<&str>, u64)> {
        match key {
            RecordKey::Row(row) => Ok((None, *row)),
            RecordKey::PartitionRow { partition, row } => Ok((Some(partition.as_str()), *row)),
            RecordKey::Id(_) => {
                anyhow::bail!("sheet stores are addressed by row index, got {}", key)
            }
        }
    }
}

#[async_trait]
impl StoreReader for SheetStore {
    async fn get_all(&self) -> anyhow::Result<Vec<RawRecord>> {
        if let Some((at, rows)) = self.cache.read().await.as_ref() {
            if at.elapsed() < CACHE_TTL {
                return Ok(rows.clone());
            }
        }

        let envelope = self.client.call(&SheetRequest::new("getAll", self.sheet)).await?;

        // A response without a row array is malformed, not empty.
        let Some(Value::Array(raw)) = envelope.rows else {
            anyhow::bail!("sheet '{}' returned a non-array getAll response", self.sheet);
        };
        let rows: Vec<RawRecord> = raw
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();

        *self.cache.write().await = Some((Instant::now(), rows.clone()));
        Ok(rows)
    }

    async fn invalidate(&self, cache_key: &str) {
        tracing::debug!(sheet = self.sheet, cache_key, "sheet cache invalidated");
        *self.cache.write().await = None;
    }
}

#[async_trait]
impl StoreWriter for SheetStore {
    async fn create(&self, data: &RawRecord, actor: &str) -> anyhow::Result<WriteReceipt> {
        let mut request = SheetRequest::new("create", self.sheet);
        request.data = Some(data);
        request.actor = Some(actor);
        let envelope = self.client.call(&request).await?;
        Ok(WriteReceipt { id: envelope.id, row: envelope.row })
    }

    async fn update(
        &self,
        key: &RecordKey,
        data: &RawRecord,
        actor: &str,
    ) -> anyhow::Result<WriteReceipt> {
        let (partition, row) = Self::key_parts(key)?;
        let mut request = SheetRequest::new("update", self.sheet);
        request.partition = partition;
        request.row = Some(row);
        request.data = Some(data);
        request.actor = Some(actor);
        let envelope = self.client.call(&request).await?;
        Ok(WriteReceipt { id: envelope.id, row: envelope.row.or(Some(row)) })
    }

    async fn delete(&self, key: &RecordKey, actor: &str) -> anyhow::Result<WriteReceipt> {
        let (partition, row) = Self::key_parts(key)?;
        let mut request = SheetRequest::new("delete", self.sheet);
        request.partition = partition;
        request.row = Some(row);
        request.actor = Some(actor);
        let envelope = self.client.call(&request).await?;
        Ok(WriteReceipt { id: envelope.id, row: envelope.row })
    }
}
