// src/store/sql.rs
//
// Generic per-table Postgres adapter. One instance per entity table, built in
// the composition root. Queries are assembled at runtime so the crate builds
// without a live database; table and column names come from our own constants,
// never from caller input.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use super::{RawRecord, RecordKey, StoreReader, StoreWriter, WriteReceipt};

#[derive(Clone)]
pub struct SqlTableStore {
    pool: PgPool,
    table: &'static str,
    id_column: &'static str,
}

impl SqlTableStore {
    pub fn new(pool: PgPool, table: &'static str, id_column: &'static str) -> Self {
        Self { pool, table, id_column }
    }
}

/// camelCase payload key -> snake_case column name.
fn column_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Bindable text for a JSON value. The migration-era tables are text-typed
/// (they mirror sheet columns), so everything is written as a string.
fn bind_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl StoreReader for SqlTableStore {
    async fn get_all(&self) -> anyhow::Result<Vec<RawRecord>> {
        let sql = format!("SELECT to_jsonb(t) FROM {} t", self.table);
        let rows: Vec<Value> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect())
    }

    async fn get_by_id(&self, id: &str) -> anyhow::Result<Option<RawRecord>> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} t WHERE t.{} = $1",
            self.table, self.id_column
        );
        let row: Option<Value> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        }))
    }
}

#[async_trait]
impl StoreWriter for SqlTableStore {
    async fn create(&self, data: &RawRecord, actor: &str) -> anyhow::Result<WriteReceipt> {
        if data.is_empty() {
            anyhow::bail!("empty payload for insert into {}", self.table);
        }

        let columns: Vec<String> = data.keys().map(|k| column_name(k)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut query = sqlx::query(&sql);
        for value in data.values() {
            query = query.bind(bind_value(value));
        }
        query.execute(&self.pool).await?;

        tracing::debug!(table = self.table, actor, "sql insert");

        // The service layer is the id authority here; echo it back if present.
        let id = data
            .get(self.id_column)
            .or_else(|| data.get(&id_key_camel(self.id_column)))
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Ok(WriteReceipt { id, row: None })
    }

    async fn update(
        &self,
        key: &RecordKey,
        data: &RawRecord,
        actor: &str,
    ) -> anyhow::Result<WriteReceipt> {
        let RecordKey::Id(id) = key else {
            anyhow::bail!("table {} is addressed by id, got {}", self.table, key);
        };
        if data.is_empty() {
            anyhow::bail!("empty payload for update of {}", self.table);
        }

        let assignments: Vec<String> = data
            .keys()
            .enumerate()
            .map(|(i, k)| format!("{} = ${}", column_name(k), i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ${}",
            self.table,
            assignments.join(", "),
            self.id_column,
            data.len() + 1
        );

        let mut query = sqlx::query(&sql);
        for value in data.values() {
            query = query.bind(bind_value(value));
        }
        let result = query.bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("no row with {} = {} in {}", self.id_column, id, self.table);
        }

        tracing::debug!(table = self.table, actor, id, "sql update");
        Ok(WriteReceipt { id: Some(id.clone()), row: None })
    }

    async fn delete(&self, key: &RecordKey, actor: &str) -> anyhow::Result<WriteReceipt> {
        let RecordKey::Id(id) = key else {
            anyhow::bail!("table {} is addressed by id, got {}", self.table, key);
        };
        let sql = format!("DELETE FROM {} WHERE {} = $1", self.table, self.id_column);
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            anyhow::bail!("no row with {} = {} in {}", self.id_column, id, self.table);
        }

        tracing::debug!(table = self.table, actor, id, "sql delete");
        Ok(WriteReceipt { id: Some(id.clone()), row: None })
    }
}

/// snake_case id column back to its camelCase payload key ("contact_id" ->
/// "contactId"), so the receipt can echo a service-assigned id.
fn id_key_camel(column: &str) -> String {
    let mut out = String::with_capacity(column.len());
    let mut upper_next = false;
    for ch in column.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
