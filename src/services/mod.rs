// src/services/mod.rs

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::store::{RawRecord, WriteReceipt};

pub mod announcement_service;
pub mod company_service;
pub mod contact_service;
pub mod event_service;
pub mod join;
pub mod opportunity_service;

/// What every mutation hands back to the caller. `moved` distinguishes a
/// category move (delete + recreate) from a plain update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<u64>,
    pub moved: bool,
}

impl MutationOutcome {
    pub fn from_receipt(receipt: WriteReceipt) -> Self {
        Self { success: true, id: receipt.id, row: receipt.row, moved: false }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn moved(mut self) -> Self {
        self.moved = true;
        self
    }
}

/// The service layer, not the store, is the id authority for sheet-resident
/// entities: `COMP_<millis>_<random>` and friends.
pub(crate) fn new_entity_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, millis, &suffix[..6])
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Serializes a payload into a raw store record, dropping nulls so partial
/// updates only touch the fields the caller sent.
pub(crate) fn to_raw<T: Serialize>(payload: &T) -> Result<RawRecord, AppError> {
    match serde_json::to_value(payload).map_err(anyhow::Error::from)? {
        Value::Object(map) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => Err(anyhow::anyhow!("payload did not serialize to an object: {}", other).into()),
    }
}
