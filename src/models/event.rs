// src/models/event.rs

use serde::{Deserialize, Serialize};

/// Event log entry. The spreadsheet store partitions events into one tab per
/// `event_type`, so `row_index` is only valid within the partition matching
/// the current type. Changing the type is a move, never an in-place update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventLog {
    pub event_id: String,
    pub event_type: String,
    pub title: String,
    pub content: String,
    pub event_time: String,
    pub related_company_id: String,

    pub created_time: Option<String>,
    pub last_update_time: Option<String>,
    pub creator: String,
    pub last_modifier: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u64>,
}
