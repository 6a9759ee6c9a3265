// src/models/company.rs

use serde::{Deserialize, Serialize};

/// Canonical company shape, store-agnostic. `row_index` is present only when
/// the record was served by the spreadsheet source; its absence marks an
/// SQL-resident record that cannot be addressed by row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Company {
    pub company_id: String,
    /// Natural key for lookups; always compared through
    /// `normalize_company_name`.
    pub company_name: String,

    pub phone: String,
    pub email: String,
    pub address: String,

    pub industry: String,
    pub company_type: String,

    pub created_time: Option<String>,
    pub last_update_time: Option<String>,
    pub creator: String,
    pub last_modifier: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u64>,
}
