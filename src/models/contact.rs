// src/models/contact.rs

use serde::{Deserialize, Serialize};

/// Vetted contact. Addressed by `contact_id`; SQL is the write authority,
/// the spreadsheet is read-fallback only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    pub contact_id: String,
    pub name: String,
    /// References a company by stable id.
    pub company_id: String,
    pub job_title: String,
    pub email: String,
    pub phone: String,
    pub note: String,

    pub created_time: Option<String>,
    pub last_update_time: Option<String>,
    pub creator: String,
    pub last_modifier: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u64>,
}

/// Unvetted contact from business-card capture. Lives only on the
/// spreadsheet, addressed by row index, and references its company by
/// free-text name until promoted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PotentialContact {
    pub name: String,
    pub company_name: String,
    pub job_title: String,
    pub email: String,
    pub phone: String,
    pub note: String,

    pub created_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u64>,
}
