// src/models/opportunity.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Opportunity {
    pub opportunity_id: String,
    pub opportunity_name: String,
    /// Free-text company name; joined against Company by normalized name,
    /// not by id.
    pub customer_company: String,

    pub current_stage: String,
    pub current_status: String,
    pub assignee: String,
    pub opportunity_value: Option<Decimal>,
    pub expected_close_date: String,

    /// Self-referential tree. Cycles are rejected on write, see
    /// `OpportunityService::update`.
    pub parent_opportunity_id: String,

    pub created_time: Option<String>,
    pub last_update_time: Option<String>,
    pub creator: String,
    pub last_modifier: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u64>,
}

/// Join-table row between contacts and opportunities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactOpportunityLink {
    pub contact_id: String,
    pub opportunity_id: String,
    pub status: String,
}

impl ContactOpportunityLink {
    /// Legacy rows predate the status column; an absent status is implicitly
    /// active.
    pub fn is_active(&self) -> bool {
        self.status.is_empty() || self.status == "active"
    }
}

/// Activity record attached to an opportunity (and transitively its
/// company). Read-only in this migration stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Interaction {
    pub interaction_id: String,
    pub opportunity_id: String,
    pub company_id: String,
    pub interaction_type: String,
    pub content: String,
    pub interaction_time: String,
}
