// src/convergence/normalize.rs
//
// Identity normalization: heterogeneous raw field names (snake_case SQL
// columns, camelCase sheet headers, legacy aliases) mapped onto one canonical
// DTO shape per entity. Pure and total: absent fields degrade to empty
// values, never to an error. Canonical names come first in
// every alias list, which is what makes `normalize` idempotent.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use crate::models::announcement::Announcement;
use crate::models::company::Company;
use crate::models::contact::{Contact, PotentialContact};
use crate::models::event::EventLog;
use crate::models::opportunity::{ContactOpportunityLink, Interaction, Opportunity};
use crate::store::RawRecord;

/// A DTO type the convergent reader can produce from a raw store row.
pub trait Normalize: Sized + Send + Sync {
    /// Entity name, used as the read-cache key and in log lines.
    const ENTITY: &'static str;

    fn normalize(raw: &RawRecord) -> Self;

    /// Stable identifier, `""` for entities without one (potential contacts,
    /// link rows).
    fn key(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// First alias whose value is present, non-null and non-empty wins.
fn field<'a>(raw: &'a RawRecord, aliases: &[&str]) -> Option<&'a Value> {
    aliases.iter().find_map(|name| {
        let value = raw.get(*name)?;
        match value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            other => Some(other),
        }
    })
}

fn text(raw: &RawRecord, aliases: &[&str]) -> String {
    match field(raw, aliases) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Audit timestamps keep absence observable, so they degrade to `None`
/// instead of `""`.
fn opt_text(raw: &RawRecord, aliases: &[&str]) -> Option<String> {
    let value = text(raw, aliases);
    (!value.is_empty()).then_some(value)
}

fn integer(raw: &RawRecord, aliases: &[&str]) -> Option<u64> {
    match field(raw, aliases)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decimal(raw: &RawRecord, aliases: &[&str]) -> Option<Decimal> {
    match field(raw, aliases)? {
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64_retain),
        Value::String(s) => {
            // Sheet cells arrive as display strings ("1,200,000", "NT$ 500").
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}

fn boolean(raw: &RawRecord, aliases: &[&str]) -> bool {
    match field(raw, aliases) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "是")
        }
        _ => false,
    }
}

fn row_index(raw: &RawRecord) -> Option<u64> {
    integer(raw, &["rowIndex", "row_index"])
}

// ---------------------------------------------------------------------------
// Company-name normalization
// ---------------------------------------------------------------------------

const LEGAL_SUFFIXES: &[&str] = &[
    "股份有限公司",
    "有限公司",
    "股份公司",
    "企業社",
    "公司",
    "co., ltd.",
    "co.,ltd.",
    "co., ltd",
    "co. ltd",
    "company limited",
    "corporation",
    "limited",
    "ltd.",
    "ltd",
    "inc.",
    "inc",
    "corp.",
    "corp",
    "llc",
];

/// Canonical form of a company name, used identically on read, lookup and
/// join paths: case-fold, drop parenthetical notes (ASCII and fullwidth),
/// strip corporate legal suffixes, collapse whitespace.
pub fn normalize_company_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut depth = 0u32;
    for ch in name.chars() {
        match ch {
            '(' | '（' => depth += 1,
            ')' | '）' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }

    let mut out = out.to_lowercase();
    loop {
        let trimmed = out.trim_end_matches([' ', '　', ',', '.', '，', '。']).to_string();
        let Some(stripped) = LEGAL_SUFFIXES
            .iter()
            .find_map(|suffix| trimmed.strip_suffix(suffix))
        else {
            out = trimmed;
            break;
        };
        out = stripped.to_string();
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Timestamp parsing
// ---------------------------------------------------------------------------

const DATETIME_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y/%m/%d %H:%M"];
const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Lenient timestamp parsing for activity aggregation. Unparseable input is
/// `None` (skipped by the caller), never zero.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in DATETIME_LAYOUTS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(dt.and_utc());
        }
    }
    for layout in DATE_LAYOUTS {
        if let Ok(d) = NaiveDate::parse_from_str(value, layout) {
            return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Per-entity normalization
// ---------------------------------------------------------------------------

impl Normalize for Company {
    const ENTITY: &'static str = "companies";

    fn normalize(raw: &RawRecord) -> Self {
        Company {
            company_id: text(raw, &["companyId", "company_id", "id"]),
            company_name: text(raw, &["companyName", "company_name", "name"]),
            phone: text(raw, &["phone", "phone_number", "tel"]),
            email: text(raw, &["email", "e_mail"]),
            address: text(raw, &["address", "company_address"]),
            industry: text(raw, &["industry", "industry_type"]),
            company_type: text(raw, &["companyType", "company_type", "type"]),
            created_time: opt_text(raw, &["createdTime", "created_time", "createTime"]),
            last_update_time: opt_text(raw, &["lastUpdateTime", "last_update_time", "updateTime"]),
            creator: text(raw, &["creator", "created_by"]),
            last_modifier: text(raw, &["lastModifier", "last_modifier", "updated_by"]),
            row_index: row_index(raw),
        }
    }

    fn key(&self) -> &str {
        &self.company_id
    }
}

impl Normalize for Contact {
    const ENTITY: &'static str = "contacts";

    fn normalize(raw: &RawRecord) -> Self {
        Contact {
            contact_id: text(raw, &["contactId", "contact_id", "id"]),
            name: text(raw, &["name", "contactName", "contact_name"]),
            company_id: text(raw, &["companyId", "company_id"]),
            job_title: text(raw, &["jobTitle", "job_title", "title", "position"]),
            email: text(raw, &["email", "e_mail"]),
            phone: text(raw, &["phone", "mobile", "tel"]),
            note: text(raw, &["note", "notes", "remark"]),
            created_time: opt_text(raw, &["createdTime", "created_time", "createTime"]),
            last_update_time: opt_text(raw, &["lastUpdateTime", "last_update_time", "updateTime"]),
            creator: text(raw, &["creator", "created_by"]),
            last_modifier: text(raw, &["lastModifier", "last_modifier", "updated_by"]),
            row_index: row_index(raw),
        }
    }

    fn key(&self) -> &str {
        &self.contact_id
    }
}

impl Normalize for PotentialContact {
    const ENTITY: &'static str = "potential_contacts";

    fn normalize(raw: &RawRecord) -> Self {
        PotentialContact {
            name: text(raw, &["name", "contactName", "contact_name"]),
            company_name: text(raw, &["companyName", "company_name", "company"]),
            job_title: text(raw, &["jobTitle", "job_title", "title", "position"]),
            email: text(raw, &["email", "e_mail"]),
            phone: text(raw, &["phone", "mobile", "tel"]),
            note: text(raw, &["note", "notes", "remark"]),
            created_time: opt_text(raw, &["createdTime", "created_time", "createTime"]),
            row_index: row_index(raw),
        }
    }

    fn key(&self) -> &str {
        ""
    }
}

impl Normalize for Opportunity {
    const ENTITY: &'static str = "opportunities";

    fn normalize(raw: &RawRecord) -> Self {
        Opportunity {
            opportunity_id: text(raw, &["opportunityId", "opportunity_id", "id"]),
            opportunity_name: text(raw, &["opportunityName", "opportunity_name", "name"]),
            customer_company: text(raw, &["customerCompany", "customer_company", "company"]),
            current_stage: text(raw, &["currentStage", "current_stage", "stage"]),
            current_status: text(raw, &["currentStatus", "current_status", "status"]),
            assignee: text(raw, &["assignee", "owner", "sales_owner"]),
            opportunity_value: decimal(raw, &["opportunityValue", "opportunity_value", "amount"]),
            expected_close_date: text(
                raw,
                &["expectedCloseDate", "expected_close_date", "close_date"],
            ),
            parent_opportunity_id: text(
                raw,
                &["parentOpportunityId", "parent_opportunity_id", "parent_id"],
            ),
            created_time: opt_text(raw, &["createdTime", "created_time", "createTime"]),
            last_update_time: opt_text(raw, &["lastUpdateTime", "last_update_time", "updateTime"]),
            creator: text(raw, &["creator", "created_by"]),
            last_modifier: text(raw, &["lastModifier", "last_modifier", "updated_by"]),
            row_index: row_index(raw),
        }
    }

    fn key(&self) -> &str {
        &self.opportunity_id
    }
}

impl Normalize for ContactOpportunityLink {
    const ENTITY: &'static str = "contact_opportunity_links";

    fn normalize(raw: &RawRecord) -> Self {
        ContactOpportunityLink {
            contact_id: text(raw, &["contactId", "contact_id"]),
            opportunity_id: text(raw, &["opportunityId", "opportunity_id"]),
            status: text(raw, &["status", "link_status"]),
        }
    }

    fn key(&self) -> &str {
        ""
    }
}

impl Normalize for Interaction {
    const ENTITY: &'static str = "interactions";

    fn normalize(raw: &RawRecord) -> Self {
        Interaction {
            interaction_id: text(raw, &["interactionId", "interaction_id", "id"]),
            opportunity_id: text(raw, &["opportunityId", "opportunity_id"]),
            company_id: text(raw, &["companyId", "company_id"]),
            interaction_type: text(raw, &["interactionType", "interaction_type", "type"]),
            content: text(raw, &["content", "notes", "description"]),
            interaction_time: text(
                raw,
                &["interactionTime", "interaction_time", "date", "createdTime", "created_time"],
            ),
        }
    }

    fn key(&self) -> &str {
        &self.interaction_id
    }
}

impl Normalize for EventLog {
    const ENTITY: &'static str = "events";

    fn normalize(raw: &RawRecord) -> Self {
        EventLog {
            event_id: text(raw, &["eventId", "event_id", "id"]),
            event_type: text(raw, &["eventType", "event_type", "type"]),
            title: text(raw, &["title", "subject"]),
            content: text(raw, &["content", "description"]),
            event_time: text(raw, &["eventTime", "event_time", "date"]),
            related_company_id: text(
                raw,
                &["relatedCompanyId", "related_company_id", "companyId", "company_id"],
            ),
            created_time: opt_text(raw, &["createdTime", "created_time", "createTime"]),
            last_update_time: opt_text(raw, &["lastUpdateTime", "last_update_time", "updateTime"]),
            creator: text(raw, &["creator", "created_by"]),
            last_modifier: text(raw, &["lastModifier", "last_modifier", "updated_by"]),
            row_index: row_index(raw),
        }
    }

    fn key(&self) -> &str {
        &self.event_id
    }
}

impl Normalize for Announcement {
    const ENTITY: &'static str = "announcements";

    fn normalize(raw: &RawRecord) -> Self {
        Announcement {
            id: text(raw, &["id", "announcementId", "announcement_id"]),
            title: text(raw, &["title", "subject"]),
            content: text(raw, &["content", "body"]),
            status: text(raw, &["status", "publish_status"]),
            is_pinned: boolean(raw, &["isPinned", "is_pinned", "pinned"]),
            created_time: opt_text(raw, &["createdTime", "created_time", "createTime"]),
            last_update_time: opt_text(raw, &["lastUpdateTime", "last_update_time", "updateTime"]),
            creator: text(raw, &["creator", "created_by"]),
            last_modifier: text(raw, &["lastModifier", "last_modifier", "updated_by"]),
            row_index: row_index(raw),
        }
    }

    fn key(&self) -> &str {
        &self.id
    }
}
