// src/services/company_service.rs

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::common::error::AppError;
use crate::convergence::normalize::normalize_company_name;
use crate::convergence::reader::ConvergentReader;
use crate::models::company::Company;
use crate::models::contact::Contact;
use crate::models::event::EventLog;
use crate::models::opportunity::{Interaction, Opportunity};
use crate::services::{join, new_entity_id, now_timestamp, to_raw, MutationOutcome};
use crate::store::{RecordKey, StoreWriter};

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompanyPayload {
    #[validate(length(min = 1, message = "required"))]
    pub company_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub industry: Option<String>,
    pub company_type: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCompanyPayload {
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub industry: Option<String>,
    pub company_type: Option<String>,
}

/// Companies are still under spreadsheet write authority, so every mutation
/// resolves its row index through a forced fallback read immediately before
/// writing. Reads converge SQL-first like every other entity.
#[derive(Clone)]
pub struct CompanyService {
    companies: ConvergentReader<Company>,
    contacts: ConvergentReader<Contact>,
    opportunities: ConvergentReader<Opportunity>,
    interactions: ConvergentReader<Interaction>,
    events: ConvergentReader<EventLog>,
    writer: Arc<dyn StoreWriter>,
}

impl CompanyService {
    pub fn new(
        companies: ConvergentReader<Company>,
        contacts: ConvergentReader<Contact>,
        opportunities: ConvergentReader<Opportunity>,
        interactions: ConvergentReader<Interaction>,
        events: ConvergentReader<EventLog>,
        writer: Arc<dyn StoreWriter>,
    ) -> Self {
        Self { companies, contacts, opportunities, interactions, events, writer }
    }

    /// Free-text query and categorical filters, AND-combined, applied in
    /// memory after the converged fetch.
    pub async fn get_all(
        &self,
        query: Option<&str>,
        industry: Option<&str>,
    ) -> Result<Vec<Company>, AppError> {
        let mut companies = self.companies.fetch_all(false).await?;
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            companies.retain(|c| {
                c.company_name.to_lowercase().contains(&q)
                    || c.address.to_lowercase().contains(&q)
                    || c.phone.contains(&q)
            });
        }
        if let Some(industry) = industry.filter(|i| !i.is_empty()) {
            companies.retain(|c| c.industry == industry);
        }
        Ok(companies)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Company>, AppError> {
        self.companies.fetch_by_id(id).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Company>, AppError> {
        let companies = self.companies.fetch_all(false).await?;
        Ok(join::company_by_name(&companies, name).cloned())
    }

    /// Aggregate view by id or free-text name. The constituent reads run
    /// concurrently and are awaited jointly; the join only starts once all of
    /// them resolved.
    pub async fn get_details(&self, key: &str) -> Result<join::CompanyDetails, AppError> {
        let (companies, contacts, opportunities, interactions, events) = tokio::join!(
            self.companies.fetch_all(false),
            self.contacts.fetch_all(false),
            self.opportunities.fetch_all(false),
            self.interactions.fetch_all(false),
            self.events.fetch_all(false),
        );
        Ok(join::company_details(
            key,
            &companies?,
            &contacts?,
            &opportunities?,
            &interactions?,
            &events?,
        ))
    }

    pub async fn create(
        &self,
        payload: CreateCompanyPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        // Duplicate detection goes through the shared name normalizer, the
        // same function every lookup path uses.
        let existing = self.companies.fetch_all(false).await?;
        if let Some(duplicate) = join::company_by_name(&existing, &payload.company_name) {
            return Err(AppError::BusinessRule(format!(
                "Company '{}' already exists as '{}'",
                payload.company_name, duplicate.company_name
            )));
        }

        let company_id = new_entity_id("COMP");
        let mut raw = to_raw(&payload)?;
        raw.insert("companyId".into(), json!(company_id));
        raw.insert("createdTime".into(), json!(now_timestamp()));
        raw.insert("creator".into(), json!(actor));

        let receipt = self.writer.create(&raw, actor).await.map_err(AppError::Internal)?;
        self.companies.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(company_id))
    }

    pub async fn update(
        &self,
        key: &str,
        payload: UpdateCompanyPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let company = self.resolve_for_write(key).await?;
        let row = write_row(&company)?;

        let mut raw = to_raw(&payload)?;
        raw.insert("lastUpdateTime".into(), json!(now_timestamp()));
        raw.insert("lastModifier".into(), json!(actor));

        let receipt = self
            .writer
            .update(&RecordKey::Row(row), &raw, actor)
            .await
            .map_err(AppError::Internal)?;
        self.companies.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(company.company_id))
    }

    pub async fn delete(&self, key: &str, actor: &str) -> Result<MutationOutcome, AppError> {
        let company = self.resolve_for_write(key).await?;
        let row = write_row(&company)?;

        // A company with opportunities hanging off it must refuse deletion.
        let opportunities = self.opportunities.fetch_all(false).await?;
        let blocking = join::opportunities_of(&opportunities, &company.company_name);
        if !blocking.is_empty() {
            return Err(AppError::BusinessRule(format!(
                "Company '{}' has {} related opportunities (e.g. '{}') and cannot be deleted",
                company.company_name,
                blocking.len(),
                blocking[0].opportunity_name
            )));
        }

        let receipt = self
            .writer
            .delete(&RecordKey::Row(row), actor)
            .await
            .map_err(AppError::Internal)?;
        self.companies.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(company.company_id))
    }

    /// Row-addressed writes must see the sheet's current layout: forced
    /// fallback read, id match first, then normalized-name match.
    async fn resolve_for_write(&self, key: &str) -> Result<Company, AppError> {
        let companies = self.companies.fetch_all(true).await?;
        companies
            .iter()
            .find(|c| c.company_id == key)
            .or_else(|| join::company_by_name(&companies, key))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("company '{}'", key)))
    }
}

fn write_row(company: &Company) -> Result<u64, AppError> {
    company.row_index.ok_or_else(|| {
        AppError::Forbidden(format!(
            "Company '{}' is SQL-resident (no row index); switch to database mode to modify it",
            company.company_name
        ))
    })
}
