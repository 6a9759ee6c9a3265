// src/services/contact_service.rs

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::common::error::AppError;
use crate::convergence::reader::ConvergentReader;
use crate::models::contact::{Contact, PotentialContact};
use crate::services::{new_entity_id, now_timestamp, to_raw, MutationOutcome};
use crate::store::{RecordKey, StoreWriter};

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactPayload {
    #[validate(length(min = 1, message = "required"))]
    pub name: String,
    pub company_id: Option<String>,
    pub job_title: Option<String>,
    #[validate(email(message = "invalid_email"))]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContactPayload {
    pub name: Option<String>,
    pub company_id: Option<String>,
    pub job_title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePotentialContactPayload {
    #[validate(length(min = 1, message = "required"))]
    pub name: String,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub note: Option<String>,
}

/// Contacts run two disjoint lifecycles. Official contacts are migrated:
/// addressed by `contactId`, SQL is the write authority, the sheet is
/// read-fallback only. Potential contacts (business-card captures) live only
/// on the sheet and are addressed by row index until promoted.
#[derive(Clone)]
pub struct ContactService {
    contacts: ConvergentReader<Contact>,
    potentials: ConvergentReader<PotentialContact>,
    sql_writer: Arc<dyn StoreWriter>,
    sheet_writer: Arc<dyn StoreWriter>,
}

impl ContactService {
    pub fn new(
        contacts: ConvergentReader<Contact>,
        potentials: ConvergentReader<PotentialContact>,
        sql_writer: Arc<dyn StoreWriter>,
        sheet_writer: Arc<dyn StoreWriter>,
    ) -> Self {
        Self { contacts, potentials, sql_writer, sheet_writer }
    }

    // -----------------------------------------------------------------------
    // Official contacts (SQL write authority)
    // -----------------------------------------------------------------------

    pub async fn get_all(
        &self,
        query: Option<&str>,
        company_id: Option<&str>,
    ) -> Result<Vec<Contact>, AppError> {
        let mut contacts = self.contacts.fetch_all(false).await?;
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            contacts.retain(|c| {
                c.name.to_lowercase().contains(&q) || c.email.to_lowercase().contains(&q)
            });
        }
        if let Some(company_id) = company_id.filter(|c| !c.is_empty()) {
            contacts.retain(|c| c.company_id == company_id);
        }
        Ok(contacts)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Contact>, AppError> {
        self.contacts.fetch_by_id(id).await
    }

    pub async fn create(
        &self,
        payload: CreateContactPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let contact_id = new_entity_id("CONT");
        let mut raw = to_raw(&payload)?;
        raw.insert("contactId".into(), json!(contact_id));
        raw.insert("createdTime".into(), json!(now_timestamp()));
        raw.insert("creator".into(), json!(actor));

        let receipt = self.sql_writer.create(&raw, actor).await.map_err(AppError::Internal)?;
        self.contacts.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(contact_id))
    }

    pub async fn update(
        &self,
        id: &str,
        payload: UpdateContactPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let contact = self.require_official(id).await?;

        let mut raw = to_raw(&payload)?;
        raw.insert("lastUpdateTime".into(), json!(now_timestamp()));
        raw.insert("lastModifier".into(), json!(actor));

        let receipt = self
            .sql_writer
            .update(&RecordKey::Id(contact.contact_id.clone()), &raw, actor)
            .await
            .map_err(AppError::Internal)?;
        self.contacts.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(contact.contact_id))
    }

    pub async fn delete(&self, id: &str, actor: &str) -> Result<MutationOutcome, AppError> {
        let contact = self.require_official(id).await?;
        let receipt = self
            .sql_writer
            .delete(&RecordKey::Id(contact.contact_id.clone()), actor)
            .await
            .map_err(AppError::Internal)?;
        self.contacts.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(contact.contact_id))
    }

    /// SQL-addressed mutations need a stable id on the looked-up record; a
    /// record without one cannot be addressed and is write-protected.
    async fn require_official(&self, id: &str) -> Result<Contact, AppError> {
        let contact = self
            .contacts
            .fetch_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("contact '{}'", id)))?;
        if contact.contact_id.is_empty() {
            return Err(AppError::Forbidden(format!(
                "Contact '{}' has no stable id; promote it before editing in database mode",
                id
            )));
        }
        Ok(contact)
    }

    // -----------------------------------------------------------------------
    // Potential contacts (spreadsheet write authority, row-addressed)
    // -----------------------------------------------------------------------

    pub async fn get_potentials(&self, query: Option<&str>) -> Result<Vec<PotentialContact>, AppError> {
        let mut potentials = self.potentials.fetch_all(false).await?;
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            potentials.retain(|p| {
                p.name.to_lowercase().contains(&q)
                    || p.company_name.to_lowercase().contains(&q)
            });
        }
        Ok(potentials)
    }

    pub async fn create_potential(
        &self,
        payload: CreatePotentialContactPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let mut raw = to_raw(&payload)?;
        raw.insert("createdTime".into(), json!(now_timestamp()));
        raw.insert("creator".into(), json!(actor));

        let receipt = self.sheet_writer.create(&raw, actor).await.map_err(AppError::Internal)?;
        self.potentials.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt))
    }

    pub async fn update_potential(
        &self,
        row: u64,
        payload: CreatePotentialContactPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let potential = self.resolve_potential(row).await?;

        let mut raw = to_raw(&payload)?;
        raw.insert("lastUpdateTime".into(), json!(now_timestamp()));
        raw.insert("lastModifier".into(), json!(actor));

        let receipt = self
            .sheet_writer
            .update(&RecordKey::Row(potential.row_index.unwrap_or(row)), &raw, actor)
            .await
            .map_err(AppError::Internal)?;
        self.potentials.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt))
    }

    pub async fn delete_potential(&self, row: u64, actor: &str) -> Result<MutationOutcome, AppError> {
        let potential = self.resolve_potential(row).await?;
        let receipt = self
            .sheet_writer
            .delete(&RecordKey::Row(potential.row_index.unwrap_or(row)), actor)
            .await
            .map_err(AppError::Internal)?;
        self.potentials.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt))
    }

    /// Promotes a potential contact into the official (SQL) lifecycle: create
    /// the vetted record first, then remove the sheet row. The free-text
    /// company name is replaced by the vetted `companyId` supplied by the
    /// caller.
    pub async fn promote(
        &self,
        row: u64,
        company_id: Option<&str>,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let potential = self.resolve_potential(row).await?;
        let sheet_row = potential.row_index.unwrap_or(row);

        let contact_id = new_entity_id("CONT");
        let mut raw = crate::store::RawRecord::new();
        raw.insert("contactId".into(), json!(contact_id));
        raw.insert("name".into(), json!(potential.name));
        raw.insert("jobTitle".into(), json!(potential.job_title));
        raw.insert("email".into(), json!(potential.email));
        raw.insert("phone".into(), json!(potential.phone));
        raw.insert("note".into(), json!(potential.note));
        raw.insert("companyId".into(), json!(company_id.unwrap_or_default()));
        raw.insert("createdTime".into(), json!(now_timestamp()));
        raw.insert("creator".into(), json!(actor));

        self.sql_writer.create(&raw, actor).await.map_err(AppError::Internal)?;
        self.sheet_writer
            .delete(&RecordKey::Row(sheet_row), actor)
            .await
            .map_err(AppError::Internal)?;

        self.contacts.invalidate().await;
        self.potentials.invalidate().await;
        Ok(MutationOutcome { success: true, id: Some(contact_id), row: None, moved: false })
    }

    /// Row-addressed lookups go through a forced fallback read; the row must
    /// exist in the sheet's current layout.
    async fn resolve_potential(&self, row: u64) -> Result<PotentialContact, AppError> {
        let potentials = self.potentials.fetch_all(true).await?;
        potentials
            .into_iter()
            .find(|p| p.row_index == Some(row))
            .ok_or_else(|| AppError::NotFound(format!("potential contact at row {}", row)))
    }
}
