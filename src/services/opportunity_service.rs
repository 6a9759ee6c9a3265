// src/services/opportunity_service.rs

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::common::error::AppError;
use crate::convergence::reader::ConvergentReader;
use crate::models::company::Company;
use crate::models::contact::{Contact, PotentialContact};
use crate::models::event::EventLog;
use crate::models::opportunity::{ContactOpportunityLink, Interaction, Opportunity};
use crate::services::{join, new_entity_id, now_timestamp, to_raw, MutationOutcome};
use crate::store::{RecordKey, StoreWriter};

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOpportunityPayload {
    #[validate(length(min = 1, message = "required"))]
    pub opportunity_name: String,
    #[validate(length(min = 1, message = "required"))]
    pub customer_company: String,
    pub current_stage: Option<String>,
    pub current_status: Option<String>,
    pub assignee: Option<String>,
    pub opportunity_value: Option<Decimal>,
    pub expected_close_date: Option<String>,
    pub parent_opportunity_id: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOpportunityPayload {
    pub opportunity_name: Option<String>,
    pub customer_company: Option<String>,
    pub current_stage: Option<String>,
    pub current_status: Option<String>,
    pub assignee: Option<String>,
    pub opportunity_value: Option<Decimal>,
    pub expected_close_date: Option<String>,
    pub parent_opportunity_id: Option<String>,
}

/// Opportunities are still sheet-resident: reads converge, writes resolve a
/// fresh row index. The aggregate view joins across six other entity lists.
#[derive(Clone)]
pub struct OpportunityService {
    opportunities: ConvergentReader<Opportunity>,
    companies: ConvergentReader<Company>,
    contacts: ConvergentReader<Contact>,
    potentials: ConvergentReader<PotentialContact>,
    links: ConvergentReader<ContactOpportunityLink>,
    interactions: ConvergentReader<Interaction>,
    events: ConvergentReader<EventLog>,
    writer: Arc<dyn StoreWriter>,
}

impl OpportunityService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        opportunities: ConvergentReader<Opportunity>,
        companies: ConvergentReader<Company>,
        contacts: ConvergentReader<Contact>,
        potentials: ConvergentReader<PotentialContact>,
        links: ConvergentReader<ContactOpportunityLink>,
        interactions: ConvergentReader<Interaction>,
        events: ConvergentReader<EventLog>,
        writer: Arc<dyn StoreWriter>,
    ) -> Self {
        Self { opportunities, companies, contacts, potentials, links, interactions, events, writer }
    }

    pub async fn get_all(
        &self,
        query: Option<&str>,
        stage: Option<&str>,
        assignee: Option<&str>,
    ) -> Result<Vec<Opportunity>, AppError> {
        let mut opportunities = self.opportunities.fetch_all(false).await?;
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            opportunities.retain(|o| {
                o.opportunity_name.to_lowercase().contains(&q)
                    || o.customer_company.to_lowercase().contains(&q)
            });
        }
        if let Some(stage) = stage.filter(|s| !s.is_empty()) {
            opportunities.retain(|o| o.current_stage == stage);
        }
        if let Some(assignee) = assignee.filter(|a| !a.is_empty()) {
            opportunities.retain(|o| o.assignee == assignee);
        }
        Ok(opportunities)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Opportunity>, AppError> {
        self.opportunities.fetch_by_id(id).await
    }

    pub async fn get_details(&self, id: &str) -> Result<join::OpportunityDetails, AppError> {
        let (opportunities, companies, contacts, potentials, links, interactions, events) = tokio::join!(
            self.opportunities.fetch_all(false),
            self.companies.fetch_all(false),
            self.contacts.fetch_all(false),
            self.potentials.fetch_all(false),
            self.links.fetch_all(false),
            self.interactions.fetch_all(false),
            self.events.fetch_all(false),
        );
        Ok(join::opportunity_details(
            id,
            &opportunities?,
            &companies?,
            &contacts?,
            &potentials?,
            &links?,
            &interactions?,
            &events?,
        ))
    }

    pub async fn create(
        &self,
        payload: CreateOpportunityPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let opportunity_id = new_entity_id("OPP");
        let mut raw = to_raw(&payload)?;
        raw.insert("opportunityId".into(), json!(opportunity_id));
        raw.insert("createdTime".into(), json!(now_timestamp()));
        raw.insert("creator".into(), json!(actor));

        let receipt = self.writer.create(&raw, actor).await.map_err(AppError::Internal)?;
        self.opportunities.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(opportunity_id))
    }

    pub async fn update(
        &self,
        key: &str,
        payload: UpdateOpportunityPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let opportunities = self.opportunities.fetch_all(true).await?;
        let original = resolve(&opportunities, key)?;
        let row = write_row(&original)?;

        // Re-parenting must not close a loop in the opportunity tree.
        if let Some(parent) = payload.parent_opportunity_id.as_deref().filter(|p| !p.is_empty()) {
            if join::creates_cycle(&opportunities, &original.opportunity_id, parent) {
                return Err(AppError::BusinessRule(format!(
                    "Opportunity '{}' cannot become a child of its own descendant '{}'",
                    original.opportunity_id, parent
                )));
            }
        }

        let mut raw = to_raw(&payload)?;
        raw.insert("lastUpdateTime".into(), json!(now_timestamp()));
        raw.insert("lastModifier".into(), json!(actor));

        let receipt = self
            .writer
            .update(&RecordKey::Row(row), &raw, actor)
            .await
            .map_err(AppError::Internal)?;
        self.opportunities.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(original.opportunity_id))
    }

    pub async fn delete(&self, key: &str, actor: &str) -> Result<MutationOutcome, AppError> {
        let opportunities = self.opportunities.fetch_all(true).await?;
        let original = resolve(&opportunities, key)?;
        let row = write_row(&original)?;

        let children = join::children_of(&opportunities, &original.opportunity_id);
        if !children.is_empty() {
            return Err(AppError::BusinessRule(format!(
                "Opportunity '{}' has {} child opportunities (e.g. '{}') and cannot be deleted",
                original.opportunity_id,
                children.len(),
                children[0].opportunity_name
            )));
        }

        let receipt = self
            .writer
            .delete(&RecordKey::Row(row), actor)
            .await
            .map_err(AppError::Internal)?;
        self.opportunities.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(original.opportunity_id))
    }
}

fn resolve(opportunities: &[Opportunity], key: &str) -> Result<Opportunity, AppError> {
    if let Some(by_id) = opportunities
        .iter()
        .find(|o| !o.opportunity_id.is_empty() && o.opportunity_id == key)
    {
        return Ok(by_id.clone());
    }
    if let Ok(row) = key.parse::<u64>() {
        if let Some(by_row) = opportunities.iter().find(|o| o.row_index == Some(row)) {
            return Ok(by_row.clone());
        }
    }
    Err(AppError::NotFound(format!("opportunity '{}'", key)))
}

fn write_row(opportunity: &Opportunity) -> Result<u64, AppError> {
    opportunity.row_index.ok_or_else(|| {
        AppError::Forbidden(format!(
            "Opportunity '{}' is SQL-resident (no row index); switch to database mode to modify it",
            opportunity.opportunity_id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::StoreReader;
    use serde_json::{json, Value};

    fn empty<T: crate::convergence::normalize::Normalize>() -> ConvergentReader<T> {
        ConvergentReader::new(None, Arc::new(MemoryStore::new()) as Arc<dyn StoreReader>)
    }

    fn service_with(sheet: Arc<MemoryStore>) -> OpportunityService {
        OpportunityService::new(
            ConvergentReader::new(None, sheet.clone() as Arc<dyn StoreReader>),
            empty(),
            empty(),
            empty(),
            empty(),
            empty(),
            empty(),
            sheet,
        )
    }

    fn opportunity_row(id: &str, name: &str, parent: &str) -> Value {
        json!({
            "opportunityId": id,
            "opportunityName": name,
            "customerCompany": "台灣科技",
            "parentOpportunityId": parent
        })
    }

    #[tokio::test]
    async fn update_rejects_a_parent_cycle() {
        let sheet = Arc::new(MemoryStore::new());
        sheet.seed(
            "",
            vec![
                opportunity_row("A", "母案", ""),
                opportunity_row("B", "子案", "A"),
                opportunity_row("C", "孫案", "B"),
            ],
        );
        let service = service_with(sheet.clone());

        let err = service
            .update(
                "A",
                UpdateOpportunityPayload {
                    parent_opportunity_id: Some("C".into()),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
        assert!(sheet.ops().is_empty());

        // A legal re-parent still goes through.
        service
            .update(
                "C",
                UpdateOpportunityPayload {
                    parent_opportunity_id: Some("A".into()),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();
        assert_eq!(sheet.ops().len(), 1);
    }

    #[tokio::test]
    async fn delete_refuses_while_children_exist() {
        let sheet = Arc::new(MemoryStore::new());
        sheet.seed(
            "",
            vec![opportunity_row("A", "母案", ""), opportunity_row("B", "子案", "A")],
        );
        let service = service_with(sheet.clone());

        let err = service.delete("A", "alice").await.unwrap_err();
        let AppError::BusinessRule(message) = err else { panic!("expected BusinessRule") };
        assert!(message.contains("1 child"));
        assert!(message.contains("子案"));

        service.delete("B", "alice").await.unwrap();
        service.delete("A", "alice").await.unwrap();
        assert!(sheet.rows_in("").is_empty());
    }

    #[tokio::test]
    async fn update_without_row_index_is_forbidden() {
        let sheet = Arc::new(MemoryStore::new());
        sheet.seed(
            "",
            vec![json!({ "opportunityId": "A", "opportunityName": "母案", "rowIndex": null })],
        );
        let service = service_with(sheet.clone());

        let err = service
            .update("A", UpdateOpportunityPayload::default(), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(sheet.ops().is_empty());
    }

    #[tokio::test]
    async fn create_assigns_an_opp_id() {
        let sheet = Arc::new(MemoryStore::new());
        let service = service_with(sheet.clone());

        let outcome = service
            .create(
                CreateOpportunityPayload {
                    opportunity_name: "年度採購案".into(),
                    customer_company: "台灣科技".into(),
                    current_stage: Some("Initial".into()),
                    current_status: None,
                    assignee: None,
                    opportunity_value: Some(Decimal::from(500_000)),
                    expected_close_date: None,
                    parent_opportunity_id: None,
                },
                "alice",
            )
            .await
            .unwrap();
        assert!(outcome.id.as_deref().unwrap().starts_with("OPP_"));
        assert_eq!(sheet.rows_in("").len(), 1);
    }
}
