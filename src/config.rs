// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::convergence::reader::ConvergentReader;
use crate::services::announcement_service::AnnouncementService;
use crate::services::company_service::CompanyService;
use crate::services::contact_service::ContactService;
use crate::services::event_service::EventService;
use crate::services::opportunity_service::OpportunityService;
use crate::store::sheet::{SheetClient, SheetStore};
use crate::store::sql::SqlTableStore;
use crate::store::{StoreReader, StoreWriter};

#[derive(Clone)]
pub struct AppState {
    pub company_service: CompanyService,
    pub contact_service: ContactService,
    pub opportunity_service: OpportunityService,
    pub event_service: EventService,
    pub announcement_service: AnnouncementService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let endpoint = env::var("SHEETS_ENDPOINT")
            .context("SHEETS_ENDPOINT must point at the spreadsheet web app")?;
        let token = env::var("SHEETS_TOKEN").unwrap_or_default();
        let client = SheetClient::new(endpoint, token);

        // DATABASE_URL is optional: without it every read comes straight from
        // the spreadsheet and the migration primary is simply absent.
        let pool = match env::var("DATABASE_URL") {
            Ok(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(&url)
                    .await?;
                tracing::info!("database primary connected");
                Some(pool)
            }
            Err(_) => {
                tracing::warn!("DATABASE_URL not set; running spreadsheet-only");
                None
            }
        };

        // One sheet adapter per tab. All of them are readers; the ones under
        // spreadsheet write authority double as writers.
        let companies_sheet = sheet(&client, "Companies");
        let contacts_sheet = sheet(&client, "Contacts");
        let potentials_sheet = sheet(&client, "PotentialContacts");
        let opportunities_sheet = sheet(&client, "Opportunities");
        let links_sheet = sheet(&client, "ContactOpportunityLinks");
        let interactions_sheet = sheet(&client, "Interactions");
        let events_sheet = sheet(&client, "EventLogs");
        let announcements_sheet = sheet(&client, "Announcements");

        let contacts_sql = pool
            .as_ref()
            .map(|p| Arc::new(SqlTableStore::new(p.clone(), "contacts", "contact_id")));

        let companies = ConvergentReader::new(
            sql_reader(&pool, "companies", "company_id"),
            companies_sheet.clone() as Arc<dyn StoreReader>,
        );
        let contacts = ConvergentReader::new(
            contacts_sql.clone().map(|s| s as Arc<dyn StoreReader>),
            contacts_sheet as Arc<dyn StoreReader>,
        );
        // Potential contacts never migrate: their whole lifecycle is
        // row-addressed against the sheet, so they get no SQL primary.
        let potentials = ConvergentReader::new(
            None,
            potentials_sheet.clone() as Arc<dyn StoreReader>,
        );
        let opportunities = ConvergentReader::new(
            sql_reader(&pool, "opportunities", "opportunity_id"),
            opportunities_sheet.clone() as Arc<dyn StoreReader>,
        );
        let links = ConvergentReader::new(
            sql_reader(&pool, "contact_opportunity_links", "id"),
            links_sheet as Arc<dyn StoreReader>,
        );
        let interactions = ConvergentReader::new(
            sql_reader(&pool, "interactions", "id"),
            interactions_sheet as Arc<dyn StoreReader>,
        );
        let events = ConvergentReader::new(
            sql_reader(&pool, "events", "event_id"),
            events_sheet.clone() as Arc<dyn StoreReader>,
        );
        let announcements = ConvergentReader::new(
            sql_reader(&pool, "announcements", "id"),
            announcements_sheet.clone() as Arc<dyn StoreReader>,
        );

        // Official contacts write to SQL once the migration primary exists;
        // until then their writes degrade to the legacy sheet.
        let contacts_writer: Arc<dyn StoreWriter> = match contacts_sql {
            Some(sql) => sql,
            None => sheet(&client, "Contacts"),
        };

        let company_service = CompanyService::new(
            companies.clone(),
            contacts.clone(),
            opportunities.clone(),
            interactions.clone(),
            events.clone(),
            companies_sheet,
        );
        let contact_service = ContactService::new(
            contacts.clone(),
            potentials.clone(),
            contacts_writer,
            potentials_sheet,
        );
        let opportunity_service = OpportunityService::new(
            opportunities.clone(),
            companies,
            contacts,
            potentials,
            links,
            interactions,
            events.clone(),
            opportunities_sheet,
        );
        let event_service = EventService::new(events, events_sheet);
        let announcement_service = AnnouncementService::new(announcements, announcements_sheet);

        Ok(Self {
            company_service,
            contact_service,
            opportunity_service,
            event_service,
            announcement_service,
        })
    }
}

fn sheet(client: &SheetClient, name: &'static str) -> Arc<SheetStore> {
    Arc::new(SheetStore::new(client.clone(), name))
}

fn sql_reader(
    pool: &Option<PgPool>,
    table: &'static str,
    id_column: &'static str,
) -> Option<Arc<dyn StoreReader>> {
    pool.as_ref()
        .map(|p| Arc::new(SqlTableStore::new(p.clone(), table, id_column)) as Arc<dyn StoreReader>)
}
