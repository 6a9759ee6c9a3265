// src/services/announcement_service.rs

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::common::error::AppError;
use crate::convergence::normalize::parse_timestamp;
use crate::convergence::reader::ConvergentReader;
use crate::models::announcement::Announcement;
use crate::services::{new_entity_id, now_timestamp, to_raw, MutationOutcome};
use crate::store::{RecordKey, StoreWriter};

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementPayload {
    #[validate(length(min = 1, message = "required"))]
    pub title: String,
    pub content: Option<String>,
    pub status: Option<String>,
    pub is_pinned: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnouncementPayload {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<String>,
    pub is_pinned: Option<bool>,
}

#[derive(Clone)]
pub struct AnnouncementService {
    announcements: ConvergentReader<Announcement>,
    writer: Arc<dyn StoreWriter>,
}

impl AnnouncementService {
    pub fn new(announcements: ConvergentReader<Announcement>, writer: Arc<dyn StoreWriter>) -> Self {
        Self { announcements, writer }
    }

    /// Pinned entries first, then most recently updated. `published_only`
    /// keeps only `已發布` records (the public listing).
    pub async fn get_all(&self, published_only: bool) -> Result<Vec<Announcement>, AppError> {
        let mut announcements = self.announcements.fetch_all(false).await?;
        if published_only {
            announcements.retain(|a| a.is_published());
        }
        announcements.sort_by(|a, b| {
            let pinned = b.is_pinned.cmp(&a.is_pinned);
            if pinned != std::cmp::Ordering::Equal {
                return pinned;
            }
            let a_time = a.last_update_time.as_deref().and_then(parse_timestamp);
            let b_time = b.last_update_time.as_deref().and_then(parse_timestamp);
            b_time.cmp(&a_time)
        });
        Ok(announcements)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Announcement>, AppError> {
        self.announcements.fetch_by_id(id).await
    }

    pub async fn create(
        &self,
        payload: CreateAnnouncementPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let id = new_entity_id("ANN");
        let mut raw = to_raw(&payload)?;
        raw.insert("id".into(), json!(id));
        raw.insert("createdTime".into(), json!(now_timestamp()));
        raw.insert("lastUpdateTime".into(), json!(now_timestamp()));
        raw.insert("creator".into(), json!(actor));

        let receipt = self.writer.create(&raw, actor).await.map_err(AppError::Internal)?;
        self.announcements.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(id))
    }

    pub async fn update(
        &self,
        key: &str,
        payload: UpdateAnnouncementPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let original = self.resolve_for_write(key).await?;
        let row = write_row(&original)?;

        let mut raw = to_raw(&payload)?;
        raw.insert("lastUpdateTime".into(), json!(now_timestamp()));
        raw.insert("lastModifier".into(), json!(actor));

        let receipt = self
            .writer
            .update(&RecordKey::Row(row), &raw, actor)
            .await
            .map_err(AppError::Internal)?;
        self.announcements.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(original.id))
    }

    pub async fn delete(&self, key: &str, actor: &str) -> Result<MutationOutcome, AppError> {
        let original = self.resolve_for_write(key).await?;
        let row = write_row(&original)?;

        let receipt = self
            .writer
            .delete(&RecordKey::Row(row), actor)
            .await
            .map_err(AppError::Internal)?;
        self.announcements.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(original.id))
    }

    async fn resolve_for_write(&self, key: &str) -> Result<Announcement, AppError> {
        let announcements = self.announcements.fetch_all(true).await?;
        if let Some(by_id) = announcements.iter().find(|a| !a.id.is_empty() && a.id == key) {
            return Ok(by_id.clone());
        }
        if let Ok(row) = key.parse::<u64>() {
            if let Some(by_row) = announcements.iter().find(|a| a.row_index == Some(row)) {
                return Ok(by_row.clone());
            }
        }
        Err(AppError::NotFound(format!("announcement '{}'", key)))
    }
}

fn write_row(announcement: &Announcement) -> Result<u64, AppError> {
    announcement.row_index.ok_or_else(|| {
        AppError::Forbidden(format!(
            "Announcement '{}' has no row index and is write-protected",
            announcement.id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::announcement::STATUS_PUBLISHED;
    use crate::store::memory::MemoryStore;
    use crate::store::StoreReader;
    use serde_json::json;

    fn service() -> (Arc<MemoryStore>, AnnouncementService) {
        let sheet = Arc::new(MemoryStore::new());
        let service = AnnouncementService::new(
            ConvergentReader::new(None, sheet.clone() as Arc<dyn StoreReader>),
            sheet.clone(),
        );
        (sheet, service)
    }

    #[tokio::test]
    async fn public_listing_filters_unpublished_and_pins_first() {
        let (sheet, service) = service();
        sheet.seed(
            "",
            vec![
                json!({ "id": "A1", "title": "舊公告", "status": STATUS_PUBLISHED,
                        "lastUpdateTime": "2026-01-01 08:00:00" }),
                json!({ "id": "A2", "title": "草稿", "status": "草稿" }),
                json!({ "id": "A3", "title": "置頂公告", "status": STATUS_PUBLISHED,
                        "isPinned": true, "lastUpdateTime": "2025-06-01 08:00:00" }),
                json!({ "id": "A4", "title": "新公告", "status": STATUS_PUBLISHED,
                        "lastUpdateTime": "2026-02-01 08:00:00" }),
            ],
        );

        let listed = service.get_all(true).await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["A3", "A4", "A1"]);
    }

    #[tokio::test]
    async fn update_without_row_index_is_write_protected() {
        let (sheet, service) = service();
        sheet.seed("", vec![json!({ "id": "A1", "title": "公告", "rowIndex": null })]);

        let err = service
            .update("A1", UpdateAnnouncementPayload::default(), "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(sheet.ops().is_empty());
    }

    #[tokio::test]
    async fn create_then_update_round_trips() {
        let (sheet, service) = service();
        let outcome = service
            .create(
                CreateAnnouncementPayload {
                    title: "系統維護通知".into(),
                    content: Some("週六凌晨停機".into()),
                    status: None,
                    is_pinned: None,
                },
                "alice",
            )
            .await
            .unwrap();
        let id = outcome.id.unwrap();

        service
            .update(
                &id,
                UpdateAnnouncementPayload {
                    status: Some(STATUS_PUBLISHED.into()),
                    ..Default::default()
                },
                "bob",
            )
            .await
            .unwrap();

        let rows = sheet.rows_in("");
        assert_eq!(rows[0].get("status"), Some(&json!(STATUS_PUBLISHED)));
        assert_eq!(rows[0].get("lastModifier"), Some(&json!("bob")));
    }
}
