// src/services/event_service.rs

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::common::error::AppError;
use crate::convergence::reader::ConvergentReader;
use crate::models::event::EventLog;
use crate::services::{new_entity_id, now_timestamp, to_raw, MutationOutcome};
use crate::store::{RecordKey, StoreWriter};

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventPayload {
    /// Determines the physical partition (one sheet tab per type).
    #[validate(length(min = 1, message = "required"))]
    pub event_type: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub event_time: Option<String>,
    pub related_company_id: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventPayload {
    pub event_type: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub event_time: Option<String>,
    pub related_company_id: Option<String>,
    pub created_time: Option<String>,
}

/// Event logs live on a sheet partitioned by `eventType`, so a row index is
/// only valid inside the partition matching the record's current type. An
/// update that changes the type cannot be written in place: it becomes a
/// delete under the original partition plus a create under the new one, the
/// category move.
#[derive(Clone)]
pub struct EventService {
    events: ConvergentReader<EventLog>,
    writer: Arc<dyn StoreWriter>,
}

impl EventService {
    pub fn new(events: ConvergentReader<EventLog>, writer: Arc<dyn StoreWriter>) -> Self {
        Self { events, writer }
    }

    pub async fn get_all(
        &self,
        event_type: Option<&str>,
        query: Option<&str>,
    ) -> Result<Vec<EventLog>, AppError> {
        let mut events = self.events.fetch_all(false).await?;
        if let Some(event_type) = event_type.filter(|t| !t.is_empty()) {
            events.retain(|e| e.event_type == event_type);
        }
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            let q = q.to_lowercase();
            events.retain(|e| {
                e.title.to_lowercase().contains(&q) || e.content.to_lowercase().contains(&q)
            });
        }
        Ok(events)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<EventLog>, AppError> {
        self.events.fetch_by_id(id).await
    }

    pub async fn create(
        &self,
        payload: CreateEventPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let event_id = new_entity_id("EVT");
        let mut raw = to_raw(&payload)?;
        raw.insert("eventId".into(), json!(event_id));
        raw.insert("createdTime".into(), json!(now_timestamp()));
        raw.insert("creator".into(), json!(actor));

        let receipt = self.writer.create(&raw, actor).await.map_err(AppError::Internal)?;
        self.events.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(event_id))
    }

    /// In-place update, or a category move when the update changes the
    /// event's type. The move deletes under the *original* `(type, row)`
    /// pair, recreates with the original identity and creation timestamp, and
    /// flags the result `moved` so callers can tell the two apart.
    pub async fn update(
        &self,
        key: &str,
        payload: UpdateEventPayload,
        actor: &str,
    ) -> Result<MutationOutcome, AppError> {
        let original = self.resolve_for_write(key).await?;
        let row = original.row_index.ok_or_else(|| {
            AppError::Forbidden(format!(
                "Event '{}' has no row index and cannot be modified on the sheet",
                key
            ))
        })?;

        let is_move = !original.event_type.is_empty()
            && payload
                .event_type
                .as_deref()
                .is_some_and(|t| t != original.event_type);

        let mut raw = to_raw(&payload)?;
        raw.insert("lastUpdateTime".into(), json!(now_timestamp()));
        raw.insert("lastModifier".into(), json!(actor));

        if !is_move {
            let receipt = self
                .writer
                .update(
                    &RecordKey::PartitionRow { partition: original.event_type.clone(), row },
                    &raw,
                    actor,
                )
                .await
                .map_err(AppError::Internal)?;
            self.events.invalidate().await;
            return Ok(MutationOutcome::from_receipt(receipt).with_id(original.event_id));
        }

        // Identity is never regenerated on a move, and the original creation
        // timestamp survives unless the caller supplied one.
        raw.insert("eventId".into(), json!(original.event_id));
        if payload.created_time.is_none() {
            if let Some(created) = &original.created_time {
                raw.insert("createdTime".into(), json!(created));
            }
        }

        self.writer
            .delete(
                &RecordKey::PartitionRow { partition: original.event_type.clone(), row },
                actor,
            )
            .await
            .map_err(AppError::Internal)?;

        // Past this point the original row is gone. A create failure is
        // fatal and is surfaced as such; there is no rollback of the delete.
        let receipt = self.writer.create(&raw, actor).await.map_err(|e| {
            AppError::MoveInconsistency(format!("event '{}': {}", original.event_id, e))
        })?;

        self.events.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt)
            .with_id(original.event_id)
            .moved())
    }

    pub async fn delete(&self, key: &str, actor: &str) -> Result<MutationOutcome, AppError> {
        let original = self.resolve_for_write(key).await?;
        let row = original.row_index.ok_or_else(|| {
            AppError::Forbidden(format!(
                "Event '{}' has no row index and cannot be deleted from the sheet",
                key
            ))
        })?;

        let receipt = self
            .writer
            .delete(
                &RecordKey::PartitionRow { partition: original.event_type.clone(), row },
                actor,
            )
            .await
            .map_err(AppError::Internal)?;
        self.events.invalidate().await;
        Ok(MutationOutcome::from_receipt(receipt).with_id(original.event_id))
    }

    /// Locates the original record for a mutation: forced fallback read, id
    /// match first, then the key parsed as an integer row index. Failing
    /// both is an error, never a guess.
    async fn resolve_for_write(&self, key: &str) -> Result<EventLog, AppError> {
        let events = self.events.fetch_all(true).await?;
        if let Some(by_id) = events
            .iter()
            .find(|e| !e.event_id.is_empty() && e.event_id == key)
        {
            return Ok(by_id.clone());
        }
        if let Ok(row) = key.parse::<u64>() {
            if let Some(by_row) = events.iter().find(|e| e.row_index == Some(row)) {
                return Ok(by_row.clone());
            }
        }
        Err(AppError::NotFound(format!("event '{}'", key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::store::StoreReader;
    use serde_json::{json, Value};

    fn service() -> (Arc<MemoryStore>, EventService) {
        let sheet = Arc::new(MemoryStore::new());
        let service = EventService::new(
            ConvergentReader::new(None, sheet.clone() as Arc<dyn StoreReader>),
            sheet.clone(),
        );
        (sheet, service)
    }

    fn meeting_row() -> Value {
        json!({
            "eventId": "E1",
            "eventType": "Meeting",
            "title": "季度檢討",
            "rowIndex": 5,
            "createdTime": "2026-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn category_change_becomes_a_move_preserving_identity() {
        let (sheet, service) = service();
        sheet.seed("Meeting", vec![meeting_row()]);

        let outcome = service
            .update(
                "E1",
                UpdateEventPayload {
                    event_type: Some("Call".into()),
                    title: Some("電話追蹤".into()),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();

        assert!(outcome.moved);
        assert_eq!(outcome.id.as_deref(), Some("E1"));
        // Delete under the original partition and row, then create under the
        // new partition.
        assert_eq!(sheet.ops(), vec!["delete Meeting:5", "create Call:2"]);

        assert!(sheet.rows_in("Meeting").is_empty());
        let moved = &sheet.rows_in("Call")[0];
        assert_eq!(moved.get("eventId"), Some(&json!("E1")));
        assert_eq!(moved.get("createdTime"), Some(&json!("2026-01-01T00:00:00Z")));
        assert_eq!(moved.get("eventType"), Some(&json!("Call")));
    }

    #[tokio::test]
    async fn same_category_update_stays_in_place() {
        let (sheet, service) = service();
        sheet.seed("Meeting", vec![meeting_row()]);

        let outcome = service
            .update(
                "E1",
                UpdateEventPayload {
                    event_type: Some("Meeting".into()),
                    title: Some("改期".into()),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();

        assert!(!outcome.moved);
        assert_eq!(sheet.ops(), vec!["update Meeting:5"]);
        assert_eq!(sheet.rows_in("Meeting")[0].get("title"), Some(&json!("改期")));
    }

    #[tokio::test]
    async fn explicit_created_time_wins_over_the_original() {
        let (sheet, service) = service();
        sheet.seed("Meeting", vec![meeting_row()]);

        service
            .update(
                "E1",
                UpdateEventPayload {
                    event_type: Some("Call".into()),
                    created_time: Some("2026-05-05T00:00:00Z".into()),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .unwrap();
        assert_eq!(
            sheet.rows_in("Call")[0].get("createdTime"),
            Some(&json!("2026-05-05T00:00:00Z"))
        );
    }

    #[tokio::test]
    async fn failed_recreate_surfaces_move_inconsistency() {
        let (sheet, service) = service();
        sheet.seed("Meeting", vec![meeting_row()]);
        sheet.fail_creates(true);

        let err = service
            .update(
                "E1",
                UpdateEventPayload { event_type: Some("Call".into()), ..Default::default() },
                "alice",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::MoveInconsistency(_)));
        // Known narrow inconsistency window: the original row is already
        // gone and no compensation is attempted.
        assert!(sheet.rows_in("Meeting").is_empty());
        // The failed mutation fires no invalidation; the single entry is the
        // forced read that resolved the row.
        assert_eq!(sheet.invalidations(), vec!["events"]);
    }

    #[tokio::test]
    async fn id_match_takes_priority_over_row_index_match() {
        let (sheet, service) = service();
        // One event whose id *looks like* a row number, and another that
        // actually sits at that row.
        sheet.seed("Meeting", vec![json!({ "eventId": "7", "eventType": "Meeting", "rowIndex": 2 })]);
        sheet.seed("Call", vec![json!({ "eventId": "E9", "eventType": "Call", "rowIndex": 7 })]);

        service
            .update("7", UpdateEventPayload { title: Some("x".into()), ..Default::default() }, "a")
            .await
            .unwrap();
        assert_eq!(sheet.ops(), vec!["update Meeting:2"]);
    }

    #[tokio::test]
    async fn row_index_lookup_applies_when_id_is_absent() {
        let (sheet, service) = service();
        sheet.seed("Meeting", vec![json!({ "eventType": "Meeting", "rowIndex": 4 })]);

        service
            .update("4", UpdateEventPayload { title: Some("x".into()), ..Default::default() }, "a")
            .await
            .unwrap();
        assert_eq!(sheet.ops(), vec!["update Meeting:4"]);
    }

    #[tokio::test]
    async fn unresolvable_key_is_not_found() {
        let (_sheet, service) = service();
        let err = service
            .update("nope", UpdateEventPayload::default(), "a")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_assigns_id_and_partitions_by_type() {
        let (sheet, service) = service();
        let outcome = service
            .create(
                CreateEventPayload {
                    event_type: "Meeting".into(),
                    title: Some("首次拜訪".into()),
                    content: None,
                    event_time: None,
                    related_company_id: None,
                },
                "alice",
            )
            .await
            .unwrap();

        assert!(outcome.id.as_deref().unwrap().starts_with("EVT_"));
        assert_eq!(sheet.rows_in("Meeting").len(), 1);
        assert!(sheet.invalidations().contains(&"events".to_string()));
    }
}
