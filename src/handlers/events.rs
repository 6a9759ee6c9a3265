// src/handlers/events.rs

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::common::error::AppError;
use crate::config::AppState;
use crate::services::event_service::{CreateEventPayload, UpdateEventPayload};

use super::actor;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListQuery {
    pub event_type: Option<String>,
    pub q: Option<String>,
}

// GET /api/events
pub async fn get_all(
    State(app_state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let events = app_state
        .event_service
        .get_all(query.event_type.as_deref(), query.q.as_deref())
        .await?;
    Ok(Json(events))
}

// GET /api/events/{id}
pub async fn get_by_id(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let event = app_state
        .event_service
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("event '{}'", id)))?;
    Ok(Json(event))
}

// POST /api/events
pub async fn create(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateEventPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = app_state.event_service.create(payload, &actor(&headers)).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// PUT /api/events/{key}; becomes a category move when `eventType` changes.
pub async fn update(
    State(app_state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateEventPayload>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state.event_service.update(&key, payload, &actor(&headers)).await?;
    Ok(Json(outcome))
}

// DELETE /api/events/{key}
pub async fn delete(
    State(app_state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state.event_service.delete(&key, &actor(&headers)).await?;
    Ok(Json(outcome))
}
