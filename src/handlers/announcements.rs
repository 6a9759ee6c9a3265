// src/handlers/announcements.rs

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
use crate::services::announcement_service::{CreateAnnouncementPayload, UpdateAnnouncementPayload};

use super::actor;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementListQuery {
    #[serde(default)]
    pub published_only: bool,
}

// GET /api/announcements
pub async fn get_all(
    State(app_state): State<AppState>,
    Query(query): Query<AnnouncementListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let announcements = app_state
        .announcement_service
        .get_all(query.published_only)
        .await?;
    Ok(Json(announcements))
}

// GET /api/announcements/{id}
pub async fn get_by_id(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let announcement = app_state
        .announcement_service
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("announcement '{}'", id)))?;
    Ok(Json(announcement))
}

// POST /api/announcements
pub async fn create(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateAnnouncementPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = app_state
        .announcement_service
        .create(payload, &actor(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// PUT /api/announcements/{key}
pub async fn update(
    State(app_state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateAnnouncementPayload>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state
        .announcement_service
        .update(&key, payload, &actor(&headers))
        .await?;
    Ok(Json(outcome))
}

// DELETE /api/announcements/{key}
pub async fn delete(
    State(app_state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state
        .announcement_service
        .delete(&key, &actor(&headers))
        .await?;
    Ok(Json(outcome))
}
