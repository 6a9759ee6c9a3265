// src/handlers/opportunities.rs

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
use crate::services::opportunity_service::{CreateOpportunityPayload, UpdateOpportunityPayload};

use super::actor;

#[derive(Debug, Default, Deserialize)]
pub struct OpportunityListQuery {
    pub q: Option<String>,
    pub stage: Option<String>,
    pub assignee: Option<String>,
}

// GET /api/opportunities
pub async fn get_all(
    State(app_state): State<AppState>,
    Query(query): Query<OpportunityListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let opportunities = app_state
        .opportunity_service
        .get_all(query.q.as_deref(), query.stage.as_deref(), query.assignee.as_deref())
        .await?;
    Ok(Json(opportunities))
}

// GET /api/opportunities/{id}
pub async fn get_by_id(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let opportunity = app_state
        .opportunity_service
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("opportunity '{}'", id)))?;
    Ok(Json(opportunity))
}

// GET /api/opportunities/{id}/details
pub async fn get_details(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let details = app_state.opportunity_service.get_details(&id).await?;
    Ok(Json(details))
}

// POST /api/opportunities
pub async fn create(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateOpportunityPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = app_state
        .opportunity_service
        .create(payload, &actor(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// PUT /api/opportunities/{key}
pub async fn update(
    State(app_state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateOpportunityPayload>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state
        .opportunity_service
        .update(&key, payload, &actor(&headers))
        .await?;
    Ok(Json(outcome))
}

// DELETE /api/opportunities/{key}
pub async fn delete(
    State(app_state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state.opportunity_service.delete(&key, &actor(&headers)).await?;
    Ok(Json(outcome))
}
