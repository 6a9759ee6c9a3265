// src/handlers/contacts.rs

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
use crate::services::contact_service::{
    CreateContactPayload, CreatePotentialContactPayload, UpdateContactPayload,
};

use super::actor;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactListQuery {
    pub q: Option<String>,
    pub company_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PotentialListQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotePayload {
    pub company_id: Option<String>,
}

// GET /api/contacts
pub async fn get_all(
    State(app_state): State<AppState>,
    Query(query): Query<ContactListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let contacts = app_state
        .contact_service
        .get_all(query.q.as_deref(), query.company_id.as_deref())
        .await?;
    Ok(Json(contacts))
}

// GET /api/contacts/{id}
pub async fn get_by_id(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let contact = app_state
        .contact_service
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("contact '{}'", id)))?;
    Ok(Json(contact))
}

// POST /api/contacts
pub async fn create(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateContactPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = app_state.contact_service.create(payload, &actor(&headers)).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// PUT /api/contacts/{id}
pub async fn update(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateContactPayload>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state.contact_service.update(&id, payload, &actor(&headers)).await?;
    Ok(Json(outcome))
}

// DELETE /api/contacts/{id}
pub async fn delete(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state.contact_service.delete(&id, &actor(&headers)).await?;
    Ok(Json(outcome))
}

// GET /api/potential-contacts
pub async fn get_potentials(
    State(app_state): State<AppState>,
    Query(query): Query<PotentialListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let potentials = app_state.contact_service.get_potentials(query.q.as_deref()).await?;
    Ok(Json(potentials))
}

// POST /api/potential-contacts
pub async fn create_potential(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePotentialContactPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = app_state
        .contact_service
        .create_potential(payload, &actor(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// PUT /api/potential-contacts/{row}
pub async fn update_potential(
    State(app_state): State<AppState>,
    Path(row): Path<u64>,
    headers: HeaderMap,
    Json(payload): Json<CreatePotentialContactPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = app_state
        .contact_service
        .update_potential(row, payload, &actor(&headers))
        .await?;
    Ok(Json(outcome))
}

// DELETE /api/potential-contacts/{row}
pub async fn delete_potential(
    State(app_state): State<AppState>,
    Path(row): Path<u64>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state
        .contact_service
        .delete_potential(row, &actor(&headers))
        .await?;
    Ok(Json(outcome))
}

// POST /api/potential-contacts/{row}/promote
pub async fn promote(
    State(app_state): State<AppState>,
    Path(row): Path<u64>,
    headers: HeaderMap,
    Json(payload): Json<PromotePayload>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state
        .contact_service
        .promote(row, payload.company_id.as_deref(), &actor(&headers))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
