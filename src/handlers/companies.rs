// src/handlers/companies.rs

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
use crate::services::company_service::{CreateCompanyPayload, UpdateCompanyPayload};

use super::actor;

#[derive(Debug, Default, Deserialize)]
pub struct CompanyListQuery {
    pub q: Option<String>,
    pub industry: Option<String>,
}

// GET /api/companies
pub async fn get_all(
    State(app_state): State<AppState>,
    Query(query): Query<CompanyListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let companies = app_state
        .company_service
        .get_all(query.q.as_deref(), query.industry.as_deref())
        .await?;
    Ok(Json(companies))
}

// GET /api/companies/{id}
pub async fn get_by_id(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let company = app_state
        .company_service
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("company '{}'", id)))?;
    Ok(Json(company))
}

// GET /api/companies/{id}/details
pub async fn get_details(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let details = app_state.company_service.get_details(&id).await?;
    Ok(Json(details))
}

// POST /api/companies
pub async fn create(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateCompanyPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let outcome = app_state.company_service.create(payload, &actor(&headers)).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// PUT /api/companies/{key}
pub async fn update(
    State(app_state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateCompanyPayload>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state.company_service.update(&key, payload, &actor(&headers)).await?;
    Ok(Json(outcome))
}

// DELETE /api/companies/{key}
pub async fn delete(
    State(app_state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state.company_service.delete(&key, &actor(&headers)).await?;
    Ok(Json(outcome))
}
