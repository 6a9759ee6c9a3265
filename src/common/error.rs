// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// The application error taxonomy. Soft read failures (primary source down or
// empty) never appear here: they are absorbed by the fallback read and only
// logged. Everything below is caller-visible.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    // A write was attempted against a record that lacks the addressing key
    // required by its current write-authority store (e.g. no rowIndex on an
    // SQL-resident record). The message must be actionable for the caller.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BusinessRule(String),

    // The delete half of a category move succeeded but the create half
    // failed. Fatal, no automatic compensation.
    #[error("Record was removed but could not be recreated: {0}")]
    MoveInconsistency(String),

    // Hard read failure: the fallback source failed too.
    #[error("Data source unavailable for '{entity}'")]
    SourceUnavailable {
        entity: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "One or more fields are invalid.",
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::BusinessRule(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::SourceUnavailable { .. } => {
                tracing::error!("{:?}", self);
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            // MoveInconsistency, Database, Internal all become 500. The
            // detailed cause goes to the log, not the response body.
            e => {
                tracing::error!("Internal server error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An unexpected error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
