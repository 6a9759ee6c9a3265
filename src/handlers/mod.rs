// src/handlers/mod.rs

use axum::http::HeaderMap;

pub mod announcements;
pub mod companies;
pub mod contacts;
pub mod events;
pub mod opportunities;

/// Who performed the mutation, for the sheet audit columns. Authentication is
/// handled upstream of this service; the gateway forwards the display name.
pub(crate) fn actor(headers: &HeaderMap) -> String {
    headers
        .get("x-operator")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("system")
        .to_string()
}
