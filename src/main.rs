// src/main.rs

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod common;
mod config;
mod convergence;
mod handlers;
mod models;
mod services;
mod store;

use crate::config::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .compact()
        .init();

    let app_state = AppState::new()
        .await
        .expect("failed to initialize application state");

    let company_routes = Router::new()
        .route("/", post(handlers::companies::create).get(handlers::companies::get_all))
        .route(
            "/{key}",
            get(handlers::companies::get_by_id)
                .put(handlers::companies::update)
                .delete(handlers::companies::delete),
        )
        .route("/{key}/details", get(handlers::companies::get_details));

    let contact_routes = Router::new()
        .route("/", post(handlers::contacts::create).get(handlers::contacts::get_all))
        .route(
            "/{id}",
            get(handlers::contacts::get_by_id)
                .put(handlers::contacts::update)
                .delete(handlers::contacts::delete),
        );

    let potential_contact_routes = Router::new()
        .route(
            "/",
            post(handlers::contacts::create_potential).get(handlers::contacts::get_potentials),
        )
        .route(
            "/{row}",
            axum::routing::put(handlers::contacts::update_potential)
                .delete(handlers::contacts::delete_potential),
        )
        .route("/{row}/promote", post(handlers::contacts::promote));

    let opportunity_routes = Router::new()
        .route(
            "/",
            post(handlers::opportunities::create).get(handlers::opportunities::get_all),
        )
        .route(
            "/{key}",
            get(handlers::opportunities::get_by_id)
                .put(handlers::opportunities::update)
                .delete(handlers::opportunities::delete),
        )
        .route("/{key}/details", get(handlers::opportunities::get_details));

    let event_routes = Router::new()
        .route("/", post(handlers::events::create).get(handlers::events::get_all))
        .route(
            "/{key}",
            get(handlers::events::get_by_id)
                .put(handlers::events::update)
                .delete(handlers::events::delete),
        );

    let announcement_routes = Router::new()
        .route(
            "/",
            post(handlers::announcements::create).get(handlers::announcements::get_all),
        )
        .route(
            "/{key}",
            get(handlers::announcements::get_by_id)
                .put(handlers::announcements::update)
                .delete(handlers::announcements::delete),
        );

    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/companies", company_routes)
        .nest("/api/contacts", contact_routes)
        .nest("/api/potential-contacts", potential_contact_routes)
        .nest("/api/opportunities", opportunity_routes)
        .nest("/api/events", event_routes)
        .nest("/api/announcements", announcement_routes)
        .with_state(app_state);

    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind TCP listener");
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.expect("axum server error");
}
