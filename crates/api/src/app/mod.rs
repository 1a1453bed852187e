//! HTTP API application wiring (Axum router + service wiring).
//!
//! This folder is structured like:
//! - `services.rs`: storage + coordinator + read model behind one handle
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request DTOs and JSON response mapping
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use storefront_auth::Hs256JwtValidator;
use storefront_infra::{CheckoutConfig, InMemoryStore, PostgresStore, StoreError};

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::{AppServices, SharedStore};

/// Build the full HTTP router from process configuration (used by `main.rs`).
///
/// Connects to Postgres and bootstraps the schema when `DATABASE_URL` is set;
/// otherwise runs on an in-memory store.
pub async fn build_app(config: &ApiConfig) -> Result<Router, StoreError> {
    let store: SharedStore = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.database_max_connections).await?;
            store.ensure_schema().await?;
            tracing::info!("using postgres store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is not persisted)");
            Arc::new(InMemoryStore::new())
        }
    };

    Ok(build_app_with_store(&config.jwt_secret, store, config.checkout))
}

/// Build the router over an already constructed store.
pub fn build_app_with_store(jwt_secret: &str, store: SharedStore, checkout: CheckoutConfig) -> Router {
    let jwt = Arc::new(Hs256JwtValidator::new(jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let services = Arc::new(AppServices::new(store, checkout));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1", routes::router(auth_state))
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
