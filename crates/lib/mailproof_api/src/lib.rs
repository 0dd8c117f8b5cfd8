//! # mailproof_api
//!
//! HTTP API library for Mailproof.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use mailproof_core::EmailValidator;

use crate::handlers::{info, validate_email};

/// Route of the link embedded in validation emails.
pub const VALIDATE_PROFILE_EMAIL: &str = "/validate-profile-email";

/// Route of the service info endpoint.
pub const GET_API_INFO: &str = "/api/info";

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Email validation flow, wired to its stores and clock.
    pub validator: Arc<EmailValidator>,
}

/// Run embedded database migrations.
///
/// Delegates to `mailproof_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    mailproof_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(GET_API_INFO, get(info::info_handler))
        .route(
            VALIDATE_PROFILE_EMAIL,
            get(validate_email::validate_profile_email_handler),
        )
        .layer(cors)
        .with_state(state)
}
