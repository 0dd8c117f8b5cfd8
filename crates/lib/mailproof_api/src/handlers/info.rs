//! Service info endpoint: version and store connectivity.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::AppState;
use crate::models::InfoResponse;

/// `GET /api/info`: reports the crate version and whether both stores answer.
pub async fn info_handler(State(state): State<AppState>) -> Json<InfoResponse> {
    let (tokens, profiles) = tokio::join!(
        state.validator.ping_token_store(),
        state.validator.ping_profile_store()
    );

    if let Err(e) = &tokens {
        warn!("token store check failed: {e}");
    }
    if let Err(e) = &profiles {
        warn!("profile store check failed: {e}");
    }

    Json(InfoResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: mailproof_core::version().to_string(),
        token_store_connected: tokens.is_ok(),
        profile_store_connected: profiles.is_ok(),
    })
}
