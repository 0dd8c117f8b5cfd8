//! Email validation link handler.

use axum::extract::State;
use axum::response::Redirect;
use tracing::info;

use crate::AppState;
use crate::extract::TokenQuery;

/// `GET /validate-profile-email?token=<id>:<secret>`: validate the profile
/// email and redirect (303) to the callback page with the outcome.
///
/// A missing or malformed `token` is rejected with a 400 by [`TokenQuery`].
pub async fn validate_profile_email_handler(
    State(state): State<AppState>,
    TokenQuery(token): TokenQuery,
) -> Redirect {
    let outcome = state.validator.validate_token(&token).await;
    info!(
        token_id = token.id(),
        outcome = outcome.as_str(),
        "email validation finished"
    );
    Redirect::to(&state.validator.redirect_url(outcome))
}
