//! Request extractors.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use mailproof_core::token::ValidationToken;

use crate::error::AppError;
use crate::models::ValidateProfileEmailQuery;

/// The `token` query parameter, present and matching the token grammar.
///
/// Requests without it, or with a malformed one, are answered with a 400
/// before any handler runs:
///
/// ```ignore
/// async fn handler(TokenQuery(token): TokenQuery) -> Redirect { ... }
/// ```
#[derive(Debug, Clone)]
pub struct TokenQuery(pub ValidationToken);

impl<S> FromRequestParts<S> for TokenQuery
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<ValidateProfileEmailQuery>::try_from_uri(&parts.uri)
            .map_err(|e| AppError::Validation(format!("Invalid query string: {e}")))?;

        let raw = query.token.ok_or_else(|| {
            AppError::Validation("Missing required query parameter 'token'".into())
        })?;

        let token = ValidationToken::parse(&raw)
            .map_err(|e| AppError::Validation(format!("Invalid 'token' query parameter: {e}")))?;

        Ok(TokenQuery(token))
    }
}
