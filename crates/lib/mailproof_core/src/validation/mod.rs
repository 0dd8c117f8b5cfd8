//! Email validation flow.
//!
//! `EmailValidator::validate` walks a token through five gates and stops at
//! the first one that fails:
//!
//! 1. parse the token and hash its secret
//! 2. fetch the token record by `(id, hash)`
//! 3. reject it if it is past `invalid_after`
//! 4. fetch the latest profile and compare its email to the record's
//! 5. write the profile back with `is_email_validated = true`
//!
//! Only step 5 writes. Every store error is turned into an outcome here; the
//! reason behind an `INVALID_TOKEN` is only visible in the logs.

pub mod outcome;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::models::ValidationTokenRecord;
use crate::store::{Lookup, ProfileStore, StoreError, ValidationTokenStore};
use crate::token::ValidationToken;

pub use outcome::{CallbackUrl, CallbackUrlError, ValidationFailure, ValidationOutcome};

use self::outcome::ValidationFailure::{GenericError, InvalidToken, TokenExpired};

/// Collaborators of the validator, fixed at construction.
#[derive(Clone)]
pub struct ValidationContext {
    pub tokens: Arc<dyn ValidationTokenStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub callback_url: CallbackUrl,
    pub clock: Arc<dyn Clock>,
}

/// Validates profile emails from one-time tokens.
#[derive(Clone)]
pub struct EmailValidator {
    ctx: ValidationContext,
}

impl EmailValidator {
    pub fn new(ctx: ValidationContext) -> Self {
        Self { ctx }
    }

    pub fn callback_url(&self) -> &CallbackUrl {
        &self.ctx.callback_url
    }

    /// Validate a raw, untrusted token string.
    ///
    /// Strings that do not match the token grammar never reach a store.
    pub async fn validate(&self, raw_token: &str) -> ValidationOutcome {
        match ValidationToken::parse(raw_token) {
            Ok(token) => self.validate_token(&token).await,
            Err(e) => {
                warn!(error = %e, "malformed validation token");
                InvalidToken.into()
            }
        }
    }

    /// Validate an already parsed token.
    pub async fn validate_token(&self, token: &ValidationToken) -> ValidationOutcome {
        match self.run(token).await {
            Ok(()) => ValidationOutcome::Success,
            Err(kind) => ValidationOutcome::Failure(kind),
        }
    }

    /// Redirect target for `outcome`, stamped with a fresh clock reading.
    pub fn redirect_url(&self, outcome: ValidationOutcome) -> String {
        self.ctx
            .callback_url
            .redirect_for(outcome, self.ctx.clock.now_millis())
    }

    /// Validate and build the redirect target in one go.
    pub async fn validate_and_redirect(&self, raw_token: &str) -> (ValidationOutcome, String) {
        let outcome = self.validate(raw_token).await;
        (outcome, self.redirect_url(outcome))
    }

    pub async fn ping_token_store(&self) -> Result<(), StoreError> {
        self.ctx.tokens.ping().await
    }

    pub async fn ping_profile_store(&self) -> Result<(), StoreError> {
        self.ctx.profiles.ping().await
    }

    async fn run(&self, token: &ValidationToken) -> Result<(), ValidationFailure> {
        let token_id = token.id();
        let record = self.find_token_record(token).await?;

        let now = self.ctx.clock.now();
        if record.is_expired_at(now) {
            warn!(
                token_id,
                expired_at = %record.invalid_after,
                "token expired"
            );
            return Err(TokenExpired);
        }

        let profile = match self.ctx.profiles.find_latest(&record.fiscal_code).await {
            Lookup::Found(profile) => profile,
            Lookup::NotFound => {
                error!(token_id, "profile not found");
                return Err(GenericError);
            }
            Lookup::Undecodable(e) => {
                error!(token_id, error = %e, "profile can't be decoded");
                return Err(GenericError);
            }
            Lookup::Failed(e) => {
                error!(token_id, error = %e, "error searching the profile");
                return Err(GenericError);
            }
        };

        if !profile.has_email(&record.email) {
            warn!(token_id, "email mismatch");
            return Err(InvalidToken);
        }

        if profile.is_email_validated {
            debug!(token_id, "email already validated, rewriting flag");
        }

        match self
            .ctx
            .profiles
            .update_latest(profile.with_email_validated())
            .await
        {
            Ok(updated) => {
                info!(
                    token_id,
                    version = updated.version,
                    "the profile has been updated"
                );
                Ok(())
            }
            Err(e) => {
                error!(token_id, error = %e, "error updating profile");
                Err(GenericError)
            }
        }
    }

    async fn find_token_record(
        &self,
        token: &ValidationToken,
    ) -> Result<ValidationTokenRecord, ValidationFailure> {
        let token_id = token.id();
        match self
            .ctx
            .tokens
            .get(token_id, &token.verification_hash())
            .await
        {
            Lookup::Found(record) => Ok(record),
            Lookup::NotFound => {
                warn!(token_id, "validation token not found");
                Err(InvalidToken)
            }
            Lookup::Undecodable(e) => {
                error!(token_id, error = %e, "validation token can't be decoded");
                Err(InvalidToken)
            }
            Lookup::Failed(e) => {
                error!(token_id, error = %e, "error searching validation token");
                Err(GenericError)
            }
        }
    }
}

#[cfg(test)]
mod tests;
