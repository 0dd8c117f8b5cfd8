//! API server configuration.

use mailproof_core::store::{StoreError, check_table_name};
use mailproof_core::validation::{CallbackUrl, CallbackUrlError};
use thiserror::Error;

/// Default listener address.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3100";

/// Default PostgreSQL connection URL.
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/mailproof";

/// Default validation token table.
pub const DEFAULT_VALIDATION_TOKENS_TABLE: &str = "validation_tokens";

/// Default profile table.
pub const DEFAULT_PROFILES_TABLE: &str = "profiles";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid VALIDATION_CALLBACK_URL: {0}")]
    CallbackUrl(#[from] CallbackUrlError),

    #[error(transparent)]
    TableName(#[from] StoreError),
}

/// Configuration for the API server.
///
/// The server fills it from flags and environment variables:
///
/// | Variable                  | Default                                  |
/// |---------------------------|------------------------------------------|
/// | `BIND_ADDR`               | `127.0.0.1:3100`                         |
/// | `DATABASE_URL`            | `postgres://localhost:5432/mailproof`    |
/// | `VALIDATION_CALLBACK_URL` | required                                 |
/// | `VALIDATION_TOKENS_TABLE` | `validation_tokens`                      |
/// | `PROFILES_TABLE`          | `profiles`                               |
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Page the user lands on after following a validation link.
    pub validation_callback_url: CallbackUrl,
    /// Table holding issued validation tokens.
    pub validation_tokens_table: String,
    /// Table holding versioned profiles.
    pub profiles_table: String,
}

impl ApiConfig {
    /// Build a config, checking the callback URL and table names.
    pub fn new(
        bind_addr: impl Into<String>,
        database_url: impl Into<String>,
        validation_callback_url: &str,
        validation_tokens_table: impl Into<String>,
        profiles_table: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            bind_addr: bind_addr.into(),
            database_url: database_url.into(),
            validation_callback_url: CallbackUrl::parse(validation_callback_url)?,
            validation_tokens_table: validation_tokens_table.into(),
            profiles_table: profiles_table.into(),
        };
        check_table_name(&config.validation_tokens_table)?;
        check_table_name(&config.profiles_table)?;
        Ok(config)
    }
}
