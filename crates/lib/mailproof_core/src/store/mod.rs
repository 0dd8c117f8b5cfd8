//! Storage seams for validation tokens and profiles.
//!
//! The validator only sees these traits. `postgres` backs them with sqlx,
//! `memory` with in-process maps.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DecodeError, FiscalCode, Profile, ValidationTokenRecord};
use crate::token::VerificationHash;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result of reading a single record.
///
/// Absence, malformed data and operational failure are kept apart so callers
/// can map each to its own outcome.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Undecodable(DecodeError),
    Failed(StoreError),
}

impl<T> Lookup<T> {
    /// Decode an optional raw row into a domain value.
    pub fn decode<R>(row: Option<R>) -> Self
    where
        T: TryFrom<R, Error = DecodeError>,
    {
        match row.map(T::try_from) {
            None => Lookup::NotFound,
            Some(Ok(value)) => Lookup::Found(value),
            Some(Err(e)) => Lookup::Undecodable(e),
        }
    }
}

impl<T> From<Result<Option<T>, StoreError>> for Lookup<T> {
    fn from(result: Result<Option<T>, StoreError>) -> Self {
        match result {
            Ok(Some(value)) => Lookup::Found(value),
            Ok(None) => Lookup::NotFound,
            Err(e) => Lookup::Failed(e),
        }
    }
}

/// Read access to issued validation tokens.
#[async_trait]
pub trait ValidationTokenStore: Send + Sync {
    /// Fetch the record keyed by `(token id, verification hash)`.
    async fn get(&self, token_id: &str, hash: &VerificationHash) -> Lookup<ValidationTokenRecord>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Access to the latest version of each profile.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_latest(&self, fiscal_code: &FiscalCode) -> Lookup<Profile>;

    /// Persist `profile` as the new latest version, returning what was stored.
    ///
    /// `profile.version` is the version it was read at.
    async fn update_latest(&self, profile: Profile) -> Result<Profile, StoreError>;

    /// Cheap connectivity probe.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Check that a configured table name is a plain SQL identifier.
///
/// Table names are interpolated into statements, so anything beyond
/// `[A-Za-z_][A-Za-z0-9_]*` (max 63 bytes, the Postgres limit) is refused.
pub fn check_table_name(name: &str) -> Result<(), StoreError> {
    let mut bytes = name.bytes();
    let starts_ok = bytes
        .next()
        .is_some_and(|b| b.is_ascii_alphabetic() || b == b'_');
    let rest_ok = bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_');
    if starts_ok && rest_ok && name.len() <= 63 {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(name.to_string()))
    }
}
