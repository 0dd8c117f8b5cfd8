//! Postgres-backed stores.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use super::{Lookup, ProfileStore, StoreError, ValidationTokenStore, check_table_name};
use crate::models::{FiscalCode, Profile, ProfileRow, ValidationTokenRecord, ValidationTokenRow};
use crate::token::VerificationHash;

/// Postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Validation tokens keyed by `(partition_key, row_key)`.
#[derive(Clone, Debug)]
pub struct PgValidationTokenStore {
    pool: PgPool,
    select_sql: String,
}

impl PgValidationTokenStore {
    pub fn new(pool: PgPool, table: &str) -> Result<Self, StoreError> {
        check_table_name(table)?;
        Ok(Self {
            pool,
            select_sql: format!(
                "SELECT partition_key, row_key, fiscal_code, email, invalid_after \
                 FROM {table} WHERE partition_key = $1 AND row_key = $2"
            ),
        })
    }
}

#[async_trait]
impl ValidationTokenStore for PgValidationTokenStore {
    async fn get(&self, token_id: &str, hash: &VerificationHash) -> Lookup<ValidationTokenRecord> {
        let row = sqlx::query_as::<_, ValidationTokenRow>(&self.select_sql)
            .bind(token_id)
            .bind(hash.as_str())
            .fetch_optional(&self.pool)
            .await;

        match row {
            Ok(row) => {
                debug!(token_id, found = row.is_some(), "validation token lookup");
                Lookup::decode(row)
            }
            Err(e) => Lookup::Failed(e.into()),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Versioned profiles: every update inserts `version + 1`.
#[derive(Clone, Debug)]
pub struct PgProfileStore {
    pool: PgPool,
    select_latest_sql: String,
    insert_version_sql: String,
}

impl PgProfileStore {
    pub fn new(pool: PgPool, table: &str) -> Result<Self, StoreError> {
        check_table_name(table)?;
        Ok(Self {
            pool,
            select_latest_sql: format!(
                "SELECT fiscal_code, version, email, is_email_validated, attributes \
                 FROM {table} WHERE fiscal_code = $1 \
                 ORDER BY version DESC LIMIT 1"
            ),
            insert_version_sql: format!(
                "INSERT INTO {table} (fiscal_code, version, email, is_email_validated, attributes) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING fiscal_code, version, email, is_email_validated, attributes"
            ),
        })
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn find_latest(&self, fiscal_code: &FiscalCode) -> Lookup<Profile> {
        let row = sqlx::query_as::<_, ProfileRow>(&self.select_latest_sql)
            .bind(fiscal_code.as_str())
            .fetch_optional(&self.pool)
            .await;

        match row {
            Ok(row) => Lookup::decode(row),
            Err(e) => Lookup::Failed(e.into()),
        }
    }

    async fn update_latest(&self, profile: Profile) -> Result<Profile, StoreError> {
        let next_version = profile.version + 1;
        let row = sqlx::query_as::<_, ProfileRow>(&self.insert_version_sql)
            .bind(profile.fiscal_code.as_str())
            .bind(next_version)
            .bind(profile.email.as_deref())
            .bind(profile.is_email_validated)
            .bind(serde_json::Value::Object(profile.attributes))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                    StoreError::Conflict(format!("profile version {next_version} already exists"))
                }
                e => StoreError::Db(e),
            })?;

        debug!(version = next_version, "profile version written");

        Profile::try_from(row).map_err(|e| StoreError::Internal(format!("stored profile: {e}")))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
