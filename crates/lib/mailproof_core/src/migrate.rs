//! Database migration support.
//!
//! Embeds and runs SQL migrations from `mailproof_core/migrations/`. They
//! create the default `validation_tokens` and `profiles` tables; deployments
//! that configure other table names provision those themselves.

use sqlx::PgPool;

/// Run all embedded database migrations against the given pool.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
