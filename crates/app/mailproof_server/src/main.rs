//! Mailproof HTTP server binary.
//!
//! Serves the email validation link endpoint backed by PostgreSQL.

use std::sync::Arc;

use clap::Parser;
use mailproof_api::config::{
    ApiConfig, ConfigError, DEFAULT_BIND_ADDR, DEFAULT_DATABASE_URL, DEFAULT_PROFILES_TABLE,
    DEFAULT_VALIDATION_TOKENS_TABLE,
};
use mailproof_core::clock::SystemClock;
use mailproof_core::store::postgres::{PgProfileStore, PgValidationTokenStore};
use mailproof_core::validation::{EmailValidator, ValidationContext};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

/// CLI arguments for the server.
#[derive(Parser, Debug)]
#[command(name = "mailproof_server", about = "Mailproof email validation server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Page users are redirected to after following a validation link.
    #[arg(long, env = "VALIDATION_CALLBACK_URL")]
    validation_callback_url: String,

    /// Table holding issued validation tokens.
    #[arg(long, env = "VALIDATION_TOKENS_TABLE", default_value = DEFAULT_VALIDATION_TOKENS_TABLE)]
    validation_tokens_table: String,

    /// Table holding versioned profiles.
    #[arg(long, env = "PROFILES_TABLE", default_value = DEFAULT_PROFILES_TABLE)]
    profiles_table: String,

    /// Skip running the embedded migrations on startup.
    #[arg(long, default_value_t = false)]
    skip_migrations: bool,
}

impl Args {
    /// Validated API configuration.
    fn api_config(&self) -> Result<ApiConfig, ConfigError> {
        ApiConfig::new(
            self.bind_addr.as_str(),
            self.database_url.as_str(),
            &self.validation_callback_url,
            self.validation_tokens_table.as_str(),
            self.profiles_table.as_str(),
        )
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,mailproof_api=debug,mailproof_core=debug")
            }),
        )
        .init();

    let args = Args::parse();
    let config = args.api_config()?;

    info!(
        bind_addr = %config.bind_addr,
        callback = %config.validation_callback_url,
        max_connections = args.max_connections,
        "starting mailproof_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    if args.skip_migrations {
        info!("skipping database migrations");
    } else {
        info!("running database migrations");
        mailproof_api::migrate(&pool).await?;
    }

    let validator = EmailValidator::new(ValidationContext {
        tokens: Arc::new(PgValidationTokenStore::new(
            pool.clone(),
            &config.validation_tokens_table,
        )?),
        profiles: Arc::new(PgProfileStore::new(pool, &config.profiles_table)?),
        callback_url: config.validation_callback_url.clone(),
        clock: Arc::new(SystemClock),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;

    let app = mailproof_api::router(mailproof_api::AppState {
        validator: Arc::new(validator),
    });

    info!(addr = %local_addr, "REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
