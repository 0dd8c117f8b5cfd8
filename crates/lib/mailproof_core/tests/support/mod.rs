//! Throwaway PostgreSQL for store tests.
//!
//! `MAILPROOF_TEST_DATABASE_URL` points the tests at an existing server.
//! Otherwise a private instance is started from the binaries `pg_config`
//! reports and stopped when the `TestDb` is dropped. Every `TestDb` works
//! inside its own freshly migrated schema.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio::process::Command;

const TEST_DATABASE_URL: &str = "MAILPROOF_TEST_DATABASE_URL";
const PG_READY_TIMEOUT: Duration = Duration::from_secs(30);
const PG_READY_POLL: Duration = Duration::from_millis(100);

static SCHEMA_SEQ: AtomicU32 = AtomicU32::new(0);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct TestDb {
    pub pool: PgPool,
    _server: Option<EphemeralPg>,
}

/// Connect to a migrated, empty schema, or `None` when no PostgreSQL is
/// available on this machine.
pub async fn test_db() -> Option<TestDb> {
    let (base_url, server) = match std::env::var(TEST_DATABASE_URL) {
        Ok(url) => (url, None),
        Err(_) => {
            let Some(bin_dir) = pg_bin_dir().await else {
                eprintln!("skipping: neither {TEST_DATABASE_URL} nor pg_config is available");
                return None;
            };
            let server = EphemeralPg::start(bin_dir)
                .await
                .expect("start ephemeral postgres");
            (server.connection_url(), Some(server))
        }
    };

    let schema = unique_schema();
    let admin = PgPool::connect(&base_url).await.expect("connect to postgres");
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .expect("create test schema");
    admin.close().await;

    let options = PgConnectOptions::from_str(&base_url)
        .expect("parse database url")
        .options([("search_path", schema.as_str())]);
    let pool = PgPoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .expect("connect to test schema");

    mailproof_core::migrate::migrate(&pool)
        .await
        .expect("run migrations");

    Some(TestDb {
        pool,
        _server: server,
    })
}

fn unique_schema() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!(
        "mailproof_test_{}_{}_{}",
        std::process::id(),
        SCHEMA_SEQ.fetch_add(1, Ordering::Relaxed),
        nanos
    )
}

async fn pg_bin_dir() -> Option<PathBuf> {
    let output = Command::new("pg_config").arg("--bindir").output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    Some(PathBuf::from(String::from_utf8_lossy(&output.stdout).trim()))
}

/// A PostgreSQL server living in a temporary directory.
struct EphemeralPg {
    bin_dir: PathBuf,
    data_dir: PathBuf,
    port: u16,
    _tempdir: tempfile::TempDir,
}

impl EphemeralPg {
    async fn start(bin_dir: PathBuf) -> Result<Self, BoxError> {
        let tempdir = tempfile::tempdir()?;
        let data_dir = tempdir.path().join("pgdata");
        let port = find_free_port()?;

        run(Command::new(bin_dir.join("initdb"))
            .arg("-D")
            .arg(&data_dir)
            .args(["--no-locale", "--encoding=UTF8", "-U", "postgres", "--auth=trust"]))
        .await?;

        run(Command::new(bin_dir.join("pg_ctl"))
            .arg("-D")
            .arg(&data_dir)
            .arg("-o")
            .arg(format!("-p {port} -k {} -h localhost", data_dir.display()))
            .arg("-l")
            .arg(data_dir.join("postgresql.log"))
            .arg("start"))
        .await?;

        let server = Self {
            bin_dir,
            data_dir,
            port,
            _tempdir: tempdir,
        };
        server.wait_for_ready().await?;
        Ok(server)
    }

    fn connection_url(&self) -> String {
        format!("postgresql://postgres@localhost:{}/postgres", self.port)
    }

    async fn wait_for_ready(&self) -> Result<(), BoxError> {
        let deadline = tokio::time::Instant::now() + PG_READY_TIMEOUT;
        loop {
            let status = Command::new(self.bin_dir.join("pg_isready"))
                .args(["-h", "localhost", "-p"])
                .arg(self.port.to_string())
                .output()
                .await?
                .status;
            if status.success() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(format!("postgres not ready after {PG_READY_TIMEOUT:?}").into());
            }
            tokio::time::sleep(PG_READY_POLL).await;
        }
    }
}

impl Drop for EphemeralPg {
    fn drop(&mut self) {
        let _ = std::process::Command::new(self.bin_dir.join("pg_ctl"))
            .arg("-D")
            .arg(&self.data_dir)
            .args(["-m", "immediate", "stop"])
            .output();
    }
}

async fn run(command: &mut Command) -> Result<(), BoxError> {
    let output = command.output().await?;
    if output.status.success() {
        Ok(())
    } else {
        let program = Path::new(command.as_std().get_program()).display().to_string();
        Err(format!(
            "{program} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )
        .into())
    }
}

fn find_free_port() -> std::io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
