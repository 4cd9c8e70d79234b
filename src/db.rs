use std::time::Duration;

use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime, Timeouts};
use tokio_postgres::NoTls;

use crate::error::Result;

/// Upper bound on pooled connections.
const MAX_CONNECTIONS: usize = 32;

/// Schema applied at startup. Every statement is idempotent.
const INIT_SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// Creates the PostgreSQL connection pool.
///
/// The URL is parsed up front so a malformed `DATABASE_URL` fails at startup
/// rather than on the first request.
pub fn create_pool(database_url: &str) -> Result<Pool> {
    let parsed: tokio_postgres::Config = database_url.parse()?;
    tracing::debug!(
        dbname = ?parsed.get_dbname(),
        user = ?parsed.get_user(),
        "Connecting to PostgreSQL"
    );

    let cfg = Config {
        url: Some(database_url.to_string()),
        manager: Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        }),
        pool: Some(PoolConfig {
            max_size: MAX_CONNECTIONS,
            timeouts: Timeouts {
                wait: Some(Duration::from_secs(5)),
                create: Some(Duration::from_secs(2)),
                recycle: Some(Duration::from_secs(1)),
            },
            ..Default::default()
        }),
        ..Default::default()
    };

    Ok(cfg.create_pool(Some(Runtime::Tokio1), NoTls)?)
}

/// Applies the embedded schema.
pub async fn run_migrations(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;
    client.batch_execute(INIT_SCHEMA).await?;
    tracing::info!("✅ Database schema is up to date");
    Ok(())
}
