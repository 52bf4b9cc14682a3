//! Connection pool construction and schema migrations.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;

use crate::error::{DataError, Result};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a pool for `url` and apply pending migrations.
///
/// In-memory databases are pinned to a single long-lived connection so every
/// caller sees the same schema.
///
/// # Errors
///
/// Returns an error if the URL is invalid, the database cannot be opened, or a
/// migration fails.
pub async fn connect(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .map_err(|err| DataError::query("pool.parse_url", err))?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = url.contains(":memory:") || url.contains("mode=memory");
    let mut pool_options = SqlitePoolOptions::new().acquire_timeout(ACQUIRE_TIMEOUT);
    pool_options = if in_memory {
        pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.max_connections(DEFAULT_MAX_CONNECTIONS)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|err| DataError::query("pool.connect", err))?;
    migrate(&pool).await?;
    info!(in_memory, "database ready");
    Ok(pool)
}

/// Apply embedded migrations.
///
/// # Errors
///
/// Returns [`DataError::MigrationFailed`] if any migration cannot be applied.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|source| DataError::MigrationFailed { source })
}
