use data_model_nlsql::db::{ConnectionPoolError, DbPool, PoolSettings, establish_connection_pool};

use crate::Config;

/// Establishes a connection pool to the configured database, failing fast if it's unreachable.
/// Checkouts give up after `pool_timeout` when every connection is busy.
/// The URL is never logged: it usually carries a password.
pub async fn get_db_pool(config: &Config) -> Result<DbPool, ConnectionPoolError> {
    let pool = establish_connection_pool(&config.database_url, &PoolSettings::new(config.pool_timeout)).await?;
    tracing::info!(
        "Connected to database (max pool size: {}, checkout timeout: {:?})",
        pool.status().max_size,
        config.pool_timeout
    );
    Ok(pool)
}
