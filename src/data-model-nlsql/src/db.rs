use std::time::Duration;

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::deadpool::Pool;

pub type PoolError = deadpool::managed::PoolError<diesel_async::pooled_connection::PoolError>;

pub type DbPool = Pool<AsyncPgConnection>;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionPoolError {
    #[error("Failed to build connection pool: {0}")]
    BuildError(#[from] deadpool::managed::BuildError),
    #[error("Failed to establish initial database connection: {0}")]
    ConnectionError(#[from] PoolError),
}

/// How the pool hands out connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// Most connections open at once. `None` keeps deadpool's default (4 per CPU).
    pub max_size: Option<usize>,
    /// How long a checkout waits for a free connection before failing with a timeout.
    pub wait_timeout: Duration,
}

impl PoolSettings {
    pub fn new(wait_timeout: Duration) -> Self {
        Self {
            max_size: None,
            wait_timeout,
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }
}

/// Builds a pool without opening any connection.
pub fn build_connection_pool(database_url: &str, settings: &PoolSettings) -> Result<DbPool, ConnectionPoolError> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    let mut builder = Pool::builder(config)
        .runtime(deadpool::Runtime::Tokio1)
        .wait_timeout(Some(settings.wait_timeout));
    if let Some(max_size) = settings.max_size {
        builder = builder.max_size(max_size);
    }
    Ok(builder.build()?)
}

/// Builds a pool and checks out one connection, failing fast if the database is unreachable.
pub async fn establish_connection_pool(
    database_url: &str,
    settings: &PoolSettings,
) -> Result<DbPool, ConnectionPoolError> {
    let pool = build_connection_pool(database_url, settings)?;
    let _conn = pool.get().await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_connection_pool_applies_settings() {
        let settings = PoolSettings::new(Duration::from_millis(250)).with_max_size(3);
        let pool = build_connection_pool("postgres://nobody@127.0.0.1:1/none", &settings).unwrap();

        assert_eq!(pool.status().max_size, 3);
        assert_eq!(pool.timeouts().wait, Some(Duration::from_millis(250)));
    }
}
