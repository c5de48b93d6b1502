//! Discovers which tables the prompt can mention.

use std::sync::Arc;

use async_trait::async_trait;
use data_model_nlsql::{db::DbPool, query::fetch_table_names};
use tokio::time::Instant;

/// Name of a table as reported by the database catalog. Opaque: never parsed or quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TableName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TableName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    DbError(#[from] diesel::result::Error),
    #[error("Database pool error: {0}")]
    DbPoolError(String),
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

impl<E: std::fmt::Debug> From<deadpool::managed::PoolError<E>> for CatalogError {
    fn from(error: deadpool::managed::PoolError<E>) -> Self {
        Self::DbPoolError(format!("{:?}", error))
    }
}

/// Interface to the database's metadata: which base tables exist outside the system schemas.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn table_names(&self) -> Result<Vec<TableName>, CatalogError>;
}

#[async_trait]
impl Catalog for DbPool {
    async fn table_names(&self) -> Result<Vec<TableName>, CatalogError> {
        // The connection goes back to the pool when `conn` drops, on every exit path.
        let mut conn = self.get().await?;
        let names = fetch_table_names(&mut conn).await?;
        Ok(names.into_iter().map(TableName::from).collect())
    }
}

#[async_trait]
impl<T: Catalog + ?Sized> Catalog for Arc<T> {
    async fn table_names(&self) -> Result<Vec<TableName>, CatalogError> {
        (**self).table_names().await
    }
}

/// Lists the catalog's tables, or nothing at all if the catalog can't be read before `deadline`.
///
/// A broken catalog only costs the prompt its table hints: the failure is logged and
/// generation still goes ahead.
pub async fn list_tables<C: Catalog + ?Sized>(catalog: &C, deadline: Instant) -> Vec<TableName> {
    match tokio::time::timeout_at(deadline, catalog.table_names()).await {
        Ok(Ok(tables)) => {
            tracing::debug!("Catalog lists {} table(s)", tables.len());
            tables
        }
        Ok(Err(error)) => {
            tracing::warn!("Catalog unavailable, continuing without table hints: {}", error);
            Vec::new()
        }
        Err(_) => {
            tracing::warn!("Catalog unavailable, no answer before the deadline. Continuing without table hints.");
            Vec::new()
        }
    }
}

/// Catalog with a fixed answer, for tests and offline use.
#[cfg(any(test, feature = "test-helpers"))]
pub struct StaticCatalog {
    tables: Option<Vec<TableName>>,
    delay: Option<std::time::Duration>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl StaticCatalog {
    /// A catalog listing exactly these tables, in this order.
    pub fn new(tables: &[&str]) -> Self {
        Self {
            tables: Some(tables.iter().map(|t| TableName::from(*t)).collect()),
            delay: None,
        }
    }

    /// A catalog whose query always fails.
    pub fn unavailable() -> Self {
        Self {
            tables: None,
            delay: None,
        }
    }

    /// Wait this long before answering.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[cfg(any(test, feature = "test-helpers"))]
#[async_trait]
impl Catalog for StaticCatalog {
    async fn table_names(&self) -> Result<Vec<TableName>, CatalogError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.tables
            .clone()
            .ok_or_else(|| CatalogError::Unavailable("static catalog configured to fail".to_string()))
    }
}
