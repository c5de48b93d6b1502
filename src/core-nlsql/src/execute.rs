//! Runs generated SQL. Not part of the pipeline: callers decide whether to execute what it produced.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use data_model_nlsql::{
    db::DbPool,
    query::{QueryError, QueryRows, run_read_only_query},
};

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("Database pool error: {0}")]
    DbPoolError(String),
}

impl<E: std::fmt::Debug> From<deadpool::managed::PoolError<E>> for ExecutionError {
    fn from(error: deadpool::managed::PoolError<E>) -> Self {
        Self::DbPoolError(format!("{:?}", error))
    }
}

#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(&self, sql: &str) -> Result<QueryRows, ExecutionError>;
}

#[async_trait]
impl<T: QueryRunner + ?Sized> QueryRunner for Arc<T> {
    async fn run_query(&self, sql: &str) -> Result<QueryRows, ExecutionError> {
        (**self).run_query(sql).await
    }
}

/// Executes queries read-only against the pool, each one cancelled server-side after `statement_timeout`.
#[derive(Clone)]
pub struct PgQueryRunner {
    pool: DbPool,
    statement_timeout: Duration,
}

impl PgQueryRunner {
    pub fn new(pool: DbPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }
}

#[async_trait]
impl QueryRunner for PgQueryRunner {
    async fn run_query(&self, sql: &str) -> Result<QueryRows, ExecutionError> {
        let mut conn = self.pool.get().await?;
        let rows = run_read_only_query(&mut conn, sql, Some(self.statement_timeout)).await?;
        tracing::debug!("Query returned {} row(s)", rows.len());
        Ok(rows)
    }
}

/// Runner with a canned answer, for tests.
#[cfg(any(test, feature = "test-helpers"))]
pub struct StaticRunner {
    result: Result<QueryRows, String>,
    queries: std::sync::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl StaticRunner {
    /// Every query yields these rows.
    pub fn with_rows(rows: QueryRows) -> Self {
        Self {
            result: Ok(rows),
            queries: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Every query fails the way Postgres would fail on a bad statement.
    pub fn with_failure(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            queries: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Every query run so far, oldest first.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
#[async_trait]
impl QueryRunner for StaticRunner {
    async fn run_query(&self, sql: &str) -> Result<QueryRows, ExecutionError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(sql.to_string());
        }
        if sql.trim().is_empty() {
            return Err(QueryError::EmptyQuery.into());
        }
        match &self.result {
            Ok(rows) => Ok(rows.clone()),
            Err(message) => Err(QueryError::Database(diesel::result::Error::QueryBuilderError(
                message.clone().into(),
            ))
            .into()),
        }
    }
}
