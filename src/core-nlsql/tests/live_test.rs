//! Tests against a real database and, for the full pipeline, a real generation endpoint.
//!
//! Marked ignored unless the environment variables they need are set at compile time.

use std::time::Duration;

use core_nlsql::{
    Catalog, Config, ExecutionError, PgQueryRunner, Pipeline, PipelineError, QueryRunner, get_db_pool, list_tables,
};
use data_model_nlsql::{
    db::{PoolSettings, establish_connection_pool},
    query::QueryError,
};
use tokio::time::Instant;

async fn config_and_pool() -> (Config, data_model_nlsql::db::DbPool) {
    let config = Config::from_env().expect("Invalid test configuration");
    let pool = get_db_pool(&config).await.expect("Failed to connect to test database");
    (config, pool)
}

#[test_with::env(DATABASE_URL)]
#[tokio::test]
async fn test_pool_is_a_catalog() {
    let (_, pool) = config_and_pool().await;

    let direct = pool.table_names().await.unwrap();
    let listed = list_tables(&pool, Instant::now() + Duration::from_secs(10)).await;
    assert_eq!(direct, listed);
}

#[test_with::env(DATABASE_URL)]
#[tokio::test]
async fn test_runner_executes_read_only() {
    let (_, pool) = config_and_pool().await;
    let runner = PgQueryRunner::new(pool, Duration::from_secs(5));

    let rows = runner.run_query("SELECT 42 AS answer").await.unwrap();
    assert_eq!(rows.columns, vec!["answer"]);
    assert_eq!(rows.len(), 1);

    let result = runner.run_query("CREATE TABLE nlsql_should_not_exist (id int)").await;
    assert!(matches!(result, Err(ExecutionError::Query(QueryError::Database(_)))));
}

#[test_with::env(DATABASE_URL)]
#[tokio::test]
async fn test_runner_gives_up_on_full_pool() {
    let (config, _) = config_and_pool().await;
    let settings = PoolSettings::new(Duration::from_millis(200)).with_max_size(1);
    let pool = establish_connection_pool(&config.database_url, &settings).await.unwrap();
    let runner = PgQueryRunner::new(pool.clone(), Duration::from_secs(5));

    let _held = pool.get().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), runner.run_query("SELECT 1")).await;
    assert!(matches!(result, Ok(Err(ExecutionError::DbPoolError(_)))));
}

#[test_with::env(DATABASE_URL, GENERATION_API_URL)]
#[tokio::test]
async fn test_pipeline_against_live_endpoint() {
    let (config, pool) = config_and_pool().await;
    let pipeline = Pipeline::from_config(pool, &config);

    // Models vary; any outcome other than a failed generation call is acceptable.
    match pipeline.answer("How many tables are there?").await {
        Ok(_) | Err(PipelineError::ExtractionNotFound { .. }) => {}
        Err(e) => panic!("Generation failed: {e}"),
    }
}
