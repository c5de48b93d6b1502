//! Live-database tests for catalog listing and read-only execution.
//!
//! Only run when DATABASE_URL is set at compile time; otherwise they are marked ignored.

use std::time::Duration;

use data_model_nlsql::{
    db::{PoolError, PoolSettings, establish_connection_pool},
    query::{QueryError, fetch_table_names, run_read_only_query},
};
use serde_json::json;

async fn connect() -> data_model_nlsql::db::DbPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for live tests");
    establish_connection_pool(&url, &PoolSettings::new(Duration::from_secs(5)))
        .await
        .expect("Failed to connect to test database")
}

#[test_with::env(DATABASE_URL)]
#[tokio::test]
async fn test_fetch_table_names_excludes_system_schemas() {
    let pool = connect().await;
    let mut conn = pool.get().await.unwrap();

    let tables = fetch_table_names(&mut conn).await.unwrap();
    assert!(!tables.iter().any(|t| t == "pg_class" || t == "tables"));
}

#[test_with::env(DATABASE_URL)]
#[tokio::test]
async fn test_run_read_only_query_returns_rows() {
    let pool = connect().await;
    let mut conn = pool.get().await.unwrap();

    let table = run_read_only_query(&mut conn, "SELECT 1 AS one, 'a' AS letter UNION ALL SELECT 2, 'b';", None)
        .await
        .unwrap();

    assert_eq!(table.columns, vec!["one", "letter"]);
    assert_eq!(table.rows, vec![vec![json!(1), json!("a")], vec![json!(2), json!("b")]]);
}

#[test_with::env(DATABASE_URL)]
#[tokio::test]
async fn test_run_read_only_query_reports_bad_sql() {
    let pool = connect().await;
    let mut conn = pool.get().await.unwrap();

    let result = run_read_only_query(&mut conn, "SELECT definitely_not_a_column FROM pg_class", None).await;
    assert!(matches!(result, Err(QueryError::Database(_))));
}

#[test_with::env(DATABASE_URL)]
#[tokio::test]
async fn test_run_read_only_query_honours_statement_timeout() {
    let pool = connect().await;
    let mut conn = pool.get().await.unwrap();

    let result = run_read_only_query(
        &mut conn,
        "SELECT pg_sleep(5)::text AS slept",
        Some(std::time::Duration::from_millis(100)),
    )
    .await;
    assert!(matches!(result, Err(QueryError::Database(_))));
}

#[test_with::env(DATABASE_URL)]
#[tokio::test]
async fn test_checkout_from_full_pool_times_out() {
    let url = std::env::var("DATABASE_URL").unwrap();
    let settings = PoolSettings::new(Duration::from_millis(200)).with_max_size(1);
    let pool = establish_connection_pool(&url, &settings).await.unwrap();

    let _held = pool.get().await.unwrap();
    let result = pool.get().await;
    assert!(matches!(result, Err(PoolError::Timeout(_))));
}
