//! Raw SQL that runs against the user's database: the catalog listing and
//! read-only execution of generated queries.

use diesel::QueryableByName;
use diesel::sql_types::Text;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Largest `statement_timeout` Postgres accepts, in milliseconds.
pub const MAX_STATEMENT_TIMEOUT_MS: u128 = i32::MAX as u128;

/// Base tables outside of the Postgres system schemas, in catalog order.
pub const TABLE_NAMES_QUERY: &str = "SELECT table_name::text AS table_name \
     FROM information_schema.tables \
     WHERE table_type = 'BASE TABLE' \
     AND table_schema NOT IN ('pg_catalog', 'information_schema')";

#[derive(Debug, QueryableByName)]
struct TableNameRow {
    #[diesel(sql_type = Text)]
    table_name: String,
}

#[derive(Debug, QueryableByName)]
struct JsonRecord {
    #[diesel(sql_type = Text)]
    record_json: String,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("Query is empty")]
    EmptyQuery,
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Malformed result row: {0}")]
    MalformedRow(String),
}

/// One `row_to_json` object, read pair by pair. Unlike a JSON map this keeps repeated
/// keys, which Postgres produces for e.g. `SELECT COUNT(*), COUNT(DISTINCT id)`.
struct JsonRow(Vec<(String, Value)>);

impl<'de> Deserialize<'de> for JsonRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = JsonRow;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<JsonRow, A::Error> {
                let mut fields = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(field) = map.next_entry::<String, Value>()? {
                    fields.push(field);
                }
                Ok(JsonRow(fields))
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// Tabular result of running a query: column names in select order, one JSON value per cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryRows {
    /// Builds the table from `row_to_json` output. Columns come from the first record, and
    /// every record must carry the same columns in the same order. Cells are taken by
    /// position, so columns sharing a name are all kept.
    pub fn from_json_records<'a, I>(records: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut table = QueryRows::default();
        for (i, record) in records.into_iter().enumerate() {
            let JsonRow(fields) = serde_json::from_str(record)
                .map_err(|e| QueryError::MalformedRow(format!("{}: {}", e, record)))?;

            if i == 0 {
                table.columns = fields.iter().map(|(name, _)| name.clone()).collect();
            } else if fields.len() != table.columns.len()
                || fields.iter().zip(&table.columns).any(|((name, _), column)| name != column)
            {
                return Err(QueryError::MalformedRow(format!(
                    "row {} doesn't match columns {:?}: {}",
                    i, table.columns, record
                )));
            }
            table.rows.push(fields.into_iter().map(|(_, value)| value).collect());
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Wraps a single statement so that every result row comes back as one JSON text column.
/// Trailing semicolons are dropped; the statement lands on its own lines so a trailing
/// `--` comment can't swallow the closing parenthesis.
pub fn json_rows_query(sql: &str) -> Result<String, QueryError> {
    let body = sql.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
    if body.is_empty() {
        return Err(QueryError::EmptyQuery);
    }
    Ok(format!(
        "SELECT row_to_json(q)::text AS record_json FROM (\n{}\n) AS q",
        body
    ))
}

/// `SET LOCAL statement_timeout`, clamped to what Postgres accepts.
/// SET doesn't take bind parameters; the value is an integer we formatted ourselves.
pub fn statement_timeout_sql(timeout: Duration) -> String {
    let millis = timeout.as_millis().clamp(1, MAX_STATEMENT_TIMEOUT_MS);
    format!("SET LOCAL statement_timeout = {}", millis)
}

/// Lists the base tables visible to the connection's user.
pub async fn fetch_table_names(conn: &mut AsyncPgConnection) -> Result<Vec<String>, diesel::result::Error> {
    let rows = diesel::sql_query(TABLE_NAMES_QUERY).load::<TableNameRow>(conn).await?;
    Ok(rows.into_iter().map(|row| row.table_name).collect())
}

/// Executes `sql` inside a READ ONLY transaction and returns its rows.
/// With a `statement_timeout`, Postgres cancels the statement once it runs longer than that.
pub async fn run_read_only_query(
    conn: &mut AsyncPgConnection,
    sql: &str,
    statement_timeout: Option<Duration>,
) -> Result<QueryRows, QueryError> {
    let wrapped = json_rows_query(sql)?;
    tracing::debug!("Running read-only query: {}", wrapped);

    let records: Vec<JsonRecord> = conn
        .build_transaction()
        .read_only()
        .run(|conn| {
            async move {
                if let Some(timeout) = statement_timeout {
                    diesel::sql_query(statement_timeout_sql(timeout)).execute(conn).await?;
                }
                diesel::sql_query(wrapped).load::<JsonRecord>(conn).await
            }
            .scope_boxed()
        })
        .await?;

    QueryRows::from_json_records(records.iter().map(|r| r.record_json.as_str()))
}
