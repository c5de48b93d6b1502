use axum::extract::{Json, State};

use core_nlsql::ask_error_from_execution;
use data_model_nlsql::models::{AskError, QueryResponse, QuestionPayload, SqlResponse};

use crate::routes::AppState;

/// Runs the pipeline for `question`, treating an empty ```sql block as a failure.
async fn generate_sql(state: &AppState, question: &str) -> Result<String, AskError> {
    if question.trim().is_empty() {
        return Err(AskError::EmptyQuestion);
    }

    let sql = state.pipeline.answer(question).await.map_err(|e| {
        tracing::debug!("No SQL for '{}': {}", question, e);
        AskError::from(e)
    })?;

    if sql.is_empty() {
        tracing::debug!("Generation produced no query for '{}'", question);
        return Err(AskError::NoQueryGenerated);
    }
    Ok(sql)
}

/// POST /api/sql - Generate SQL for a question
pub async fn post_sql(
    State(state): State<AppState>,
    Json(payload): Json<QuestionPayload>,
) -> Result<Json<SqlResponse>, AskError> {
    let sql = generate_sql(&state, &payload.question).await?;
    Ok(Json(SqlResponse { sql }))
}

/// POST /api/query - Generate SQL for a question, run it read-only, and return the rows
pub async fn post_query(
    State(state): State<AppState>,
    Json(payload): Json<QuestionPayload>,
) -> Result<Json<QueryResponse>, AskError> {
    let sql = generate_sql(&state, &payload.question).await?;

    match state.runner.run_query(&sql).await {
        Ok(result) => {
            tracing::debug!("{} row(s) for '{}'", result.len(), payload.question);
            Ok(Json(QueryResponse { sql, result }))
        }
        Err(e) => {
            tracing::debug!("Query failed for '{}': {}", payload.question, e);
            Err(ask_error_from_execution(&sql, e))
        }
    }
}
