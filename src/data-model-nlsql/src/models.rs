use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::db::PoolError;
use crate::query::{QueryError, QueryRows};

// API Payload Types

/// Input payload for endpoints that accept a natural-language question
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPayload {
    pub question: String,
}

/// Response payload for POST /api/sql
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlResponse {
    pub sql: String,
}

/// Response payload for POST /api/query: the generated SQL and the rows it produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub sql: String,
    #[serde(flatten)]
    pub result: QueryRows,
}

// API Error Types

/// Error for the POST /api/sql and POST /api/query endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error", content = "details")]
pub enum AskError {
    /// The question was blank
    #[serde(rename = "empty_question")]
    EmptyQuestion,
    /// The generation endpoint errored or was unreachable
    #[serde(rename = "generation_failed")]
    GenerationFailed(String),
    /// The generation endpoint didn't answer before the deadline
    #[serde(rename = "generation_timeout")]
    GenerationTimeout(String),
    /// The generation endpoint answered, but without a ```sql fence. Carries the raw response.
    #[serde(rename = "extraction_not_found")]
    ExtractionNotFound(String),
    /// The ```sql fence was present but empty
    #[serde(rename = "no_query_generated")]
    NoQueryGenerated,
    /// The generated SQL failed to run
    #[serde(rename = "execution_failed")]
    ExecutionFailed { sql: String, message: String },
    /// Unknown error occurred
    #[serde(rename = "unknown")]
    Unknown(String),
}

impl AskError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AskError::EmptyQuestion | AskError::ExecutionFailed { .. } => StatusCode::BAD_REQUEST,
            AskError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
            AskError::GenerationTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AskError::ExtractionNotFound(_) | AskError::NoQueryGenerated => StatusCode::UNPROCESSABLE_ENTITY,
            AskError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Classifies a failure to run the generated `sql`.
    /// Problems with the statement itself are the caller's; anything else is ours.
    pub fn from_query_error(sql: &str, error: QueryError) -> Self {
        match error {
            QueryError::EmptyQuery => AskError::NoQueryGenerated,
            QueryError::Database(e) => AskError::ExecutionFailed {
                sql: sql.to_string(),
                message: e.to_string(),
            },
            QueryError::MalformedRow(e) => AskError::Unknown(e),
        }
    }
}

impl IntoResponse for AskError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self)).into_response()
    }
}

macro_rules! from_error {
    ($lib_err:path, $err_type:tt) => {
        /// Converts a `$lib_err` into an `$err_type::Unknown`.
        impl From<$lib_err> for $err_type {
            fn from(e: $lib_err) -> Self {
                $err_type::Unknown(format!("{:?}", e))
            }
        }
    };
}

from_error!(PoolError, AskError);
