use data_model_nlsql::models::AskError;

use crate::execute::ExecutionError;
use crate::llms::GenerationError;

/// Why a question didn't produce SQL.
#[derive(Debug)]
pub enum PipelineError {
    /// The generation endpoint errored, was unreachable, or missed the deadline. Extraction was not attempted.
    GenerationFailed(GenerationError),

    /// The endpoint answered but its text holds no ```sql block. Carries the raw response.
    ExtractionNotFound { response: String },

    /// Internal error: prompt substitution failed.
    PromptCreationFailure(subst::Error),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::GenerationFailed(err) => write!(f, "Generation failed: {}", err),
            PipelineError::ExtractionNotFound { response } => {
                write!(f, "No ```sql block in generated text ({} bytes)", response.len())
            }
            PipelineError::PromptCreationFailure(err) => write!(f, "Failed to create prompt: {}", err),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::GenerationFailed(err) => Some(err),
            PipelineError::PromptCreationFailure(err) => Some(err),
            PipelineError::ExtractionNotFound { .. } => None,
        }
    }
}

impl From<GenerationError> for PipelineError {
    fn from(err: GenerationError) -> Self {
        PipelineError::GenerationFailed(err)
    }
}

impl From<subst::Error> for PipelineError {
    fn from(err: subst::Error) -> Self {
        PipelineError::PromptCreationFailure(err)
    }
}

/// HTTP classification of a pipeline failure.
impl From<PipelineError> for AskError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::GenerationFailed(e @ GenerationError::Timeout(_)) => AskError::GenerationTimeout(e.to_string()),
            PipelineError::GenerationFailed(e) => AskError::GenerationFailed(e.to_string()),
            PipelineError::ExtractionNotFound { response } => AskError::ExtractionNotFound(response),
            PipelineError::PromptCreationFailure(e) => AskError::Unknown(e.to_string()),
        }
    }
}

/// HTTP classification of a failure to run the generated `sql`.
pub fn ask_error_from_execution(sql: &str, err: ExecutionError) -> AskError {
    match err {
        ExecutionError::Query(e) => AskError::from_query_error(sql, e),
        ExecutionError::DbPoolError(e) => AskError::Unknown(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_model_nlsql::query::QueryError;
    use std::time::Duration;

    #[test]
    fn test_timeout_maps_to_generation_timeout() {
        let error: AskError = PipelineError::from(GenerationError::Timeout(Duration::from_secs(2))).into();
        assert!(matches!(error, AskError::GenerationTimeout(_)));
    }

    #[test]
    fn test_endpoint_error_maps_to_generation_failed() {
        let error: AskError = PipelineError::from(GenerationError::Endpoint {
            status: 503,
            body: "overloaded".into(),
        })
        .into();
        match error {
            AskError::GenerationFailed(message) => {
                assert!(message.contains("503"));
                assert!(message.contains("overloaded"));
            }
            other => panic!("Expected GenerationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_extraction_not_found_keeps_raw_response() {
        let error: AskError = PipelineError::ExtractionNotFound {
            response: "just prose".into(),
        }
        .into();
        assert_eq!(error, AskError::ExtractionNotFound("just prose".into()));
    }

    #[test]
    fn test_execution_error_classification() {
        let error = ask_error_from_execution("", ExecutionError::Query(QueryError::EmptyQuery));
        assert_eq!(error, AskError::NoQueryGenerated);

        let error = ask_error_from_execution("SELECT 1", ExecutionError::DbPoolError("timed out".into()));
        assert_eq!(error, AskError::Unknown("timed out".into()));
    }
}
