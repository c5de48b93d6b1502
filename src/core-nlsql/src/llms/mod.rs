#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;
pub mod ollama;
pub mod prompts;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
pub use prompts::{NO_TABLES_MARKER, Prompt, format_table_list, prompt_text_to_sql};

pub use ollama::Ollama;

/// Why the generation endpoint didn't hand back any text.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The endpoint answered with a non-success status.
    #[error("Generation endpoint returned {status}: {body}")]
    Endpoint { status: u16, body: String },

    /// The request never completed (connection refused, reset, bad TLS, ...).
    #[error("Request to generation endpoint failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Success status, but not the `{"response": "..."}` body we expect.
    #[error("Generation endpoint sent a malformed body: {0}")]
    MalformedBody(String),

    /// No answer before the caller's deadline.
    #[error("Generation endpoint did not answer within {0:?}")]
    Timeout(Duration),
}

/// Interface to a hosted LLM that turns a prompt into free-form text.
///
/// One call is one best-effort attempt: implementations don't retry.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T: Generator + ?Sized> Generator for Arc<T> {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }
}
