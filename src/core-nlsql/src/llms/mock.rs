//! Mock generation endpoint for testing
//!
//! This module provides a mock implementation of the `Generator` trait
//! that can be configured to return predefined responses or endpoint errors,
//! without making real API calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::llms::{GenerationError, Generator, Prompt};

/// Mock generation endpoint for testing
///
/// Can be configured to:
/// - Return specific responses based on prompt content
/// - Return a default response for any prompt
/// - Answer with an error status
/// - Stall before answering
///
/// Every prompt it receives is recorded.
pub struct MockGenerator {
    /// If the prompt contains the key, return the corresponding response
    responses: HashMap<String, String>,
    /// Default response if no specific match found
    default_response: Option<String>,
    /// If set, always answer with this status + body
    failure: Option<(u16, String)>,
    /// Sleep this long before answering
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Create a new empty mock
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            default_response: None,
            failure: None,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns a specific response when the prompt contains the given text
    pub fn with_response(prompt_contains: &str, response: &str) -> Self {
        let mut generator = Self::new();
        generator.add_response(prompt_contains, response);
        generator
    }

    /// Create a mock with a default response for any prompt
    pub fn with_default(response: &str) -> Self {
        let mut generator = Self::new();
        generator.set_default(response);
        generator
    }

    /// Create a mock that always answers with an error status
    pub fn with_failure(status: u16, body: &str) -> Self {
        let mut generator = Self::new();
        generator.failure = Some((status, body.to_string()));
        generator
    }

    /// Create a mock that answers with a fenced SQL query
    pub fn with_sql(sql: &str) -> Self {
        Self::with_default(&sample_fenced_response(sql))
    }

    /// Add a response mapping to this mock
    pub fn add_response(&mut self, prompt_contains: &str, response: &str) {
        self.responses.insert(prompt_contains.to_string(), response.to_string());
    }

    /// Set the default response
    pub fn set_default(&mut self, response: &str) {
        self.default_response = Some(response.to_string());
    }

    /// Wait this long before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far, oldest first
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts().len()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.as_str().to_string());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((status, body)) = &self.failure {
            return Err(GenerationError::Endpoint {
                status: *status,
                body: body.clone(),
            });
        }

        for (key, response) in &self.responses {
            if prompt.as_str().contains(key) {
                return Ok(response.clone());
            }
        }

        if let Some(default) = &self.default_response {
            return Ok(default.clone());
        }

        Err(GenerationError::MalformedBody(
            "Mock generator has no response configured for this prompt".to_string(),
        ))
    }
}

//
// Test Fixtures
//

/// What a chatty model typically sends back: prose around a ```sql fence.
pub fn sample_fenced_response(sql: &str) -> String {
    format!(
        "Here is the query:\n```sql\n{}\n```\nIt sorts by total spend and keeps the first rows.",
        sql
    )
}

/// A response that answers the question without any fenced SQL.
pub fn sample_unfenced_response() -> &'static str {
    "I'm sorry, I can't determine which table holds customer spend. Could you clarify?"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llms::prompt_text_to_sql;

    fn prompt(question: &str) -> Prompt {
        prompt_text_to_sql(question, &[]).unwrap()
    }

    #[tokio::test]
    async fn test_mock_with_default_response() {
        let generator = MockGenerator::with_default("test response");
        let result = generator.generate(&prompt("anything")).await.unwrap();
        assert_eq!(result, "test response");
    }

    #[tokio::test]
    async fn test_mock_with_specific_response() {
        let generator = MockGenerator::with_response("orders", "orders response");
        assert_eq!(
            generator.generate(&prompt("count orders")).await.unwrap(),
            "orders response"
        );
        assert!(generator.generate(&prompt("count users")).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_with_failure() {
        let generator = MockGenerator::with_failure(500, "boom");
        let result = generator.generate(&prompt("anything")).await;
        assert!(matches!(result, Err(GenerationError::Endpoint { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_mock_records_prompts() {
        let generator = MockGenerator::with_sql("SELECT 1;");
        generator.generate(&prompt("first")).await.unwrap();
        generator.generate(&prompt("second")).await.unwrap();

        let prompts = generator.prompts();
        assert_eq!(generator.call_count(), 2);
        assert!(prompts[0].contains("Request: first"));
        assert!(prompts[1].contains("Request: second"));
    }

    #[test]
    fn test_sample_fenced_response_has_fence() {
        let response = sample_fenced_response("SELECT 1;");
        assert!(response.contains("```sql\nSELECT 1;\n```"));
        assert!(!sample_unfenced_response().contains("```"));
    }
}
