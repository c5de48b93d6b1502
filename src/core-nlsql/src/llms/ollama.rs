use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Config;
use crate::llms::{GenerationError, Generator, Prompt};

/// Request body for a single, non-streamed completion.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// The only part of the endpoint's answer we rely on. Other fields (`done`, timings, ...) are ignored.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct Ollama {
    client: Client,
    generate_url: Url,
    model: String,
}

impl Ollama {
    pub fn new(generate_url: Url, model: impl Into<String>) -> Self {
        Self::with_client(Client::new(), generate_url, model)
    }

    pub fn with_client(client: Client, generate_url: Url, model: impl Into<String>) -> Self {
        Self {
            client,
            generate_url,
            model: model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.generation_url.clone(), config.model.clone())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generate_url(&self) -> &Url {
        &self.generate_url
    }
}

#[async_trait]
impl Generator for Ollama {
    async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: prompt.as_str(),
            stream: false,
        };
        tracing::debug!(
            "POST {} (model: {}, prompt: {} bytes)",
            self.generate_url,
            self.model,
            prompt.as_str().len()
        );

        let response = self.client.post(self.generate_url.clone()).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        tracing::debug!("Generation endpoint answered {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(GenerationError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }
        parse_generate_body(&body)
    }
}

fn parse_generate_body(body: &str) -> Result<String, GenerationError> {
    serde_json::from_str::<GenerateResponse>(body)
        .map(|parsed| parsed.response)
        .map_err(|e| GenerationError::MalformedBody(format!("{} (body: {})", e, body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::{Value, json};

    use crate::llms::prompt_text_to_sql;

    /// Serves `router` on an ephemeral local port, returning the URL of its /api/generate route.
    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        Url::parse(&format!("http://{}/api/generate", addr)).unwrap()
    }

    fn prompt() -> Prompt {
        prompt_text_to_sql("count orders", &["orders".into()]).unwrap()
    }

    #[tokio::test]
    async fn test_generate_sends_model_prompt_and_no_stream() {
        // Echo back what we were sent so the test can inspect the request body.
        let url = serve(Router::new().route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "model": "llama3",
                    "response": format!("{}|{}|{}", body["model"], body["stream"], body["prompt"].as_str().unwrap_or("")),
                    "done": true,
                }))
            }),
        ))
        .await;

        let ollama = Ollama::new(url, "llama3");
        let text = ollama.generate(&prompt()).await.unwrap();

        let mut parts = text.splitn(3, '|');
        assert_eq!(parts.next(), Some("\"llama3\""));
        assert_eq!(parts.next(), Some("false"));
        assert_eq!(parts.next(), Some(prompt().as_str()));
    }

    #[tokio::test]
    async fn test_generate_surfaces_error_status_and_body() {
        let url = serve(Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::NOT_FOUND, "model \"llama9\" not found") }),
        ))
        .await;

        let result = Ollama::new(url, "llama9").generate(&prompt()).await;
        match result {
            Err(GenerationError::Endpoint { status, body }) => {
                assert_eq!(status, 404);
                assert_eq!(body, "model \"llama9\" not found");
            }
            other => panic!("Expected endpoint error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_rejects_body_without_response_field() {
        let url = serve(Router::new().route(
            "/api/generate",
            post(|| async { Json(json!({"done": true})) }),
        ))
        .await;

        let result = Ollama::new(url, "llama3").generate(&prompt()).await;
        assert!(matches!(result, Err(GenerationError::MalformedBody(_))));
    }

    #[tokio::test]
    async fn test_generate_reports_unreachable_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/api/generate", addr)).unwrap();
        let result = Ollama::new(url, "llama3").generate(&prompt()).await;
        assert!(matches!(result, Err(GenerationError::Transport(_))));
    }

    #[test]
    fn test_parse_generate_body() {
        assert_eq!(parse_generate_body(r#"{"response": "hi", "done": true}"#).unwrap(), "hi");
        assert!(matches!(
            parse_generate_body("<html>502</html>"),
            Err(GenerationError::MalformedBody(_))
        ));
        assert!(matches!(
            parse_generate_body(r#"{"response": 7}"#),
            Err(GenerationError::MalformedBody(_))
        ));
    }
}
