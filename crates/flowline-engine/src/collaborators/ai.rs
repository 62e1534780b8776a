use std::time::Duration;

use async_trait::async_trait;
use flowline_config::AiSection;
use reqwest::{Client, Response, header};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CollaboratorError, CompletionClient, CompletionRequest, Result};

/// `CompletionClient` for any OpenAI-compatible `/chat/completions` API.
#[derive(Debug, Clone)]
pub struct OpenAiCompletionClient {
    client: Client,
    base_url: String,
    max_tokens: u32,
}

impl OpenAiCompletionClient {
    pub fn new(config: &AiSection) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                CollaboratorError::InvalidRequest(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_tokens: config.max_tokens,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn handle_error_response(response: Response) -> CollaboratorError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));

        match status.as_u16() {
            401 | 403 => CollaboratorError::Auth(message),
            _ => CollaboratorError::Backend(message),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &request.model,
            messages,
            max_tokens: self.max_tokens,
        };

        debug!(model = %request.model, "Sending chat completion request");

        let response = self
            .client
            .post(self.completions_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", request.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CollaboratorError::InvalidResponse("no completion choices".into()))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_trims_slash() {
        let client = OpenAiCompletionClient::new(&AiSection {
            base_url: "http://localhost:11434/v1/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_chat_response() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hello"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hello"));
    }
}
