use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::ChatConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Chat service returned error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Chat service request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Chat service returned no message content")]
    EmptyResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Schema-constrained chat request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub schema_name: String,
    pub schema: Value,
    pub temperature: f32,
    pub top_p: f32,
}

/// Seam over the chat-completion provider
#[async_trait::async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Raw content of the first choice
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError>;
}

/// OpenAI-compatible `/chat/completions` client (Groq by default)
pub struct OpenAiCompatClient {
    http: Client,
    config: ChatConfig,
}

impl OpenAiCompatClient {
    pub fn new(config: ChatConfig) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn body(&self, request: &ChatRequest) -> Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "top_p": request.top_p,
            "max_completion_tokens": self.config.max_completion_tokens,
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.schema_name,
                    "schema": request.schema,
                },
            },
        })
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait::async_trait]
impl ChatCompletion for OpenAiCompatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!("Sending chat completion to {} ({} messages)", url, request.messages.len());

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}
