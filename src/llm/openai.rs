use std::time::Duration;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::LlmError;

use super::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};

/// OpenAI-compatible chat-completions provider. Works against the real
/// OpenAI API or any compatible endpoint (`base_url` is configurable), the
/// same way the original talked to a single configured LLM backend.
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: secrecy::SecretString,
    model: String,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig, model: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_s))
            .build()
            .map_err(|e| LlmError::Config { reason: e.to_string() })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model,
            timeout: Duration::from_secs(config.timeout_s),
            max_retries: config.max_retries,
        })
    }

    fn api_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn send_once(&self, body: &ChatCompletionRequest) -> Result<ChatCompletionResponse, LlmError> {
        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout { provider: "openai".into(), timeout_s: self.timeout.as_secs() }
                } else {
                    LlmError::RequestFailed { provider: "openai".into(), reason: e.to_string() }
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::RequestFailed { provider: "openai".into(), reason: e.to_string() })?;

        if !status.is_success() {
            return Err(LlmError::RequestFailed {
                provider: "openai".into(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| LlmError::InvalidOutput { reason: format!("malformed completion response: {e}") })
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: request.messages.into_iter().map(ChatCompletionMessage::from).collect(),
            temperature: request.temperature,
        };

        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(response) => {
                    let content = response
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .ok_or_else(|| LlmError::InvalidOutput { reason: "no choices in response".into() })?;
                    return Ok(CompletionResponse { content });
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatCompletionMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatCompletionMessage {
    role: String,
    content: String,
}

impl From<ChatMessage> for ChatCompletionMessage {
    fn from(m: ChatMessage) -> Self {
        let role = match m.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        Self { role: role.to_string(), content: m.content }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}
