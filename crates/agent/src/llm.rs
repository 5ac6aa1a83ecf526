use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use optiq_core::config::ModelConfig;
use optiq_core::PipelineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// One model round-trip. Temperature stays low and output bounded so the
/// pipeline leans deterministic.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub tokens_used: u32,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model credential is not configured")]
    NotConfigured,
    #[error("model service unavailable: {reason}")]
    ServiceUnavailable { reason: String },
}

impl From<reqwest::Error> for ModelError {
    fn from(error: reqwest::Error) -> Self {
        Self::ServiceUnavailable { reason: error.to_string() }
    }
}

impl From<ModelError> for PipelineError {
    fn from(error: ModelError) -> Self {
        match error {
            ModelError::NotConfigured => Self::NotConfigured,
            ModelError::ServiceUnavailable { reason } => Self::ServiceUnavailable(reason),
        }
    }
}

/// Pluggable model service. Implementations must not retry on their own;
/// retry policy belongs to callers.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError>;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl OpenAiClient {
    /// Build a client from configuration. A missing or empty API key is
    /// rejected here, before any session starts.
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = config.api_key.clone().ok_or(ModelError::NotConfigured)?;
        if api_key.expose_secret().trim().is_empty() {
            return Err(ModelError::NotConfigured);
        }

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ModelError::from)?;

        Ok(Self { client, api_key, base_url, model: config.model.clone() })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<WireChoice>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError> {
        let mut messages = vec![WireMessage { role: "system", content: request.system_prompt }];
        for message in request.messages {
            let role = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(WireMessage { role, content: message.content });
        }

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let reason = match response.json::<WireError>().await {
                Ok(wire) => wire.error.message,
                Err(_) => format!("request failed with status {status}"),
            };
            return Err(ModelError::ServiceUnavailable { reason });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ModelError::ServiceUnavailable {
                reason: "response contained no choices".to_string(),
            })?;

        Ok(CompletionResponse { content, tokens_used: completion.usage.total_tokens })
    }
}

/// Deterministic client that replays queued replies in order. Used by the
/// smoke command and by tests; exhausting the script is reported as a
/// service failure rather than a panic.
#[derive(Debug, Default)]
pub struct ScriptedModelClient {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedModelClient {
    pub fn new(replies: impl IntoIterator<Item = String>) -> Self {
        Self { replies: Mutex::new(replies.into_iter().collect()) }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply.into());
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ModelError> {
        let _ = &request;
        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .ok_or(ModelError::ServiceUnavailable {
                reason: "scripted client has no replies left".to_string(),
            })?;

        let tokens_used = (reply.len() / 4) as u32;
        Ok(CompletionResponse { content: reply, tokens_used })
    }
}
