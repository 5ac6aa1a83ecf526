use std::sync::Arc;

use serde_json::Value;

use optiq_core::config::ModelConfig;

use crate::llm::{ChatMessage, CompletionRequest, ModelClient, ModelError, Role};

/// Result of one model round-trip before any stage-specific
/// interpretation.
#[derive(Clone, Debug, PartialEq)]
pub struct RawCompletion {
    pub text: String,
    pub tokens_used: u32,
}

/// Default post-processing of raw model text: a strict structured parse
/// that falls back to the raw string. Stages layer their own
/// interpretation on top of this.
#[derive(Clone, Debug, PartialEq)]
pub enum ProcessedResponse {
    Structured(Value),
    Raw(String),
}

pub fn process_response(raw: &str) -> ProcessedResponse {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => ProcessedResponse::Structured(value),
        Err(_) => ProcessedResponse::Raw(raw.to_string()),
    }
}

/// One blocking round-trip to the model service per call. Temperature and
/// max tokens are pinned from configuration; no retries, no local state.
#[derive(Clone)]
pub struct ModelInvoker {
    client: Arc<dyn ModelClient>,
    temperature: f32,
    max_tokens: u32,
}

impl ModelInvoker {
    pub fn new(client: Arc<dyn ModelClient>, temperature: f32, max_tokens: u32) -> Self {
        Self { client, temperature, max_tokens }
    }

    pub fn from_config(client: Arc<dyn ModelClient>, config: &ModelConfig) -> Self {
        Self::new(client, config.temperature, config.max_tokens)
    }

    pub async fn invoke(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<RawCompletion, ModelError> {
        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            messages: vec![ChatMessage { role: Role::User, content: user_message.to_string() }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self.client.complete(request).await?;
        Ok(RawCompletion { text: response.content, tokens_used: response.tokens_used })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::llm::ScriptedModelClient;

    use super::{process_response, ModelInvoker, ProcessedResponse};

    #[test]
    fn default_processing_parses_json_or_keeps_raw_text() {
        let structured = process_response(r#"{"confidence": 0.8}"#);
        assert!(matches!(structured, ProcessedResponse::Structured(_)));

        let raw = process_response("not json at all");
        assert_eq!(raw, ProcessedResponse::Raw("not json at all".to_string()));
    }

    #[tokio::test]
    async fn invoke_returns_text_and_token_usage() {
        let client = Arc::new(ScriptedModelClient::new(["{\"ok\": true}".to_string()]));
        let invoker = ModelInvoker::new(client, 0.1, 2000);

        let completion =
            invoker.invoke("system prompt", "user message").await.expect("scripted reply");
        assert_eq!(completion.text, "{\"ok\": true}");
        assert!(completion.tokens_used > 0);
    }
}
