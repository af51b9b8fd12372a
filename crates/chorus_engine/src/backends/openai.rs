//! OpenAI-compatible chat backend.
//!
//! Works against the `/v1/chat/completions` shape, which covers the hosted
//! OpenAI API and the many local servers that mimic it. The API key is
//! resolved from an environment variable at construction so configs never
//! hold secrets.

use crate::backend::{BackendError, CompletionRequest, ModelBackend};
use async_trait::async_trait;
use chorus_common::config::BackendConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAiBackend {
    id: String,
    http_client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiBackend {
    pub fn new(id: impl Into<String>, url: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_timeout(id, url, model, Duration::from_secs(30))
    }

    pub fn with_timeout(
        id: impl Into<String>,
        url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        let url = url.into();
        Self {
            id: id.into(),
            http_client,
            url: url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        let mut backend = Self::with_timeout(
            &config.id,
            &config.url,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        );
        if !config.api_key_env.is_empty() {
            match std::env::var(&config.api_key_env) {
                Ok(key) if !key.is_empty() => backend.api_key = Some(key),
                _ => warn!(
                    backend = %config.id,
                    env_var = %config.api_key_env,
                    "api key environment variable not set, calls will be unauthenticated"
                ),
            }
        }
        backend
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        debug!(backend = %self.id, model = %self.model, "calling openai-compatible endpoint");

        let mut builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.url))
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::transient(format!("openai request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("openai endpoint returned {status}");
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(BackendError::transient(message));
            }
            return Err(BackendError::fatal(message));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::fatal(format!("openai response parse failed: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| BackendError::fatal("openai response contained no choices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_parse_takes_first_choice() {
        let json = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "hello there"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]
        }"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.choices[0].message.content, "hello there");
    }

    #[test]
    fn request_omits_unset_sampling_fields() {
        let body = ChatCompletionRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            temperature: None,
            max_tokens: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("temperature").is_none());
        assert!(json.get("max_tokens").is_none());
    }
}
