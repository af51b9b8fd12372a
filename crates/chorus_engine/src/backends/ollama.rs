//! Ollama chat backend.
//!
//! Talks to a local or remote Ollama server over its `/api/chat` endpoint
//! with streaming disabled, so one request yields one complete reply.

use crate::backend::{BackendError, CompletionRequest, ModelBackend};
use async_trait::async_trait;
use chorus_common::config::BackendConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

pub struct OllamaBackend {
    id: String,
    http_client: reqwest::Client,
    url: String,
    model: String,
    /// Keeps the model resident between calls so consecutive requests skip
    /// the load penalty.
    keep_alive: String,
}

impl OllamaBackend {
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
            keep_alive: "5m".to_string(),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::with_timeout(
            &config.id,
            &config.url,
            &config.model,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn build_request(&self, request: &CompletionRequest) -> OllamaChatRequest {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: request.prompt.clone(),
        });

        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        OllamaChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options,
            keep_alive: Some(self.keep_alive.clone()),
        }
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        let body = self.build_request(request);
        debug!(backend = %self.id, model = %self.model, "calling ollama");

        let response = self
            .http_client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::transient(format!("ollama request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("ollama returned {status}");
            // Server overload and 5xx are worth retrying elsewhere; anything
            // else indicates a broken request.
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(BackendError::transient(message));
            }
            return Err(BackendError::fatal(message));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::fatal(format!("ollama response parse failed: {e}")))?;

        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_without_empty_options() {
        let backend = OllamaBackend::new("local", "http://127.0.0.1:11434/", "llama3.1:8b");
        let body = backend.build_request(&CompletionRequest::new("hi"));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3.1:8b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["keep_alive"], "5m");
        assert!(json.get("options").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn request_carries_system_and_sampling_knobs() {
        let backend = OllamaBackend::new("local", "http://127.0.0.1:11434", "llama3.1:8b");
        let body = backend.build_request(
            &CompletionRequest::new("hi")
                .with_system("be terse")
                .with_temperature(0.1)
                .with_max_tokens(64),
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["options"]["temperature"], 0.1);
        assert_eq!(json["options"]["num_predict"], 64);
    }

    #[test]
    fn trailing_slash_is_trimmed_from_url() {
        let backend = OllamaBackend::new("local", "http://host:11434///", "m");
        assert_eq!(backend.url, "http://host:11434");
    }
}
