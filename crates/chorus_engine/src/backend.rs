//! Model backend abstraction.
//!
//! The core only ever sees `complete()`: production implementations talk
//! to Ollama or OpenAI-compatible HTTP services, tests talk to
//! `backends::fake::FakeBackend` with scripted replies. Failures carry a
//! transient/fatal distinction so callers can tell "try another backend"
//! from "this request can never work".

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Whether a failed call could plausibly succeed if repeated elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// Timeouts, connection resets, overload. Another backend may answer.
    Transient,
    /// Bad credentials, unknown model, malformed request.
    Fatal,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Transient,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Fatal,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == BackendErrorKind::Transient
    }
}

/// One completion request: the prompt plus optional sampling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// An external completion service, treated as a black box.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn id(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError>;
}

/// Configured backends in declaration order, addressable by id.
#[derive(Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn ModelBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Register a backend; a duplicate id replaces the earlier entry while
    /// keeping its position.
    pub fn register(&mut self, backend: Arc<dyn ModelBackend>) {
        if let Some(existing) = self
            .backends
            .iter_mut()
            .find(|b| b.id() == backend.id())
        {
            *existing = backend;
        } else {
            self.backends.push(backend);
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn ModelBackend>> {
        self.backends.iter().find(|b| b.id() == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.backends.iter().any(|b| b.id() == id)
    }

    pub fn first(&self) -> Option<Arc<dyn ModelBackend>> {
        self.backends.first().cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
