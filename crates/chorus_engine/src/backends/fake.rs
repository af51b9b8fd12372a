//! Scripted in-memory backend for tests.
//!
//! Replies are matched by substring against the prompt, first match wins.
//! Every prompt is recorded so tests can assert on call counts and on the
//! exact text the engine sent.

use crate::backend::{BackendError, CompletionRequest, ModelBackend};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub struct FakeBackend {
    id: String,
    replies: Vec<(String, Result<String, BackendError>)>,
    default_reply: Result<String, BackendError>,
    delay: Option<Duration>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            replies: Vec::new(),
            default_reply: Ok("ok".to_string()),
            delay: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A backend that answers every prompt with the same text.
    pub fn with_reply(id: impl Into<String>, reply: impl Into<String>) -> Self {
        let mut backend = Self::new(id);
        backend.default_reply = Ok(reply.into());
        backend
    }

    /// A backend that fails every call with a transient error.
    pub fn failing(id: impl Into<String>, message: impl Into<String>) -> Self {
        let mut backend = Self::new(id);
        backend.default_reply = Err(BackendError::transient(message));
        backend
    }

    pub fn builder(id: impl Into<String>) -> FakeBackendBuilder {
        FakeBackendBuilder {
            backend: Self::new(id),
        }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelBackend for FakeBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        for (pattern, reply) in &self.replies {
            if request.prompt.contains(pattern.as_str()) {
                return reply.clone();
            }
        }
        self.default_reply.clone()
    }
}

pub struct FakeBackendBuilder {
    backend: FakeBackend,
}

impl FakeBackendBuilder {
    /// Reply with `text` whenever the prompt contains `pattern`.
    pub fn reply_for(mut self, pattern: impl Into<String>, text: impl Into<String>) -> Self {
        self.backend
            .replies
            .push((pattern.into(), Ok(text.into())));
        self
    }

    /// Fail with a transient error whenever the prompt contains `pattern`.
    pub fn failure_for(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.backend
            .replies
            .push((pattern.into(), Err(BackendError::transient(message))));
        self
    }

    pub fn default_reply(mut self, text: impl Into<String>) -> Self {
        self.backend.default_reply = Ok(text.into());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.backend.delay = Some(delay);
        self
    }

    pub fn build(self) -> FakeBackend {
        self.backend
    }
}
