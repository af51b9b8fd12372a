//! Request analysis for the answer path.
//!
//! One model call estimates how complex the request is, what capabilities
//! an answer needs, and what shape of response the user expects. Analysis
//! must never block an answer, so every failure mode falls back to neutral
//! defaults.

use crate::backend::{CompletionRequest, ModelBackend};
use crate::parsers::extract_json;
use chorus_common::analysis::RequestAnalysis;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct RequestAnalyzer {
    backend: Option<Arc<dyn ModelBackend>>,
}

impl RequestAnalyzer {
    pub fn new() -> Self {
        Self { backend: None }
    }

    pub fn with_backend(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Analyze one utterance. Infallible: with no backend, a failed call,
    /// or an unparseable reply the neutral default analysis is returned.
    pub async fn analyze(&self, text: &str) -> RequestAnalysis {
        let Some(backend) = self.backend.as_ref() else {
            return RequestAnalysis::default();
        };

        let request = CompletionRequest::new(format!(
            "Analyze this request and respond with JSON only, using exactly \
             these keys:\n\
             {{\"complexity\": 0.0, \"required_capabilities\": [\"...\"], \
             \"topic_category\": \"...\", \"response_type\": \
             \"factual|creative|analytical|procedural|general\", \
             \"time_sensitivity\": 0.0}}\n\nRequest: {text}"
        ))
        .with_system("You are a request triage component. Respond with strict JSON only.")
        .with_temperature(0.1);

        let reply = match backend.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(backend = backend.id(), error = %e, "request analysis failed, using defaults");
                return RequestAnalysis::default();
            }
        };

        parse_reply(&reply)
    }
}

impl Default for RequestAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_reply(reply: &str) -> RequestAnalysis {
    match serde_json::from_str::<RequestAnalysis>(extract_json(reply)) {
        Ok(analysis) => {
            let analysis = analysis.normalized();
            debug!(
                complexity = analysis.complexity,
                response_kind = ?analysis.response_kind,
                "request analyzed"
            );
            analysis
        }
        Err(e) => {
            warn!(error = %e, "analysis reply was not valid JSON, using defaults");
            RequestAnalysis::default()
        }
    }
}
