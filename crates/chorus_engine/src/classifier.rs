//! Two-stage intent classification.
//!
//! Stage one matches the utterance against an ordered table of anchored,
//! case-insensitive patterns and yields high confidence. Stage two, used
//! only when no pattern fires, asks a model backend whether the text looks
//! like a command and yields lower confidence. Classification never errors:
//! an utterance that is not a command simply classifies to `None`.

use crate::backend::{CompletionRequest, ModelBackend};
use crate::parsers::extract_json;
use chorus_common::intent::{CommandCategory, Intent};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Confidence assigned to pattern-table matches.
pub const PATTERN_CONFIDENCE: f64 = 0.9;
/// Confidence assigned to model-fallback classifications.
pub const FALLBACK_CONFIDENCE: f64 = 0.7;

/// Keywords scanned in the fallback reply, checked in this order.
const FALLBACK_KEYWORDS: [(&str, CommandCategory); 2] = [
    ("system", CommandCategory::System),
    ("application", CommandCategory::Application),
];

static PATTERN_TABLE: Lazy<Vec<(CommandCategory, Vec<Regex>)>> = Lazy::new(|| {
    let compile = |pattern: &str| Regex::new(pattern).unwrap();
    vec![
        (
            CommandCategory::System,
            vec![
                compile(r"(?i)^(check|show|get|display)\s+(system|cpu|memory|disk)\s+(status|info|usage)"),
                compile(r"(?i)^(monitor|track)\s+(system|resources|performance)"),
            ],
        ),
        (
            CommandCategory::Application,
            vec![
                compile(r"(?i)^(open|launch|start|run|execute)\s+([a-zA-Z0-9\s\-_]+)"),
                compile(r"(?i)^(close|stop|exit|quit|terminate)\s+([a-zA-Z0-9\s\-_]+)"),
            ],
        ),
        (
            CommandCategory::File,
            vec![
                compile(r"(?i)^(create|make|new)\s+(?:a\s+)?(?:new\s+)?(file|directory|folder)"),
                compile(r"(?i)^(delete|remove|move|copy)\s+(?:the\s+)?(file|directory|folder)?"),
            ],
        ),
    ]
});

pub struct IntentClassifier {
    fallback_backend: Option<Arc<dyn ModelBackend>>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            fallback_backend: None,
        }
    }

    pub fn with_fallback(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            fallback_backend: Some(backend),
        }
    }

    /// Classify one utterance. `None` means "not a command".
    pub async fn classify(&self, text: &str) -> Option<Intent> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if let Some(intent) = match_patterns(text) {
            debug!(
                category = %intent.category,
                action = %intent.action,
                "pattern table matched"
            );
            return Some(intent);
        }

        self.classify_via_model(text).await
    }

    /// Ask the fallback backend whether the text is command-like. Backend
    /// failures are absorbed: the utterance just stays unclassified.
    async fn classify_via_model(&self, text: &str) -> Option<Intent> {
        let backend = self.fallback_backend.as_ref()?;
        let request = CompletionRequest::new(format!(
            "Analyze this text for command intent: {text}\n\
             If it asks to inspect or control the computer, answer with the \
             single word \"system\" or \"application\". Otherwise answer \"none\"."
        ))
        .with_temperature(0.1);

        let reply = match backend.complete(&request).await {
            Ok(reply) => reply.to_lowercase(),
            Err(e) => {
                warn!(backend = backend.id(), error = %e, "fallback classification failed");
                return None;
            }
        };

        for (keyword, category) in FALLBACK_KEYWORDS {
            if reply.contains(keyword) {
                debug!(category = %category, "fallback classification matched");
                return Some(Intent::new(
                    category,
                    category.as_str(),
                    HashMap::new(),
                    FALLBACK_CONFIDENCE,
                ));
            }
        }
        None
    }

    /// Ask a backend to propose a full intent as JSON, then bound its
    /// self-reported confidence by what our own stages would grant: a
    /// proposal we could have pattern-matched may keep up to the pattern
    /// confidence, anything else is capped at fallback confidence.
    pub async fn generate_intent(&self, text: &str, threshold: f64) -> Option<Intent> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let backend = self.fallback_backend.as_ref()?;

        let request = CompletionRequest::new(format!(
            "Generate a command interpretation of this request:\n{text}\n\n\
             Respond with JSON only, using exactly these keys:\n\
             {{\"command_type\": \"system|application|file\", \"action\": \"<verb>\", \
             \"parameters\": {{}}, \"confidence\": 0.0}}"
        ))
        .with_system("You translate user requests into machine-readable commands. Respond with strict JSON only.")
        .with_temperature(0.1);

        let reply = match backend.complete(&request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(backend = backend.id(), error = %e, "intent generation failed");
                return None;
            }
        };

        let value: serde_json::Value = match serde_json::from_str(extract_json(&reply)) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "intent generation returned unparseable JSON");
                return None;
            }
        };

        let category = value
            .get("command_type")
            .and_then(|v| v.as_str())
            .map(CommandCategory::from_name)
            .unwrap_or(CommandCategory::Unknown);
        let action = value
            .get("action")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| category.as_str().to_string());
        let parameters = value
            .get("parameters")
            .and_then(|v| v.as_object())
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| {
                        v.as_str().map(|s| (k.clone(), s.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let proposed = value
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.5);

        let cap = match match_patterns(text) {
            Some(pattern_intent) if pattern_intent.category == category => PATTERN_CONFIDENCE,
            _ => FALLBACK_CONFIDENCE,
        };
        let confidence = proposed.clamp(0.0, 1.0).min(cap);

        if confidence < threshold {
            debug!(
                confidence,
                threshold, "generated intent discarded below threshold"
            );
            return None;
        }
        Some(Intent::new(category, action, parameters, confidence))
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the pattern table alone. The action is the category name; the
/// matched verb travels as `param_1`, with later capture groups numbered
/// `param_2`, ... in group order (optional groups that did not participate
/// are skipped).
pub fn match_patterns(text: &str) -> Option<Intent> {
    for (category, patterns) in PATTERN_TABLE.iter() {
        for pattern in patterns {
            if let Some(captures) = pattern.captures(text) {
                let mut parameters = HashMap::new();
                for (i, group) in captures.iter().skip(1).enumerate() {
                    if let Some(group) = group {
                        parameters
                            .insert(format!("param_{}", i + 1), group.as_str().trim().to_string());
                    }
                }
                return Some(Intent::new(
                    *category,
                    category.as_str(),
                    parameters,
                    PATTERN_CONFIDENCE,
                ));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::fake::FakeBackend;
    use approx::assert_relative_eq;

    #[tokio::test]
    async fn system_status_matches_pattern_table() {
        let classifier = IntentClassifier::new();
        let intent = classifier.classify("check system status").await.unwrap();
        assert_eq!(intent.category, CommandCategory::System);
        // The action names the category; the verb stays a parameter.
        assert_eq!(intent.action, "system");
        assert_eq!(intent.parameters.get("param_1").map(String::as_str), Some("check"));
        assert_relative_eq!(intent.confidence, PATTERN_CONFIDENCE);
    }

    #[tokio::test]
    async fn matching_is_case_insensitive() {
        let classifier = IntentClassifier::new();
        let intent = classifier.classify("  CHECK MEMORY USAGE  ").await.unwrap();
        assert_eq!(intent.category, CommandCategory::System);
        assert_eq!(intent.action, "system");
    }

    #[tokio::test]
    async fn launch_requests_classify_as_application() {
        let classifier = IntentClassifier::new();
        let intent = classifier.classify("open visual studio code").await.unwrap();
        assert_eq!(intent.category, CommandCategory::Application);
        assert_eq!(intent.action, "application");
        assert_eq!(intent.parameters.get("param_1").map(String::as_str), Some("open"));
        assert_eq!(
            intent.parameters.get("param_2").map(String::as_str),
            Some("visual studio code")
        );
    }

    #[tokio::test]
    async fn file_creation_matches_with_filler_words() {
        let classifier = IntentClassifier::new();
        let intent = classifier.classify("create a new file").await.unwrap();
        assert_eq!(intent.category, CommandCategory::File);
        assert_eq!(intent.action, "file");
    }

    #[test]
    fn optional_capture_groups_are_skipped() {
        let intent = match_patterns("delete everything now").unwrap();
        assert_eq!(intent.category, CommandCategory::File);
        assert_eq!(intent.parameters.get("param_1").map(String::as_str), Some("delete"));
        assert!(!intent.parameters.contains_key("param_2"));
    }

    #[tokio::test]
    async fn non_commands_without_fallback_stay_unclassified() {
        let classifier = IntentClassifier::new();
        assert!(classifier.classify("what is the capital of France").await.is_none());
        assert!(classifier.classify("   ").await.is_none());
    }

    #[tokio::test]
    async fn fallback_scans_system_before_application() {
        let backend = Arc::new(FakeBackend::with_reply(
            "fake",
            "This looks like an application request touching the system.",
        ));
        let classifier = IntentClassifier::with_fallback(backend.clone());
        let intent = classifier.classify("please tidy things up").await.unwrap();
        assert_eq!(intent.category, CommandCategory::System);
        // Fallback intents carry nothing beyond the category.
        assert_eq!(intent.action, "system");
        assert!(intent.parameters.is_empty());
        assert_relative_eq!(intent.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn fallback_failure_is_absorbed() {
        let backend = Arc::new(FakeBackend::failing("down", "connection refused"));
        let classifier = IntentClassifier::with_fallback(backend);
        assert!(classifier.classify("do something vague").await.is_none());
    }

    #[tokio::test]
    async fn generated_intent_agreeing_with_patterns_keeps_high_confidence() {
        let backend = Arc::new(FakeBackend::with_reply(
            "fake",
            r#"{"command_type": "system", "action": "check", "parameters": {}, "confidence": 0.95}"#,
        ));
        let classifier = IntentClassifier::with_fallback(backend);
        let intent = classifier
            .generate_intent("check system status", 0.8)
            .await
            .unwrap();
        // Self-reported 0.95 is bounded by the pattern confidence.
        assert_relative_eq!(intent.confidence, PATTERN_CONFIDENCE);
        assert_eq!(intent.category, CommandCategory::System);
    }

    #[tokio::test]
    async fn generated_intent_without_pattern_agreement_is_capped_lower() {
        let backend = Arc::new(FakeBackend::with_reply(
            "fake",
            r#"{"command_type": "system", "action": "inspect", "parameters": {}, "confidence": 0.99}"#,
        ));
        let classifier = IntentClassifier::with_fallback(backend);
        // No pattern fires for this phrasing, so the cap drops to the
        // fallback level and the proposal misses a 0.8 threshold.
        assert!(classifier
            .generate_intent("peek at resource pressure", 0.8)
            .await
            .is_none());
        let intent = classifier
            .generate_intent("peek at resource pressure", 0.6)
            .await
            .unwrap();
        assert_relative_eq!(intent.confidence, FALLBACK_CONFIDENCE);
    }

    #[tokio::test]
    async fn generated_intent_defaults_missing_confidence() {
        let backend = Arc::new(FakeBackend::with_reply(
            "fake",
            r#"{"command_type": "application", "action": "open", "parameters": {"param_2": "firefox"}}"#,
        ));
        let classifier = IntentClassifier::with_fallback(backend);
        assert!(classifier.generate_intent("open firefox", 0.8).await.is_none());
        let intent = classifier.generate_intent("open firefox", 0.5).await.unwrap();
        assert_relative_eq!(intent.confidence, 0.5);
    }

    #[tokio::test]
    async fn generated_intent_survives_prose_wrapped_json() {
        let backend = Arc::new(FakeBackend::with_reply(
            "fake",
            "Here you go:\n{\"command_type\": \"file\", \"action\": \"create\", \"confidence\": 0.85}\nDone.",
        ));
        let classifier = IntentClassifier::with_fallback(backend);
        let intent = classifier.generate_intent("make a file", 0.5).await.unwrap();
        assert_eq!(intent.category, CommandCategory::File);
        assert_eq!(intent.action, "create");
    }
}
