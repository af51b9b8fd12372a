//! The orchestrator: one utterance in, one outcome out.
//!
//! Every message moves through the same stages: received, classified,
//! then either executing a command or generating an answer, ending in
//! completed or failed. Conversation context and quality stats are only
//! written once the full result of a stage is known, so a request
//! cancelled mid-flight leaves no partial state behind.

use crate::analyzer::RequestAnalyzer;
use crate::backend::{BackendRegistry, CompletionRequest, ModelBackend};
use crate::backends::ollama::OllamaBackend;
use crate::backends::openai::OpenAiBackend;
use crate::capability::{ApplicationControl, FileOps, SystemTelemetry, WeatherLookup};
use crate::classifier::IntentClassifier;
use crate::executor::{CommandExecutor, ExecutionReport};
use crate::pool::{select_backends, BackendPool};
use crate::prompt;
use crate::scorer;
use crate::store::ConversationStore;
use crate::synthesizer::ResponseSynthesizer;
use chorus_common::answer::SynthesizedAnswer;
use chorus_common::config::{BackendProvider, BackendStrength, ChorusConfig};
use chorus_common::context::ConversationContext;
use chorus_common::error::ChorusError;
use chorus_common::intent::{CommandHistoryEntry, CommandStatistics, Intent};
use chorus_common::message::{Conversation, ConversationMessage, Role};
use chorus_common::stats::{StatSample, StatsRing, StatsSummary};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-message knobs. Defaults match normal interactive use.
#[derive(Debug, Clone)]
pub struct MessageOptions {
    /// When false, command-like messages are answered instead of executed.
    pub allow_commands: bool,
    /// Route the answer to one specific backend instead of the policy pick.
    pub preferred_backend: Option<String>,
}

impl Default for MessageOptions {
    fn default() -> Self {
        Self {
            allow_commands: true,
            preferred_backend: None,
        }
    }
}

/// Everything the embedding layer learns about one handled message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageOutcome {
    /// False only when the pipeline itself failed terminally.
    pub success: bool,
    pub reply: String,
    pub error: Option<String>,
    /// True when a command handler ran and succeeded.
    pub command_executed: bool,
    pub intent: Option<Intent>,
    pub answer: Option<SynthesizedAnswer>,
    pub command: Option<ExecutionReport>,
    /// Backends that contributed candidate answers, in call order.
    pub backend_ids: Vec<String>,
    pub elapsed: Duration,
}

enum Stage {
    Received,
    Classified,
    Executing,
    Generating,
    Completed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Classified => "classified",
            Stage::Executing => "executing",
            Stage::Generating => "generating",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

pub struct Orchestrator {
    config: ChorusConfig,
    registry: Arc<BackendRegistry>,
    classifier: IntentClassifier,
    analyzer: RequestAnalyzer,
    executor: CommandExecutor,
    pool: BackendPool,
    synthesizer: ResponseSynthesizer,
    telemetry: Option<Arc<dyn SystemTelemetry>>,
    weather: Option<Arc<dyn WeatherLookup>>,
    store: Option<Arc<dyn ConversationStore>>,
    context: Mutex<ConversationContext>,
    stats: Mutex<StatsRing>,
}

impl Orchestrator {
    pub fn builder(config: ChorusConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Handle one user message with default options.
    pub async fn handle_message(&self, text: &str) -> MessageOutcome {
        self.handle_message_with(text, MessageOptions::default())
            .await
    }

    /// Handle one user message. Never returns an `Err`: terminal failures
    /// become an outcome with `success == false` and the error text set.
    pub async fn handle_message_with(
        &self,
        text: &str,
        options: MessageOptions,
    ) -> MessageOutcome {
        let started = Instant::now();
        debug!(stage = %Stage::Received, "handling message");
        match self.process(text, &options, started).await {
            Ok(outcome) => outcome,
            Err(e) => self.fail(e, started),
        }
    }

    async fn process(
        &self,
        text: &str,
        options: &MessageOptions,
        started: Instant,
    ) -> Result<MessageOutcome, ChorusError> {
        let utterance = text.trim();
        if utterance.is_empty() {
            return Err(ChorusError::Classification("empty message".to_string()));
        }

        let intent = self.classifier.classify(utterance).await;
        debug!(
            stage = %Stage::Classified,
            command = intent.is_some(),
            "message classified"
        );

        let threshold = self.config.effective_confidence_threshold();
        match intent {
            Some(intent) if options.allow_commands && intent.confidence >= threshold => {
                self.execute_command(utterance, intent, started).await
            }
            // A below-threshold or suppressed intent still rides along in
            // the outcome; the message itself is answered, not executed.
            other => self.generate_answer(utterance, other, options, started).await,
        }
    }

    async fn execute_command(
        &self,
        utterance: &str,
        intent: Intent,
        started: Instant,
    ) -> Result<MessageOutcome, ChorusError> {
        debug!(
            stage = %Stage::Executing,
            category = %intent.category,
            action = %intent.action,
            "dispatching command"
        );
        let report = self.executor.execute(&intent).await;
        let reply = if report.is_success() {
            format!(
                "Executed {} command successfully. {}",
                intent.category, report.message
            )
        } else {
            format!("Command execution failed: {}", report.message)
        };

        {
            let mut context = self.context.lock().unwrap();
            context.push(ConversationMessage::new(Role::User, utterance));
            if report.is_success() {
                context.push(ConversationMessage::new(
                    Role::System,
                    format!("Executed {} command: {}", intent.category, intent.action),
                ));
            }
            context.push(
                ConversationMessage::new(Role::Assistant, reply.clone())
                    .with_metadata("command_executed", serde_json::json!(report.is_success())),
            );
        }
        let quality = if report.is_success() { 1.0 } else { 0.0 };
        self.stats
            .lock()
            .unwrap()
            .push(StatSample::new(quality, started.elapsed(), intent.confidence));
        self.persist().await;

        debug!(stage = %Stage::Completed, "command path finished");
        Ok(MessageOutcome {
            success: true,
            reply,
            error: None,
            command_executed: report.is_success(),
            intent: Some(intent),
            answer: None,
            command: Some(report),
            backend_ids: Vec::new(),
            elapsed: started.elapsed(),
        })
    }

    async fn generate_answer(
        &self,
        utterance: &str,
        intent: Option<Intent>,
        options: &MessageOptions,
        started: Instant,
    ) -> Result<MessageOutcome, ChorusError> {
        debug!(stage = %Stage::Generating, "generating answer");
        if self.registry.is_empty() {
            return Err(ChorusError::AllBackendsFailed);
        }

        let analysis = self.analyzer.analyze(utterance).await;

        let mut backend_ids = match &options.preferred_backend {
            Some(id) if self.registry.contains(id) => vec![id.clone()],
            Some(id) => {
                warn!(backend = %id, "preferred backend not registered, using selection policy");
                select_backends(&analysis, &self.config.backends)
            }
            None => select_backends(&analysis, &self.config.backends),
        };
        backend_ids.retain(|id| self.registry.contains(id));
        if backend_ids.is_empty() {
            backend_ids = self.registry.ids().into_iter().take(1).collect();
        }

        let hints = self.gather_hints(utterance).await;
        let window = {
            let context = self.context.lock().unwrap();
            context
                .recent(self.config.effective_context_window())
                .to_vec()
        };
        let user_prompt = prompt::build_user_prompt(&window, utterance, &hints);

        let calls: Vec<(String, CompletionRequest)> = backend_ids
            .iter()
            .map(|id| {
                let strength = self
                    .config
                    .backend(id)
                    .map(|b| b.strength)
                    .unwrap_or_default();
                let request = CompletionRequest::new(user_prompt.clone())
                    .with_system(prompt::tailor_system_prompt(strength));
                (id.clone(), request)
            })
            .collect();

        let mut candidates = self.pool.collect(calls).await;
        if candidates.is_empty() {
            return Err(ChorusError::AllBackendsFailed);
        }
        for candidate in &mut candidates {
            candidate.quality_score = scorer::score(&candidate.text, &analysis);
        }
        let answered_by: Vec<String> = candidates.iter().map(|c| c.backend_id.clone()).collect();

        let answer = self.synthesizer.synthesize(candidates, &analysis).await?;

        {
            let mut context = self.context.lock().unwrap();
            context.push(ConversationMessage::new(Role::User, utterance));
            context.push(
                ConversationMessage::new(Role::Assistant, answer.text.clone())
                    .with_metadata("backends", serde_json::json!(answered_by))
                    .with_metadata("quality_score", serde_json::json!(answer.quality_score)),
            );
        }
        self.stats.lock().unwrap().push(StatSample::new(
            answer.quality_score,
            started.elapsed(),
            answer.confidence,
        ));
        self.persist().await;

        debug!(stage = %Stage::Completed, "answer path finished");
        Ok(MessageOutcome {
            success: true,
            reply: answer.text.clone(),
            error: None,
            command_executed: false,
            intent,
            answer: Some(answer),
            command: None,
            backend_ids: answered_by,
            elapsed: started.elapsed(),
        })
    }

    /// Context hints are strictly best-effort; a failing provider costs a
    /// hint, never the answer.
    async fn gather_hints(&self, utterance: &str) -> Vec<String> {
        let mut hints = Vec::new();
        if prompt::mentions_system(utterance) {
            if let Some(telemetry) = &self.telemetry {
                match telemetry.query().await {
                    Ok(snapshot) => hints.push(prompt::telemetry_hint(&snapshot)),
                    Err(e) => warn!(error = %e, "telemetry hint unavailable"),
                }
            }
        }
        if prompt::mentions_weather(utterance) {
            if let Some(weather) = &self.weather {
                let city =
                    prompt::extract_city(utterance, &self.config.orchestrator.default_city);
                match weather.get(&city).await {
                    Ok(report) => hints.push(prompt::weather_hint(&report)),
                    Err(e) => warn!(error = %e, city = %city, "weather hint unavailable"),
                }
            }
        }
        hints
    }

    /// Persist the conversation if a store is attached. Save failures are
    /// logged and absorbed: the in-memory conversation stays authoritative.
    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let conversation = { self.context.lock().unwrap().conversation().clone() };
        if let Err(e) = store.save(&conversation).await {
            warn!(error = %e, "conversation save failed");
        }
    }

    fn fail(&self, error: ChorusError, started: Instant) -> MessageOutcome {
        warn!(stage = %Stage::Failed, error = %error, "message handling failed");
        self.stats
            .lock()
            .unwrap()
            .push(StatSample::new(0.0, started.elapsed(), 0.0));
        MessageOutcome {
            success: false,
            reply: String::new(),
            error: Some(error.to_string()),
            command_executed: false,
            intent: None,
            answer: None,
            command: None,
            backend_ids: Vec::new(),
            elapsed: started.elapsed(),
        }
    }

    /// Load a conversation for resumption; any load problem starts fresh.
    pub async fn load_or_empty(
        store: &dyn ConversationStore,
        id: &str,
    ) -> Option<Conversation> {
        match store.load(id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, conversation = %id, "conversation load failed, starting empty");
                None
            }
        }
    }

    // ==== Introspection ====

    pub fn history(&self, limit: usize) -> Vec<CommandHistoryEntry> {
        self.executor.history(limit)
    }

    pub fn statistics(&self) -> CommandStatistics {
        self.executor.statistics()
    }

    pub fn stats_summary(&self) -> StatsSummary {
        self.stats.lock().unwrap().summary()
    }

    pub fn recent_samples(&self, n: usize) -> Vec<StatSample> {
        self.stats.lock().unwrap().recent(n)
    }

    pub fn context_len(&self) -> usize {
        self.context.lock().unwrap().len()
    }

    pub fn conversation(&self) -> Conversation {
        self.context.lock().unwrap().conversation().clone()
    }

    pub fn conversation_id(&self) -> String {
        self.context.lock().unwrap().id().to_string()
    }
}

pub struct OrchestratorBuilder {
    config: ChorusConfig,
    registry: BackendRegistry,
    telemetry: Option<Arc<dyn SystemTelemetry>>,
    applications: Option<Arc<dyn ApplicationControl>>,
    files: Option<Arc<dyn FileOps>>,
    weather: Option<Arc<dyn WeatherLookup>>,
    store: Option<Arc<dyn ConversationStore>>,
    title: String,
    resume_from: Option<Conversation>,
}

impl OrchestratorBuilder {
    pub fn new(config: ChorusConfig) -> Self {
        Self {
            config,
            registry: BackendRegistry::new(),
            telemetry: None,
            applications: None,
            files: None,
            weather: None,
            store: None,
            title: "New conversation".to_string(),
            resume_from: None,
        }
    }

    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.registry.register(backend);
        self
    }

    /// Construct and register a client for every backend in the config.
    pub fn with_configured_backends(mut self) -> Self {
        for backend_config in &self.config.backends {
            let backend: Arc<dyn ModelBackend> = match backend_config.provider {
                BackendProvider::Ollama => Arc::new(OllamaBackend::from_config(backend_config)),
                BackendProvider::Openai => Arc::new(OpenAiBackend::from_config(backend_config)),
            };
            self.registry.register(backend);
        }
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn SystemTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn applications(mut self, applications: Arc<dyn ApplicationControl>) -> Self {
        self.applications = Some(applications);
        self
    }

    pub fn files(mut self, files: Arc<dyn FileOps>) -> Self {
        self.files = Some(files);
        self
    }

    pub fn weather(mut self, weather: Arc<dyn WeatherLookup>) -> Self {
        self.weather = Some(weather);
        self
    }

    pub fn store(mut self, store: Arc<dyn ConversationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn conversation_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn resume(mut self, conversation: Conversation) -> Self {
        self.resume_from = Some(conversation);
        self
    }

    pub fn build(self) -> Orchestrator {
        let registry = Arc::new(self.registry);

        // The classifier fallback and the analyzer use the first backend;
        // merging prefers an analytically-strong one.
        let utility_backend = registry.first();
        let merge_backend = self
            .config
            .backends
            .iter()
            .find(|b| b.strength == BackendStrength::Analytical)
            .and_then(|b| registry.get(&b.id))
            .or_else(|| registry.first());

        let classifier = match utility_backend.clone() {
            Some(backend) => IntentClassifier::with_fallback(backend),
            None => IntentClassifier::new(),
        };
        let analyzer = match utility_backend {
            Some(backend) => RequestAnalyzer::with_backend(backend),
            None => RequestAnalyzer::new(),
        };
        let synthesizer = match merge_backend {
            Some(backend) => ResponseSynthesizer::with_merge_backend(backend),
            None => ResponseSynthesizer::new(),
        };

        let mut executor = CommandExecutor::new(
            self.config.effective_confidence_threshold(),
            self.config.orchestrator.history_limit,
        );
        if let Some(telemetry) = self.telemetry.clone() {
            executor = executor.with_telemetry(telemetry);
        }
        if let Some(applications) = self.applications {
            executor = executor.with_applications(applications);
        }
        if let Some(files) = self.files {
            executor = executor.with_files(files);
        }

        let max_context = self.config.effective_max_context();
        let context = match self.resume_from {
            Some(conversation) => ConversationContext::from_conversation(conversation, max_context),
            None => ConversationContext::new(self.title, max_context),
        };

        Orchestrator {
            pool: BackendPool::new(registry.clone()),
            config: self.config,
            registry,
            classifier,
            analyzer,
            executor,
            synthesizer,
            telemetry: self.telemetry,
            weather: self.weather,
            store: self.store,
            context: Mutex::new(context),
            stats: Mutex::new(StatsRing::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::fake::FakeBackend;
    use crate::capability::FakeTelemetry;

    fn config_with_backend(id: &str) -> ChorusConfig {
        let mut config = ChorusConfig::default();
        config.backends[0].id = id.to_string();
        config
    }

    #[tokio::test]
    async fn empty_message_fails_without_touching_context() {
        let orchestrator = Orchestrator::builder(config_with_backend("fake"))
            .backend(Arc::new(FakeBackend::with_reply("fake", "hello")))
            .build();

        let outcome = orchestrator.handle_message("   ").await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
        assert_eq!(orchestrator.context_len(), 0);
        // The failure is still sampled.
        assert_eq!(orchestrator.stats_summary().total_samples, 1);
    }

    #[tokio::test]
    async fn plain_question_takes_the_answer_path() {
        let backend = Arc::new(FakeBackend::with_reply(
            "fake",
            "Rust is a systems programming language focused on safety.",
        ));
        let orchestrator = Orchestrator::builder(config_with_backend("fake"))
            .backend(backend.clone())
            .build();

        let outcome = orchestrator.handle_message("what is Rust").await;
        assert!(outcome.success);
        assert!(!outcome.command_executed);
        assert_eq!(outcome.backend_ids, vec!["fake"]);
        assert!(outcome.reply.contains("systems programming"));
        // User message and assistant reply both recorded.
        assert_eq!(orchestrator.context_len(), 2);
    }

    #[tokio::test]
    async fn command_message_executes_and_records_system_note() {
        let orchestrator = Orchestrator::builder(config_with_backend("fake"))
            .backend(Arc::new(FakeBackend::with_reply("fake", "unused")))
            .telemetry(Arc::new(FakeTelemetry::new()))
            .build();

        let outcome = orchestrator.handle_message("check system status").await;
        assert!(outcome.success);
        assert!(outcome.command_executed);
        assert!(outcome.reply.starts_with("Executed system command successfully."));
        let conversation = orchestrator.conversation();
        // user + system note + assistant reply.
        assert_eq!(conversation.messages.len(), 3);
        assert_eq!(conversation.messages[1].role, Role::System);
        assert_eq!(
            conversation.messages[1].content,
            "Executed system command: system"
        );
    }

    #[tokio::test]
    async fn commands_can_be_disabled_per_message() {
        let backend = Arc::new(FakeBackend::with_reply(
            "fake",
            "Your CPU load depends on what is currently running.",
        ));
        let telemetry = Arc::new(FakeTelemetry::new());
        let orchestrator = Orchestrator::builder(config_with_backend("fake"))
            .backend(backend)
            .telemetry(telemetry.clone())
            .build();

        let options = MessageOptions {
            allow_commands: false,
            ..MessageOptions::default()
        };
        let outcome = orchestrator
            .handle_message_with("check system status", options)
            .await;
        assert!(outcome.success);
        assert!(!outcome.command_executed);
        // The intent was still classified and reported.
        assert!(outcome.intent.is_some());
        // The hint provider may run, but the executor must not.
        assert!(outcome.command.is_none());
    }

    #[tokio::test]
    async fn preferred_backend_overrides_selection() {
        let first = Arc::new(FakeBackend::with_reply("first", "answer from the first backend"));
        let second = Arc::new(FakeBackend::with_reply("second", "answer from the second backend"));
        let mut config = ChorusConfig::default();
        config.backends[0].id = "first".to_string();
        let orchestrator = Orchestrator::builder(config)
            .backend(first.clone())
            .backend(second.clone())
            .build();

        let options = MessageOptions {
            preferred_backend: Some("second".to_string()),
            ..MessageOptions::default()
        };
        let outcome = orchestrator
            .handle_message_with("tell me something", options)
            .await;
        assert_eq!(outcome.backend_ids, vec!["second"]);
        assert_eq!(outcome.reply, "answer from the second backend");
        // The preference constrains the answer fan-out only; the first
        // backend still serves classification and analysis.
        assert_eq!(second.call_count(), 1);
    }

    #[tokio::test]
    async fn no_registered_backends_is_a_terminal_failure() {
        let orchestrator = Orchestrator::builder(ChorusConfig::default()).build();
        let outcome = orchestrator.handle_message("hello there").await;
        assert!(!outcome.success);
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .contains("All backends failed"));
    }
}
