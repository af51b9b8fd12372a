//! Command execution.
//!
//! Dispatches a classified intent to the capability handler for its
//! category. Handler failures are outcomes, not errors: every attempt
//! produces an `ExecutionReport` and a history entry, successful ones are
//! additionally remembered for statistics.

use crate::capability::{ApplicationControl, FileOps, SystemTelemetry};
use chorus_common::intent::{
    CommandCategory, CommandHistory, CommandHistoryEntry, CommandStatistics, CommandStatus, Intent,
};
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Verbs that mean "shut the application down" rather than start it.
const CLOSE_VERBS: [&str; 5] = ["close", "stop", "exit", "quit", "terminate"];

/// Outcome of one execution attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub status: CommandStatus,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ExecutionReport {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Success,
            message: message.into(),
            details: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Error,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

pub struct CommandExecutor {
    confidence_threshold: f64,
    telemetry: Option<Arc<dyn SystemTelemetry>>,
    applications: Option<Arc<dyn ApplicationControl>>,
    files: Option<Arc<dyn FileOps>>,
    history: Mutex<CommandHistory>,
    executed: Mutex<Vec<Intent>>,
    history_capacity: usize,
}

impl CommandExecutor {
    pub fn new(confidence_threshold: f64, history_capacity: usize) -> Self {
        Self {
            confidence_threshold,
            telemetry: None,
            applications: None,
            files: None,
            history: Mutex::new(CommandHistory::new(history_capacity)),
            executed: Mutex::new(Vec::new()),
            history_capacity,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn SystemTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn with_applications(mut self, applications: Arc<dyn ApplicationControl>) -> Self {
        self.applications = Some(applications);
        self
    }

    pub fn with_files(mut self, files: Arc<dyn FileOps>) -> Self {
        self.files = Some(files);
        self
    }

    /// Execute one intent. The confidence gate runs before any handler is
    /// touched, so a low-confidence intent has no side effects.
    pub async fn execute(&self, intent: &Intent) -> ExecutionReport {
        if intent.confidence < self.confidence_threshold {
            let report = ExecutionReport::error(format!(
                "Confidence {:.2} is below the threshold {:.2}",
                intent.confidence, self.confidence_threshold
            ));
            warn!(
                category = %intent.category,
                action = %intent.action,
                confidence = intent.confidence,
                "command rejected below confidence threshold"
            );
            self.record(intent, &report);
            return report;
        }

        debug!(category = %intent.category, action = %intent.action, "executing command");
        let report = match intent.category {
            CommandCategory::System => self.run_system_query().await,
            CommandCategory::Application => self.run_application_command(intent).await,
            CommandCategory::File => self.run_file_command(intent).await,
            other => ExecutionReport::error(format!("Unsupported command category: {other}")),
        };

        if report.is_success() {
            info!(category = %intent.category, action = %intent.action, "command succeeded");
        } else {
            warn!(
                category = %intent.category,
                action = %intent.action,
                message = %report.message,
                "command failed"
            );
        }
        self.record(intent, &report);
        report
    }

    async fn run_system_query(&self) -> ExecutionReport {
        let Some(telemetry) = self.telemetry.as_ref() else {
            return ExecutionReport::error("No system telemetry handler is configured");
        };
        match telemetry.query().await {
            Ok(snapshot) => ExecutionReport::success(format!(
                "CPU {:.1}%, memory {:.1}%, disk {:.1}%",
                snapshot.cpu_percent, snapshot.memory_percent, snapshot.disk_percent
            ))
            .with_details(json!({
                "cpu_percent": snapshot.cpu_percent,
                "memory_percent": snapshot.memory_percent,
                "disk_percent": snapshot.disk_percent,
            })),
            Err(e) => ExecutionReport::error(format!("Telemetry query failed: {e}")),
        }
    }

    async fn run_application_command(&self, intent: &Intent) -> ExecutionReport {
        let Some(applications) = self.applications.as_ref() else {
            return ExecutionReport::error("No application control handler is configured");
        };
        let verb = intent
            .parameters
            .get("param_1")
            .map(String::as_str)
            .unwrap_or(intent.action.as_str())
            .to_lowercase();
        let target = intent
            .parameters
            .get("param_2")
            .map(String::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        if target.is_empty() {
            return ExecutionReport::error("No application target given");
        }
        let result = if CLOSE_VERBS.contains(&verb.as_str()) {
            applications.close(&target).await
        } else {
            applications.launch(&target).await
        };
        match result {
            Ok(message) => ExecutionReport::success(message),
            Err(e) => ExecutionReport::error(format!("Application command failed: {e}")),
        }
    }

    async fn run_file_command(&self, intent: &Intent) -> ExecutionReport {
        let Some(files) = self.files.as_ref() else {
            return ExecutionReport::error("No file handler is configured");
        };
        let verb = intent
            .parameters
            .get("param_1")
            .map(String::as_str)
            .unwrap_or(intent.action.as_str())
            .to_lowercase();
        let wants_directory = intent
            .parameters
            .get("param_2")
            .map(|kind| matches!(kind.to_lowercase().as_str(), "directory" | "folder"))
            .unwrap_or(false);
        let path = intent
            .parameters
            .get("path")
            .cloned()
            .unwrap_or_else(|| {
                if wants_directory {
                    "new_folder/".to_string()
                } else {
                    "new_file.txt".to_string()
                }
            });

        let result = match verb.as_str() {
            "create" | "make" | "new" => {
                let contents = intent
                    .parameters
                    .get("contents")
                    .map(String::as_str)
                    .unwrap_or_default();
                files.create(&path, contents).await
            }
            "delete" | "remove" => files.delete(&path).await,
            "read" => files.read(&path).await,
            other => return ExecutionReport::error(format!("Unsupported file operation: {other}")),
        };
        match result {
            Ok(message) => ExecutionReport::success(message),
            Err(e) => ExecutionReport::error(format!("File command failed: {e}")),
        }
    }

    /// Every attempt lands in the history; only successes count towards
    /// the executed set used for statistics.
    fn record(&self, intent: &Intent, report: &ExecutionReport) {
        let mut args: Vec<(String, String)> = intent
            .parameters
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        args.sort_by(|a, b| a.0.cmp(&b.0));
        let entry = CommandHistoryEntry {
            timestamp: chrono::Utc::now(),
            command: intent.action.clone(),
            args: args.into_iter().map(|(_, v)| v).collect(),
            status: report.status,
            result_summary: report.message.clone(),
        };
        self.history.lock().unwrap().push(entry);

        if report.is_success() {
            let mut executed = self.executed.lock().unwrap();
            if executed.len() >= self.history_capacity {
                executed.remove(0);
            }
            executed.push(intent.clone());
        }
    }

    /// Most recent attempts first.
    pub fn history(&self, limit: usize) -> Vec<CommandHistoryEntry> {
        self.history.lock().unwrap().recent(limit)
    }

    pub fn statistics(&self) -> CommandStatistics {
        let executed = self.executed.lock().unwrap();
        if executed.is_empty() {
            return CommandStatistics::default();
        }
        let mut by_category: std::collections::HashMap<String, u64> = Default::default();
        for intent in executed.iter() {
            *by_category
                .entry(intent.category.as_str().to_string())
                .or_insert(0) += 1;
        }
        CommandStatistics {
            total_executed: executed.len() as u64,
            by_category,
            average_confidence: executed.iter().map(|i| i.confidence).sum::<f64>()
                / executed.len() as f64,
        }
    }
}
