//! Command intent model and execution history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Category of local command an utterance can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandCategory {
    System,
    Application,
    File,
    Network,
    Settings,
    Unknown,
}

impl CommandCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Application => "application",
            Self::File => "file",
            Self::Network => "network",
            Self::Settings => "settings",
            Self::Unknown => "unknown",
        }
    }

    /// Map a free-form category name (e.g. from a model reply) to a
    /// category. Anything unrecognized is `Unknown`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "system" => Self::System,
            "application" | "app" => Self::Application,
            "file" => Self::File,
            "network" => Self::Network,
            "settings" => Self::Settings,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for CommandCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified, confidence-scored interpretation of an utterance as a
/// local command. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub category: CommandCategory,
    pub action: String,
    pub parameters: HashMap<String, String>,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl Intent {
    pub fn new(
        category: CommandCategory,
        action: impl Into<String>,
        parameters: HashMap<String, String>,
        confidence: f64,
    ) -> Self {
        Self {
            category,
            action: action.into(),
            parameters,
            confidence,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Success,
    Error,
}

impl CommandStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One execution attempt, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub args: Vec<String>,
    pub status: CommandStatus,
    pub result_summary: String,
}

/// Bounded FIFO of execution attempts, oldest evicted first.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: Vec<CommandHistoryEntry>,
    max_entries: usize,
}

impl CommandHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn push(&mut self, entry: CommandHistoryEntry) {
        if self.entries.len() >= self.max_entries {
            self.entries.remove(0);
        }
        self.entries.push(entry);
    }

    /// Up to `limit` entries, most recent first.
    pub fn recent(&self, limit: usize) -> Vec<CommandHistoryEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Aggregates over successfully executed intents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandStatistics {
    pub total_executed: u64,
    pub by_category: HashMap<String, u64>,
    pub average_confidence: f64,
}
