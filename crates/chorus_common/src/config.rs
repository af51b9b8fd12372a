//! Configuration for the orchestration core.
//!
//! Loads from a TOML file or falls back to defaults; every field has a
//! serde default so partial configs parse. Out-of-range values are never
//! rejected, only clamped through the `effective_*` accessors.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where a backend sits on the capability spectrum; drives selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStrength {
    /// Stronger reasoning, preferred for complex/analytical/code requests.
    Analytical,
    /// Faster or fresher, preferred for creative/time-sensitive requests.
    Creative,
}

impl Default for BackendStrength {
    fn default() -> Self {
        Self::Analytical
    }
}

/// Which wire protocol a backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendProvider {
    Ollama,
    Openai,
}

impl Default for BackendProvider {
    fn default() -> Self {
        Self::Ollama
    }
}

/// One configured model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub id: String,

    #[serde(default)]
    pub provider: BackendProvider,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_backend_url")]
    pub url: String,

    #[serde(default)]
    pub strength: BackendStrength,

    /// Environment variable holding the API key (openai provider only).
    #[serde(default)]
    pub api_key_env: String,

    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_backend_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_backend_timeout() -> u64 {
    30
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            id: "ollama-local".to_string(),
            provider: BackendProvider::default(),
            model: default_model(),
            url: default_backend_url(),
            strength: BackendStrength::default(),
            api_key_env: String::new(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

/// Orchestration thresholds and caps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Minimum intent confidence before any side effect is permitted.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Cap on the conversation message log.
    #[serde(default = "default_max_context_messages")]
    pub max_context_messages: usize,

    /// How many recent messages go into each prompt.
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Cap on the command execution history.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Fallback city for weather hints when the utterance names none.
    #[serde(default = "default_city")]
    pub default_city: String,
}

fn default_confidence_threshold() -> f64 {
    0.8
}

fn default_max_context_messages() -> usize {
    50
}

fn default_context_window() -> usize {
    10
}

fn default_history_limit() -> usize {
    100
}

fn default_city() -> String {
    "London".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_context_messages: default_max_context_messages(),
            context_window: default_context_window(),
            history_limit: default_history_limit(),
            default_city: default_city(),
        }
    }
}

/// Conversation persistence settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; empty selects the per-user data directory.
    #[serde(default)]
    pub db_path: String,
}

impl StorageConfig {
    pub fn resolved_db_path(&self) -> PathBuf {
        if !self.db_path.is_empty() {
            return PathBuf::from(&self.db_path);
        }
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chorus")
            .join("conversations.db")
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChorusConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_backends() -> Vec<BackendConfig> {
    vec![BackendConfig::default()]
}

impl Default for ChorusConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            backends: default_backends(),
            storage: StorageConfig::default(),
        }
    }
}

impl ChorusConfig {
    /// Load config from a file, or return defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        Self::load_from_path(path.as_ref()).unwrap_or_else(|e| {
            warn!("Config not found, using defaults: {}", e);
            ChorusConfig::default()
        })
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ChorusConfig = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Threshold clamped into [0, 1].
    pub fn effective_confidence_threshold(&self) -> f64 {
        self.orchestrator.confidence_threshold.clamp(0.0, 1.0)
    }

    /// Context cap, never below the prompt window.
    pub fn effective_max_context(&self) -> usize {
        self.orchestrator
            .max_context_messages
            .max(self.effective_context_window())
    }

    /// Prompt window, floored at 1.
    pub fn effective_context_window(&self) -> usize {
        self.orchestrator.context_window.max(1)
    }

    pub fn backend(&self, id: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.id == id)
    }

    pub fn first_backend(&self) -> Option<&BackendConfig> {
        self.backends.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_has_one_local_backend() {
        let config = ChorusConfig::default();
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].id, "ollama-local");
        assert_eq!(config.backends[0].provider, BackendProvider::Ollama);
        assert_eq!(config.effective_confidence_threshold(), 0.8);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r#"
[orchestrator]
confidence_threshold = 0.6

[[backends]]
id = "remote"
provider = "openai"
model = "gpt-4o-mini"
url = "https://api.openai.com"
strength = "creative"
api_key_env = "OPENAI_API_KEY"
"#;
        let config: ChorusConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.orchestrator.confidence_threshold, 0.6);
        assert_eq!(config.orchestrator.context_window, 10);
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].strength, BackendStrength::Creative);
        assert_eq!(config.backends[0].timeout_secs, 30);
    }

    #[test]
    fn out_of_range_threshold_is_clamped_not_rejected() {
        let toml_str = r#"
[orchestrator]
confidence_threshold = 7.5
"#;
        let config: ChorusConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.effective_confidence_threshold(), 1.0);
    }

    #[test]
    fn context_cap_never_drops_below_window() {
        let toml_str = r#"
[orchestrator]
max_context_messages = 2
context_window = 10
"#;
        let config: ChorusConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.effective_max_context(), 10);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let config = ChorusConfig::load("/nonexistent/chorus.toml");
        assert_eq!(config.backends.len(), 1);
    }

    #[test]
    fn load_reads_a_real_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[orchestrator]\nhistory_limit = 7").unwrap();
        let config = ChorusConfig::load(file.path());
        assert_eq!(config.orchestrator.history_limit, 7);
    }

    #[test]
    fn backend_lookup_by_id() {
        let config = ChorusConfig::default();
        assert!(config.backend("ollama-local").is_some());
        assert!(config.backend("nope").is_none());
        assert_eq!(config.first_backend().unwrap().id, "ollama-local");
    }
}
