//! Error taxonomy for the orchestration core.
//!
//! Failures are recovered at the lowest layer that can absorb them; only
//! terminal conditions reach the facade, and the facade converts those to
//! a failed result object rather than propagating.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChorusError {
    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Command execution failed: {0}")]
    CommandExecution(String),

    #[error("Backend '{backend_id}' call failed: {message}")]
    BackendCall {
        backend_id: String,
        message: String,
        transient: bool,
    },

    #[error("All backends failed to produce a response")]
    AllBackendsFailed,

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("Conversation store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChorusError {
    /// Whether retrying the same request later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ChorusError::BackendCall { transient, .. } => *transient,
            ChorusError::AllBackendsFailed => true,
            _ => false,
        }
    }
}
