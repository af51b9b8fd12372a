//! Candidate and synthesized answer types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One backend's raw reply, scored but not yet ranked. Lives only for the
/// duration of a single request; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendCandidate {
    pub backend_id: String,
    pub text: String,
    pub quality_score: f64,
    pub latency: Duration,
}

impl BackendCandidate {
    /// A fresh, unscored candidate straight from a backend call.
    pub fn unscored(backend_id: impl Into<String>, text: impl Into<String>, latency: Duration) -> Self {
        Self {
            backend_id: backend_id.into(),
            text: text.into(),
            quality_score: 0.0,
            latency,
        }
    }
}

/// The one answer handed back to the embedding layer after ranking or
/// merging. `confidence` aggregates across candidates and is distinct
/// from any single candidate's quality score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedAnswer {
    pub text: String,
    pub quality_score: f64,
    pub confidence: f64,
    pub processing_time: Duration,
}

impl SynthesizedAnswer {
    /// Promote a single candidate unchanged; its score doubles as the
    /// answer confidence.
    pub fn from_candidate(candidate: &BackendCandidate, processing_time: Duration) -> Self {
        Self {
            text: candidate.text.clone(),
            quality_score: candidate.quality_score,
            confidence: candidate.quality_score,
            processing_time,
        }
    }
}
