//! Candidate ranking and merging.
//!
//! Scored candidates come in, one answer goes out. Simple requests take
//! the best candidate as-is; complex ones get a single merge attempt that
//! combines the candidates through a backend. Merging is strictly
//! best-effort: any merge problem falls back to the best candidate, and
//! the only hard error is having nothing to work with.

use crate::backend::{CompletionRequest, ModelBackend};
use crate::scorer;
use chorus_common::analysis::RequestAnalysis;
use chorus_common::answer::{BackendCandidate, SynthesizedAnswer};
use chorus_common::error::ChorusError;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Requests above this complexity are worth a merge call.
pub const MERGE_COMPLEXITY_THRESHOLD: f64 = 0.7;

pub struct ResponseSynthesizer {
    merge_backend: Option<Arc<dyn ModelBackend>>,
}

impl ResponseSynthesizer {
    pub fn new() -> Self {
        Self {
            merge_backend: None,
        }
    }

    pub fn with_merge_backend(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            merge_backend: Some(backend),
        }
    }

    /// Reduce scored candidates to the final answer.
    ///
    /// The answer's confidence is the mean candidate quality, so it
    /// reflects how good the whole field was, not just the winner.
    pub async fn synthesize(
        &self,
        mut candidates: Vec<BackendCandidate>,
        analysis: &RequestAnalysis,
    ) -> Result<SynthesizedAnswer, ChorusError> {
        let started = Instant::now();

        if candidates.is_empty() {
            return Err(ChorusError::Synthesis(
                "no candidates to synthesize".to_string(),
            ));
        }
        if candidates.len() == 1 {
            return Ok(SynthesizedAnswer::from_candidate(
                &candidates[0],
                started.elapsed(),
            ));
        }

        // Stable descending sort: equal scores keep their call order, so
        // earlier backends win ties.
        candidates.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(Ordering::Equal)
        });
        let confidence = mean_quality(&candidates);

        if analysis.complexity > MERGE_COMPLEXITY_THRESHOLD {
            match self.merge(&candidates, analysis).await {
                Ok(merged) => {
                    let quality_score = scorer::score(&merged, analysis);
                    debug!(
                        candidates = candidates.len(),
                        quality_score, "merged candidates into one answer"
                    );
                    return Ok(SynthesizedAnswer {
                        text: merged,
                        quality_score,
                        confidence,
                        processing_time: started.elapsed(),
                    });
                }
                Err(e) => {
                    warn!(error = %e, "merge failed, falling back to best candidate");
                }
            }
        }

        let best = &candidates[0];
        debug!(
            backend = %best.backend_id,
            quality_score = best.quality_score,
            "selected best candidate"
        );
        Ok(SynthesizedAnswer {
            text: best.text.clone(),
            quality_score: best.quality_score,
            confidence,
            processing_time: started.elapsed(),
        })
    }

    /// One merge call, no retries.
    async fn merge(
        &self,
        candidates: &[BackendCandidate],
        analysis: &RequestAnalysis,
    ) -> Result<String, ChorusError> {
        let Some(backend) = self.merge_backend.as_ref() else {
            return Err(ChorusError::Synthesis(
                "no merge backend configured".to_string(),
            ));
        };

        let profile = serde_json::to_string(analysis).unwrap_or_default();
        let mut prompt = format!(
            "Combine the following responses into a single coherent answer. \
             Keep the strongest points from each, remove repetition, and \
             answer in the register the request profile suggests.\n\
             Request profile: {profile}\n\n"
        );
        for (i, candidate) in candidates.iter().enumerate() {
            prompt.push_str(&format!(
                "--- Response {} (from {}) ---\n{}\n\n",
                i + 1,
                candidate.backend_id,
                candidate.text
            ));
        }

        let request = CompletionRequest::new(prompt).with_temperature(0.3);
        backend
            .complete(&request)
            .await
            .map_err(|e| ChorusError::Synthesis(format!("merge call failed: {e}")))
    }
}

impl Default for ResponseSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

fn mean_quality(candidates: &[BackendCandidate]) -> f64 {
    let mean =
        candidates.iter().map(|c| c.quality_score).sum::<f64>() / candidates.len() as f64;
    mean.clamp(0.0, 1.0)
}
