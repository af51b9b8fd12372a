//! Concurrent fan-out over the backend registry.
//!
//! All selected backends are queried at the same time and one failure never
//! hides the other answers. Dropping the future aborts the in-flight tasks.

use crate::backend::{BackendRegistry, CompletionRequest};
use chorus_common::analysis::{RequestAnalysis, ResponseKind};
use chorus_common::answer::BackendCandidate;
use chorus_common::config::{BackendConfig, BackendStrength};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub struct BackendPool {
    registry: Arc<BackendRegistry>,
}

impl BackendPool {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    /// Run every call concurrently and gather the successful replies as
    /// unscored candidates, in the same order as the input calls. Failed
    /// backends are logged and skipped; an unknown backend id is skipped
    /// up front.
    pub async fn collect(
        &self,
        calls: Vec<(String, CompletionRequest)>,
    ) -> Vec<BackendCandidate> {
        let mut join_set = JoinSet::new();
        for (index, (backend_id, request)) in calls.into_iter().enumerate() {
            let Some(backend) = self.registry.get(&backend_id) else {
                warn!(backend = %backend_id, "backend not registered, skipping");
                continue;
            };
            join_set.spawn(async move {
                let started = Instant::now();
                let result = backend.complete(&request).await;
                (index, backend_id, result, started.elapsed())
            });
        }

        let mut indexed: Vec<(usize, BackendCandidate)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, backend_id, Ok(text), latency)) => {
                    debug!(
                        backend = %backend_id,
                        latency_ms = latency.as_millis() as u64,
                        "backend answered"
                    );
                    indexed.push((index, BackendCandidate::unscored(backend_id, text, latency)));
                }
                Ok((_, backend_id, Err(e), latency)) => {
                    warn!(
                        backend = %backend_id,
                        latency_ms = latency.as_millis() as u64,
                        transient = e.is_transient(),
                        error = %e,
                        "backend call failed"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "backend task panicked or was cancelled");
                }
            }
        }

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, candidate)| candidate).collect()
    }
}

/// Pick which configured backends should answer this request.
///
/// Complex, structured, or code-heavy requests go to analytically-strong
/// backends; creative or highly time-sensitive ones to creatively-strong
/// backends. A request matching both gets both sets. When the policy
/// selects nothing, the first configured backend answers alone.
pub fn select_backends(analysis: &RequestAnalysis, configured: &[BackendConfig]) -> Vec<String> {
    let has_capability =
        |name: &str| analysis.required_capabilities.iter().any(|c| c == name);
    let wants_analytical = analysis.complexity > 0.7
        || analysis.response_kind.expects_structure()
        || has_capability("code");
    let wants_creative = analysis.response_kind == ResponseKind::Creative
        || analysis.time_sensitivity > 0.8
        || has_capability("visual");

    let ids_with = |strength: BackendStrength| {
        configured
            .iter()
            .filter(move |b| b.strength == strength)
            .map(|b| b.id.clone())
    };

    let mut selected: Vec<String> = Vec::new();
    if wants_analytical {
        selected.extend(ids_with(BackendStrength::Analytical));
    }
    if wants_creative {
        selected.extend(ids_with(BackendStrength::Creative));
    }
    if selected.is_empty() {
        if let Some(first) = configured.first() {
            selected.push(first.id.clone());
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::fake::FakeBackend;
    use std::time::Duration;

    fn registry_of(backends: Vec<FakeBackend>) -> Arc<BackendRegistry> {
        let mut registry = BackendRegistry::new();
        for backend in backends {
            registry.register(Arc::new(backend));
        }
        Arc::new(registry)
    }

    fn calls_for(ids: &[&str]) -> Vec<(String, CompletionRequest)> {
        ids.iter()
            .map(|id| (id.to_string(), CompletionRequest::new(format!("ask {id}"))))
            .collect()
    }

    fn config(id: &str, strength: BackendStrength) -> BackendConfig {
        BackendConfig {
            id: id.to_string(),
            strength,
            ..BackendConfig::default()
        }
    }

    #[tokio::test]
    async fn failures_do_not_hide_other_answers() {
        let registry = registry_of(vec![
            FakeBackend::with_reply("a", "answer a"),
            FakeBackend::failing("b", "connection refused"),
            FakeBackend::with_reply("c", "answer c"),
        ]);
        let pool = BackendPool::new(registry);
        let candidates = pool.collect(calls_for(&["a", "b", "c"])).await;
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].backend_id, "a");
        assert_eq!(candidates[1].backend_id, "c");
    }

    #[tokio::test]
    async fn results_keep_call_order_despite_timing() {
        // The first backend finishes last; order must still follow the calls.
        let slow = FakeBackend::builder("slow")
            .default_reply("slow answer")
            .delay(Duration::from_millis(40))
            .build();
        let registry = registry_of(vec![slow, FakeBackend::with_reply("fast", "fast answer")]);
        let pool = BackendPool::new(registry);
        let candidates = pool.collect(calls_for(&["slow", "fast"])).await;
        assert_eq!(candidates[0].backend_id, "slow");
        assert_eq!(candidates[1].backend_id, "fast");
    }

    #[tokio::test]
    async fn all_failures_yield_an_empty_set() {
        let registry = registry_of(vec![
            FakeBackend::failing("a", "down"),
            FakeBackend::failing("b", "down"),
        ]);
        let pool = BackendPool::new(registry);
        assert!(pool.collect(calls_for(&["a", "b"])).await.is_empty());
    }

    #[tokio::test]
    async fn unknown_backend_ids_are_skipped() {
        let registry = registry_of(vec![FakeBackend::with_reply("a", "answer a")]);
        let pool = BackendPool::new(registry);
        let candidates = pool.collect(calls_for(&["ghost", "a"])).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].backend_id, "a");
    }

    #[tokio::test]
    async fn latency_is_recorded_per_backend() {
        let slow = FakeBackend::builder("slow")
            .default_reply("answer")
            .delay(Duration::from_millis(25))
            .build();
        let pool = BackendPool::new(registry_of(vec![slow]));
        let candidates = pool.collect(calls_for(&["slow"])).await;
        assert!(candidates[0].latency >= Duration::from_millis(25));
    }

    #[test]
    fn complex_requests_select_analytical_backends() {
        let configured = vec![
            config("creative-1", BackendStrength::Creative),
            config("analytical-1", BackendStrength::Analytical),
            config("analytical-2", BackendStrength::Analytical),
        ];
        let analysis = RequestAnalysis {
            complexity: 0.9,
            ..RequestAnalysis::default()
        };
        assert_eq!(
            select_backends(&analysis, &configured),
            vec!["analytical-1", "analytical-2"]
        );
    }

    #[test]
    fn creative_requests_select_creative_backends() {
        let configured = vec![
            config("creative-1", BackendStrength::Creative),
            config("analytical-1", BackendStrength::Analytical),
        ];
        let analysis = RequestAnalysis {
            response_kind: ResponseKind::Creative,
            ..RequestAnalysis::default()
        };
        assert_eq!(select_backends(&analysis, &configured), vec!["creative-1"]);
    }

    #[test]
    fn plain_requests_fall_back_to_first_configured() {
        let configured = vec![
            config("first", BackendStrength::Analytical),
            config("second", BackendStrength::Creative),
        ];
        let analysis = RequestAnalysis::default();
        assert_eq!(select_backends(&analysis, &configured), vec!["first"]);
    }

    #[test]
    fn mixed_requests_select_both_strength_groups() {
        let configured = vec![
            config("analytical-1", BackendStrength::Analytical),
            config("creative-1", BackendStrength::Creative),
        ];
        let analysis = RequestAnalysis {
            complexity: 0.8,
            time_sensitivity: 0.9,
            ..RequestAnalysis::default()
        };
        assert_eq!(
            select_backends(&analysis, &configured),
            vec!["analytical-1", "creative-1"]
        );
    }

    #[test]
    fn analytical_group_precedes_creative_regardless_of_config_order() {
        // Group order decides synthesizer tie-breaks, so it must not shift
        // with how the backends happen to be listed in the config.
        let configured = vec![
            config("creative-1", BackendStrength::Creative),
            config("analytical-1", BackendStrength::Analytical),
            config("creative-2", BackendStrength::Creative),
        ];
        let analysis = RequestAnalysis {
            complexity: 0.8,
            time_sensitivity: 0.9,
            ..RequestAnalysis::default()
        };
        assert_eq!(
            select_backends(&analysis, &configured),
            vec!["analytical-1", "creative-1", "creative-2"]
        );
    }

    #[test]
    fn code_capability_counts_as_analytical() {
        let configured = vec![
            config("creative-1", BackendStrength::Creative),
            config("analytical-1", BackendStrength::Analytical),
        ];
        let analysis = RequestAnalysis {
            required_capabilities: vec!["code".to_string()],
            ..RequestAnalysis::default()
        };
        assert_eq!(select_backends(&analysis, &configured), vec!["analytical-1"]);
    }
}
