//! Rolling response statistics.
//!
//! Every handled utterance leaves exactly one sample, including failures
//! (score 0), so the stream has no silent gaps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Ring capacity. The window is deliberately small: these feed a live
/// quality readout, not long-term analytics.
pub const STATS_RING_CAPACITY: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatSample {
    pub timestamp: DateTime<Utc>,
    pub quality_score: f64,
    pub processing_time: Duration,
    pub confidence: f64,
}

impl StatSample {
    pub fn new(quality_score: f64, processing_time: Duration, confidence: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            quality_score,
            processing_time,
            confidence,
        }
    }
}

/// Fixed-capacity ring of recent samples, oldest evicted first.
#[derive(Debug, Clone)]
pub struct StatsRing {
    samples: VecDeque<StatSample>,
    capacity: usize,
}

impl StatsRing {
    pub fn new() -> Self {
        Self::with_capacity(STATS_RING_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, sample: StatSample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Up to `n` samples, most recent first.
    pub fn recent(&self, n: usize) -> Vec<StatSample> {
        self.samples.iter().rev().take(n).cloned().collect()
    }

    pub fn summary(&self) -> StatsSummary {
        if self.samples.is_empty() {
            return StatsSummary::default();
        }
        let n = self.samples.len() as f64;
        let mut quality = 0.0;
        let mut confidence = 0.0;
        let mut processing_ms = 0.0;
        for sample in &self.samples {
            quality += sample.quality_score;
            confidence += sample.confidence;
            processing_ms += sample.processing_time.as_secs_f64() * 1000.0;
        }
        StatsSummary {
            total_samples: self.samples.len(),
            average_quality: quality / n,
            average_confidence: confidence / n,
            average_processing_ms: processing_ms / n,
        }
    }
}

impl Default for StatsRing {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSummary {
    pub total_samples: usize,
    pub average_quality: f64,
    pub average_confidence: f64,
    pub average_processing_ms: f64,
}
