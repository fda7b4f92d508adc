//! Rolling per-provider success, latency and quality statistics.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ProviderId, UtcDateTime};

/// Outcome of one provider attempt as seen by the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttemptOutcome {
    Success { quality_score: f64 },
    Failure,
}

/// Counters and running means for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub provider_id: ProviderId,
    pub total_requests: u64,
    pub successes: u64,
    pub failures: u64,
    /// Mean over successful attempts only.
    pub avg_response_time_ms: f64,
    /// Mean over successful attempts only.
    pub avg_quality_score: f64,
    pub last_used_at: Option<UtcDateTime>,
}

impl ProviderStats {
    pub fn new(provider_id: ProviderId) -> Self {
        Self {
            provider_id,
            total_requests: 0,
            successes: 0,
            failures: 0,
            avg_response_time_ms: 0.0,
            avg_quality_score: 0.0,
            last_used_at: None,
        }
    }

    /// Success percentage. An untried provider reports 100 so it is never
    /// penalized before its first attempt.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 100.0;
        }
        self.successes as f64 / self.total_requests as f64 * 100.0
    }

    pub fn has_history(&self) -> bool {
        self.total_requests > 0
    }

    fn record(&mut self, outcome: AttemptOutcome, elapsed: Duration) {
        self.total_requests += 1;
        self.last_used_at = Some(UtcDateTime::now());

        match outcome {
            AttemptOutcome::Success { quality_score } => {
                self.successes += 1;
                let n = self.successes as f64;
                let elapsed_ms = elapsed.as_secs_f64() * 1_000.0;
                self.avg_response_time_ms =
                    (self.avg_response_time_ms * (n - 1.0) + elapsed_ms) / n;
                self.avg_quality_score = (self.avg_quality_score * (n - 1.0) + quality_score) / n;
            }
            AttemptOutcome::Failure => {
                self.failures += 1;
            }
        }
    }
}

/// Thread-safe tracker shared by all concurrent calls of one orchestrator.
#[derive(Debug, Default)]
pub struct PerformanceTracker {
    stats: Mutex<BTreeMap<ProviderId, ProviderStats>>,
}

impl PerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self, provider: ProviderId, outcome: AttemptOutcome, elapsed: Duration) {
        self.lock()
            .entry(provider)
            .or_insert_with(|| ProviderStats::new(provider))
            .record(outcome, elapsed);
    }

    /// Stats for `provider`; an empty record if it was never attempted.
    pub fn snapshot(&self, provider: ProviderId) -> ProviderStats {
        self.lock()
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| ProviderStats::new(provider))
    }

    /// Stats for every attempted provider, ordered by id.
    pub fn snapshot_all(&self) -> Vec<ProviderStats> {
        self.lock().values().cloned().collect()
    }

    pub fn success_rate(&self, provider: ProviderId) -> f64 {
        self.snapshot(provider).success_rate()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ProviderId, ProviderStats>> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
