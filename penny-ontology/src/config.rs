//! Engine tuning knobs.

use crate::error::{OntologyError, OntologyResult};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when a manifest type matches several live types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateTypePolicy {
    /// Record a conflict and leave the type alone.
    #[default]
    Report,
    /// Record a conflict and reconcile against the first live match.
    UseFirst,
    /// Abort the run before any write.
    Reject,
}

/// Configuration for the serializer, retrier and reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum pause between one write completing and the next dispatch (ms).
    pub write_delay_ms: u64,
    /// First backoff delay of the convergence retrier (ms). Must be
    /// non-zero while `retry_budget_ms` is.
    pub retry_initial_ms: u64,
    /// Total backoff budget of the convergence retrier (ms).
    pub retry_budget_ms: u64,
    /// Pending writes allowed per backend before submissions are refused.
    pub max_queue_depth: usize,
    /// How long shutdown waits for queued writes to drain (ms).
    pub drain_timeout_ms: u64,
    pub duplicate_types: DuplicateTypePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            write_delay_ms: 50,
            retry_initial_ms: 200,
            retry_budget_ms: 2_000,
            max_queue_depth: 256,
            drain_timeout_ms: 5_000,
            duplicate_types: DuplicateTypePolicy::Report,
        }
    }
}

impl EngineConfig {
    /// Rejects settings that would silently disable a configured behavior.
    pub fn validate(&self) -> OntologyResult<()> {
        if self.retry_initial_ms == 0 && self.retry_budget_ms > 0 {
            return Err(OntologyError::Config(format!(
                "retry_initial_ms is 0 but retry_budget_ms is {}; no retry would ever run",
                self.retry_budget_ms
            )));
        }
        if self.max_queue_depth == 0 {
            return Err(OntologyError::Config(
                "max_queue_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn write_delay(&self) -> Duration {
        Duration::from_millis(self.write_delay_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            Duration::from_millis(self.retry_initial_ms),
            Duration::from_millis(self.retry_budget_ms),
        )
    }
}
