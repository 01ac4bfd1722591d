//! Convergence retrier.
//!
//! Backends index new entities asynchronously, so a read or a dependent
//! write issued right after a create can fail with
//! [`OntologyError::EntityNotYetVisible`]. The retrier absorbs that one
//! failure mode with bounded backoff. Every other error passes straight
//! through.

use crate::error::{OntologyError, OntologyResult};
use crate::reconciler::CancelToken;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff schedule used between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Doubling delays starting at `initial`, capped so their sum never
    /// exceeds `budget`. A zero `initial` yields no retries at all.
    Exponential { initial: Duration, budget: Duration },
    /// An explicit list of delays. One attempt is made per delay, plus the
    /// first.
    Fixed(Vec<Duration>),
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(200), Duration::from_millis(2_000))
    }
}

impl RetryPolicy {
    pub fn exponential(initial: Duration, budget: Duration) -> Self {
        Self::Exponential { initial, budget }
    }

    pub fn from_delays(delays: impl IntoIterator<Item = Duration>) -> Self {
        Self::Fixed(delays.into_iter().collect())
    }

    /// No retries: a single attempt.
    pub fn none() -> Self {
        Self::Fixed(Vec::new())
    }

    /// Delays to sleep between consecutive attempts.
    ///
    /// ```
    /// use penny_ontology::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let ms = |v| Duration::from_millis(v);
    /// let policy = RetryPolicy::exponential(ms(200), ms(2_000));
    /// assert_eq!(policy.delays(), vec![ms(200), ms(400), ms(800), ms(600)]);
    /// ```
    pub fn delays(&self) -> Vec<Duration> {
        match self {
            RetryPolicy::Fixed(delays) => delays.clone(),
            RetryPolicy::Exponential { initial, budget } => {
                let mut delays = Vec::new();
                if initial.is_zero() {
                    return delays;
                }
                let mut next = *initial;
                let mut spent = Duration::ZERO;
                while spent < *budget {
                    let delay = next.min(*budget - spent);
                    delays.push(delay);
                    spent += delay;
                    next = next.saturating_mul(2);
                }
                delays
            }
        }
    }

    /// Total time spent sleeping if every attempt fails.
    pub fn budget(&self) -> Duration {
        self.delays().iter().sum()
    }
}

/// Retries operations that fail on transient index lag.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceRetrier {
    policy: RetryPolicy,
}

impl ConvergenceRetrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `attempt` until it succeeds, fails with an error `classify`
    /// rejects, or the backoff schedule runs out. Running out surfaces
    /// [`OntologyError::SchemaNotConverged`] carrying the last error.
    pub async fn retry<T, F, Fut, C>(
        &self,
        operation: &str,
        attempt: F,
        classify: C,
    ) -> OntologyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OntologyResult<T>>,
        C: Fn(&OntologyError) -> bool,
    {
        self.retry_until_cancelled(operation, attempt, classify, &CancelToken::new())
            .await
    }

    /// [`retry`](Self::retry) that gives up with [`OntologyError::Cancelled`]
    /// once `cancel` fires, either during backoff or before the next attempt.
    /// An attempt already in flight is awaited, not dropped.
    pub async fn retry_until_cancelled<T, F, Fut, C>(
        &self,
        operation: &str,
        mut attempt: F,
        classify: C,
        cancel: &CancelToken,
    ) -> OntologyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OntologyResult<T>>,
        C: Fn(&OntologyError) -> bool,
    {
        let mut delays = self.policy.delays().into_iter();
        let mut attempt_no: u32 = 1;
        loop {
            if cancel.is_cancelled() {
                debug!(operation, attempt = attempt_no, "Cancelled before attempt");
                return Err(OntologyError::Cancelled);
            }
            let err = match attempt().await {
                Ok(value) => {
                    if attempt_no > 1 {
                        debug!(operation, attempt = attempt_no, "Converged after retry");
                    }
                    return Ok(value);
                }
                Err(err) if !classify(&err) => return Err(err),
                Err(err) => err,
            };

            match delays.next() {
                Some(delay) => {
                    debug!(
                        operation,
                        attempt = attempt_no,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Not converged yet, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => {
                            debug!(operation, attempt = attempt_no, "Cancelled during backoff");
                            return Err(OntologyError::Cancelled);
                        }
                    }
                    attempt_no += 1;
                }
                None => {
                    warn!(
                        operation,
                        attempts = attempt_no,
                        error = %err,
                        "Retry budget exhausted"
                    );
                    return Err(OntologyError::SchemaNotConverged {
                        last: Box::new(err),
                    });
                }
            }
        }
    }

    /// [`retry`](Self::retry) classifying only index lag as retryable.
    pub async fn retry_lag<T, F, Fut>(&self, operation: &str, attempt: F) -> OntologyResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OntologyResult<T>>,
    {
        self.retry(operation, attempt, OntologyError::is_transient_lag)
            .await
    }
}
