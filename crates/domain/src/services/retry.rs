//! Bounded retry of contended event transactions.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::errors::AdmissionError;

/// Exponential backoff with jitter for lock contention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Defaults: 5 attempts, 20ms initial delay, 500ms cap, doubling.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
        }
    }

    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `attempt` (0-indexed):
    /// `min(initial * 2^attempt, max) * random(0.5..=1.0)`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_possible_wrap)]
        let base_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_secs = base_secs.min(self.max_delay.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        Duration::from_secs_f64(capped_secs * jitter)
    }

    /// Runs `op` until it succeeds, fails with a non-contention error, or the
    /// attempt budget is spent. An exhausted budget becomes
    /// [`AdmissionError::Unavailable`].
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> Result<T, AdmissionError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AdmissionError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Err(err) if err.is_contention() => {
                    attempt += 1;
                    if attempt >= attempts {
                        warn!(operation, attempts, error = %err, "Retries exhausted on contended event");
                        return Err(AdmissionError::Unavailable(format!(
                            "event is busy, {} gave up after {} attempts",
                            operation, attempts
                        )));
                    }
                    metrics::counter!("admission_retries_total", "operation" => operation)
                        .increment(1);
                    let delay = self.delay_for_attempt(attempt - 1);
                    warn!(operation, attempt, delay_ms = delay.as_millis() as u64, "Event contended, retrying");
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}
