//! Retry/backoff policy for provider calls
//!
//! A strategy object parameterized by a retry bound, a delay curve and a
//! retry predicate. It wraps one outbound provider call at a time; callers
//! never wrap a whole collection pipeline.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{BackoffKind, RetryConfig};
use crate::error::{
    MetricsError, ProviderError, STATUS_INTERNAL_SERVER_ERROR, STATUS_TOO_MANY_REQUESTS,
};

/// Retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Delay unit used to compute per-attempt delays
pub const DEFAULT_DELAY_MILLIS: u64 = 1000;

/// Upper bound for any single delay
pub const DEFAULT_MAX_DELAY_MILLIS: u64 = 30_000;

/// Delay curve between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),
    /// Delay grows by one unit per attempt
    Linear(Duration),
}

impl Backoff {
    /// Delay before retry number `attempt` (1-based), capped at `max_delay`
    pub fn delay_for(&self, attempt: u32, max_delay: Duration) -> Duration {
        let delay = match self {
            Backoff::Fixed(unit) => *unit,
            Backoff::Linear(unit) => unit.saturating_mul(attempt.max(1)),
        };
        delay.min(max_delay)
    }
}

/// Decides whether a failed call is attempted again
pub type RetryPredicate = Arc<dyn Fn(&ProviderError) -> bool + Send + Sync>;

/// Default predicate: transient failures carrying 429 or 500
pub fn is_retryable(error: &ProviderError) -> bool {
    match error {
        ProviderError::Transient { status, .. } => {
            *status == STATUS_TOO_MANY_REQUESTS || *status == STATUS_INTERNAL_SERVER_ERROR
        }
        _ => false,
    }
}

/// Bounded retry with backoff
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Backoff,
    max_delay: Duration,
    predicate: RetryPredicate,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_RETRIES,
            Backoff::Linear(Duration::from_millis(DEFAULT_DELAY_MILLIS)),
        )
    }
}

impl RetryPolicy {
    /// Policy with the default predicate and delay cap
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MILLIS),
            predicate: Arc::new(is_retryable),
        }
    }

    /// Policy described by the retry configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        let unit = Duration::from_millis(config.delay_millis);
        let backoff = match config.backoff {
            BackoffKind::Fixed => Backoff::Fixed(unit),
            BackoffKind::Linear => Backoff::Linear(unit),
        };
        Self::new(config.max_retries, backoff)
            .with_max_delay(Duration::from_millis(config.max_delay_millis))
    }

    /// Cap every delay at `max_delay`
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Replace the retry predicate
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ProviderError) -> bool + Send + Sync + 'static,
    {
        self.predicate = Arc::new(predicate);
        self
    }

    /// Retries allowed after the first attempt
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay curve
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Whether `error` is retried by this policy
    pub fn should_retry(&self, error: &ProviderError) -> bool {
        (self.predicate)(error)
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent.
    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, MetricsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Provider call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) if attempt <= self.max_retries && self.should_retry(&error) => {
                    let delay = self.backoff.delay_for(attempt, self.max_delay);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient provider error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    warn!(
                        operation,
                        attempts = attempt,
                        error = %error,
                        "Provider call failed"
                    );
                    return Err(MetricsError::ProviderCommunication {
                        operation: operation.to_string(),
                        attempts: attempt,
                        source: error,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff_is_monotonic_and_capped() {
        let backoff = Backoff::Linear(Duration::from_millis(1000));
        let cap = Duration::from_millis(2500);
        let delays: Vec<_> = (1..=5).map(|a| backoff.delay_for(a, cap)).collect();

        assert_eq!(delays[0], Duration::from_millis(1000));
        assert_eq!(delays[1], Duration::from_millis(2000));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= cap));
    }

    #[test]
    fn test_fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed(Duration::from_millis(50));
        let cap = Duration::from_secs(1);
        assert_eq!(backoff.delay_for(1, cap), backoff.delay_for(4, cap));
    }

    #[test]
    fn test_default_predicate() {
        assert!(is_retryable(&ProviderError::Transient {
            status: 429,
            message: String::new(),
        }));
        assert!(is_retryable(&ProviderError::Transient {
            status: 500,
            message: String::new(),
        }));
        assert!(!is_retryable(&ProviderError::Transient {
            status: 503,
            message: String::new(),
        }));
        assert!(!is_retryable(&ProviderError::Rejected {
            status: 429,
            message: String::new(),
        }));
        assert!(!is_retryable(&ProviderError::Transport("reset".into())));
    }
}
