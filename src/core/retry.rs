use std::time::Duration;

use crate::core::capability::{Capability, CapabilityInput};
use crate::core::error::{CapabilityError, ItemFailure};
use crate::core::Payload;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(4);
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Bounded retry with capped exponential backoff.
///
/// `max_attempts` counts every invocation, the first one included.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn without_backoff(self) -> Self {
        self.with_backoff(Duration::ZERO, Duration::ZERO)
    }

    /// At least one attempt is always made.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * multiplier.powi(exponent);
        let cap = self.max_backoff.as_secs_f64();
        if !secs.is_finite() || secs >= cap {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// How the final attempt of an invocation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptError {
    Failed(CapabilityError),
    TimedOut(Duration),
}

/// Every allowed attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Exhausted {
    pub last: AttemptError,
    pub attempts: u32,
}

impl From<Exhausted> for ItemFailure {
    fn from(exhausted: Exhausted) -> Self {
        match exhausted.last {
            AttemptError::Failed(e) => ItemFailure::CapabilityFailure {
                message: e.to_string(),
                attempts: exhausted.attempts,
            },
            AttemptError::TimedOut(timeout) => ItemFailure::Timeout {
                timeout,
                attempts: exhausted.attempts,
            },
        }
    }
}

/// Invokes a capability under a per-attempt timeout, retrying transient
/// failures. Returns the payload with the number of attempts it took.
pub async fn invoke_with_retry(
    capability: &dyn Capability,
    input: &CapabilityInput,
    policy: &RetryPolicy,
    timeout: Duration,
) -> Result<(Payload, u32), Exhausted> {
    let max_attempts = policy.attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let last = match tokio::time::timeout(timeout, capability.execute(input)).await {
            Ok(Ok(payload)) => return Ok((payload, attempt)),
            Ok(Err(e)) if !e.is_retryable() => {
                log::error!("Capability '{}' rejected its input: {}", capability.name(), e);
                return Err(Exhausted {
                    last: AttemptError::Failed(e),
                    attempts: attempt,
                });
            }
            Ok(Err(e)) => AttemptError::Failed(e),
            Err(_) => AttemptError::TimedOut(timeout),
        };

        if attempt >= max_attempts {
            return Err(Exhausted { last, attempts: attempt });
        }

        let delay = policy.backoff(attempt);
        log::warn!(
            "Capability '{}' attempt {}/{} failed ({:?}), retrying in {:?}",
            capability.name(),
            attempt,
            max_attempts,
            last,
            delay
        );
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signature::Signature;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given error until `succeed_on`, then returns its attempt number.
    struct Flaky {
        calls: AtomicU32,
        succeed_on: u32,
        error: CapabilityError,
        delay: Duration,
    }

    impl Flaky {
        fn new(succeed_on: u32, error: CapabilityError) -> Self {
            Flaky {
                calls: AtomicU32::new(0),
                succeed_on,
                error,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Capability for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn signature(&self) -> Signature {
            Signature::new()
        }

        async fn execute(&self, _input: &CapabilityInput) -> Result<Payload, CapabilityError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call >= self.succeed_on {
                Ok(json!(call))
            } else {
                Err(self.error.clone())
            }
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy::default()
            .with_backoff(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(350));
        assert_eq!(policy.backoff(60), Duration::from_millis(350));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::default().with_max_attempts(0).attempts(), 1);
        assert_eq!(RetryPolicy::none().attempts(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let flaky = Flaky::new(3, CapabilityError::Collaborator("503".into()));
        let policy = RetryPolicy::default().without_backoff();

        let (payload, attempts) =
            invoke_with_retry(&flaky, &CapabilityInput::new(), &policy, Duration::from_secs(1))
                .await
                .unwrap();
        assert_eq!(payload, json!(3));
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempt_count() {
        let flaky = Flaky::new(u32::MAX, CapabilityError::Collaborator("503".into()));
        let policy = RetryPolicy::default().with_max_attempts(3).without_backoff();

        let exhausted =
            invoke_with_retry(&flaky, &CapabilityInput::new(), &policy, Duration::from_secs(1))
                .await
                .unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            ItemFailure::from(exhausted),
            ItemFailure::CapabilityFailure {
                message: "collaborator error: 503".into(),
                attempts: 3
            }
        );
    }

    #[tokio::test]
    async fn test_input_errors_are_not_retried() {
        let flaky = Flaky::new(u32::MAX, CapabilityError::MissingInput("query".into()));
        let policy = RetryPolicy::default().without_backoff();

        let exhausted =
            invoke_with_retry(&flaky, &CapabilityInput::new(), &policy, Duration::from_secs(1))
                .await
                .unwrap_err();
        assert_eq!(exhausted.attempts, 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let mut slow = Flaky::new(1, CapabilityError::Collaborator("unused".into()));
        slow.delay = Duration::from_millis(200);
        let policy = RetryPolicy::default().with_max_attempts(2).without_backoff();
        let timeout = Duration::from_millis(10);

        let exhausted = invoke_with_retry(&slow, &CapabilityInput::new(), &policy, timeout)
            .await
            .unwrap_err();
        assert_eq!(exhausted.attempts, 2);
        assert_eq!(
            ItemFailure::from(exhausted),
            ItemFailure::Timeout {
                timeout,
                attempts: 2
            }
        );
    }
}
