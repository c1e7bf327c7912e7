//! Retry with exponential backoff
//!
//! Retries operations whose error is [`FlowError::is_retryable`]. A provider
//! `retry_after` hint replaces the computed delay (still capped at `max_delay`).
//!
//! # Example
//!
//! ```rust,ignore
//! use agentflow::resilience::RetryPolicy;
//!
//! let policy = RetryPolicy::default();
//! let response = policy.execute(|| provider.generate(request.clone())).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::{FlowError, Result};

/// Backoff settings; delays double from `base_delay` up to `max_delay`
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Random spread around each delay, as a fraction of it (0.0..=1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            jitter: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

/// Runs fallible async operations under a [`RetryConfig`]
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Computed delay before retry number `attempt` (0-indexed)
    fn backoff(&self, attempt: u32) -> Duration {
        let delay = self
            .config
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.config.max_delay);
        if self.config.jitter <= 0.0 {
            return delay;
        }
        let spread = rand::thread_rng().gen_range(-self.config.jitter..=self.config.jitter);
        delay.mul_f64(1.0 + spread)
    }

    fn delay_for(&self, attempt: u32, error: &FlowError) -> Duration {
        match error.retry_after() {
            Some(hint) => hint.min(self.config.max_delay),
            None => self.backoff(attempt),
        }
    }

    /// Run `operation`, retrying retryable failures
    ///
    /// Non-retryable errors return immediately; after the last attempt the
    /// last error is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if !e.is_retryable() || attempt >= self.config.max_retries => {
                    return Err(e)
                }
                Err(e) => {
                    let delay = self.delay_for(attempt, &e);
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::default()
                .with_base_delay(Duration::from_millis(1))
                .with_jitter(0.0),
        )
    }

    fn transient() -> FlowError {
        FlowError::LlmProvider {
            provider: "mock".to_string(),
            reason: "unavailable".to_string(),
            status: Some(503),
        }
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = RetryPolicy::new(RetryConfig {
            max_delay: Duration::from_millis(500),
            ..RetryConfig::default()
                .with_base_delay(Duration::from_millis(100))
                .with_jitter(0.0)
        });

        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
        assert_eq!(policy.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_is_clamped_and_bounded() {
        assert_eq!(RetryConfig::default().with_jitter(3.0).jitter, 1.0);

        let policy = RetryPolicy::new(
            RetryConfig::default()
                .with_base_delay(Duration::from_millis(1000))
                .with_jitter(0.1),
        );
        for _ in 0..50 {
            let ms = policy.backoff(0).as_millis();
            assert!((899..=1100).contains(&ms), "delay {ms} out of range");
        }
    }

    #[test]
    fn test_retry_after_hint_is_capped() {
        let policy = RetryPolicy::new(RetryConfig {
            max_delay: Duration::from_secs(2),
            ..RetryConfig::default()
        });
        let err = FlowError::RateLimited {
            provider: "p".to_string(),
            retry_after_secs: 30,
        };
        assert_eq!(policy.delay_for(0, &err), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = fast()
            .execute(|| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(transient())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = fast()
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(FlowError::ToolNotFound {
                        tool: "x".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(FlowError::ToolNotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(
            RetryConfig::default()
                .with_max_retries(2)
                .with_base_delay(Duration::from_millis(1))
                .with_jitter(0.0),
        );
        let result: Result<()> = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
