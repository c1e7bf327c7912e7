//! Resilience patterns for provider calls
//!
//! - [`retry`]: Retry with exponential backoff and jitter
//! - [`provider`]: `LlmProvider` decorator applying a retry policy
//!
//! Opt-in only: the executor never retries a failed node by itself.

pub mod provider;
pub mod retry;

pub use provider::RetryingProvider;
pub use retry::{RetryConfig, RetryPolicy};
