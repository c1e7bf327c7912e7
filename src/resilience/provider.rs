//! Retrying Provider Wrapper
//!
//! Decorates any [`LlmProvider`] with a [`RetryPolicy`]. Name, default model
//! and capabilities are those of the wrapped provider, so the decorator can be
//! registered in place of it.
//!
//! ```rust
//! use std::sync::Arc;
//! use agentflow::provider::{MockProvider, ProviderRegistry};
//! use agentflow::resilience::{RetryingProvider, RetryPolicy};
//!
//! let registry = ProviderRegistry::new();
//! let inner = Arc::new(MockProvider::new());
//! registry.register(Arc::new(RetryingProvider::new(inner, RetryPolicy::default())));
//! assert!(registry.has("mock"));
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use super::RetryPolicy;
use crate::error::Result;
use crate::provider::{ChunkStream, GenerateRequest, GenerateResponse, LlmProvider};

pub struct RetryingProvider {
    inner: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &Arc<dyn LlmProvider> {
        &self.inner
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        self.policy
            .execute(|| self.inner.generate(request.clone()))
            .await
    }

    /// Only opening the stream is retried; errors inside the stream pass through
    async fn generate_stream(&self, request: GenerateRequest) -> Result<ChunkStream> {
        self.policy
            .execute(|| self.inner.generate_stream(request.clone()))
            .await
    }

    fn supports_tools(&self, model: &str) -> bool {
        self.inner.supports_tools(model)
    }

    fn supports_streaming(&self, model: &str) -> bool {
        self.inner.supports_streaming(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlowError;
    use crate::provider::{MockProvider, MockReply};
    use crate::resilience::RetryConfig;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::default()
                .with_max_retries(2)
                .with_base_delay(Duration::from_millis(1))
                .with_jitter(0.0),
        )
    }

    #[tokio::test]
    async fn retries_transient_provider_errors() {
        let mock = Arc::new(MockProvider::with_responses([
            MockReply::error("overloaded", Some(529)),
            MockReply::RateLimited {
                retry_after_secs: 0,
            },
            MockReply::text("ok"),
        ]));
        let provider = RetryingProvider::new(mock.clone(), policy());

        let response = provider
            .generate(GenerateRequest::new("m", "hi"))
            .await
            .unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(mock.call_count(), 3);
        assert_eq!(provider.name(), "mock");
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let mock = Arc::new(MockProvider::with_responses([MockReply::error(
            "bad request",
            Some(400),
        )]));
        let provider = RetryingProvider::new(mock.clone(), policy());

        let err = provider
            .generate(GenerateRequest::new("m", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::LlmProvider { status: Some(400), .. }));
        assert_eq!(mock.call_count(), 1);
    }
}
