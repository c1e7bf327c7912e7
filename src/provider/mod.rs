//! # Provider Abstraction Layer
//!
//! The executor talks to language models only through [`LlmProvider`]:
//!
//! - [`LlmProvider`] - capability trait (`generate`, `generate_stream`, capability queries)
//! - [`ProviderRegistry`] - explicit name → provider map handed to the executor
//! - [`MockProvider`] - scripted provider for tests and the CLI
//!
//! Real HTTP clients live outside this crate. Retry/backoff is not applied here;
//! wrap a provider in [`crate::resilience::RetryingProvider`] when wanted.
//!
//! ```rust
//! use std::sync::Arc;
//! use agentflow::provider::{MockProvider, ProviderRegistry};
//!
//! let registry = ProviderRegistry::new();
//! registry.register(Arc::new(MockProvider::new()));
//! assert!(registry.has("mock"));
//! ```

mod mock;
mod registry;
mod types;

pub use mock::{MockProvider, MockReply};
pub use registry::ProviderRegistry;
pub use types::*;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::Result;

/// Stream of incremental output, ending with [`StreamChunk::Done`]
pub type ChunkStream = BoxStream<'static, Result<StreamChunk>>;

/// LLM provider capability consumed by the executor
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry key (e.g. "mock", "claude")
    fn name(&self) -> &str;

    /// Model used when the agent does not name one
    fn default_model(&self) -> &str;

    /// One-shot generation
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;

    /// Streaming generation; the default adapts [`LlmProvider::generate`]
    async fn generate_stream(&self, request: GenerateRequest) -> Result<ChunkStream> {
        let response = self.generate(request).await?;
        let chunks = vec![
            Ok(StreamChunk::Delta(response.text)),
            Ok(StreamChunk::Done {
                finish_reason: response.finish_reason,
                usage: response.usage,
            }),
        ];
        Ok(stream::iter(chunks).boxed())
    }

    fn supports_tools(&self, _model: &str) -> bool {
        false
    }

    fn supports_streaming(&self, _model: &str) -> bool {
        false
    }
}

/// Drain a chunk stream into a response, calling `on_delta` per text piece
pub async fn collect_stream(
    mut stream: ChunkStream,
    mut on_delta: impl FnMut(&str),
) -> Result<GenerateResponse> {
    let mut response = GenerateResponse::default();
    while let Some(chunk) = stream.next().await {
        match chunk? {
            StreamChunk::Delta(delta) => {
                on_delta(&delta);
                response.text.push_str(&delta);
            }
            StreamChunk::Done {
                finish_reason,
                usage,
            } => {
                response.finish_reason = finish_reason;
                response.usage = usage;
            }
        }
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl LlmProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn default_model(&self) -> &str {
            "fixed-1"
        }

        async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse> {
            Ok(GenerateResponse::text("hello").with_usage(TokenUsage::new(1, 2)))
        }
    }

    #[tokio::test]
    async fn default_stream_adapts_generate() {
        let provider = Fixed;
        let stream = provider
            .generate_stream(GenerateRequest::new("fixed-1", "hi"))
            .await
            .unwrap();
        let mut deltas = Vec::new();
        let response = collect_stream(stream, |d| deltas.push(d.to_string()))
            .await
            .unwrap();
        assert_eq!(deltas, vec!["hello"]);
        assert_eq!(response.text, "hello");
        assert_eq!(response.usage, TokenUsage::new(1, 2));
        assert!(!provider.supports_streaming("fixed-1"));
    }

    #[test]
    fn trait_is_object_safe() {
        fn accepts(_: &dyn LlmProvider) {}
        accepts(&Fixed);
    }
}
