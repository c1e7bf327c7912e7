//! Mock provider for testing
//!
//! Returns configurable responses without making real API calls.
//! Replies come from, in order: prompt rules, the FIFO queue, the default
//! reply, and finally an echo of the prompt.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use super::{
    ChunkStream, FinishReason, GenerateRequest, GenerateResponse, LlmProvider, StreamChunk,
    TokenUsage,
};
use crate::error::{FlowError, Result};

/// One scripted outcome
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    Text(String),
    /// Text returned after a delay (for ordering/cancellation tests)
    Delayed { text: String, delay: Duration },
    /// Provider error with optional status code
    Error { reason: String, status: Option<u16> },
    RateLimited { retry_after_secs: u64 },
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn delayed(text: impl Into<String>, delay: Duration) -> Self {
        Self::Delayed {
            text: text.into(),
            delay,
        }
    }

    pub fn error(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self::Error {
            reason: reason.into(),
            status,
        }
    }
}

impl From<&str> for MockReply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for MockReply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// Mock provider that returns predefined responses
pub struct MockProvider {
    name: String,
    model: String,
    /// (prompt substring, reply); first match wins and is reused
    rules: Vec<(String, MockReply)>,
    /// Queue of replies (FIFO)
    queue: Mutex<VecDeque<MockReply>>,
    /// Reply when no rule matches and the queue is empty; `None` echoes the prompt
    default_reply: Option<MockReply>,
    streaming: bool,
    /// Track all requests made (for assertions)
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockProvider {
    /// Echoing mock named "mock"
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            model: "mock-model".to_string(),
            rules: Vec::new(),
            queue: Mutex::new(VecDeque::new()),
            default_reply: None,
            streaming: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create with a queue of responses
    pub fn with_responses<I, R>(responses: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<MockReply>,
    {
        let provider = Self::new();
        provider
            .queue
            .lock()
            .extend(responses.into_iter().map(Into::into));
        provider
    }

    /// Register under a different name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Reply whenever the prompt contains `pattern`
    pub fn on_prompt(mut self, pattern: impl Into<String>, reply: impl Into<MockReply>) -> Self {
        self.rules.push((pattern.into(), reply.into()));
        self
    }

    pub fn with_default(mut self, reply: impl Into<MockReply>) -> Self {
        self.default_reply = Some(reply.into());
        self
    }

    /// Advertise streaming; streamed text is split at whitespace
    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }

    /// Add a response to the queue
    pub fn queue_response(&self, reply: impl Into<MockReply>) {
        self.queue.lock().push_back(reply.into());
    }

    /// Get all requests made to this provider
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.requests.lock().last().cloned()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn next_reply(&self, prompt: &str) -> MockReply {
        if let Some((_, reply)) = self.rules.iter().find(|(p, _)| prompt.contains(p.as_str())) {
            return reply.clone();
        }
        if let Some(reply) = self.queue.lock().pop_front() {
            return reply;
        }
        self.default_reply
            .clone()
            .unwrap_or_else(|| MockReply::Text(prompt.to_string()))
    }

    async fn respond(&self, request: &GenerateRequest) -> Result<String> {
        self.requests.lock().push(request.clone());
        match self.next_reply(request.prompt()) {
            MockReply::Text(text) => Ok(text),
            MockReply::Delayed { text, delay } => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            MockReply::Error { reason, status } => Err(FlowError::LlmProvider {
                provider: self.name.clone(),
                reason,
                status,
            }),
            MockReply::RateLimited { retry_after_secs } => Err(FlowError::RateLimited {
                provider: self.name.clone(),
                retry_after_secs,
            }),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let text = self.respond(&request).await?;
        let usage = TokenUsage::estimate(request.prompt_len(), text.len());
        Ok(GenerateResponse::text(text).with_usage(usage))
    }

    async fn generate_stream(&self, request: GenerateRequest) -> Result<ChunkStream> {
        let text = self.respond(&request).await?;
        let usage = TokenUsage::estimate(request.prompt_len(), text.len());
        let mut chunks: Vec<Result<StreamChunk>> = text
            .split_inclusive(char::is_whitespace)
            .map(|piece| Ok(StreamChunk::Delta(piece.to_string())))
            .collect();
        chunks.push(Ok(StreamChunk::Done {
            finish_reason: FinishReason::Stop,
            usage,
        }));
        Ok(stream::iter(chunks).boxed())
    }

    fn supports_streaming(&self, _model: &str) -> bool {
        self.streaming
    }
}
