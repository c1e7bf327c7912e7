//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use agentflow::provider::{MockProvider, ProviderRegistry};
use agentflow::tools::ToolRegistry;
use agentflow::{Event, EventSink, FlowExecutor};

/// A two-step sequence with a parallel fan-out in the middle
pub fn research_flow_yaml() -> &'static str {
    r#"
code: research
name: Research
inputs:
  - name: topic
    type: shortText
    required: true
steps:
  type: sequence
  steps:
    - type: step
      agent: researcher
      input: "Find sources about @topic"
    - type: parallel
      steps:
        - type: step
          agent: writer
          input: "Draft on {{previous_output}}"
        - type: step
          agent: critic
          input: "Critique {{previous_output}}"
"#
}

/// A flow with an agent roster and one tool call
pub fn tool_flow_yaml() -> &'static str {
    r#"
code: tooling
agents:
  - name: writer
    model: mock-large
steps:
  type: sequence
  steps:
    - type: tool
      toolName: echo
      toolOptions:
        query: "@query"
    - type: step
      agent: writer
      input: "Summarize {{previous_output}}"
inputs:
  - name: query
    type: shortText
"#
}

/// Registry holding one mock provider, which is also the default
pub fn registry_with(provider: MockProvider) -> (Arc<ProviderRegistry>, Arc<MockProvider>) {
    let provider = Arc::new(provider);
    let registry = ProviderRegistry::new();
    registry.register(Arc::clone(&provider) as Arc<dyn agentflow::provider::LlmProvider>);
    (Arc::new(registry), provider)
}

/// Executor over a mock provider and the built-in tools
pub fn executor_with(provider: MockProvider) -> (FlowExecutor, Arc<MockProvider>) {
    let (registry, mock) = registry_with(provider);
    let executor = FlowExecutor::new(registry).with_tools(Arc::new(ToolRegistry::with_builtins()));
    (executor, mock)
}

/// Sink that records every event it sees
pub fn recording_sink() -> (EventSink, Arc<Mutex<Vec<Event>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);
    let sink: EventSink = Arc::new(move |event: &Event| captured.lock().push(event.clone()));
    (sink, seen)
}

/// Wire names of `events`, in order
pub fn type_names(events: &[Event]) -> Vec<&'static str> {
    events.iter().map(|e| e.kind.type_name()).collect()
}
