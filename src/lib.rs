//! agentflow - agent-flow execution engine
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  ast/       Step Tree, runtime nodes, Flow definitions       │
//! │  convert    Step Tree ⇄ runtime node conversion              │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  binding/   @name injection, {{name}} interpolation, inputs  │
//! │  expr/      Sandboxed condition expressions                  │
//! │  runtime/   FlowExecutor and per-tag node handlers           │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  event/       Event log, sinks, NDJSON traces                │
//! │  provider/    LlmProvider trait, registry, mock              │
//! │  tools/       Tool trait and registry                        │
//! │  resilience/  Retry policy and retrying provider             │
//! │  config       EngineConfig (TOML + env)                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`ast`] | `Step`, `RuntimeNode`, `AgentTag`, `Flow`, input declarations |
//! | [`convert`] | `to_runtime` / `from_runtime` |
//! | [`binding`] | Variable binding engine and input schema validation |
//! | [`expr`] | `evaluate_condition` / `evaluate_expression` |
//! | [`runtime`] | Flow execution with tokio concurrency |
//! | [`event`] | Ordered execution events |
//! | [`provider`] | Language-model collaborator abstraction |
//! | [`tools`] | Tool collaborator abstraction |
//! | [`resilience`] | Opt-in retry around providers |
//! | [`config`] | Engine limits and defaults |
//! | [`error`] | Error types with codes and fix suggestions |
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use agentflow::{Flow, FlowExecutor, Step};
//! use agentflow::provider::{MockProvider, ProviderRegistry};
//!
//! # async fn demo() -> agentflow::Result<()> {
//! let providers = ProviderRegistry::new();
//! providers.register(Arc::new(MockProvider::new()));
//!
//! let flow = Flow::new(
//!     "greet",
//!     Step::sequence(vec![Step::step("writer", "Say hi"), Step::step("editor", "Polish {{previous_output}}")]),
//! );
//! let result = FlowExecutor::new(Arc::new(providers))
//!     .execute(&flow, serde_json::Value::Null, None)
//!     .await?;
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL
// ═══════════════════════════════════════════════════════════════
pub mod ast;
pub mod convert;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER
// ═══════════════════════════════════════════════════════════════
pub mod binding;
pub mod expr;
pub mod runtime;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod event;
pub mod provider;
pub mod resilience;
pub mod tools;

pub mod error;

pub use ast::{AgentDefinition, AgentTag, Flow, InputVariable, RuntimeNode, Step, VariableType};
pub use config::EngineConfig;
pub use convert::{from_runtime, to_runtime};
pub use error::{FixSuggestion, FlowError, Result};
pub use event::{Event, EventKind, EventLog, EventSink};
pub use runtime::{FlowExecutionResult, FlowExecutor};
