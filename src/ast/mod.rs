//! AST Module - flow definitions and their two tree shapes
//!
//! Contains the typed definitions parsed from flow files:
//! - `step`: Step Tree, the editor-facing workflow tree (`Step`, `StepKind`)
//! - `flow`: Flow, input declarations and the agent roster
//! - `runtime`: flattened runtime nodes consumed by the interpreter
//!
//! These types represent the "what" - static structure.
//! For conversion between the two trees see `convert`; for execution see `runtime`.

mod flow;
mod runtime;
mod step;

// Re-export all public types
pub use flow::{AgentDefinition, Flow, InputVariable, VariableType};
pub use runtime::{AgentTag, RuntimeInput, RuntimeNode, ToolPayload, UiPayload};
pub use step::{Branch, Step, StepKind};
