//! Runtime Module - flow execution
//!
//! - `executor`: [`FlowExecutor`] and the per-tag node handlers
//! - `context`: [`ExecutionContext`] (run-owned scope + shared collaborators)
//!   and the sub-flow [`FlowCatalog`]
//! - `judge`: prompts and reply parsing for optimize / bestOfAll
//! - `result`: [`FlowExecutionResult`]
//!
//! This module represents the "how" - runtime execution.
//! For static structure, see the `ast` module.

mod context;
mod executor;
mod judge;
mod result;

pub use context::{AgentTarget, ExecutionContext, FlowCatalog};
pub use executor::{
    resolve_value, FlowExecutor, FEEDBACK, ITERATION, PREVIOUS_OUTPUT, PREVIOUS_RESULT,
};
pub use judge::{Choice, Verdict};
pub use result::FlowExecutionResult;
