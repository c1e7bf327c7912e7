//! Flow execution result

use serde_json::{json, Value};

use crate::binding::Variables;
use crate::error::{FlowError, Result};
use crate::event::Event;

/// Outcome of one flow run
///
/// Node failures land here with `success = false`; only pre-execution
/// validation makes `FlowExecutor::execute` return `Err`.
#[derive(Debug)]
pub struct FlowExecutionResult {
    pub run_id: String,
    pub success: bool,
    pub output: Value,
    /// Final bindings of the root scope
    pub variables: Variables,
    /// Completed leaf work nodes (LLM steps, tools, UI components)
    pub steps: usize,
    pub events: Vec<Event>,
    pub error: Option<FlowError>,
    pub duration_ms: u64,
}

impl FlowExecutionResult {
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Output on success, the attached error otherwise
    pub fn into_result(self) -> Result<Value> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.output),
        }
    }

    /// JSON summary for the CLI and traces
    pub fn summary(&self) -> Value {
        json!({
            "run_id": self.run_id,
            "success": self.success,
            "output": self.output,
            "steps": self.steps,
            "events": self.events.len(),
            "duration_ms": self.duration_ms,
            "error": self.error.as_ref().map(|e| e.to_string()),
        })
    }
}
