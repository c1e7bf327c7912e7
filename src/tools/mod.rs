//! Tool Module - callable capabilities for `toolAgent` nodes
//!
//! - [`Tool`] - async trait implemented by every tool
//! - [`ToolRegistry`] - explicit name → tool map handed to the executor
//! - [`EchoTool`] - built-in tool returning its options, used by the CLI and tests

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{json, Value};

use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════
// TOOL TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// A tool a flow can invoke by name
///
/// Failures should be reported as `FlowError::ToolExecution`; the executor
/// wraps anything else it receives the same way.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry key (e.g. "echo", "search")
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Execute with the node's (interpolated) `toolOptions`
    async fn execute(&self, args: Value) -> Result<Value>;
}

// ═══════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct ToolRegistry {
    tools: DashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in tools
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(EchoTool));
        registry
    }

    /// Register under `tool.name()`, replacing any previous entry
    pub fn register(&self, tool: Arc<dyn Tool>) {
        tracing::debug!(tool = %tool.name(), "Registered tool");
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| Arc::clone(t.value()))
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BUILT-IN TOOLS
// ═══════════════════════════════════════════════════════════════════════════

/// Returns `{"echo": <args>}`
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the tool options unchanged"
    }

    async fn execute(&self, args: Value) -> Result<Value> {
        Ok(json!({ "echo": args }))
    }
}
