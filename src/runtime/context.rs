//! Execution context - everything a node evaluation can see
//!
//! Shared, read-mostly collaborators sit behind `Arc`; the variable map is
//! owned by the run. Concurrent children get their own scope via [`ExecutionContext::fork`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::ast::{AgentDefinition, Flow};
use crate::binding::{lookup, Variables};
use crate::config::EngineConfig;
use crate::error::{FlowError, Result};
use crate::event::{EventKind, EventLog};
use crate::provider::ProviderRegistry;
use crate::tools::ToolRegistry;

/// Flows callable as sub-flows, keyed by flow code
#[derive(Debug, Default)]
pub struct FlowCatalog {
    flows: DashMap<String, Arc<Flow>>,
}

impl FlowCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, flow: Flow) {
        self.flows.insert(flow.code.clone(), Arc::new(flow));
    }

    pub fn get(&self, code: &str) -> Option<Arc<Flow>> {
        self.flows.get(code).map(|f| Arc::clone(f.value()))
    }

    pub fn has(&self, code: &str) -> bool {
        self.flows.contains_key(code)
    }

    /// Registered flow codes, sorted
    pub fn list(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.flows.iter().map(|e| e.key().clone()).collect();
        codes.sort();
        codes
    }
}

/// What a `Step(name)` node resolves to
#[derive(Debug, Clone)]
pub enum AgentTarget {
    Agent(AgentDefinition),
    Subflow(Arc<Flow>),
}

#[derive(Clone)]
pub struct ExecutionContext {
    pub flow: Arc<Flow>,
    pub config: Arc<EngineConfig>,
    pub providers: Arc<ProviderRegistry>,
    pub tools: Option<Arc<ToolRegistry>>,
    pub flows: Arc<FlowCatalog>,
    /// Run-owned bindings (forks hold a copy)
    pub variables: Variables,
    pub depth: usize,
    pub cancel: CancellationToken,
    pub events: EventLog,
    steps: Arc<AtomicUsize>,
}

impl ExecutionContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        flow: Arc<Flow>,
        config: Arc<EngineConfig>,
        providers: Arc<ProviderRegistry>,
        tools: Option<Arc<ToolRegistry>>,
        flows: Arc<FlowCatalog>,
        variables: Variables,
        cancel: CancellationToken,
        events: EventLog,
    ) -> Self {
        Self {
            flow,
            config,
            providers,
            tools,
            flows,
            variables,
            depth: 0,
            cancel,
            events,
            steps: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Copy of this scope for a concurrent child, cancelled through `cancel`
    pub fn fork(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    /// Scope for a sub-flow one level deeper; fails fatally past `max_depth`
    pub fn enter_subflow(&self, flow: Arc<Flow>, variables: Variables) -> Result<Self> {
        let depth = self.depth + 1;
        if depth > self.config.max_depth {
            return Err(FlowError::MaxDepthExceeded {
                depth,
                max_depth: self.config.max_depth,
            });
        }
        Ok(Self {
            flow,
            variables,
            depth,
            ..self.clone()
        })
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.variables, path)
    }

    pub fn emit(&self, kind: EventKind) -> u64 {
        self.events.emit(kind)
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        Ok(())
    }

    pub(crate) fn count_step(&self) {
        self.steps.fetch_add(1, Ordering::Relaxed);
    }

    /// Leaf work nodes completed so far across the whole run
    pub fn steps(&self) -> usize {
        self.steps.load(Ordering::Relaxed)
    }

    /// Roster first, then the sub-flow catalog; without a roster any name is
    /// a default agent
    pub fn resolve_agent(&self, name: &str) -> Result<AgentTarget> {
        if let Some(agent) = self.flow.agent(name) {
            return Ok(AgentTarget::Agent(agent.clone()));
        }
        if let Some(flow) = self.flows.get(name) {
            return Ok(AgentTarget::Subflow(flow));
        }
        if !self.flow.has_roster() {
            return Ok(AgentTarget::Agent(AgentDefinition::new(name)));
        }
        Err(FlowError::UnknownAgent {
            agent: name.to_string(),
            flow_code: self.flow.code.clone(),
        })
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("flow", &self.flow.code)
            .field("variables", &self.variables)
            .field("depth", &self.depth)
            .field("steps", &self.steps())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Step;
    use serde_json::json;

    fn ctx(flow: Flow) -> ExecutionContext {
        ExecutionContext::new(
            Arc::new(flow),
            Arc::new(EngineConfig::default().with_max_depth(1)),
            Arc::new(ProviderRegistry::new()),
            None,
            Arc::new(FlowCatalog::new()),
            Variables::new(),
            CancellationToken::new(),
            EventLog::new(),
        )
    }

    #[test]
    fn fork_copies_scope_and_shares_counter() {
        let mut parent = ctx(Flow::new("f", Step::step("a", "x")));
        parent.bind("x", json!(1));
        let mut child = parent.fork(parent.cancel.child_token());
        child.bind("y", json!(2));
        child.count_step();

        assert!(parent.get("y").is_none());
        assert_eq!(child.get("x"), Some(&json!(1)));
        assert_eq!(parent.steps(), 1);
    }

    #[test]
    fn subflow_depth_is_bounded() {
        let parent = ctx(Flow::new("f", Step::step("a", "x")));
        let sub = Arc::new(Flow::new("g", Step::step("b", "y")));
        let child = parent.enter_subflow(sub.clone(), Variables::new()).unwrap();
        assert_eq!(child.depth, 1);
        let err = child.enter_subflow(sub, Variables::new()).unwrap_err();
        assert!(matches!(
            err,
            FlowError::MaxDepthExceeded {
                depth: 2,
                max_depth: 1
            }
        ));
    }

    #[test]
    fn resolve_agent_prefers_roster_then_catalog() {
        let flow = Flow::new("f", Step::step("writer", "x"))
            .with_agents(vec![AgentDefinition::new("writer")]);
        let context = ctx(flow);
        context
            .flows
            .register(Flow::new("summarize", Step::step("s", "x")));

        assert!(matches!(
            context.resolve_agent("writer"),
            Ok(AgentTarget::Agent(_))
        ));
        assert!(matches!(
            context.resolve_agent("summarize"),
            Ok(AgentTarget::Subflow(_))
        ));
        assert!(matches!(
            context.resolve_agent("ghost"),
            Err(FlowError::UnknownAgent { .. })
        ));
    }

    #[test]
    fn cancelled_context_is_inactive() {
        let context = ctx(Flow::new("f", Step::step("a", "x")));
        assert!(context.ensure_active().is_ok());
        context.cancel.cancel();
        assert!(matches!(context.ensure_active(), Err(FlowError::Cancelled)));
    }
}
