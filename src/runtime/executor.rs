//! Flow Executor - async interpreter over runtime nodes
//!
//! `execute` validates everything up front (flow, input, node shapes, agent
//! names), injects `@name` bindings, then walks the tree:
//!
//! ```text
//! flow-start ──► run_node(root) ──► flow-complete
//!                     │                  │
//!                     └── node error ──► flow-error (result.success = false)
//! ```
//!
//! Dispatch is an exhaustive `match` on [`AgentTag`]. A node failure emits
//! `step-error`, is wrapped once with the failing step id, and travels up
//! unchanged. Nothing here retries.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::context::{AgentTarget, ExecutionContext, FlowCatalog};
use super::judge;
use super::result::FlowExecutionResult;
use crate::ast::{
    AgentDefinition, AgentTag, Flow, RuntimeInput, RuntimeNode, ToolPayload, UiPayload,
};
use crate::binding::{
    bindings_from_input, inject_variables, interpolate, interpolate_value, lookup,
    parse_input_value, validate_flow_input, Variables,
};
use crate::config::EngineConfig;
use crate::convert::to_runtime;
use crate::error::{FlowError, Result};
use crate::event::{EventKind, EventLog, EventSink};
use crate::expr::evaluate_condition;
use crate::provider::{collect_stream, GenerateRequest, GenerateResponse, ProviderRegistry};
use crate::tools::ToolRegistry;

/// Output of the previous child in a sequence or loop
pub const PREVIOUS_OUTPUT: &str = "previous_output";
/// Last unsatisfying result inside an `optimizeAgent`
pub const PREVIOUS_RESULT: &str = "previous_result";
/// Judge feedback inside an `optimizeAgent`
pub const FEEDBACK: &str = "feedback";
/// Completed iterations inside a `loopAgent`
pub const ITERATION: &str = "iteration";

const JUDGE_AGENT: &str = "judge";

pub struct FlowExecutor {
    config: Arc<EngineConfig>,
    providers: Arc<ProviderRegistry>,
    tools: Option<Arc<ToolRegistry>>,
    flows: Arc<FlowCatalog>,
}

impl FlowExecutor {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self {
            config: Arc::new(EngineConfig::default()),
            providers,
            tools: None,
            flows: Arc::new(FlowCatalog::new()),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Make `flow` callable as a sub-flow by its code
    pub fn with_flow(self, flow: Flow) -> Self {
        self.flows.register(flow);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn flows(&self) -> &FlowCatalog {
        &self.flows
    }

    /// Run a flow definition
    ///
    /// `Err` only for pre-execution validation; node failures come back as
    /// `FlowExecutionResult { success: false, error: Some(..) }`.
    pub async fn execute(
        &self,
        flow: &Flow,
        input: Value,
        sink: Option<EventSink>,
    ) -> Result<FlowExecutionResult> {
        self.execute_with_cancel(flow, input, sink, CancellationToken::new())
            .await
    }

    /// [`FlowExecutor::execute`] with a caller-owned cancellation token
    #[instrument(skip_all, fields(flow = %flow.code))]
    pub async fn execute_with_cancel(
        &self,
        flow: &Flow,
        input: Value,
        sink: Option<EventSink>,
        cancel: CancellationToken,
    ) -> Result<FlowExecutionResult> {
        flow.validate()?;
        let root = to_runtime(flow.require_steps()?);
        self.run_prepared(flow, root, input, sink, cancel).await
    }

    /// Run an imported runtime tree against `flow`'s inputs and roster
    #[instrument(skip_all, fields(flow = %flow.code))]
    pub async fn execute_runtime(
        &self,
        flow: &Flow,
        root: RuntimeNode,
        input: Value,
        sink: Option<EventSink>,
    ) -> Result<FlowExecutionResult> {
        self.run_prepared(flow, root, input, sink, CancellationToken::new())
            .await
    }

    async fn run_prepared(
        &self,
        flow: &Flow,
        mut root: RuntimeNode,
        input: Value,
        sink: Option<EventSink>,
        cancel: CancellationToken,
    ) -> Result<FlowExecutionResult> {
        let input = match input {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        validate_flow_input(&input, &flow.inputs).into_result()?;
        root.validate()?;
        check_agents(flow, &self.flows, &root)?;

        inject_variables(&mut root, &bindings_from_input(&input));
        let variables = variables_from_input(&input);

        Ok(self.run(flow, &root, variables, sink, cancel).await)
    }

    async fn run(
        &self,
        flow: &Flow,
        root: &RuntimeNode,
        variables: Variables,
        sink: Option<EventSink>,
        cancel: CancellationToken,
    ) -> FlowExecutionResult {
        let events = match sink {
            Some(sink) => EventLog::with_sink(sink),
            None => EventLog::new(),
        };
        let mut ctx = ExecutionContext::new(
            Arc::new(flow.clone()),
            Arc::clone(&self.config),
            Arc::clone(&self.providers),
            self.tools.clone(),
            Arc::clone(&self.flows),
            variables,
            cancel,
            events,
        );

        let run_id = Uuid::new_v4().to_string();
        let node_count = root.count_nodes();
        ctx.emit(EventKind::FlowStart {
            flow_code: flow.code.clone(),
            run_id: run_id.clone(),
            node_count,
        });
        info!(run_id = %run_id, nodes = node_count, "Flow started");

        let start = Instant::now();
        let outcome = run_node(root, &mut ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let steps = ctx.steps();

        let (success, output, error) = match outcome {
            Ok(output) => {
                ctx.emit(EventKind::FlowComplete {
                    flow_code: flow.code.clone(),
                    output: output.clone(),
                    steps,
                    duration_ms,
                });
                info!(steps, duration_ms, "Flow completed");
                (true, output, None)
            }
            Err(err) => {
                ctx.emit(EventKind::FlowError {
                    flow_code: flow.code.clone(),
                    error: err.to_string(),
                    step_id: err.step_id().map(Arc::from),
                });
                warn!(error = %err, "Flow failed");
                (false, Value::Null, Some(err))
            }
        };

        FlowExecutionResult {
            run_id,
            success,
            output,
            variables: ctx.variables,
            steps,
            events: ctx.events.events(),
            error,
            duration_ms,
        }
    }
}

impl std::fmt::Debug for FlowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowExecutor")
            .field("config", &self.config)
            .field("providers", &self.providers)
            .field("tools", &self.tools)
            .field("flows", &self.flows.list())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PRE-EXECUTION CHECKS
// ═══════════════════════════════════════════════════════════════════════════

/// Every step must name a roster agent, a catalogued flow, or (without a
/// roster) any agent; `fooAgent` names that are neither are unknown tags.
fn check_agents(flow: &Flow, flows: &FlowCatalog, node: &RuntimeNode) -> Result<()> {
    if let AgentTag::Step(name) = &node.agent {
        if flow.agent(name).is_none() && !flows.has(name) {
            if node.agent.looks_like_tag() {
                return Err(FlowError::UnknownNodeTag { tag: name.clone() });
            }
            if flow.has_roster() {
                return Err(FlowError::UnknownAgent {
                    agent: name.clone(),
                    flow_code: flow.code.clone(),
                });
            }
        }
    }
    node.children()
        .into_iter()
        .try_for_each(|child| check_agents(flow, flows, child))
}

fn variables_from_input(input: &Value) -> Variables {
    match input {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => Variables::new(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// NODE EVALUATION
// ═══════════════════════════════════════════════════════════════════════════

/// Evaluate one node with `step-start` / `step-complete` / `step-error` framing
pub(crate) fn run_node<'a>(
    node: &'a RuntimeNode,
    ctx: &'a mut ExecutionContext,
) -> BoxFuture<'a, Result<Value>> {
    async move {
        ctx.ensure_active()?;

        let step_id: Arc<str> = Arc::from(node.id.as_str());
        ctx.emit(EventKind::StepStart {
            step_id: Arc::clone(&step_id),
            agent: node.agent.to_string(),
            name: node.display_name().to_string(),
        });
        debug!(step = %node.id, agent = %node.agent, "Step started");

        let start = Instant::now();
        let outcome = dispatch(node, &step_id, ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) => {
                ctx.emit(EventKind::StepComplete {
                    step_id,
                    output: output.clone(),
                    duration_ms,
                });
                Ok(output)
            }
            Err(err) => {
                debug!(step = %node.id, error = %err, "Step failed");
                ctx.emit(EventKind::StepError {
                    step_id,
                    error: err.to_string(),
                    duration_ms,
                });
                Err(err.at_step(&ctx.flow.code, &node.id))
            }
        }
    }
    .boxed()
}

async fn dispatch(
    node: &RuntimeNode,
    step_id: &Arc<str>,
    ctx: &mut ExecutionContext,
) -> Result<Value> {
    match &node.agent {
        AgentTag::Sequence => run_sequence(node, ctx).await,
        AgentTag::Parallel => run_parallel(node, ctx).await,
        AgentTag::OneOf => run_one_of(node, step_id, ctx).await,
        AgentTag::ForEach => run_for_each(node, step_id, ctx).await,
        AgentTag::Optimize => run_optimize(node, step_id, ctx).await,
        AgentTag::BestOfAll => run_best_of_all(node, step_id, ctx).await,
        AgentTag::Tool => run_tool(node, step_id, ctx).await,
        AgentTag::UiComponent => run_ui_component(node, step_id, ctx),
        AgentTag::Loop => run_loop(node, step_id, ctx).await,
        AgentTag::Step(name) => run_agent_step(node, name, step_id, ctx).await,
    }
}

async fn run_sequence(node: &RuntimeNode, ctx: &mut ExecutionContext) -> Result<Value> {
    let mut last = Value::Null;
    for child in node.children() {
        let output = run_node(child, ctx).await?;
        ctx.bind(PREVIOUS_OUTPUT, output.clone());
        if child.has_custom_name() {
            ctx.bind(child.display_name(), output.clone());
        }
        last = output;
    }
    Ok(last)
}

async fn run_parallel(node: &RuntimeNode, ctx: &mut ExecutionContext) -> Result<Value> {
    let base = ctx.variables.clone();
    let (outputs, scopes) = run_concurrently(&node.children(), ctx).await?;
    for scope in scopes {
        merge_scope(ctx, &base, scope);
    }
    Ok(Value::Array(outputs))
}

/// Run children on forked scopes; outputs keep declaration order
///
/// The first failure cancels the group token so in-flight siblings stop.
async fn run_concurrently(
    children: &[&RuntimeNode],
    ctx: &ExecutionContext,
) -> Result<(Vec<Value>, Vec<ExecutionContext>)> {
    let group = ctx.cancel.child_token();
    let mut scopes: Vec<ExecutionContext> =
        children.iter().map(|_| ctx.fork(group.clone())).collect();

    let outcome = try_join_all(
        children
            .iter()
            .zip(scopes.iter_mut())
            .map(|(child, scope)| run_node(child, scope)),
    )
    .await;

    match outcome {
        Ok(outputs) => Ok((outputs, scopes)),
        Err(err) => {
            group.cancel();
            Err(err)
        }
    }
}

/// Copy bindings a child scope changed relative to `base`
fn merge_scope(ctx: &mut ExecutionContext, base: &Variables, scope: ExecutionContext) {
    for (name, value) in scope.variables {
        if base.get(&name) != Some(&value) {
            ctx.variables.insert(name, value);
        }
    }
}

async fn run_one_of(
    node: &RuntimeNode,
    step_id: &Arc<str>,
    ctx: &mut ExecutionContext,
) -> Result<Value> {
    let conditions = node.conditions.as_deref().unwrap_or_default();
    for (index, (condition, branch)) in conditions.iter().zip(node.children()).enumerate() {
        let result = evaluate_condition(condition, &ctx.variables)?;
        ctx.emit(EventKind::ConditionEvaluated {
            step_id: Arc::clone(step_id),
            condition: condition.clone(),
            result,
        });
        if result {
            ctx.emit(EventKind::BranchSelected {
                step_id: Arc::clone(step_id),
                index: Some(index),
            });
            return run_node(branch, ctx).await;
        }
    }

    ctx.emit(EventKind::BranchSelected {
        step_id: Arc::clone(step_id),
        index: None,
    });
    Ok(Value::Null)
}

async fn run_for_each(
    node: &RuntimeNode,
    step_id: &Arc<str>,
    ctx: &mut ExecutionContext,
) -> Result<Value> {
    let child = nested(node)?;
    let item = node.item.as_deref().unwrap_or_default().trim();
    let (var, source) = match item.split_once(" in ") {
        Some((var, source)) => (var.trim(), source.trim()),
        None => (item, item),
    };
    let var = reference_path(var).unwrap_or(var);

    let collection = match lookup(&ctx.variables, reference_path(source).unwrap_or(source)) {
        Some(value) if !value.is_null() => value.clone(),
        _ => {
            return Err(FlowError::UnknownVariable {
                name: source.to_string(),
            })
        }
    };

    let saved = ctx.variables.get(var).cloned();
    let mut outputs = Vec::new();
    let mut failure = None;
    for (index, element) in into_elements(collection).into_iter().enumerate() {
        ctx.emit(EventKind::IterationStart {
            step_id: Arc::clone(step_id),
            iteration: index as u32,
            item: Some(element.clone()),
        });
        ctx.bind(var, element);
        match run_node(child, ctx).await {
            Ok(output) => outputs.push(output),
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    match saved {
        Some(previous) => ctx.bind(var, previous),
        None => {
            ctx.variables.shift_remove(var);
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(Value::Array(outputs)),
    }
}

/// Arrays iterate; a string holding a JSON array is parsed; anything else is one element
fn into_elements(collection: Value) -> Vec<Value> {
    match collection {
        Value::Array(items) => items,
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(items)) => items,
            _ => vec![Value::String(text)],
        },
        other => vec![other],
    }
}

async fn run_optimize(
    node: &RuntimeNode,
    step_id: &Arc<str>,
    ctx: &mut ExecutionContext,
) -> Result<Value> {
    let child = nested(node)?;
    let criteria = interpolate(node.criteria.as_deref().unwrap_or_default(), &ctx.variables)
        .into_owned();
    let max_iterations = node
        .max_iterations
        .unwrap_or(ctx.config.max_iterations)
        .max(1);

    let mut last = Value::Null;
    for iteration in 0..max_iterations {
        ctx.emit(EventKind::IterationStart {
            step_id: Arc::clone(step_id),
            iteration,
            item: None,
        });
        last = run_node(child, ctx).await?;

        let prompt = judge::evaluation_prompt(&criteria, &last);
        let reply = call_judge(ctx, step_id, prompt).await?;
        let verdict = judge::parse_verdict(&reply)?;
        ctx.emit(EventKind::Evaluation {
            step_id: Arc::clone(step_id),
            iteration,
            satisfied: verdict.satisfied,
            feedback: verdict.feedback.clone(),
        });
        if verdict.satisfied {
            return Ok(last);
        }

        ctx.bind(PREVIOUS_RESULT, last.clone());
        ctx.bind(FEEDBACK, Value::String(verdict.feedback));
    }

    debug!(step = %node.id, max_iterations, "Optimize cap reached, keeping last result");
    Ok(last)
}

async fn run_best_of_all(
    node: &RuntimeNode,
    step_id: &Arc<str>,
    ctx: &mut ExecutionContext,
) -> Result<Value> {
    let criteria = interpolate(node.criteria.as_deref().unwrap_or_default(), &ctx.variables)
        .into_owned();
    let base = ctx.variables.clone();
    let (candidates, scopes) = run_concurrently(&node.children(), ctx).await?;
    if candidates.is_empty() {
        return Ok(Value::Null);
    }

    let choice = if candidates.len() == 1 {
        judge::Choice {
            winner: 0,
            reason: "single candidate".to_string(),
        }
    } else {
        let prompt = judge::selection_prompt(&criteria, &candidates);
        let reply = call_judge(ctx, step_id, prompt).await?;
        judge::parse_choice(&reply, candidates.len())?
    };

    ctx.emit(EventKind::CandidateSelected {
        step_id: Arc::clone(step_id),
        winner: choice.winner,
        reason: choice.reason,
    });

    if let Some(scope) = scopes.into_iter().nth(choice.winner) {
        merge_scope(ctx, &base, scope);
    }
    Ok(candidates
        .into_iter()
        .nth(choice.winner)
        .unwrap_or(Value::Null))
}

async fn run_tool(
    node: &RuntimeNode,
    step_id: &Arc<str>,
    ctx: &mut ExecutionContext,
) -> Result<Value> {
    let payload = ToolPayload::parse(text(node)?)?;
    let tool_name = payload.tool_name;
    let args = interpolate_value(&payload.tool_options, &ctx.variables);

    let tool = ctx
        .tools
        .as_ref()
        .and_then(|registry| registry.get(&tool_name))
        .ok_or_else(|| FlowError::ToolNotFound {
            tool: tool_name.clone(),
        })?;

    ctx.emit(EventKind::ToolCall {
        step_id: Arc::clone(step_id),
        tool: tool_name.clone(),
        args: args.clone(),
    });
    let result = guarded(ctx, &tool_name, tool.execute(args))
        .await
        .map_err(|err| tool_failure(&tool_name, err))?;
    ctx.emit(EventKind::ToolResult {
        step_id: Arc::clone(step_id),
        tool: tool_name,
        result: result.clone(),
    });

    ctx.count_step();
    Ok(result)
}

fn tool_failure(tool: &str, err: FlowError) -> FlowError {
    match err {
        FlowError::ToolExecution { .. } | FlowError::Timeout { .. } => err,
        err if err.is_fatal() => err,
        other => FlowError::ToolExecution {
            tool: tool.to_string(),
            reason: other.to_string(),
        },
    }
}

fn run_ui_component(
    node: &RuntimeNode,
    step_id: &Arc<str>,
    ctx: &mut ExecutionContext,
) -> Result<Value> {
    let payload = UiPayload::parse(text(node)?)?;
    let props = interpolate_value(&payload.props, &ctx.variables);

    ctx.emit(EventKind::UiComponent {
        step_id: Arc::clone(step_id),
        component: payload.component_name.clone(),
        props: props.clone(),
    });

    ctx.count_step();
    Ok(json!({ "component": payload.component_name, "props": props }))
}

async fn run_loop(
    node: &RuntimeNode,
    step_id: &Arc<str>,
    ctx: &mut ExecutionContext,
) -> Result<Value> {
    let child = nested(node)?;
    let condition = node
        .conditions
        .as_deref()
        .and_then(|c| c.first())
        .ok_or_else(|| malformed(node, "loop needs a condition"))?;
    let max_iterations = node.max_iterations.unwrap_or(ctx.config.max_iterations);

    let mut outputs = Vec::new();
    for iteration in 0..max_iterations {
        ctx.bind(ITERATION, json!(iteration));
        let holds = evaluate_condition(condition, &ctx.variables)?;
        ctx.emit(EventKind::ConditionEvaluated {
            step_id: Arc::clone(step_id),
            condition: condition.clone(),
            result: holds,
        });
        if !holds {
            break;
        }

        ctx.emit(EventKind::IterationStart {
            step_id: Arc::clone(step_id),
            iteration,
            item: None,
        });
        let output = run_node(child, ctx).await?;
        ctx.bind(PREVIOUS_OUTPUT, output.clone());
        outputs.push(output);
    }
    ctx.bind(ITERATION, json!(outputs.len()));

    Ok(Value::Array(outputs))
}

// ═══════════════════════════════════════════════════════════════════════════
// LLM STEPS AND SUB-FLOWS
// ═══════════════════════════════════════════════════════════════════════════

async fn run_agent_step(
    node: &RuntimeNode,
    name: &str,
    step_id: &Arc<str>,
    ctx: &mut ExecutionContext,
) -> Result<Value> {
    let prompt = interpolate(text(node)?, &ctx.variables).into_owned();
    match ctx.resolve_agent(name)? {
        AgentTarget::Agent(agent) => {
            let response = call_model(ctx, step_id, &agent, prompt).await?;
            ctx.count_step();
            Ok(Value::String(response.text))
        }
        AgentTarget::Subflow(flow) => run_subflow(flow, &prompt, step_id, ctx).await,
    }
}

/// Run a catalogued flow one level deeper, in its own variable scope
async fn run_subflow(
    flow: Arc<Flow>,
    input_text: &str,
    step_id: &Arc<str>,
    ctx: &mut ExecutionContext,
) -> Result<Value> {
    let mut scope = ctx.enter_subflow(Arc::clone(&flow), Variables::new())?;
    ctx.emit(EventKind::SubflowStart {
        step_id: Arc::clone(step_id),
        flow_code: flow.code.clone(),
        depth: scope.depth,
    });
    debug!(flow = %flow.code, depth = scope.depth, "Entering sub-flow");

    let input = subflow_input(&flow, input_text);
    validate_flow_input(&input, &flow.inputs).into_result()?;
    flow.validate()?;
    let mut root = to_runtime(flow.require_steps()?);
    check_agents(&flow, &ctx.flows, &root)?;
    inject_variables(&mut root, &bindings_from_input(&input));
    scope.variables = variables_from_input(&input);

    run_node(&root, &mut scope).await
}

/// A JSON object is the input itself; otherwise the text feeds the single
/// declared input, or `input` when there are several
fn subflow_input(flow: &Flow, text: &str) -> Value {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(text) {
        return value;
    }
    match flow.inputs.as_slice() {
        [only] => json!({ only.name.clone(): parse_input_value(text, Some(only.var_type)) }),
        _ => json!({ "input": text }),
    }
}

async fn call_judge(ctx: &ExecutionContext, step_id: &Arc<str>, prompt: String) -> Result<String> {
    let judge = AgentDefinition::new(JUDGE_AGENT);
    Ok(call_model(ctx, step_id, &judge, prompt).await?.text)
}

async fn call_model(
    ctx: &ExecutionContext,
    step_id: &Arc<str>,
    agent: &AgentDefinition,
    prompt: String,
) -> Result<GenerateResponse> {
    let provider = ctx.providers.resolve(
        agent
            .provider
            .as_deref()
            .or(ctx.config.default_provider.as_deref()),
    )?;
    let model = agent
        .model
        .clone()
        .or_else(|| ctx.config.default_model.clone())
        .unwrap_or_else(|| provider.default_model().to_string());

    let mut request = GenerateRequest::new(&model, prompt)
        .with_temperature(agent.temperature)
        .with_max_tokens(agent.max_tokens)
        .with_tools(agent.tools.clone());
    if let Some(system) = &agent.system_prompt {
        request = request.with_system(interpolate(system, &ctx.variables).into_owned());
    }

    ctx.emit(EventKind::ProviderCall {
        step_id: Arc::clone(step_id),
        provider: provider.name().to_string(),
        model: model.clone(),
        prompt_len: request.prompt_len(),
    });

    let response = if agent.stream && provider.supports_streaming(&model) {
        let events = ctx.events.clone();
        let delta_step = Arc::clone(step_id);
        let streamed = async {
            let stream = provider.generate_stream(request).await?;
            let response = collect_stream(stream, |delta| {
                events.emit(EventKind::TextDelta {
                    step_id: Arc::clone(&delta_step),
                    delta: delta.to_string(),
                });
            })
            .await?;
            Ok::<_, FlowError>(response)
        };
        guarded(ctx, provider.name(), streamed).await?
    } else {
        guarded(ctx, provider.name(), provider.generate(request)).await?
    };

    ctx.emit(EventKind::ProviderResponse {
        step_id: Arc::clone(step_id),
        text: response.text.clone(),
        input_tokens: response.usage.input_tokens,
        output_tokens: response.usage.output_tokens,
        finish_reason: response.finish_reason.as_str().to_string(),
    });
    Ok(response)
}

/// Race a collaborator call against cancellation and the configured timeout
async fn guarded<T>(
    ctx: &ExecutionContext,
    operation: &str,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    let timed = async {
        match ctx.config.call_timeout() {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(FlowError::Timeout {
                    operation: operation.to_string(),
                    duration_ms: limit.as_millis() as u64,
                }),
            },
            None => call.await,
        }
    };

    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => Err(FlowError::Cancelled),
        result = timed => result,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// VALUE RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════

/// `@name`, `$name` or `{{name}}` (dotted paths allowed) → bound path
fn reference_path(reference: &str) -> Option<&str> {
    let reference = reference.trim();
    if let Some(path) = reference
        .strip_prefix('@')
        .or_else(|| reference.strip_prefix('$'))
    {
        return Some(path);
    }
    reference
        .strip_prefix("{{")
        .and_then(|r| r.strip_suffix("}}"))
        .map(str::trim)
}

/// Bound value for a variable reference, the literal itself otherwise
pub fn resolve_value(reference: &str, variables: &Variables) -> Value {
    reference_path(reference)
        .and_then(|path| lookup(variables, path))
        .cloned()
        .unwrap_or_else(|| Value::String(reference.to_string()))
}

fn nested(node: &RuntimeNode) -> Result<&RuntimeNode> {
    match &node.input {
        RuntimeInput::Node(child) => Ok(child),
        _ => Err(malformed(node, "input must be a nested node")),
    }
}

fn text(node: &RuntimeNode) -> Result<&str> {
    node.input
        .as_text()
        .ok_or_else(|| malformed(node, "input must be a string"))
}

fn malformed(node: &RuntimeNode, reason: &str) -> FlowError {
    FlowError::MalformedNode {
        node_id: node.id.clone(),
        agent: node.agent.to_string(),
        reason: reason.to_string(),
    }
}
