//! Step Tree ⇄ runtime node conversion
//!
//! `to_runtime` assigns a fresh UUID v4 to every node and names unnamed nodes
//! after their tag. `from_runtime` is the inverse keyed on [`AgentTag`]; a name
//! equal to the tag is dropped again.
//!
//! `condition` has no runtime tag of its own: it becomes a two-branch
//! `oneOfAgent` with conditions `[c, "!(c)"]`, and converts back as `oneOf`.

use uuid::Uuid;

use crate::ast::{
    AgentTag, Branch, RuntimeInput, RuntimeNode, Step, StepKind, ToolPayload, UiPayload,
};
use crate::error::{FlowError, Result};

/// Convert with random ids
pub fn to_runtime(step: &Step) -> RuntimeNode {
    let mut next_id = || Uuid::new_v4().to_string();
    to_runtime_with(step, &mut next_id)
}

/// Convert with caller-supplied ids (called once per node, pre-order)
pub fn to_runtime_with(step: &Step, next_id: &mut dyn FnMut() -> String) -> RuntimeNode {
    let id = next_id();
    let mut node = match &step.kind {
        StepKind::Step { agent, input } => {
            RuntimeNode::new(id, agent.as_str(), RuntimeInput::Text(input.clone()))
        }
        StepKind::Sequence { steps } => {
            RuntimeNode::new(id, AgentTag::Sequence, convert_all(steps, next_id))
        }
        StepKind::Parallel { steps } => {
            RuntimeNode::new(id, AgentTag::Parallel, convert_all(steps, next_id))
        }
        StepKind::BestOfAll { criteria, steps } => {
            let mut node = RuntimeNode::new(id, AgentTag::BestOfAll, convert_all(steps, next_id));
            node.criteria = Some(criteria.clone());
            node
        }
        StepKind::OneOf { branches } => {
            let children = branches
                .iter()
                .map(|b| to_runtime_with(&b.flow, next_id))
                .collect();
            let mut node = RuntimeNode::new(id, AgentTag::OneOf, RuntimeInput::Nodes(children));
            node.conditions = Some(branches.iter().map(|b| b.condition.clone()).collect());
            node
        }
        StepKind::ForEach { item, flow } => {
            let mut node = RuntimeNode::new(id, AgentTag::ForEach, nested(flow, next_id));
            node.item = Some(item.clone());
            node
        }
        StepKind::Evaluator {
            criteria,
            max_iterations,
            flow,
        } => {
            let mut node = RuntimeNode::new(id, AgentTag::Optimize, nested(flow, next_id));
            node.criteria = Some(criteria.clone());
            node.max_iterations = *max_iterations;
            node
        }
        StepKind::Tool {
            tool_name,
            tool_options,
        } => RuntimeNode::new(
            id,
            AgentTag::Tool,
            RuntimeInput::Text(ToolPayload::new(tool_name.clone(), tool_options.clone()).to_input()),
        ),
        StepKind::UiComponent {
            component_name,
            props,
        } => RuntimeNode::new(
            id,
            AgentTag::UiComponent,
            RuntimeInput::Text(UiPayload::new(component_name.clone(), props.clone()).to_input()),
        ),
        StepKind::Condition {
            condition,
            if_true,
            if_false,
        } => {
            let children = vec![
                to_runtime_with(if_true, next_id),
                to_runtime_with(if_false, next_id),
            ];
            let mut node = RuntimeNode::new(id, AgentTag::OneOf, RuntimeInput::Nodes(children));
            node.conditions = Some(vec![condition.clone(), format!("!({})", condition)]);
            node
        }
        StepKind::Loop {
            max_iterations,
            condition,
            flow,
        } => {
            let mut node = RuntimeNode::new(id, AgentTag::Loop, nested(flow, next_id));
            node.conditions = Some(vec![condition.clone()]);
            node.max_iterations = Some(*max_iterations);
            node
        }
    };
    node.name = Some(
        step.name
            .clone()
            .unwrap_or_else(|| node.agent.as_str().to_string()),
    );
    node
}

fn convert_all(steps: &[Step], next_id: &mut dyn FnMut() -> String) -> RuntimeInput {
    RuntimeInput::Nodes(steps.iter().map(|s| to_runtime_with(s, next_id)).collect())
}

fn nested(step: &Step, next_id: &mut dyn FnMut() -> String) -> RuntimeInput {
    RuntimeInput::Node(Box::new(to_runtime_with(step, next_id)))
}

/// Rebuild a Step Tree from a runtime node
pub fn from_runtime(node: &RuntimeNode) -> Result<Step> {
    let kind = match &node.agent {
        AgentTag::Sequence => StepKind::Sequence {
            steps: children(node)?,
        },
        AgentTag::Parallel => StepKind::Parallel {
            steps: children(node)?,
        },
        AgentTag::BestOfAll => StepKind::BestOfAll {
            criteria: criteria(node)?,
            steps: children(node)?,
        },
        AgentTag::OneOf => {
            let steps = children(node)?;
            let conditions = node.conditions.clone().unwrap_or_default();
            if conditions.len() != steps.len() {
                return Err(malformed(node, "conditions and branches differ in length"));
            }
            StepKind::OneOf {
                branches: conditions
                    .into_iter()
                    .zip(steps)
                    .map(|(condition, flow)| Branch { condition, flow })
                    .collect(),
            }
        }
        AgentTag::ForEach => StepKind::ForEach {
            item: node
                .item
                .clone()
                .ok_or_else(|| malformed(node, "missing item"))?,
            flow: Box::new(child(node)?),
        },
        AgentTag::Optimize => StepKind::Evaluator {
            criteria: criteria(node)?,
            max_iterations: node.max_iterations,
            flow: Box::new(child(node)?),
        },
        AgentTag::Loop => {
            let condition = match node.conditions.as_deref() {
                Some([c]) => c.clone(),
                _ => return Err(malformed(node, "loop needs exactly one condition")),
            };
            StepKind::Loop {
                max_iterations: node
                    .max_iterations
                    .ok_or_else(|| malformed(node, "missing max_iterations"))?,
                condition,
                flow: Box::new(child(node)?),
            }
        }
        AgentTag::Tool => {
            let payload =
                ToolPayload::parse(text(node)?).map_err(|e| malformed(node, &e.to_string()))?;
            StepKind::Tool {
                tool_name: payload.tool_name,
                tool_options: payload.tool_options,
            }
        }
        AgentTag::UiComponent => {
            let payload =
                UiPayload::parse(text(node)?).map_err(|e| malformed(node, &e.to_string()))?;
            StepKind::UiComponent {
                component_name: payload.component_name,
                props: payload.props,
            }
        }
        AgentTag::Step(agent) => StepKind::Step {
            agent: agent.clone(),
            input: text(node)?.to_string(),
        },
    };

    Ok(Step {
        name: node.has_custom_name().then(|| node.display_name().to_string()),
        kind,
    })
}

fn children(node: &RuntimeNode) -> Result<Vec<Step>> {
    match &node.input {
        RuntimeInput::Nodes(nodes) => nodes.iter().map(from_runtime).collect(),
        _ => Err(malformed(node, "input must be an array")),
    }
}

fn child(node: &RuntimeNode) -> Result<Step> {
    match &node.input {
        RuntimeInput::Node(inner) => from_runtime(inner),
        _ => Err(malformed(node, "input must be a nested node")),
    }
}

fn text(node: &RuntimeNode) -> Result<&str> {
    node.input
        .as_text()
        .ok_or_else(|| malformed(node, "input must be a string"))
}

fn criteria(node: &RuntimeNode) -> Result<String> {
    node.criteria
        .clone()
        .ok_or_else(|| malformed(node, "missing criteria"))
}

fn malformed(node: &RuntimeNode, reason: &str) -> FlowError {
    FlowError::MalformedNode {
        node_id: node.id.clone(),
        agent: node.agent.to_string(),
        reason: reason.to_string(),
    }
}
