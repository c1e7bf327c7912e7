//! Step Tree - editor-facing workflow tree
//!
//! A closed tagged union, one tag per workflow primitive:
//!
//! ```yaml
//! type: sequence
//! steps:
//!   - type: step
//!     agent: researcher
//!     input: "Find sources about @topic"
//!   - type: condition
//!     condition: "score > 5"
//!     ifTrue:  { type: step, agent: writer, input: "Write it" }
//!     ifFalse: { type: step, agent: critic, input: "Explain why not" }
//! ```
//!
//! Children are owned (`Box`/`Vec`), so a tree can never share or cycle nodes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::runtime::AgentTag;

/// One node of a Step Tree
///
/// A name equal to the node's runtime tag is stored as `None`: runtime nodes
/// default their name to the tag, so the two are indistinguishable there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStep")]
pub struct Step {
    /// Optional display name (runtime nodes default to their agent tag)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: StepKind,
}

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    name: Option<String>,
    #[serde(flatten)]
    kind: StepKind,
}

impl From<RawStep> for Step {
    fn from(raw: RawStep) -> Self {
        let step = Step::new(raw.kind);
        match raw.name {
            Some(name) => step.named(name),
            None => step,
        }
    }
}

/// A `oneOf` branch: condition + the flow it guards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub condition: String,
    pub flow: Step,
}

/// Workflow primitives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StepKind {
    /// Leaf: run an agent on a literal/templated input
    Step {
        agent: String,
        #[serde(default)]
        input: String,
    },
    Sequence {
        steps: Vec<Step>,
    },
    Parallel {
        steps: Vec<Step>,
    },
    /// First branch whose condition holds runs
    OneOf {
        branches: Vec<Branch>,
    },
    ForEach {
        item: String,
        flow: Box<Step>,
    },
    /// Re-run `flow` until `criteria` is judged satisfied or the cap is hit
    Evaluator {
        criteria: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
        flow: Box<Step>,
    },
    /// Run all candidates, keep the one judged best
    BestOfAll {
        criteria: String,
        steps: Vec<Step>,
    },
    Tool {
        tool_name: String,
        #[serde(default)]
        tool_options: Value,
    },
    UiComponent {
        component_name: String,
        #[serde(default)]
        props: Value,
    },
    Condition {
        condition: String,
        if_true: Box<Step>,
        if_false: Box<Step>,
    },
    Loop {
        max_iterations: u32,
        condition: String,
        flow: Box<Step>,
    },
}

impl Step {
    fn new(kind: StepKind) -> Self {
        Self { name: None, kind }
    }

    /// Leaf step running `agent`
    pub fn step(agent: impl Into<String>, input: impl Into<String>) -> Self {
        Self::new(StepKind::Step {
            agent: agent.into(),
            input: input.into(),
        })
    }

    pub fn sequence(steps: Vec<Step>) -> Self {
        Self::new(StepKind::Sequence { steps })
    }

    pub fn parallel(steps: Vec<Step>) -> Self {
        Self::new(StepKind::Parallel { steps })
    }

    /// `oneOf` from (condition, flow) pairs, in priority order
    pub fn one_of(branches: Vec<(&str, Step)>) -> Self {
        Self::new(StepKind::OneOf {
            branches: branches
                .into_iter()
                .map(|(condition, flow)| Branch {
                    condition: condition.to_string(),
                    flow,
                })
                .collect(),
        })
    }

    pub fn for_each(item: impl Into<String>, flow: Step) -> Self {
        Self::new(StepKind::ForEach {
            item: item.into(),
            flow: Box::new(flow),
        })
    }

    pub fn evaluator(criteria: impl Into<String>, max_iterations: Option<u32>, flow: Step) -> Self {
        Self::new(StepKind::Evaluator {
            criteria: criteria.into(),
            max_iterations,
            flow: Box::new(flow),
        })
    }

    pub fn best_of_all(criteria: impl Into<String>, steps: Vec<Step>) -> Self {
        Self::new(StepKind::BestOfAll {
            criteria: criteria.into(),
            steps,
        })
    }

    pub fn tool(tool_name: impl Into<String>, tool_options: Value) -> Self {
        Self::new(StepKind::Tool {
            tool_name: tool_name.into(),
            tool_options,
        })
    }

    pub fn ui_component(component_name: impl Into<String>, props: Value) -> Self {
        Self::new(StepKind::UiComponent {
            component_name: component_name.into(),
            props,
        })
    }

    pub fn condition(condition: impl Into<String>, if_true: Step, if_false: Step) -> Self {
        Self::new(StepKind::Condition {
            condition: condition.into(),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        })
    }

    pub fn loop_while(max_iterations: u32, condition: impl Into<String>, flow: Step) -> Self {
        Self::new(StepKind::Loop {
            max_iterations,
            condition: condition.into(),
            flow: Box::new(flow),
        })
    }

    /// Set the display name (cleared when it repeats the runtime tag)
    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let custom = name != self.runtime_tag();
        self.name = custom.then_some(name);
        self
    }

    /// `agent` string of the runtime node this step converts to
    pub fn runtime_tag(&self) -> &str {
        match &self.kind {
            StepKind::Step { agent, .. } => agent,
            StepKind::Sequence { .. } => AgentTag::SEQUENCE,
            StepKind::Parallel { .. } => AgentTag::PARALLEL,
            StepKind::OneOf { .. } | StepKind::Condition { .. } => AgentTag::ONE_OF,
            StepKind::ForEach { .. } => AgentTag::FOR_EACH,
            StepKind::Evaluator { .. } => AgentTag::OPTIMIZE,
            StepKind::BestOfAll { .. } => AgentTag::BEST_OF_ALL,
            StepKind::Tool { .. } => AgentTag::TOOL,
            StepKind::UiComponent { .. } => AgentTag::UI_COMPONENT,
            StepKind::Loop { .. } => AgentTag::LOOP,
        }
    }

    /// Tag name as written in flow files
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            StepKind::Step { .. } => "step",
            StepKind::Sequence { .. } => "sequence",
            StepKind::Parallel { .. } => "parallel",
            StepKind::OneOf { .. } => "oneOf",
            StepKind::ForEach { .. } => "forEach",
            StepKind::Evaluator { .. } => "evaluator",
            StepKind::BestOfAll { .. } => "bestOfAll",
            StepKind::Tool { .. } => "tool",
            StepKind::UiComponent { .. } => "uiComponent",
            StepKind::Condition { .. } => "condition",
            StepKind::Loop { .. } => "loop",
        }
    }

    /// Direct children, in declaration order
    pub fn children(&self) -> Vec<&Step> {
        match &self.kind {
            StepKind::Sequence { steps }
            | StepKind::Parallel { steps }
            | StepKind::BestOfAll { steps, .. } => steps.iter().collect(),
            StepKind::OneOf { branches } => branches.iter().map(|b| &b.flow).collect(),
            StepKind::ForEach { flow, .. }
            | StepKind::Evaluator { flow, .. }
            | StepKind::Loop { flow, .. } => vec![flow.as_ref()],
            StepKind::Condition {
                if_true, if_false, ..
            } => vec![if_true.as_ref(), if_false.as_ref()],
            StepKind::Step { .. } | StepKind::Tool { .. } | StepKind::UiComponent { .. } => {
                Vec::new()
            }
        }
    }

    /// Agent names referenced by `step` leaves (duplicates removed, first-seen order)
    pub fn agent_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_agents(&mut names);
        names
    }

    fn collect_agents<'a>(&'a self, names: &mut Vec<&'a str>) {
        if let StepKind::Step { agent, .. } = &self.kind {
            if !names.contains(&agent.as_str()) {
                names.push(agent);
            }
        }
        for child in self.children() {
            child.collect_agents(names);
        }
    }
}
