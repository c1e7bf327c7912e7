//! Runtime nodes - the flattened tree consumed by the interpreter
//!
//! Wire shape (export/import):
//!
//! ```json
//! { "id": "…", "agent": "oneOfAgent", "input": [ … ],
//!   "conditions": ["x > 5", "!(x > 5)"], "name": "oneOfAgent" }
//! ```
//!
//! The `agent` string is parsed into [`AgentTag`] so dispatch is an exhaustive
//! `match`. Any string that is not a reserved tag names an LLM agent.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{FlowError, Result};

/// Runtime discriminator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentTag {
    Sequence,
    Parallel,
    OneOf,
    ForEach,
    Optimize,
    BestOfAll,
    Tool,
    UiComponent,
    Loop,
    /// LLM step (or sub-flow) named by the agent
    Step(String),
}

impl AgentTag {
    pub const SEQUENCE: &'static str = "sequenceAgent";
    pub const PARALLEL: &'static str = "parallelAgent";
    pub const ONE_OF: &'static str = "oneOfAgent";
    pub const FOR_EACH: &'static str = "forEachAgent";
    pub const OPTIMIZE: &'static str = "optimizeAgent";
    pub const BEST_OF_ALL: &'static str = "bestOfAllAgent";
    pub const TOOL: &'static str = "toolAgent";
    pub const UI_COMPONENT: &'static str = "uiComponentAgent";
    pub const LOOP: &'static str = "loopAgent";

    pub fn as_str(&self) -> &str {
        match self {
            Self::Sequence => Self::SEQUENCE,
            Self::Parallel => Self::PARALLEL,
            Self::OneOf => Self::ONE_OF,
            Self::ForEach => Self::FOR_EACH,
            Self::Optimize => Self::OPTIMIZE,
            Self::BestOfAll => Self::BEST_OF_ALL,
            Self::Tool => Self::TOOL,
            Self::UiComponent => Self::UI_COMPONENT,
            Self::Loop => Self::LOOP,
            Self::Step(name) => name,
        }
    }

    /// Reserved workflow tag (anything but an LLM step)
    pub fn is_reserved(&self) -> bool {
        !matches!(self, Self::Step(_))
    }

    /// Step name that looks like a runtime tag (`fooAgent`) but isn't one
    pub fn looks_like_tag(&self) -> bool {
        matches!(self, Self::Step(name) if name.len() > "Agent".len() && name.ends_with("Agent"))
    }

    /// Leaf kinds counted as executed work
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Step(_) | Self::Tool | Self::UiComponent)
    }
}

impl From<String> for AgentTag {
    fn from(s: String) -> Self {
        match s.as_str() {
            Self::SEQUENCE => Self::Sequence,
            Self::PARALLEL => Self::Parallel,
            Self::ONE_OF => Self::OneOf,
            Self::FOR_EACH => Self::ForEach,
            Self::OPTIMIZE => Self::Optimize,
            Self::BEST_OF_ALL => Self::BestOfAll,
            Self::TOOL => Self::Tool,
            Self::UI_COMPONENT => Self::UiComponent,
            Self::LOOP => Self::Loop,
            _ => Self::Step(s),
        }
    }
}

impl From<&str> for AgentTag {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

impl From<AgentTag> for String {
    fn from(tag: AgentTag) -> Self {
        match tag {
            AgentTag::Step(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for AgentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `input` of a runtime node: text, child array, or one nested child
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuntimeInput {
    Text(String),
    Nodes(Vec<RuntimeNode>),
    Node(Box<RuntimeNode>),
}

impl Default for RuntimeInput {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl RuntimeInput {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Text(_) => "a string",
            Self::Nodes(_) => "an array",
            Self::Node(_) => "a nested node",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeNode {
    pub id: String,
    pub agent: AgentTag,
    #[serde(default)]
    pub input: RuntimeInput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RuntimeNode {
    pub fn new(id: impl Into<String>, agent: impl Into<AgentTag>, input: RuntimeInput) -> Self {
        Self {
            id: id.into(),
            agent: agent.into(),
            input,
            conditions: None,
            criteria: None,
            max_iterations: None,
            item: None,
            name: None,
        }
    }

    /// Display name, falling back to the tag
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.agent.as_str())
    }

    /// True when the node carries a name other than its own tag
    pub fn has_custom_name(&self) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| n != self.agent.as_str())
    }

    pub fn children(&self) -> Vec<&RuntimeNode> {
        match &self.input {
            RuntimeInput::Text(_) => Vec::new(),
            RuntimeInput::Nodes(nodes) => nodes.iter().collect(),
            RuntimeInput::Node(node) => vec![node.as_ref()],
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut RuntimeNode> {
        match &mut self.input {
            RuntimeInput::Text(_) => Vec::new(),
            RuntimeInput::Nodes(nodes) => nodes.iter_mut().collect(),
            RuntimeInput::Node(node) => vec![node.as_mut()],
        }
    }

    /// Nodes in the subtree, this one included
    pub fn count_nodes(&self) -> usize {
        1 + self.children().iter().map(|c| c.count_nodes()).sum::<usize>()
    }

    /// Check per-tag shape and id uniqueness for the whole subtree
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        self.validate_inner(&mut seen)
    }

    fn validate_inner<'a>(&'a self, seen: &mut HashSet<&'a str>) -> Result<()> {
        if self.id.is_empty() {
            return Err(self.malformed("node id is empty"));
        }
        if !seen.insert(self.id.as_str()) {
            return Err(self.malformed("duplicate node id"));
        }

        match &self.agent {
            AgentTag::Sequence | AgentTag::Parallel => {
                self.expect_array()?;
            }
            AgentTag::BestOfAll => {
                self.expect_array()?;
                self.expect_criteria()?;
            }
            AgentTag::OneOf => {
                let children = self.expect_array()?;
                let conditions = self.conditions.as_deref().unwrap_or_default();
                if conditions.len() != children {
                    return Err(self.malformed(&format!(
                        "{} conditions for {} branches",
                        conditions.len(),
                        children
                    )));
                }
            }
            AgentTag::ForEach => {
                self.expect_nested()?;
                if self.item.as_deref().map_or(true, |i| i.trim().is_empty()) {
                    return Err(self.malformed("forEach needs an item variable"));
                }
            }
            AgentTag::Optimize => {
                self.expect_nested()?;
                self.expect_criteria()?;
            }
            AgentTag::Loop => {
                self.expect_nested()?;
                match self.conditions.as_deref() {
                    Some([_]) => {}
                    _ => return Err(self.malformed("loop needs exactly one condition")),
                }
                if self.max_iterations.is_none() {
                    return Err(self.malformed("loop needs max_iterations"));
                }
            }
            AgentTag::Tool => {
                let text = self.expect_text()?;
                ToolPayload::parse(text).map_err(|e| self.malformed(&e.to_string()))?;
            }
            AgentTag::UiComponent => {
                let text = self.expect_text()?;
                UiPayload::parse(text).map_err(|e| self.malformed(&e.to_string()))?;
            }
            AgentTag::Step(name) => {
                if name.trim().is_empty() {
                    return Err(self.malformed("agent name is empty"));
                }
                self.expect_text()?;
            }
        }

        for child in self.children() {
            child.validate_inner(seen)?;
        }
        Ok(())
    }

    fn malformed(&self, reason: &str) -> FlowError {
        FlowError::MalformedNode {
            node_id: self.id.clone(),
            agent: self.agent.to_string(),
            reason: reason.to_string(),
        }
    }

    fn expect_array(&self) -> Result<usize> {
        match &self.input {
            RuntimeInput::Nodes(nodes) => Ok(nodes.len()),
            other => Err(self.malformed(&format!("input must be an array, got {}", other.shape()))),
        }
    }

    fn expect_nested(&self) -> Result<()> {
        match &self.input {
            RuntimeInput::Node(_) => Ok(()),
            other => Err(self.malformed(&format!(
                "input must be a nested node, got {}",
                other.shape()
            ))),
        }
    }

    fn expect_text(&self) -> Result<&str> {
        match &self.input {
            RuntimeInput::Text(s) => Ok(s),
            other => Err(self.malformed(&format!("input must be a string, got {}", other.shape()))),
        }
    }

    fn expect_criteria(&self) -> Result<()> {
        if self.criteria.as_deref().map_or(true, |c| c.trim().is_empty()) {
            return Err(self.malformed("criteria is required"));
        }
        Ok(())
    }
}

/// Serialized `toolAgent` input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPayload {
    pub tool_name: String,
    #[serde(default)]
    pub tool_options: Value,
}

impl ToolPayload {
    pub fn new(tool_name: impl Into<String>, tool_options: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_options,
        }
    }

    pub fn to_input(&self) -> String {
        json!({ "toolName": self.tool_name, "toolOptions": self.tool_options }).to_string()
    }

    pub fn parse(input: &str) -> Result<Self> {
        let payload: Self = serde_json::from_str(input)?;
        if payload.tool_name.is_empty() {
            return Err(FlowError::ValidationError {
                reason: "toolName is empty".to_string(),
            });
        }
        Ok(payload)
    }
}

/// Serialized `uiComponentAgent` input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiPayload {
    pub component_name: String,
    #[serde(default)]
    pub props: Value,
}

impl UiPayload {
    pub fn new(component_name: impl Into<String>, props: Value) -> Self {
        Self {
            component_name: component_name.into(),
            props,
        }
    }

    pub fn to_input(&self) -> String {
        json!({ "componentName": self.component_name, "props": self.props }).to_string()
    }

    pub fn parse(input: &str) -> Result<Self> {
        let payload: Self = serde_json::from_str(input)?;
        if payload.component_name.is_empty() {
            return Err(FlowError::ValidationError {
                reason: "componentName is empty".to_string(),
            });
        }
        Ok(payload)
    }
}
