//! Flow definition (input declarations, agent roster, step tree)

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::step::Step;
use crate::error::{FlowError, Result};

/// A named workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub inputs: Vec<InputVariable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Step>,
    /// Agent roster; when absent every step runs with the default agent settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<AgentDefinition>>,
}

/// Declared input variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type")]
    pub var_type: VariableType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableType {
    ShortText,
    LongText,
    Url,
    Number,
    Json,
    FileBase64,
}

impl VariableType {
    /// Validated as a JSON string
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            Self::ShortText | Self::LongText | Self::Url | Self::FileBase64
        )
    }
}

/// Roster entry describing how one agent calls its model
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

impl AgentDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl InputVariable {
    pub fn new(name: impl Into<String>, var_type: VariableType, required: bool) -> Self {
        Self {
            name: name.into(),
            description: None,
            required,
            var_type,
        }
    }
}

impl Flow {
    pub fn new(code: impl Into<String>, steps: Step) -> Self {
        let code = code.into();
        Self {
            name: code.clone(),
            code,
            description: None,
            inputs: Vec::new(),
            steps: Some(steps),
            agents: None,
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<InputVariable>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_agents(mut self, agents: Vec<AgentDefinition>) -> Self {
        self.agents = Some(agents);
        self
    }

    pub fn from_yaml(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load a flow file; `.json` is parsed as JSON, anything else as YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&source),
            _ => Self::from_yaml(&source),
        }
    }

    /// Roster lookup
    pub fn agent(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.as_ref()?.iter().find(|a| a.name == name)
    }

    pub fn has_roster(&self) -> bool {
        self.agents.is_some()
    }

    /// Static checks: code, unique names, and step-tree shape
    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(validation("flow code is empty"));
        }

        let mut seen = HashSet::new();
        for input in &self.inputs {
            if input.name.trim().is_empty() {
                return Err(validation("input variable with empty name"));
            }
            if !seen.insert(input.name.as_str()) {
                return Err(validation(&format!(
                    "duplicate input variable '{}'",
                    input.name
                )));
            }
        }

        if let Some(agents) = &self.agents {
            let mut seen = HashSet::new();
            for agent in agents {
                if !seen.insert(agent.name.as_str()) {
                    return Err(validation(&format!("duplicate agent '{}'", agent.name)));
                }
            }
        }

        if let Some(steps) = &self.steps {
            crate::convert::to_runtime(steps).validate()?;
        }
        Ok(())
    }

    /// Step tree, required before execution
    pub fn require_steps(&self) -> Result<&Step> {
        self.steps
            .as_ref()
            .ok_or_else(|| validation(&format!("flow '{}' has no steps", self.code)))
    }
}

fn validation(reason: &str) -> FlowError {
    FlowError::ValidationError {
        reason: reason.to_string(),
    }
}
