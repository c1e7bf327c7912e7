//! Flow Error Types with Error Codes
//!
//! Error code ranges:
//! - FLOW-000-019: Validation errors (raised before any node runs)
//! - FLOW-020-039: Execution errors (node-level failures)
//! - FLOW-040-049: Tool errors
//! - FLOW-050-069: Provider errors
//! - FLOW-090-099: IO / serialization errors
//!
//! Node-level failures are wrapped once in [`FlowError::FlowExecution`] at the
//! failing node, so callers see the flow code and the failing step id together
//! with the original cause.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlowError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Coarse classification used by callers deciding what to do with a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    FlowExecution,
    ToolExecution,
    LlmProvider,
    Timeout,
    RateLimit,
    Cancelled,
    Io,
}

/// All error variants are part of the public API.
#[derive(Error, Debug, Diagnostic)]
pub enum FlowError {
    // ═══════════════════════════════════════════
    // VALIDATION ERRORS (000-019)
    // ═══════════════════════════════════════════
    #[error("[FLOW-001] Failed to parse flow: {details}")]
    #[diagnostic(
        code(agentflow::parse_error),
        help("Check YAML/JSON syntax and the `type` tag of every step")
    )]
    ParseError { details: String },

    #[error("[FLOW-002] Flow validation failed: {reason}")]
    #[diagnostic(code(agentflow::validation_error))]
    ValidationError { reason: String },

    #[error("[FLOW-003] Invalid flow input: {}", .errors.join("; "))]
    #[diagnostic(
        code(agentflow::invalid_input),
        help("Pass every required input with the declared type")
    )]
    InvalidInput { errors: Vec<String> },

    #[error("[FLOW-004] Unrecognized node tag '{tag}'")]
    #[diagnostic(code(agentflow::unknown_node_tag))]
    UnknownNodeTag { tag: String },

    #[error("[FLOW-005] Malformed node '{node_id}' ({agent}): {reason}")]
    MalformedNode {
        node_id: String,
        agent: String,
        reason: String,
    },

    #[error("[FLOW-006] Unknown agent '{agent}' in flow '{flow_code}'")]
    UnknownAgent { agent: String, flow_code: String },

    #[error("[FLOW-007] Config error: {reason}")]
    ConfigError { reason: String },

    // ═══════════════════════════════════════════
    // EXECUTION ERRORS (020-039)
    // ═══════════════════════════════════════════
    #[error("[FLOW-020] Flow '{flow_code}' failed at step '{step_id}': {source}")]
    FlowExecution {
        flow_code: String,
        step_id: String,
        #[source]
        source: Box<FlowError>,
    },

    #[error("[FLOW-021] Expression error in '{expression}': {reason}")]
    #[diagnostic(
        code(agentflow::expression),
        help("Conditions support literals, variables, ! && || == != < <= > >= + - * / % and len/contains/lower/upper")
    )]
    Expression { expression: String, reason: String },

    #[error("[FLOW-022] Variable '{name}' is not bound")]
    UnknownVariable { name: String },

    #[error("[FLOW-023] Maximum flow depth exceeded: depth {depth} > max {max_depth}")]
    #[diagnostic(
        code(agentflow::max_depth),
        help("Check for flows that invoke each other recursively, or raise max_depth")
    )]
    MaxDepthExceeded { depth: usize, max_depth: usize },

    #[error("[FLOW-024] Flow execution cancelled")]
    Cancelled,

    #[error("[FLOW-025] Could not interpret judge response: {reason}")]
    JudgeParse { reason: String },

    // ═══════════════════════════════════════════
    // TOOL ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[FLOW-040] Tool '{tool}' not found in registry")]
    ToolNotFound { tool: String },

    #[error("[FLOW-041] Tool '{tool}' failed: {reason}")]
    ToolExecution { tool: String, reason: String },

    // ═══════════════════════════════════════════
    // PROVIDER ERRORS (050-069)
    // ═══════════════════════════════════════════
    #[error("[FLOW-050] Provider '{provider}' not registered")]
    ProviderNotFound { provider: String },

    #[error("[FLOW-051] Provider '{provider}' error{}: {reason}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    LlmProvider {
        provider: String,
        reason: String,
        /// HTTP-like status code reported by the provider, if any
        status: Option<u16>,
    },

    #[error("[FLOW-052] Provider '{provider}' rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    #[error("[FLOW-053] Operation '{operation}' timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    // ═══════════════════════════════════════════
    // IO / SERIALIZATION ERRORS (090-099)
    // ═══════════════════════════════════════════
    #[error("[FLOW-090] IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("[FLOW-091] JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("[FLOW-092] YAML parse error: {0}")]
    #[diagnostic(
        code(agentflow::yaml_parse),
        help("Check YAML syntax: indentation must be consistent, strings with special chars need quoting")
    )]
    YamlParse(#[from] serde_yaml::Error),
}

impl FlowError {
    /// Get the error code (e.g., "FLOW-001")
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseError { .. } => "FLOW-001",
            Self::ValidationError { .. } => "FLOW-002",
            Self::InvalidInput { .. } => "FLOW-003",
            Self::UnknownNodeTag { .. } => "FLOW-004",
            Self::MalformedNode { .. } => "FLOW-005",
            Self::UnknownAgent { .. } => "FLOW-006",
            Self::ConfigError { .. } => "FLOW-007",
            Self::FlowExecution { .. } => "FLOW-020",
            Self::Expression { .. } => "FLOW-021",
            Self::UnknownVariable { .. } => "FLOW-022",
            Self::MaxDepthExceeded { .. } => "FLOW-023",
            Self::Cancelled => "FLOW-024",
            Self::JudgeParse { .. } => "FLOW-025",
            Self::ToolNotFound { .. } => "FLOW-040",
            Self::ToolExecution { .. } => "FLOW-041",
            Self::ProviderNotFound { .. } => "FLOW-050",
            Self::LlmProvider { .. } => "FLOW-051",
            Self::RateLimited { .. } => "FLOW-052",
            Self::Timeout { .. } => "FLOW-053",
            Self::IoError(_) => "FLOW-090",
            Self::JsonError(_) => "FLOW-091",
            Self::YamlParse(_) => "FLOW-092",
        }
    }

    /// Classify the error (wrapped node failures report the kind of their cause)
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ParseError { .. }
            | Self::ValidationError { .. }
            | Self::InvalidInput { .. }
            | Self::UnknownNodeTag { .. }
            | Self::MalformedNode { .. }
            | Self::UnknownAgent { .. }
            | Self::ConfigError { .. }
            | Self::JsonError(_)
            | Self::YamlParse(_) => ErrorKind::Validation,
            Self::FlowExecution { source, .. } => match source.kind() {
                ErrorKind::Validation => ErrorKind::FlowExecution,
                other => other,
            },
            Self::Expression { .. }
            | Self::UnknownVariable { .. }
            | Self::MaxDepthExceeded { .. }
            | Self::JudgeParse { .. } => ErrorKind::FlowExecution,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::ToolNotFound { .. } | Self::ToolExecution { .. } => ErrorKind::ToolExecution,
            Self::ProviderNotFound { .. } | Self::LlmProvider { .. } => ErrorKind::LlmProvider,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::IoError(_) => ErrorKind::Io,
        }
    }

    /// True for failures a wrapping caller may reasonably retry.
    ///
    /// Classification only: nothing in the executor retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::FlowExecution { source, .. } => source.is_retryable(),
            Self::RateLimited { .. } | Self::Timeout { .. } => true,
            Self::LlmProvider { status, .. } => match status {
                None => true,
                Some(code) => *code == 408 || *code == 429 || *code >= 500,
            },
            Self::IoError(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Provider-reported retry hint, if any
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::RateLimited {
                retry_after_secs, ..
            } => Some(std::time::Duration::from_secs(*retry_after_secs)),
            Self::FlowExecution { source, .. } => source.retry_after(),
            _ => None,
        }
    }

    /// Failures that must never be caught or wrapped by node handlers
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::MaxDepthExceeded { .. } | Self::Cancelled => true,
            Self::FlowExecution { source, .. } => source.is_fatal(),
            _ => false,
        }
    }

    /// Innermost cause of a wrapped node failure
    pub fn root_cause(&self) -> &FlowError {
        match self {
            Self::FlowExecution { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Failing step id, when the error came out of a node
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::FlowExecution { step_id, .. } => Some(step_id),
            _ => None,
        }
    }

    /// Wrap a node-level failure once; already wrapped or fatal errors pass through.
    pub fn at_step(self, flow_code: &str, step_id: &str) -> Self {
        if matches!(self, Self::FlowExecution { .. }) || self.is_fatal() {
            return self;
        }
        Self::FlowExecution {
            flow_code: flow_code.to_string(),
            step_id: step_id.to_string(),
            source: Box::new(self),
        }
    }
}

impl FixSuggestion for FlowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FlowError::ParseError { .. } => Some("Check YAML/JSON syntax and step `type` tags"),
            FlowError::ValidationError { .. } => Some("Fix the flow definition before running it"),
            FlowError::InvalidInput { .. } => {
                Some("Pass inputs with --input name=value matching the flow's declared inputs")
            }
            FlowError::UnknownNodeTag { .. } => Some(
                "Use one of: sequenceAgent, parallelAgent, oneOfAgent, forEachAgent, optimizeAgent, bestOfAllAgent, toolAgent, uiComponentAgent, loopAgent",
            ),
            FlowError::MalformedNode { .. } => {
                Some("Composite nodes need child nodes; steps and tools need a string input")
            }
            FlowError::UnknownAgent { .. } => {
                Some("Declare the agent in the flow's `agents:` roster")
            }
            FlowError::ConfigError { .. } => Some("Check ~/.config/agentflow/config.toml"),
            FlowError::FlowExecution { source, .. } => source.fix_suggestion(),
            FlowError::Expression { .. } => Some("Check the condition syntax"),
            FlowError::UnknownVariable { .. } => {
                Some("Bind the variable as a flow input or produce it in an earlier step")
            }
            FlowError::MaxDepthExceeded { .. } => {
                Some("Remove recursive sub-flow references or raise max_depth")
            }
            FlowError::Cancelled => None,
            FlowError::JudgeParse { .. } => {
                Some("Make the judging model answer with the requested JSON")
            }
            FlowError::ToolNotFound { .. } => Some("Register the tool before running the flow"),
            FlowError::ToolExecution { .. } => Some("Check the tool options"),
            FlowError::ProviderNotFound { .. } => {
                Some("Register the provider or set default_provider in config")
            }
            FlowError::LlmProvider { .. } => Some("Check provider credentials and model name"),
            FlowError::RateLimited { .. } => Some("Wait for the retry-after window and retry"),
            FlowError::Timeout { .. } => Some("Raise call_timeout_secs or simplify the prompt"),
            FlowError::IoError(_) => Some("Check file path and permissions"),
            FlowError::JsonError(_) => Some("Check JSON syntax"),
            FlowError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
        }
    }
}
