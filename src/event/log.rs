//! EventLog - ordered execution record
//!
//! - Event: envelope with id + timestamp + kind
//! - EventKind: flow / step / control-flow / provider / tool variants
//! - EventLog: thread-safe, append-only log with an optional caller sink
//!
//! Every emitted event is appended and then handed to the sink while the
//! emission lock is held, so the sink observes exactly the log order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-supplied event callback, invoked synchronously in emission order
pub type EventSink = Arc<dyn Fn(&Event) + Send + Sync>;

/// Single event in the execution log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since run start (ms)
    pub timestamp_ms: u64,
    /// Event type and data
    #[serde(flatten)]
    pub kind: EventKind,
}

/// All event types
///
/// Uses Arc<str> for step_id fields to enable cheap cloning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // FLOW LEVEL
    // ═══════════════════════════════════════════
    FlowStart {
        flow_code: String,
        /// Unique id of this run
        run_id: String,
        node_count: usize,
    },
    FlowComplete {
        flow_code: String,
        output: Value,
        steps: usize,
        duration_ms: u64,
    },
    FlowError {
        flow_code: String,
        error: String,
        step_id: Option<Arc<str>>,
    },

    // ═══════════════════════════════════════════
    // STEP LEVEL
    // ═══════════════════════════════════════════
    StepStart {
        step_id: Arc<str>,
        agent: String,
        name: String,
    },
    StepComplete {
        step_id: Arc<str>,
        output: Value,
        duration_ms: u64,
    },
    StepError {
        step_id: Arc<str>,
        error: String,
        duration_ms: u64,
    },

    // ═══════════════════════════════════════════
    // CONTROL FLOW
    // ═══════════════════════════════════════════
    ConditionEvaluated {
        step_id: Arc<str>,
        condition: String,
        result: bool,
    },
    /// `index` is None when no branch matched
    BranchSelected {
        step_id: Arc<str>,
        index: Option<usize>,
    },
    IterationStart {
        step_id: Arc<str>,
        iteration: u32,
        /// Current element for forEach
        item: Option<Value>,
    },
    Evaluation {
        step_id: Arc<str>,
        iteration: u32,
        satisfied: bool,
        feedback: String,
    },
    CandidateSelected {
        step_id: Arc<str>,
        winner: usize,
        reason: String,
    },
    SubflowStart {
        step_id: Arc<str>,
        flow_code: String,
        depth: usize,
    },

    // ═══════════════════════════════════════════
    // PROVIDER / TOOL / UI
    // ═══════════════════════════════════════════
    ProviderCall {
        step_id: Arc<str>,
        provider: String,
        model: String,
        prompt_len: usize,
    },
    ProviderResponse {
        step_id: Arc<str>,
        text: String,
        input_tokens: u32,
        output_tokens: u32,
        finish_reason: String,
    },
    TextDelta {
        step_id: Arc<str>,
        delta: String,
    },
    ToolCall {
        step_id: Arc<str>,
        tool: String,
        args: Value,
    },
    ToolResult {
        step_id: Arc<str>,
        tool: String,
        result: Value,
    },
    UiComponent {
        step_id: Arc<str>,
        component: String,
        props: Value,
    },
}

impl EventKind {
    /// Extract step_id if event is step-related
    pub fn step_id(&self) -> Option<&str> {
        match self {
            Self::StepStart { step_id, .. }
            | Self::StepComplete { step_id, .. }
            | Self::StepError { step_id, .. }
            | Self::ConditionEvaluated { step_id, .. }
            | Self::BranchSelected { step_id, .. }
            | Self::IterationStart { step_id, .. }
            | Self::Evaluation { step_id, .. }
            | Self::CandidateSelected { step_id, .. }
            | Self::SubflowStart { step_id, .. }
            | Self::ProviderCall { step_id, .. }
            | Self::ProviderResponse { step_id, .. }
            | Self::TextDelta { step_id, .. }
            | Self::ToolCall { step_id, .. }
            | Self::ToolResult { step_id, .. }
            | Self::UiComponent { step_id, .. } => Some(step_id),
            Self::FlowError { step_id, .. } => step_id.as_deref(),
            Self::FlowStart { .. } | Self::FlowComplete { .. } => None,
        }
    }

    /// Wire name of the variant (`step-start`, …)
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::FlowStart { .. } => "flow-start",
            Self::FlowComplete { .. } => "flow-complete",
            Self::FlowError { .. } => "flow-error",
            Self::StepStart { .. } => "step-start",
            Self::StepComplete { .. } => "step-complete",
            Self::StepError { .. } => "step-error",
            Self::ConditionEvaluated { .. } => "condition-evaluated",
            Self::BranchSelected { .. } => "branch-selected",
            Self::IterationStart { .. } => "iteration-start",
            Self::Evaluation { .. } => "evaluation",
            Self::CandidateSelected { .. } => "candidate-selected",
            Self::SubflowStart { .. } => "subflow-start",
            Self::ProviderCall { .. } => "provider-call",
            Self::ProviderResponse { .. } => "provider-response",
            Self::TextDelta { .. } => "text-delta",
            Self::ToolCall { .. } => "tool-call",
            Self::ToolResult { .. } => "tool-result",
            Self::UiComponent { .. } => "ui-component",
        }
    }

    /// Check if this is a flow-level event
    pub fn is_flow_event(&self) -> bool {
        matches!(
            self,
            Self::FlowStart { .. } | Self::FlowComplete { .. } | Self::FlowError { .. }
        )
    }

    /// `flow-complete` or `flow-error`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::FlowComplete { .. } | Self::FlowError { .. })
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
    /// Serializes id assignment, append and sink delivery
    emit_lock: Arc<Mutex<()>>,
    sink: Option<EventSink>,
}

impl EventLog {
    /// Create a new event log (call at run start)
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
            emit_lock: Arc::new(Mutex::new(())),
            sink: None,
        }
    }

    /// Create a log that forwards every event to `sink`
    pub fn with_sink(sink: EventSink) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new()
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let _order = self.emit_lock.lock();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        if let Some(sink) = &self.sink {
            self.events.write().push(event.clone());
            sink(&event);
        } else {
            self.events.write().push(event);
        }
        id
    }

    /// Get all events (cloned - use `with_events` for zero-copy access)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Zero-copy access to events via callback
    ///
    /// Holds read lock for duration of callback - keep it short.
    pub fn with_events<T>(&self, f: impl FnOnce(&[Event]) -> T) -> T {
        f(&self.events.read())
    }

    /// Filter events by step ID
    pub fn filter_step(&self, step_id: &str) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.step_id() == Some(step_id))
                .cloned()
                .collect()
        })
    }

    /// Count events of one wire type (no allocation)
    pub fn count_type(&self, type_name: &str) -> usize {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.kind.type_name() == type_name)
                .count()
        })
    }

    /// Serialize to JSON for persistence/debugging
    pub fn to_json(&self) -> Value {
        self.with_events(|events| serde_json::to_value(events).unwrap_or(Value::Null))
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ═══════════════════════════════════════════════════════════════
    // Test helpers
    // ═══════════════════════════════════════════════════════════════

    fn step_start(step_id: &str) -> EventKind {
        EventKind::StepStart {
            step_id: Arc::from(step_id),
            agent: "writer".to_string(),
            name: "writer".to_string(),
        }
    }

    fn flow_start() -> EventKind {
        EventKind::FlowStart {
            flow_code: "demo".to_string(),
            run_id: "run-1".to_string(),
            node_count: 3,
        }
    }

    // ═══════════════════════════════════════════════════════════════
    // EventKind
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn serializes_with_kebab_case_type() {
        let value = serde_json::to_value(EventKind::ConditionEvaluated {
            step_id: "s1".into(),
            condition: "x > 5".to_string(),
            result: true,
        })
        .unwrap();
        assert_eq!(value["type"], "condition-evaluated");
        assert_eq!(value["step_id"], "s1");
    }

    #[test]
    fn type_name_matches_serde_tag() {
        let kinds = vec![
            flow_start(),
            step_start("s"),
            EventKind::TextDelta {
                step_id: "s".into(),
                delta: "hi".to_string(),
            },
            EventKind::UiComponent {
                step_id: "s".into(),
                component: "Chart".to_string(),
                props: json!({}),
            },
        ];
        for kind in kinds {
            let value = serde_json::to_value(&kind).unwrap();
            assert_eq!(value["type"], kind.type_name());
        }
    }

    #[test]
    fn step_id_extraction() {
        assert_eq!(step_start("abc").step_id(), Some("abc"));
        assert_eq!(flow_start().step_id(), None);
        let err = EventKind::FlowError {
            flow_code: "f".to_string(),
            error: "boom".to_string(),
            step_id: Some("s9".into()),
        };
        assert_eq!(err.step_id(), Some("s9"));
        assert!(err.is_terminal());
        assert!(err.is_flow_event());
    }

    #[test]
    fn event_envelope_flattens_kind() {
        let log = EventLog::new();
        log.emit(flow_start());
        let value = log.to_json();
        assert_eq!(value[0]["id"], 0);
        assert_eq!(value[0]["type"], "flow-start");
        let back: Vec<Event> = serde_json::from_value(value).unwrap();
        assert_eq!(back, log.events());
    }

    // ═══════════════════════════════════════════════════════════════
    // EventLog
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn ids_are_sequential() {
        let log = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.emit(flow_start()), 0);
        assert_eq!(log.emit(step_start("a")), 1);
        assert_eq!(log.emit(step_start("b")), 2);
        assert_eq!(log.len(), 3);
        assert_eq!(log.filter_step("a").len(), 1);
        assert_eq!(log.count_type("step-start"), 2);
    }

    #[test]
    fn sink_sees_log_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        let log = EventLog::with_sink(Arc::new(move |e: &Event| sink_seen.lock().push(e.id)));

        log.emit(flow_start());
        log.emit(step_start("a"));

        let ids: Vec<u64> = log.events().iter().map(|e| e.id).collect();
        assert_eq!(*seen.lock(), ids);
    }

    #[test]
    fn sink_may_read_the_log() {
        let log_slot: Arc<Mutex<Option<EventLog>>> = Arc::new(Mutex::new(None));
        let counts = Arc::new(Mutex::new(Vec::new()));
        let (slot, c) = (Arc::clone(&log_slot), Arc::clone(&counts));
        let log = EventLog::with_sink(Arc::new(move |_: &Event| {
            if let Some(log) = slot.lock().as_ref() {
                c.lock().push(log.len());
            }
        }));
        *log_slot.lock() = Some(log.clone());
        log.emit(flow_start());
        log.emit(step_start("a"));
        assert_eq!(*counts.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn concurrent_emits_keep_unique_ids() {
        let log = EventLog::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = log.clone();
                tokio::spawn(async move {
                    for _ in 0..25 {
                        log.emit(step_start(&format!("s{}", i)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        let events = log.events();
        assert_eq!(events.len(), 200);
        for (idx, e) in events.iter().enumerate() {
            assert_eq!(e.id, idx as u64);
        }
    }
}
