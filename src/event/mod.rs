//! Event Module - ordered record of a flow run
//!
//! Key types:
//! - `Event`: Envelope with id + timestamp + kind
//! - `EventKind`: flow / step / control-flow / provider / tool / ui variants,
//!   serialized with a kebab-case `type` tag (`step-start`, `text-delta`, …)
//! - `EventLog`: Thread-safe, append-only log forwarding to an `EventSink`
//! - `TraceWriter`: NDJSON file writer for debugging

mod log;
mod trace;

// Re-export all public types
pub use log::{Event, EventKind, EventLog, EventSink};
pub use trace::{read_trace, TraceWriter};
