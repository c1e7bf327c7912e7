//! NDJSON Trace Writer
//!
//! Writes events to newline-delimited JSON files for debugging and replay.
//! `sink()` turns the writer into a live [`EventSink`].

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::log::{Event, EventLog, EventSink};
use crate::error::Result;

/// NDJSON trace writer
#[derive(Clone)]
pub struct TraceWriter {
    writer: Arc<Mutex<BufWriter<File>>>,
    path: PathBuf,
}

impl TraceWriter {
    /// Create (or truncate) a trace file, creating parent directories
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;

        tracing::info!(path = %path.display(), "Created trace file");

        Ok(Self {
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
            path,
        })
    }

    /// Write a single event to the trace file
    pub fn write_event(&self, event: &Event) -> Result<()> {
        let json = serde_json::to_string(event)?;

        let mut writer = self.writer.lock();
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }

    /// Write all events from an EventLog
    pub fn write_all(&self, event_log: &EventLog) -> Result<()> {
        event_log.with_events(|events| events.iter().try_for_each(|e| self.write_event(e)))
    }

    /// Live sink; write failures are logged, not propagated into the run
    pub fn sink(&self) -> EventSink {
        let writer = self.clone();
        Arc::new(move |event: &Event| {
            if let Err(e) = writer.write_event(event) {
                tracing::warn!(error = %e, path = %writer.path.display(), "Failed to write trace event");
            }
        })
    }

    /// Get the trace file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read an NDJSON trace back into events
pub fn read_trace(path: impl AsRef<Path>) -> Result<Vec<Event>> {
    let contents = fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(Into::into))
        .collect()
}
