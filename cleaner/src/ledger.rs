//! Run ledger: counters plus the ordered audit trail of one invocation.
//!
//! Every event is appended to the in-memory log, forwarded to `tracing`, and
//! pushed to each attached [`EventSink`] (console, `--log` file). Forwarding
//! happens at `info` with the event level as a field, so the default `warn`
//! filter does not echo events the console sink already printed. The ledger is
//! single-threaded; callers that parallelize must wrap it themselves.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// One human-readable line of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub level: EventLevel,
    pub message: String,
}

/// Destination that receives every ledger event as it is recorded.
pub trait EventSink {
    fn emit(&mut self, event: &Event) -> Result<()>;
}

/// Prints event messages to stdout.
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: &Event) -> Result<()> {
        println!("{}", event.message);
        Ok(())
    }
}

/// Serializable result of a run, handed to the report writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub status: RunStatus,
    pub message: String,
    pub details: Vec<String>,
    pub cleaned_count: usize,
    pub processed_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Default)]
pub struct RunLedger {
    processed: BTreeSet<PathBuf>,
    issues_cleaned: usize,
    events: Vec<Event>,
    error: Option<String>,
    sinks: Vec<Box<dyn EventSink>>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.attach(sink);
        self
    }

    pub fn attach(&mut self, sink: impl EventSink + 'static) {
        self.sinks.push(Box::new(sink));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.record(EventLevel::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.record(EventLevel::Warn, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.record(EventLevel::Error, message.into());
    }

    /// Append an event and forward it to tracing and all sinks.
    pub fn record(&mut self, level: EventLevel, message: String) {
        info!(target: "cleaner::ledger", level = ?level, "{message}");
        let event = Event { level, message };
        for sink in &mut self.sinks {
            // A broken sink must not lose the event or stop the run.
            if let Err(err) = sink.emit(&event) {
                warn!(err = %format!("{err:#}"), "ledger sink failed");
            }
        }
        self.events.push(event);
    }

    /// Count `path` as processed. Returns `false` if it was already counted.
    pub fn mark_processed(&mut self, path: &Path) -> bool {
        self.processed.insert(path.to_path_buf())
    }

    pub fn add_cleaned(&mut self, count: usize) {
        self.issues_cleaned += count;
    }

    /// Mark the run as failed. The message is also recorded as an event.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.error(format!("ERROR: {message}"));
        self.error = Some(message);
    }

    pub fn files_processed(&self) -> usize {
        self.processed.len()
    }

    pub fn issues_cleaned(&self) -> usize {
        self.issues_cleaned
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn status(&self) -> RunStatus {
        if self.error.is_some() {
            RunStatus::Error
        } else {
            RunStatus::Success
        }
    }

    pub fn finalize(&self) -> RunSummary {
        RunSummary {
            status: self.status(),
            message: format!(
                "Processed {} files, cleaned {} issues",
                self.files_processed(),
                self.issues_cleaned
            ),
            details: self
                .events
                .iter()
                .map(|event| event.message.clone())
                .collect(),
            cleaned_count: self.issues_cleaned,
            processed_count: self.files_processed(),
            error: self.error.clone(),
        }
    }
}
