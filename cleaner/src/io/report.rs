//! Run outputs: the `--log` event sink and the `--json` result document.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::io::fs::write_atomic;
use crate::ledger::{Event, EventSink, RunSummary};

/// Appends every ledger event as one line to a log file.
pub struct LogFileSink {
    path: PathBuf,
    file: File,
}

impl LogFileSink {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create log dir {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl EventSink for LogFileSink {
    fn emit(&mut self, event: &Event) -> Result<()> {
        writeln!(self.file, "{}", event.message)
            .with_context(|| format!("append to log {}", self.path.display()))
    }
}

/// Write the run summary as pretty-printed JSON with trailing newline.
pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(summary).context("serialize run summary")?;
    payload.push('\n');
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    write_atomic(path, payload.as_bytes())
}
