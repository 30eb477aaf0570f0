//! Append-only event log with sort-on-flush persistence.
//!
//! Pulse draining interleaves with trial logic, so append order can briefly
//! violate time order; sorting at flush restores the canonical order the
//! analysis side expects.

use std::fs;
use std::path::PathBuf;

use esrun_core::{Event, EventKind};
use tracing::warn;

pub struct EventLog {
    path: PathBuf,
    buf: Vec<Event>,
}

impl EventLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            buf: Vec::new(),
        }
    }

    pub fn record(&mut self, time: f64, kind: EventKind, trial: Option<usize>) {
        self.buf.push(Event::new(time, kind, trial));
    }

    /// Sorts the buffer ascending by time and rewrites the log file.
    ///
    /// A write failure is logged and absorbed: trial progression must never
    /// stall on storage, and the next flush retries with the full buffer.
    pub fn flush(&mut self) {
        self.buf.sort_by(|a, b| a.time.total_cmp(&b.time));
        if let Err(e) = self.write_file() {
            warn!(path = %self.path.display(), error = %e, "event log flush failed, retrying on next flush");
        }
    }

    fn write_file(&self) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(&self.buf)?;
        fs::write(&self.path, json)
    }

    pub fn events(&self) -> &[Event] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
