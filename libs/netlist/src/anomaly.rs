//! Anomaly reporting for the extractor.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Sink for extraction anomalies.
///
/// Anomalies (skipped models, nested subcircuits, malformed directives,
/// parameter parse failures) are emitted as `tracing` warnings. When a log
/// path is configured, one line per anomaly is also appended to that file.
/// Clones share the same file handle, which is released when the last clone
/// is dropped.
#[derive(Clone, Default)]
pub struct AnomalyLog {
    sink: Option<Arc<Mutex<File>>>,
}

impl AnomalyLog {
    /// A log that only emits `tracing` warnings.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A log that also appends one line per anomaly to the file at `path`.
    pub fn to_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            sink: Some(Arc::new(Mutex::new(file))),
        })
    }

    /// Records one anomaly.
    pub fn record(&self, source: &str, line: u32, message: &str) {
        tracing::warn!(source, line, "{message}");
        if let Some(sink) = &self.sink {
            if let Ok(mut out) = sink.lock() {
                let _ = writeln!(out, "{source}:{line}: {message}");
            }
        }
    }
}

impl std::fmt::Debug for AnomalyLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnomalyLog")
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}
