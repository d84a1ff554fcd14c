//! In-memory logger shared by unit tests that assert on emitted log entries.

use std::sync::{Arc, Mutex};
use crate::engine::Engine;
use crate::log::{LogEntry, Logger, LogSeverity};

/// Captures `(severity, source, message)` triples
#[derive(Clone, Default)]
pub struct CaptureLogger {
    entries: Arc<Mutex<Vec<(LogSeverity, String, String)>>>,
}

impl CaptureLogger {
    /// Install a fresh capture logger as the engine logger and return a handle to it
    pub fn install() -> Self {
        let logger = Self::default();
        Engine::set_logger(logger.clone());
        logger
    }

    /// Entries emitted by one source. Tests running in parallel may log
    /// through the same global logger, so assertions filter by source.
    pub fn from_source(&self, source: &str) -> Vec<(LogSeverity, String)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s, _)| s == source)
            .map(|(severity, _, message)| (*severity, message.clone()))
            .collect()
    }

    pub fn count(&self, source: &str, severity: LogSeverity) -> usize {
        self.from_source(source).iter().filter(|(s, _)| *s == severity).count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.lock().unwrap().iter().any(|(_, _, m)| m.contains(needle))
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries
            .lock()
            .unwrap()
            .push((entry.severity, entry.source.clone(), entry.message.clone()));
    }
}
