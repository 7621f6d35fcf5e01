//! Log sink implementations.

use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use super::{JobEvent, LogSink, Severity};

/// Re-emits job events through `tracing`.
///
/// The message key becomes the log message; the structured payload is attached
/// as a JSON `data` field so JSON subscribers keep it machine-parseable.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingSink {
    fn log(&self, channel: &str, event: &JobEvent) {
        let data = serde_json::to_string(event.data()).unwrap_or_else(|_| "{}".to_string());
        let message = event.message();
        let severity = event.severity();

        match severity {
            Severity::Debug => debug!(channel, severity = %severity, data = %data, "{message}"),
            Severity::Info | Severity::Notice => {
                info!(channel, severity = %severity, data = %data, "{message}")
            }
            Severity::Warning => warn!(channel, severity = %severity, data = %data, "{message}"),
            Severity::Error | Severity::Critical => {
                error!(channel, severity = %severity, data = %data, "{message}")
            }
        }
    }
}

/// Records events in memory for tests/dev.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<(String, JobEvent)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, in emission order.
    pub fn events(&self) -> Vec<JobEvent> {
        self.records
            .lock()
            .map(|r| r.iter().map(|(_, e)| e.clone()).collect())
            .unwrap_or_default()
    }

    /// Channels the events were logged on, in emission order.
    pub fn channels(&self) -> Vec<String> {
        self.records
            .lock()
            .map(|r| r.iter().map(|(c, _)| c.clone()).collect())
            .unwrap_or_default()
    }

    /// Message keys, in emission order.
    pub fn messages(&self) -> Vec<String> {
        self.events().iter().map(|e| e.message().to_string()).collect()
    }

    /// Events with the given name (`started`, `locked`, ...).
    pub fn named(&self, name: &str) -> Vec<JobEvent> {
        self.events().into_iter().filter(|e| e.name() == name).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut r) = self.records.lock() {
            r.clear();
        }
    }
}

impl LogSink for MemorySink {
    fn log(&self, channel: &str, event: &JobEvent) {
        if let Ok(mut r) = self.records.lock() {
            r.push((channel.to_string(), event.clone()));
        }
    }
}
