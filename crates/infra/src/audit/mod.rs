//! Structured job audit trail.
//!
//! Every state transition of a store job (`locked`, `has_lock`, `started`,
//! `finished`, `unlocked`, `failed`) is emitted as a [`JobEvent`] whose
//! message key is hierarchical and machine-parseable:
//!
//! ```text
//! <job kind path>:<store domain>:<event>      e.g. update_store:shop1.example.com:started
//! ```
//!
//! Events are handed to a [`LogSink`] on a named channel. The sink is the
//! boundary to whatever log backend the process uses.

pub mod sinks;
pub mod timing;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use storesync_core::{JobId, Store};

use crate::jobs::JobKind;

pub use sinks::{MemorySink, TracingSink};
pub use timing::{Marker, Window};

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEvent {
    kind_path: String,
    store_domain: String,
    name: String,
    severity: Severity,
    data: Map<String, JsonValue>,
    timestamp: DateTime<Utc>,
    message: String,
}

impl JobEvent {
    fn new(
        kind: JobKind,
        store_domain: &str,
        name: &str,
        severity: Severity,
        data: Map<String, JsonValue>,
    ) -> Self {
        let kind_segments = kind.log_segments();
        let message = kind_segments
            .iter()
            .map(String::as_str)
            .chain([store_domain, name])
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(":");

        Self {
            kind_path: kind_segments.join(":"),
            store_domain: store_domain.to_string(),
            name: name.to_string(),
            severity,
            data,
            timestamp: Utc::now(),
            message,
        }
    }

    /// Hierarchical message key, e.g. `update_store:shop1.example.com:started`.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind_path(&self) -> &str {
        &self.kind_path
    }

    pub fn store_domain(&self) -> &str {
        &self.store_domain
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn data(&self) -> &Map<String, JsonValue> {
        &self.data
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Boundary to the log backend.
///
/// Implementations must not fail the caller: a broken backend loses log lines,
/// it never aborts a job.
pub trait LogSink: Send + Sync {
    fn log(&self, channel: &str, event: &JobEvent);
}

impl<S> LogSink for Arc<S>
where
    S: LogSink + ?Sized,
{
    fn log(&self, channel: &str, event: &JobEvent) {
        (**self).log(channel, event)
    }
}

/// Builds [`JobEvent`]s for a store and hands them to the configured sink.
#[derive(Clone)]
pub struct EventLogger {
    sink: Arc<dyn LogSink>,
    channel: String,
}

impl core::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventLogger")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl EventLogger {
    pub fn new(sink: Arc<dyn LogSink>, channel: impl Into<String>) -> Self {
        Self {
            sink,
            channel: channel.into(),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Emit an event about `store` outside of a running job.
    ///
    /// `data` wins over the store's identifying fields on key collisions.
    pub fn emit(
        &self,
        kind: JobKind,
        store: &Store,
        event: &str,
        data: Map<String, JsonValue>,
        severity: Severity,
    ) {
        let mut data = data;
        for (key, value) in store.log_fields() {
            data.entry(key).or_insert(value);
        }

        let event = JobEvent::new(kind, &store.myshopify_domain, event, severity, data);
        self.sink.log(&self.channel, &event);
    }

    /// Emit an event from inside a job run; adds the (nullable) `job_id`.
    pub fn emit_for_job(
        &self,
        kind: JobKind,
        store: &Store,
        job_id: Option<JobId>,
        event: &str,
        data: Map<String, JsonValue>,
        severity: Severity,
    ) {
        let mut data = data;
        data.entry("job_id")
            .or_insert_with(|| job_id.map_or(JsonValue::Null, |id| JsonValue::String(id.to_string())));
        self.emit(kind, store, event, data, severity);
    }

    /// Log a job that ended in error as `failed`, at error level.
    pub fn failed(
        &self,
        kind: JobKind,
        store: &Store,
        job_id: Option<JobId>,
        error: &dyn core::fmt::Display,
    ) {
        let mut data = Map::new();
        data.insert("error".to_string(), JsonValue::String(error.to_string()));
        self.emit_for_job(kind, store, job_id, "failed", data, Severity::Error);
    }
}

/// Snake-case one taxonomy segment: `UpdateStore` → `update_store`.
pub fn snake_case(segment: &str) -> String {
    let chars: Vec<char> = segment.chars().collect();
    let mut out = String::with_capacity(segment.len() + 4);

    for (i, c) in chars.iter().enumerate() {
        if c.is_whitespace() || *c == '-' {
            if !out.ends_with('_') && !out.is_empty() {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev = i.checked_sub(1).and_then(|p| chars.get(p));
            let next = chars.get(i + 1);
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(|n| n.is_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(*c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use storesync_core::StoreId;

    fn logger() -> (EventLogger, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (EventLogger::new(sink.clone(), "storesync"), sink)
    }

    #[test]
    fn snake_cases_taxonomy_segments() {
        assert_eq!(snake_case("UpdateStore"), "update_store");
        assert_eq!(snake_case("Jobs"), "jobs");
        assert_eq!(snake_case("SyncHTTPHooks"), "sync_http_hooks");
        assert_eq!(snake_case("Update2Store"), "update2_store");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn message_key_joins_kind_domain_and_event() {
        let (logger, sink) = logger();
        let store = Store::new(StoreId::new(1), "shop1.example.com", "tok");

        logger.emit(JobKind::UpdateStore, &store, "started", Map::new(), Severity::Info);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message(), "update_store:shop1.example.com:started");
        assert_eq!(events[0].kind_path(), "update_store");
        assert_eq!(events[0].severity(), Severity::Info);
        assert_eq!(sink.channels(), vec!["storesync".to_string()]);
    }

    #[test]
    fn empty_segments_are_dropped_from_the_key() {
        let (logger, sink) = logger();
        let store = Store::new(StoreId::new(1), "", "tok");

        logger.emit(JobKind::UpdateStore, &store, "unlocked", Map::new(), Severity::Info);

        assert_eq!(sink.events()[0].message(), "update_store:unlocked");
    }

    #[test]
    fn caller_data_wins_over_store_fields() {
        let (logger, sink) = logger();
        let store = Store::new(StoreId::new(9), "shop9.example.com", "tok");
        let mut data = Map::new();
        data.insert("name".to_string(), json!("override"));

        logger.emit(JobKind::UpdateStore, &store, "started", data, Severity::Info);

        let data = sink.events()[0].data().clone();
        assert_eq!(data["name"], json!("override"));
        assert_eq!(data["store_id"], json!(9));
        assert_eq!(data["myshopify_domain"], json!("shop9.example.com"));
    }

    #[test]
    fn job_id_is_nullable() {
        let (logger, sink) = logger();
        let store = Store::new(StoreId::new(3), "shop3.example.com", "tok");
        let job_id = JobId::new();

        logger.emit_for_job(JobKind::UpdateStore, &store, None, "started", Map::new(), Severity::Info);
        logger.emit_for_job(
            JobKind::UpdateStore,
            &store,
            Some(job_id),
            "finished",
            Map::new(),
            Severity::Info,
        );

        let events = sink.events();
        assert_eq!(events[0].data()["job_id"], JsonValue::Null);
        assert_eq!(events[1].data()["job_id"], json!(job_id.to_string()));
    }
}
