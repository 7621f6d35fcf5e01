//! Start/finish markers for a job execution.
//!
//! Markers pair a wall-clock timestamp (for humans and log correlation) with a
//! monotonic instant (for durations). They are observability only and are
//! never used to compute lock expiry.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value as JsonValue, json};

static PROCESS_ANCHOR: OnceLock<Instant> = OnceLock::new();

fn anchor() -> Instant {
    *PROCESS_ANCHOR.get_or_init(Instant::now)
}

/// A `{wall, monotonic}` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    pub wall: DateTime<Utc>,
    pub monotonic: Instant,
}

impl Marker {
    pub fn now() -> Self {
        // Initialise the anchor before sampling so offsets are never negative.
        let _ = anchor();
        Self {
            wall: Utc::now(),
            monotonic: Instant::now(),
        }
    }

    /// Microseconds since the first marker taken in this process.
    pub fn monotonic_us(&self) -> u64 {
        self.monotonic
            .saturating_duration_since(anchor())
            .as_micros()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    pub fn to_json(&self) -> JsonValue {
        json!({
            "at": self.wall.to_rfc3339_opts(SecondsFormat::Micros, true),
            "monotonic_us": self.monotonic_us(),
        })
    }
}

/// Execution window of one job run. `finished` stays empty if the run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub started: Marker,
    pub finished: Option<Marker>,
}

impl Window {
    pub fn duration(&self) -> Option<Duration> {
        self.finished
            .map(|f| f.monotonic.saturating_duration_since(self.started.monotonic))
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }
}

/// Open a window at the current instant.
pub fn mark_start() -> Window {
    Window {
        started: Marker::now(),
        finished: None,
    }
}

/// Close `window` at the current instant.
pub fn mark_finish(window: Window) -> Window {
    Window {
        finished: Some(Marker::now()),
        ..window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_marker_follows_start_marker() {
        let window = mark_start();
        assert!(!window.is_finished());
        assert_eq!(window.duration(), None);

        std::thread::sleep(Duration::from_millis(5));
        let window = mark_finish(window);

        let finished = window.finished.unwrap();
        assert!(finished.wall >= window.started.wall);
        assert!(finished.monotonic_us() >= window.started.monotonic_us());
        assert!(window.duration().unwrap() >= Duration::from_millis(5));
    }

    #[test]
    fn marker_renders_wall_and_monotonic_parts() {
        let marker = Marker::now();
        let rendered = marker.to_json();

        assert!(rendered["at"].as_str().unwrap().ends_with('Z'));
        assert!(rendered["monotonic_us"].is_u64());
    }
}
