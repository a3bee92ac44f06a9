//! Adapter counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which event source the adapter is consuming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// PostgreSQL `LISTEN/NOTIFY` change feed.
    ChangeFeed,
    /// Periodic predicate queries (degraded mode).
    Polling,
    /// In-process broadcast feed.
    InMemory,
    /// Capture turned off in configuration.
    Disabled,
}

impl CaptureMode {
    /// Return the mode as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChangeFeed => "change_feed",
            Self::Polling => "polling",
            Self::InMemory => "in_memory",
            Self::Disabled => "disabled",
        }
    }

    /// Whether the adapter is running without a live feed.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Polling)
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the adapter's counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterStats {
    /// Source in use; `None` before `start`.
    pub mode: Option<CaptureMode>,
    /// Whether the consume loop is running.
    pub running: bool,
    /// Events handled without error.
    pub events_processed: u64,
    /// Events (or source reads) that failed.
    pub events_failed: u64,
    /// Notifications created from events.
    pub notifications_created: u64,
    /// When the last event was handled.
    pub last_event_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
    created: AtomicU64,
    last_event_ms: AtomicU64,
}

impl Counters {
    pub(crate) fn record_success(&self, created: usize) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.created.fetch_add(created as u64, Ordering::Relaxed);
        self.touch();
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.touch();
    }

    fn touch(&self) {
        let ms = Utc::now().timestamp_millis().max(0) as u64;
        self.last_event_ms.store(ms, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, mode: Option<CaptureMode>, running: bool) -> AdapterStats {
        let last = self.last_event_ms.load(Ordering::Relaxed);
        AdapterStats {
            mode,
            running,
            events_processed: self.processed.load(Ordering::Relaxed),
            events_failed: self.failed.load(Ordering::Relaxed),
            notifications_created: self.created.load(Ordering::Relaxed),
            last_event_at: (last > 0)
                .then(|| DateTime::from_timestamp_millis(last as i64))
                .flatten(),
        }
    }
}
