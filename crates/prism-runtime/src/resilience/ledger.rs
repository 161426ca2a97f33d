//! In-memory error ledger.
//!
//! Tracks per-kind occurrence counts and last-occurrence timestamps, plus a
//! bounded journal of the most recent events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};

use super::kind::ErrorKind;

/// One occurrence of a classified failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,

    /// Diagnostic context, already converted to JSON
    pub context: Value,

    pub timestamp: DateTime<Utc>,
}

/// Accumulated statistics for a single kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KindStats {
    pub count: u32,

    /// Absent if the kind was never logged since the last clear
    pub last_occurred: Option<DateTime<Utc>>,
}

/// Snapshot of the ledger's statistics, with an entry for every kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorStats {
    kinds: BTreeMap<ErrorKind, KindStats>,
}

impl ErrorStats {
    /// Statistics for `kind`. Never-logged kinds report a zero count.
    pub fn get(&self, kind: ErrorKind) -> KindStats {
        self.kinds.get(&kind).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ErrorKind, KindStats)> + '_ {
        self.kinds.iter().map(|(kind, stats)| (*kind, *stats))
    }

    /// Total occurrences across all kinds.
    pub fn total(&self) -> u64 {
        self.kinds.values().map(|s| u64::from(s.count)).sum()
    }
}

/// Per-kind counters and recent events.
#[derive(Debug)]
pub struct ErrorLedger {
    stats: HashMap<ErrorKind, KindStats>,
    recent: VecDeque<ErrorEvent>,
    max_recent: usize,
}

impl ErrorLedger {
    /// Create an empty ledger keeping at most `max_recent` events.
    pub fn new(max_recent: usize) -> Self {
        Self {
            stats: HashMap::new(),
            recent: VecDeque::with_capacity(max_recent.min(1024)),
            max_recent,
        }
    }

    /// Record an event and return the kind's new count.
    pub fn record(&mut self, event: ErrorEvent) -> u32 {
        let stats = self.stats.entry(event.kind).or_default();
        stats.count = stats.count.saturating_add(1);
        stats.last_occurred = Some(event.timestamp);
        let count = stats.count;

        if self.max_recent > 0 {
            while self.recent.len() >= self.max_recent {
                self.recent.pop_front();
            }
            self.recent.push_back(event);
        }

        count
    }

    pub fn count(&self, kind: ErrorKind) -> u32 {
        self.stats.get(&kind).map(|s| s.count).unwrap_or(0)
    }

    /// Statistics for every kind.
    pub fn stats(&self) -> ErrorStats {
        let kinds = ErrorKind::ALL
            .into_iter()
            .map(|kind| (kind, self.stats.get(&kind).copied().unwrap_or_default()))
            .collect();
        ErrorStats { kinds }
    }

    /// Kinds whose count has reached `threshold`, in taxonomy order.
    pub fn kinds_at_or_above(&self, threshold: u32) -> Vec<(ErrorKind, u32)> {
        ErrorKind::ALL
            .into_iter()
            .map(|kind| (kind, self.count(kind)))
            .filter(|(_, count)| *count >= threshold)
            .collect()
    }

    /// Most recent events, oldest first.
    pub fn recent(&self) -> Vec<ErrorEvent> {
        self.recent.iter().cloned().collect()
    }

    /// Reset every count and timestamp and drop the journal.
    pub fn clear(&mut self) {
        self.stats.clear();
        self.recent.clear();
    }
}

impl Default for ErrorLedger {
    fn default() -> Self {
        Self::new(100)
    }
}
