//! Channel history tracking.
//!
//! Each state keeps its own record of the channel values it has observed,
//! which backs the temporal conditions (`CHANGE`, `NEW`). The engine also
//! keeps a session-wide log of state switches.

use crate::core::channels::Channels;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A copy of one channel's values at the moment they changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub values: Vec<f64>,
    pub recorded_at: DateTime<Utc>,
}

/// Per-state change flags and snapshot history, keyed by channel.
///
/// A snapshot is appended only when the channel's values differ from the
/// last one recorded here, or when nothing has been recorded yet for the
/// channel.
#[derive(Clone, Debug, Default)]
pub struct ChannelHistory {
    changed: HashMap<String, bool>,
    snapshots: HashMap<String, Vec<Snapshot>>,
}

impl ChannelHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag every channel whose current values differ from its latest
    /// snapshot, or which has no snapshot yet.
    pub fn recompute_change_flags(&mut self, channels: &Channels) {
        for (key, values) in channels.iter() {
            let changed = match self.latest(key) {
                Some(last) => last.values.as_slice() != values,
                None => true,
            };
            self.changed.insert(key.to_string(), changed);
        }
    }

    /// Append a snapshot for every flagged channel.
    pub fn record_flagged(&mut self, channels: &Channels) {
        let now = Utc::now();
        for (key, values) in channels.iter() {
            let entry = self.snapshots.entry(key.to_string()).or_default();
            if self.changed.get(key).copied().unwrap_or(false) {
                entry.push(Snapshot {
                    values: values.to_vec(),
                    recorded_at: now,
                });
            }
        }
    }

    /// Whether the channel's change flag is currently set.
    pub fn changed(&self, key: &str) -> bool {
        self.changed.get(key).copied().unwrap_or(false)
    }

    /// Whether `values` matches any snapshot recorded for `key`.
    pub fn was_seen(&self, key: &str, values: &[f64]) -> bool {
        self.snapshots
            .get(key)
            .is_some_and(|rows| rows.iter().any(|s| s.values.as_slice() == values))
    }

    pub fn latest(&self, key: &str) -> Option<&Snapshot> {
        self.snapshots.get(key).and_then(|rows| rows.last())
    }

    pub fn snapshots(&self, key: &str) -> &[Snapshot] {
        self.snapshots.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True when no snapshot has been recorded for any channel.
    pub fn is_empty(&self) -> bool {
        self.snapshots.values().all(Vec::is_empty)
    }

    /// Drop every snapshot. Change flags are left for the next recompute.
    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

/// Record of one switch of the active state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
    /// Set when the switch bypassed guard evaluation.
    pub forced: bool,
}

/// Ordered log of state switches for the current session.
///
/// With a non-zero limit only the most recent switches are kept.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransitionLog {
    records: Vec<TransitionRecord>,
    #[serde(default)]
    limit: usize,
}

impl TransitionLog {
    /// An unbounded log.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            limit,
        }
    }

    pub fn record(&mut self, record: TransitionRecord) {
        if self.limit > 0 && self.records.len() >= self.limit {
            let excess = self.records.len() + 1 - self.limit;
            self.records.drain(..excess);
        }
        self.records.push(record);
    }

    /// States traversed in order: the first `from`, then every `to`.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        if let Some(first) = self.records.first() {
            path.push(first.from.as_str());
        }
        for record in &self.records {
            path.push(record.to.as_str());
        }
        path
    }

    /// Elapsed time between the first and last switch.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.records.first(), self.records.last()) {
            last.timestamp
                .signed_duration_since(first.timestamp)
                .to_std()
                .ok()
        } else {
            None
        }
    }

    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
