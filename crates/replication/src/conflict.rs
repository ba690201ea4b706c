//! Bounded log of replica-side conflict resolutions (§4.6 "Conflict
//! detection on the replica"): capped at 100 most recent entries.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const CAPACITY: usize = 100;

/// A single conflict resolution, recorded after an incoming `set`
/// conflicted with a newer local write for the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub key: String,
    pub local_ts: i64,
    pub remote_ts: i64,
    /// `"on_conflict"` if a caller-supplied resolver ran, `"lww_remote"`
    /// otherwise.
    pub strategy: String,
    pub resolved_at: i64,
}

/// Append-only, capacity-bounded conflict history.
#[derive(Debug, Clone, Default)]
pub struct ConflictLog {
    entries: VecDeque<ConflictEntry>,
}

impl ConflictLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry`, evicting the oldest entry if at capacity.
    pub fn push(&mut self, entry: ConflictEntry) {
        if self.entries.len() >= CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// The conflict history, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ConflictEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
