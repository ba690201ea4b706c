//! Per-follower health bookkeeping (§4.6 "Heartbeat"). Written only by the
//! replicator; readable from the status surface without locking because
//! entries are immutable once appended (§5).

use std::collections::HashMap;

/// Consecutive failures before a follower is marked down.
const DOWN_THRESHOLD: u32 = 3;

/// Observed reachability of one follower.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FollowerHealth {
    pub alive: bool,
    pub fail_count: u32,
    pub last_ping: Option<i64>,
    pub lag_ms: Option<i64>,
}

/// Health state for every configured follower, keyed by endpoint URL.
#[derive(Debug, Clone, Default)]
pub struct HealthTable {
    followers: HashMap<String, FollowerHealth>,
}

impl HealthTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, follower: &str) -> &mut FollowerHealth {
        self.followers.entry(follower.to_string()).or_insert_with(|| FollowerHealth { alive: true, ..Default::default() })
    }

    /// Record a successful broadcast or heartbeat to `follower` sent at
    /// `sent_at` and acknowledged at `observed_at`.
    pub fn record_success(&mut self, follower: &str, sent_at: i64, observed_at: i64) {
        let entry = self.entry(follower);
        entry.alive = true;
        entry.fail_count = 0;
        entry.last_ping = Some(observed_at);
        entry.lag_ms = Some((observed_at - sent_at).max(0));
    }

    /// Record a failed broadcast or heartbeat to `follower`. Marks it down
    /// once `DOWN_THRESHOLD` consecutive failures accumulate.
    pub fn record_failure(&mut self, follower: &str) {
        let entry = self.entry(follower);
        entry.fail_count += 1;
        if entry.fail_count >= DOWN_THRESHOLD {
            entry.alive = false;
        }
    }

    /// Health of one follower, if it has ever been observed.
    pub fn get(&self, follower: &str) -> Option<&FollowerHealth> {
        self.followers.get(follower)
    }

    /// A snapshot of the full health table for the status surface.
    pub fn snapshot(&self) -> HashMap<String, FollowerHealth> {
        self.followers.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_fail_count_and_marks_alive() {
        let mut table = HealthTable::new();
        table.record_failure("http://f1");
        table.record_success("http://f1", 100, 120);
        let health = table.get("http://f1").unwrap();
        assert!(health.alive);
        assert_eq!(health.fail_count, 0);
        assert_eq!(health.lag_ms, Some(20));
    }

    #[test]
    fn consecutive_failures_mark_follower_down() {
        let mut table = HealthTable::new();
        for _ in 0..DOWN_THRESHOLD {
            table.record_failure("http://f1");
        }
        assert!(!table.get("http://f1").unwrap().alive);
    }

    #[test]
    fn single_failure_does_not_yet_mark_down() {
        let mut table = HealthTable::new();
        table.record_failure("http://f1");
        assert!(table.get("http://f1").unwrap().alive);
    }
}
