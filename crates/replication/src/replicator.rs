//! Ties node identity, the follower client, health table, and conflict
//! log together (§4.6). The primary side broadcasts; the replica side
//! resolves conflicts on incoming `set`s. Neither side touches the store
//! directly — callers apply the returned decision through their own
//! write pipeline, keeping this crate free of a `storage` dependency.

use crate::client::{FollowerClient, DEFAULT_TIMEOUT};
use crate::conflict::{ConflictEntry, ConflictLog};
use crate::envelope::{Envelope, OpKind};
use crate::health::HealthTable;
use crate::role::Role;
use emberstore_core::{now_millis, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Caller-supplied resolver for replica-side conflicts: given `(local,
/// remote, op)`, returns the value to apply.
pub type ConflictResolver = Box<dyn Fn(&Value, &Value, OpKind) -> Value + Send>;

/// Construction options for a [`Replicator`].
pub struct ReplicatorOptions {
    pub node_id: Option<String>,
    pub role: Role,
    pub followers: Vec<String>,
    pub timeout: Duration,
    pub on_conflict: Option<ConflictResolver>,
}

impl ReplicatorOptions {
    pub fn new(role: Role) -> Self {
        ReplicatorOptions { node_id: None, role, followers: Vec::new(), timeout: DEFAULT_TIMEOUT, on_conflict: None }
    }

    pub fn followers(mut self, followers: Vec<String>) -> Self {
        self.followers = followers;
        self
    }

    pub fn node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn on_conflict(mut self, resolver: ConflictResolver) -> Self {
        self.on_conflict = Some(resolver);
        self
    }
}

/// The outcome of handing an incoming [`Envelope`] to
/// [`Replicator::apply_op`]: what, if anything, the caller should now
/// write through its own store pipeline.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Excluded by the `_`-prefix rule; the caller must not apply it.
    Excluded,
    /// Apply as-is: no conflicting local write was observed.
    Apply { key: String, op: OpKind, value: Option<Value> },
    /// A newer local write existed; apply `value` (already resolved) and
    /// note that `entry` was appended to the conflict log.
    Conflict { key: String, op: OpKind, value: Value, entry: ConflictEntry },
}

/// Node identity plus the outbound broadcast/heartbeat client, health
/// table, and replica-side conflict bookkeeping.
pub struct Replicator {
    node_id: String,
    role: Role,
    followers: Vec<String>,
    client: FollowerClient,
    health: HealthTable,
    conflicts: ConflictLog,
    on_conflict: Option<ConflictResolver>,
    recent_writes: HashMap<String, (i64, Value)>,
}

impl Replicator {
    pub fn new(options: ReplicatorOptions) -> emberstore_core::Result<Self> {
        let node_id = options.node_id.unwrap_or_else(|| format!("node-{}", uuid::Uuid::new_v4()));
        let client = FollowerClient::new(options.timeout)?;
        Ok(Replicator {
            node_id,
            role: options.role,
            followers: options.followers,
            client,
            health: HealthTable::new(),
            conflicts: ConflictLog::new(),
            on_conflict: options.on_conflict,
            recent_writes: HashMap::new(),
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn health(&self) -> &HealthTable {
        &self.health
    }

    pub fn conflicts(&self) -> &ConflictLog {
        &self.conflicts
    }

    /// Remember that `key` was written locally at `ts` with `value`, so a
    /// later conflicting incoming op can be compared against it. The
    /// engine calls this after every local write that is not itself the
    /// result of `apply_op`.
    pub fn record_local_write(&mut self, key: &str, ts: i64, value: Value) {
        self.recent_writes.insert(key.to_string(), (ts, value));
    }

    /// Broadcast `envelope` to every follower. Fire-and-await-per-follower
    /// with the configured timeout; failures update the health table and
    /// never propagate to the write caller (§4.6 "Broadcast policy").
    /// A no-op if this node is not the primary, or if `envelope` targets
    /// an excluded key.
    pub fn broadcast(&mut self, envelope: &Envelope) {
        if !self.role.is_primary() || envelope.is_excluded() {
            return;
        }
        let sent_at = envelope.ts;
        for follower in self.followers.clone() {
            match self.client.post_envelope(&follower, envelope) {
                Ok(()) => self.health.record_success(&follower, sent_at, now_millis()),
                Err(e) => {
                    tracing::warn!(follower, error = %e, "replication broadcast failed");
                    self.health.record_failure(&follower);
                }
            }
        }
    }

    /// Ping every follower, updating health on success or failure.
    pub fn heartbeat(&mut self) {
        if !self.role.is_primary() {
            return;
        }
        for follower in self.followers.clone() {
            let sent_at = now_millis();
            match self.client.ping(&follower) {
                Ok(()) => self.health.record_success(&follower, sent_at, now_millis()),
                Err(e) => {
                    tracing::warn!(follower, error = %e, "heartbeat failed");
                    self.health.record_failure(&follower);
                }
            }
        }
    }

    /// Resolve an incoming replicated op against the last known local
    /// write for its key. Only `set` ops are subject to conflict
    /// detection; `delete`/`clear` apply unconditionally.
    pub fn apply_op(&mut self, envelope: Envelope) -> ApplyOutcome {
        if envelope.is_excluded() {
            return ApplyOutcome::Excluded;
        }

        match envelope.op {
            OpKind::Set => {
                let key = envelope.key.clone().unwrap_or_default();
                let remote_value = envelope.value.clone().unwrap_or_else(Value::null);
                if let Some((local_ts, local_value)) = self.recent_writes.get(&key).cloned() {
                    if local_ts > envelope.ts {
                        let (resolved, strategy) = match &self.on_conflict {
                            Some(resolver) => (resolver(&local_value, &remote_value, envelope.op), "on_conflict"),
                            None => (remote_value.clone(), "lww_remote"),
                        };
                        let entry = ConflictEntry {
                            key: key.clone(),
                            local_ts,
                            remote_ts: envelope.ts,
                            strategy: strategy.to_string(),
                            resolved_at: now_millis(),
                        };
                        self.conflicts.push(entry.clone());
                        self.recent_writes.insert(key.clone(), (local_ts.max(envelope.ts), resolved.clone()));
                        return ApplyOutcome::Conflict { key, op: envelope.op, value: resolved, entry };
                    }
                }
                self.recent_writes.insert(key.clone(), (envelope.ts, remote_value.clone()));
                ApplyOutcome::Apply { key, op: envelope.op, value: Some(remote_value) }
            }
            OpKind::Delete => {
                let key = envelope.key.clone().unwrap_or_default();
                self.recent_writes.remove(&key);
                ApplyOutcome::Apply { key, op: envelope.op, value: None }
            }
            OpKind::Clear => {
                self.recent_writes.clear();
                ApplyOutcome::Apply { key: String::new(), op: envelope.op, value: None }
            }
        }
    }
}
