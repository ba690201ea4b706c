//! Primary/replica replication: outbound broadcast and heartbeat client,
//! follower health table, and last-writer-wins conflict resolution with a
//! bounded conflict log (§4.6).

pub mod client;
pub mod conflict;
pub mod envelope;
pub mod health;
pub mod replicator;
pub mod role;

pub use client::{FollowerClient, DEFAULT_TIMEOUT};
pub use conflict::{ConflictEntry, ConflictLog};
pub use envelope::{Envelope, OpKind};
pub use health::{FollowerHealth, HealthTable};
pub use replicator::{ApplyOutcome, ConflictResolver, Replicator, ReplicatorOptions};
pub use role::Role;
