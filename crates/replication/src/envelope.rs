//! Wire envelope exchanged between primary and replica (§4.6, §6): a
//! single encoded op, `{op, key, value?, ts, nodeId}`. POSTed whole; a 2xx
//! response acknowledges receipt and application.

use emberstore_core::Value;
use serde::{Deserialize, Serialize};

/// The mutation kind carried by an [`Envelope`]. Keys beginning with `_`
/// are never wrapped in one of these (§4.6 "Exclusions").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Set,
    Delete,
    Clear,
}

/// A single replicated mutation, broadcast by the primary and applied by
/// each replica through the same store pipeline a local write would use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub op: OpKind,
    /// Required for `set`/`delete`; absent for `clear`.
    pub key: Option<String>,
    /// Required for `set`; absent otherwise.
    pub value: Option<Value>,
    /// Server wall-clock timestamp on the originating node, milliseconds
    /// since the Unix epoch.
    pub ts: i64,
    #[serde(rename = "nodeId")]
    pub node_id: String,
}

impl Envelope {
    /// Build a `set` envelope.
    pub fn set(key: impl Into<String>, value: Value, ts: i64, node_id: impl Into<String>) -> Self {
        Envelope { op: OpKind::Set, key: Some(key.into()), value: Some(value), ts, node_id: node_id.into() }
    }

    /// Build a `delete` envelope.
    pub fn delete(key: impl Into<String>, ts: i64, node_id: impl Into<String>) -> Self {
        Envelope { op: OpKind::Delete, key: Some(key.into()), value: None, ts, node_id: node_id.into() }
    }

    /// Build a `clear` envelope.
    pub fn clear(ts: i64, node_id: impl Into<String>) -> Self {
        Envelope { op: OpKind::Clear, key: None, value: None, ts, node_id: node_id.into() }
    }

    /// True if this op targets (or, for `clear`, implies) a key that is
    /// node-local state and must never cross the wire.
    pub fn is_excluded(&self) -> bool {
        self.key.as_deref().map(|k| k.starts_with('_')).unwrap_or(false)
    }
}
