//! # emberstore
//!
//! An embeddable, file-backed document store: a WAL for durability, TTL
//! expiry, key watchers and a store-wide event feed, secondary indexes
//! (hash/range/text), a query engine with predicate and `field op value`
//! dispatch, namespaced collections with schema validation, and
//! last-writer-wins replication to followers over HTTP.
//!
//! # Quick start
//!
//! ```no_run
//! use emberstore::{Database, EngineOptions, Value};
//!
//! fn main() -> emberstore::Result<()> {
//!     let db = Database::init(EngineOptions::new("./data"))?;
//!     db.set("user:1", Value::from_json(serde_json::json!({"name": "Alice"})), None)?;
//!     assert_eq!(db.get("user:1").and_then(|v| v.as_json().get("name").cloned()), Some(serde_json::json!("Alice")));
//!     Ok(())
//! }
//! ```
//!
//! # Layout
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | `emberstore-core` | `Value`, dot-path projection, error type, size limits |
//! | `emberstore-durability` | WAL record format and replay |
//! | `emberstore-storage` | `Store`: keys, TTL, watchers, events, snapshots |
//! | `emberstore-index` | secondary indexes and their maintenance protocol |
//! | `emberstore-query` | predicates, sort/limit/skip pipeline, aggregates |
//! | `emberstore-collection` | namespaced documents with schema validation |
//! | `emberstore-replication` | follower envelopes, health, conflict resolution |
//! | `emberstore-engine` | `Database`: wires all of the above behind one writer lock |
//! | `emberstore-api` | this crate's facade re-exports |
//!
//! Only the surface re-exported here and from `emberstore-api` is stable;
//! the individual crates may change shape between releases.

pub use emberstore_api::*;
