//! Public embedded API (§6): a thin re-export facade over the engine and
//! its supporting crates. A host embeds `emberstore-api` and gets the
//! whole stack — store, query, indexes, collections, replication — behind
//! one `Database` handle without reaching into the individual layers.

#![warn(missing_docs)]

pub use emberstore_collection::{Collection, FieldRule, FieldType, Schema};
pub use emberstore_core::{get_at_path, EmberError, Limits, Path, Result, Value};
pub use emberstore_durability::DurabilityMode;
pub use emberstore_engine::{
    Database, EngineOptions, IdentityCodec, InterceptorChain, PostRead, PostWrite, PreRead,
    PreReadOutcome, PreWrite, PreWriteOutcome, ReplicationStatus, StoreRegistry, ValueCodec,
};
pub use emberstore_index::{IndexKind, Operator};
pub use emberstore_query::{ResultPipeline, SortDirection, WhereClause};
pub use emberstore_replication::{
    ApplyOutcome, ConflictEntry, Envelope, FollowerHealth, OpKind, ReplicatorOptions, Role,
};

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_set_get_through_the_facade() {
        let dir = tempdir().unwrap();
        let db = Database::init(EngineOptions::new(dir.path().join("db"))).unwrap();
        db.set("a", Value::from(1i64), None).unwrap();
        assert_eq!(db.get("a"), Some(Value::from(1i64)));
    }

    #[test]
    fn collection_and_index_types_are_reachable_from_the_facade() {
        let dir = tempdir().unwrap();
        let db = Database::init(EngineOptions::new(dir.path().join("db"))).unwrap();
        db.create_index("age", IndexKind::Hash).unwrap();
        assert_eq!(db.list_indexes(), vec![("age".to_string(), IndexKind::Hash)]);
    }
}
